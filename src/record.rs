//! Chunks of records.
//!
//! A record is the concatenation of its fields (point14, rgb, nir,
//! wave packet, extra bytes), each coded by its own layered field codec.
//! The point14 field sets the scanner channel context, the fields after it
//! follow that context.
//!
//! A chunk is laid out as:
//!
//! 1. the first record, raw;
//! 2. the number of records of the chunk (u32);
//! 3. the size of every layer of every field;
//! 4. the layers.
use std::io::{Read, Seek, Write};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::las;
use crate::las::laszip::{LazItem, LazItemType};
use crate::las::selective::DecompressionSelection;
use crate::LasZipError;

/// Codec of one field, holding a layer (arithmetic coder) per group of attributes.
pub trait LayeredFieldDecompressor<R: Read + Seek> {
    fn size_of_field(&self) -> usize;

    /// Reads the raw first point of the chunk and resets the contexts.
    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()>;
    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()>;
}

pub trait LayeredFieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    /// Writes the raw first point of the chunk, resets the contexts and empties the layers.
    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()>;

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()>;
    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()>;
}

/// Decodes the records of a stream of chunks.
pub trait RecordDecompressor<R> {
    fn set_fields_from(&mut self, laz_items: &[LazItem]) -> crate::Result<()>;
    fn record_size(&self) -> usize;
    /// Number of records of the current chunk, known once its
    /// first record was decompressed.
    fn record_count(&self) -> u64;

    fn decompress_next(&mut self, out: &mut [u8]) -> std::io::Result<()>;
    /// Gets ready to read a new chunk, keeping the fields.
    fn reset(&mut self);

    fn get_mut(&mut self) -> &mut R;
    fn get(&self) -> &R;

    fn box_into_inner(self: Box<Self>) -> R;
}

/// Encodes records into chunks.
pub trait RecordCompressor<W> {
    fn set_fields_from(&mut self, laz_items: &[LazItem]) -> crate::Result<()>;
    fn record_size(&self) -> usize;
    /// Number of records compressed in the current chunk.
    fn record_count(&self) -> u64;

    fn compress_next(&mut self, input: &[u8]) -> std::io::Result<()>;
    /// Writes the record count and the layers of the current chunk.
    fn done(&mut self) -> std::io::Result<()>;
    /// Gets ready to write a new chunk, keeping the fields.
    fn reset(&mut self);

    fn get_mut(&mut self) -> &mut W;
    fn get(&self) -> &W;

    fn box_into_inner(self: Box<Self>) -> W;
}

/// A field codec and the bytes of the record it covers.
struct Field<C: ?Sized> {
    bytes: Range<usize>,
    codec: Box<C>,
}

fn layered_version(item: &LazItem) -> crate::Result<u16> {
    match item.version {
        3 | 4 => Ok(item.version),
        version => Err(LasZipError::UnsupportedLazItemVersion(item.item_type, version)),
    }
}

/***************************************************************************************************
                    Decompression
***************************************************************************************************/

pub struct LayeredPointRecordDecompressor<R: Read + Seek> {
    fields: Vec<Field<dyn LayeredFieldDecompressor<R> + Send>>,
    input: R,
    record_size: usize,
    /// `None` until the first record of the chunk is read
    record_count: Option<u64>,
    context: usize,
    selection: DecompressionSelection,
}

impl<R: Read + Seek> LayeredPointRecordDecompressor<R> {
    pub fn new(input: R) -> Self {
        Self {
            fields: vec![],
            input,
            record_size: 0,
            record_count: None,
            context: 0,
            selection: DecompressionSelection::all(),
        }
    }

    /// Fields added after this call only decode the layers of `selection`.
    pub fn set_selection(&mut self, selection: DecompressionSelection) {
        self.selection = selection;
    }

    pub fn add_field_decompressor<T: 'static + LayeredFieldDecompressor<R> + Send>(
        &mut self,
        field: T,
    ) {
        let start = self.record_size;
        self.record_size += field.size_of_field();
        self.fields.push(Field {
            bytes: start..self.record_size,
            codec: Box::new(field),
        });
    }

    fn read_chunk_start(&mut self, out: &mut [u8]) -> std::io::Result<u64> {
        for field in &mut self.fields {
            field.codec.init_first_point(
                &mut self.input,
                &mut out[field.bytes.clone()],
                &mut self.context,
            )?;
        }
        let count = self.input.read_u32::<LittleEndian>()?;
        for field in &mut self.fields {
            field.codec.read_layers_sizes(&mut self.input)?;
        }
        for field in &mut self.fields {
            field.codec.read_layers(&mut self.input)?;
        }
        Ok(u64::from(count))
    }
}

impl<R: Read + Seek> RecordDecompressor<R> for LayeredPointRecordDecompressor<R> {
    fn set_fields_from(&mut self, laz_items: &[LazItem]) -> crate::Result<()> {
        let selection = self.selection;
        for item in laz_items {
            let version = layered_version(item)?;
            match item.item_type {
                LazItemType::Point14 => {
                    self.add_field_decompressor(las::LasPoint6Decompressor::selective(selection))
                }
                LazItemType::RGB14 => self.add_field_decompressor(
                    las::LasRGBDecompressor::selective(selection).with_version(version),
                ),
                LazItemType::RGBNIR14 => {
                    self.add_field_decompressor(
                        las::LasRGBDecompressor::selective(selection).with_version(version),
                    );
                    self.add_field_decompressor(
                        las::LasNIRDecompressor::selective(selection).with_version(version),
                    );
                }
                LazItemType::WavePacket14 => self.add_field_decompressor(
                    las::LasWavepacketDecompressor::selective(selection).with_version(version),
                ),
                LazItemType::Byte14(count) => self.add_field_decompressor(
                    las::LasExtraByteDecompressor::selective(usize::from(count), selection)
                        .with_version(version),
                ),
            }
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn record_count(&self) -> u64 {
        self.record_count.unwrap_or(0)
    }

    fn decompress_next(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        if self.record_count.is_none() {
            self.record_count = Some(self.read_chunk_start(out)?);
            return Ok(());
        }
        for field in &mut self.fields {
            field
                .codec
                .decompress_field_with(&mut out[field.bytes.clone()], &mut self.context)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.record_count = None;
        self.context = 0;
    }

    fn get_mut(&mut self) -> &mut R {
        &mut self.input
    }

    fn get(&self) -> &R {
        &self.input
    }

    fn box_into_inner(self: Box<Self>) -> R {
        self.input
    }
}

/***************************************************************************************************
                    Compression
***************************************************************************************************/

pub struct LayeredPointRecordCompressor<W: Write> {
    fields: Vec<Field<dyn LayeredFieldCompressor<W> + Send>>,
    record_size: usize,
    record_count: u32,
    context: usize,
    dst: W,
}

impl<W: Write> LayeredPointRecordCompressor<W> {
    pub fn new(dst: W) -> Self {
        Self {
            fields: vec![],
            record_size: 0,
            record_count: 0,
            context: 0,
            dst,
        }
    }

    pub fn add_field_compressor<T: 'static + LayeredFieldCompressor<W> + Send>(
        &mut self,
        field: T,
    ) {
        let start = self.record_size;
        self.record_size += field.size_of_field();
        self.fields.push(Field {
            bytes: start..self.record_size,
            codec: Box::new(field),
        });
    }
}

impl<W: Write> RecordCompressor<W> for LayeredPointRecordCompressor<W> {
    fn set_fields_from(&mut self, laz_items: &[LazItem]) -> crate::Result<()> {
        for item in laz_items {
            let version = layered_version(item)?;
            match item.item_type {
                LazItemType::Point14 => {
                    self.add_field_compressor(las::LasPoint6Compressor::default())
                }
                LazItemType::RGB14 => {
                    self.add_field_compressor(las::LasRGBCompressor::with_version(version))
                }
                LazItemType::RGBNIR14 => {
                    self.add_field_compressor(las::LasRGBCompressor::with_version(version));
                    self.add_field_compressor(las::LasNIRCompressor::with_version(version));
                }
                LazItemType::WavePacket14 => {
                    self.add_field_compressor(las::LasWavepacketCompressor::with_version(version))
                }
                LazItemType::Byte14(count) => self.add_field_compressor(
                    las::LasExtraByteCompressor::with_version(usize::from(count), version),
                ),
            }
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn record_count(&self) -> u64 {
        u64::from(self.record_count)
    }

    fn compress_next(&mut self, record: &[u8]) -> std::io::Result<()> {
        let is_first = self.record_count == 0;
        for field in &mut self.fields {
            let bytes = &record[field.bytes.clone()];
            if is_first {
                field
                    .codec
                    .init_first_point(&mut self.dst, bytes, &mut self.context)?;
            } else {
                field.codec.compress_field_with(bytes, &mut self.context)?;
            }
        }
        self.record_count += 1;
        Ok(())
    }

    fn done(&mut self) -> std::io::Result<()> {
        if self.record_count == 0 {
            return Ok(());
        }
        self.dst.write_u32::<LittleEndian>(self.record_count)?;
        for field in &mut self.fields {
            field.codec.write_layers_sizes(&mut self.dst)?;
        }
        for field in &mut self.fields {
            field.codec.write_layers(&mut self.dst)?;
        }
        log::debug!("chunk of {} records written", self.record_count);
        Ok(())
    }

    fn reset(&mut self) {
        self.record_count = 0;
        self.context = 0;
    }

    fn get_mut(&mut self) -> &mut W {
        &mut self.dst
    }

    fn get(&self) -> &W {
        &self.dst
    }

    fn box_into_inner(self: Box<Self>) -> W {
        self.dst
    }
}
