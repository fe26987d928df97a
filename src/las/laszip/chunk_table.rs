//! The chunk table, written after the last chunk, gives the size
//! of every chunk so that a reader can jump to any of them.
//!
//! Layout:
//!
//! - u32 version (0)
//! - u32 number of chunks
//! - the entries, arithmetic coded with a 32 bits integer compressor,
//!   each value being predicted by the one of the previous entry.
//!   Variable-size chunks store their point count then their byte count,
//!   fixed-size chunks only store their byte count.
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Index;
use std::slice::SliceIndex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::{LasZipError, LazVlr};

const TABLE_VERSION: u32 = 0;
const POINT_COUNT_CONTEXT: u32 = 0;
const BYTE_COUNT_CONTEXT: u32 = 1;
/// Upper bound of the entries reserved up front, the chunk count
/// comes from the data and cannot be trusted.
const MAX_RESERVED_ENTRIES: usize = 1 << 16;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub point_count: u64,
    pub byte_count: u64,
}

/// Entries of all the chunks, in the order they are in the data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkTable(Vec<ChunkTableEntry>);

impl ChunkTable {
    /// Reads the chunk table of the compressed points data that starts
    /// at the current position of `src`.
    ///
    /// On success, `src` is left at the start of the first chunk.
    ///
    /// With fixed-size chunks the table does not store point counts,
    /// every entry gets the `chunk_size` of the vlr, even the last one
    /// which may hold less points.
    pub fn read_from<R: Read + Seek>(mut src: R, vlr: &LazVlr) -> crate::Result<Self> {
        let data_start = src.seek(SeekFrom::Current(0))?;
        let table_start = find_table_start(&mut src, data_start)?;
        src.seek(SeekFrom::Start(table_start))?;

        let with_point_counts = vlr.uses_variably_sized_chunks();
        let mut table = Self::read_entries(&mut src, with_point_counts)?;
        if !with_point_counts {
            let chunk_size = u64::from(vlr.chunk_size());
            table.0.iter_mut().for_each(|e| e.point_count = chunk_size);
        }
        log::debug!("read chunk table of {} chunks", table.len());

        src.seek(SeekFrom::Start(data_start + OFFSET_SIZE))?;
        Ok(table)
    }

    fn read_entries<R: Read>(src: &mut R, with_point_counts: bool) -> std::io::Result<Self> {
        let _version = src.read_u32::<LittleEndian>()?;
        let num_chunks = src.read_u32::<LittleEndian>()? as usize;
        let mut table = Self(Vec::with_capacity(num_chunks.min(MAX_RESERVED_ENTRIES)));
        if num_chunks == 0 {
            return Ok(table);
        }

        let mut decoder = ArithmeticDecoder::new(src);
        decoder.read_init_bytes()?;
        let mut ic = entries_decompressor();
        let mut previous = ChunkTableEntry::default();
        for _ in 0..num_chunks {
            let point_count = if with_point_counts {
                decode_count(&mut ic, &mut decoder, previous.point_count, POINT_COUNT_CONTEXT)?
            } else {
                0
            };
            let byte_count =
                decode_count(&mut ic, &mut decoder, previous.byte_count, BYTE_COUNT_CONTEXT)?;
            previous = ChunkTableEntry {
                point_count,
                byte_count,
            };
            table.push(previous);
        }
        Ok(table)
    }

    /// Writes the table, point counts are only written when
    /// the vlr uses variable-size chunks.
    pub fn write_to<W: Write>(&self, dst: &mut W, vlr: &LazVlr) -> std::io::Result<()> {
        dst.write_u32::<LittleEndian>(TABLE_VERSION)?;
        dst.write_u32::<LittleEndian>(self.len() as u32)?;
        if !self.is_empty() {
            let with_point_counts = vlr.uses_variably_sized_chunks();
            let mut encoder = ArithmeticEncoder::new(&mut *dst);
            let mut ic = entries_compressor();
            let mut previous = ChunkTableEntry::default();
            for entry in &self.0 {
                if with_point_counts {
                    let (last, count) = (previous.point_count, entry.point_count);
                    encode_count(&mut ic, &mut encoder, last, count, POINT_COUNT_CONTEXT)?;
                }
                let (last, count) = (previous.byte_count, entry.byte_count);
                encode_count(&mut ic, &mut encoder, last, count, BYTE_COUNT_CONTEXT)?;
                previous = *entry;
            }
            encoder.done()?;
        }
        log::debug!("wrote chunk table of {} chunks", self.len());
        Ok(())
    }

    pub fn push(&mut self, entry: ChunkTableEntry) {
        self.0.push(entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<ChunkTableEntry> {
        self.0.iter()
    }

    /// Index of the chunk holding the point at `point_index`
    /// and the index of the first point of that chunk.
    pub(super) fn chunk_of_point(&self, point_index: u64) -> Option<(usize, u64)> {
        let mut first_point = 0u64;
        for (i, entry) in self.0.iter().enumerate() {
            if point_index < first_point + entry.point_count {
                return Some((i, first_point));
            }
            first_point += entry.point_count;
        }
        None
    }

    /// Position of the chunk at `chunk_index` relative to
    /// the start of the first chunk.
    pub(super) fn chunk_offset(&self, chunk_index: usize) -> u64 {
        self.0[..chunk_index].iter().map(|e| e.byte_count).sum()
    }
}

impl AsRef<[ChunkTableEntry]> for ChunkTable {
    fn as_ref(&self) -> &[ChunkTableEntry] {
        &self.0
    }
}

impl<I> Index<I> for ChunkTable
where
    I: SliceIndex<[ChunkTableEntry]>,
{
    type Output = <I as SliceIndex<[ChunkTableEntry]>>::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.0[index]
    }
}

/// Size of the offset to the chunk table that starts the points data.
pub(super) const OFFSET_SIZE: u64 = std::mem::size_of::<i64>() as u64;

/// Writes the current position of `dst`, where the chunk table starts,
/// into the offset reserved at `offset_pos`.
///
/// The position of `dst` is left unchanged.
pub(super) fn patch_chunk_table_offset<W: Write + Seek>(
    dst: &mut W,
    offset_pos: u64,
) -> std::io::Result<()> {
    let table_start = dst.seek(SeekFrom::Current(0))?;
    dst.seek(SeekFrom::Start(offset_pos))?;
    dst.write_i64::<LittleEndian>(table_start as i64)?;
    dst.seek(SeekFrom::Start(table_start))?;
    Ok(())
}

/// The offset at the start of the data is only valid once the writer
/// patched it. Writers that could not seek back append it to the end
/// of the data instead.
fn find_table_start<R: Read + Seek>(src: &mut R, data_start: u64) -> crate::Result<u64> {
    let is_valid = |offset: i64| offset > data_start as i64;

    let offset = src.read_i64::<LittleEndian>()?;
    if is_valid(offset) {
        return Ok(offset as u64);
    }
    src.seek(SeekFrom::End(-(OFFSET_SIZE as i64)))?;
    let offset = src.read_i64::<LittleEndian>()?;
    if is_valid(offset) {
        Ok(offset as u64)
    } else {
        Err(LasZipError::MissingChunkTable)
    }
}

fn entries_compressor() -> IntegerCompressor {
    IntegerCompressorBuilder::new()
        .bits(32)
        .contexts(2)
        .build_initialized()
}

fn entries_decompressor() -> IntegerDecompressor {
    IntegerDecompressorBuilder::new()
        .bits(32)
        .contexts(2)
        .build_initialized()
}

fn encode_count<W: Write>(
    ic: &mut IntegerCompressor,
    encoder: &mut ArithmeticEncoder<W>,
    previous: u64,
    count: u64,
    context: u32,
) -> std::io::Result<()> {
    ic.compress(encoder, previous as i32, count as i32, context)
}

fn decode_count<R: Read>(
    ic: &mut IntegerDecompressor,
    decoder: &mut ArithmeticDecoder<R>,
    previous: u64,
    context: u32,
) -> std::io::Result<u64> {
    let count = ic.decompress(decoder, previous as i32, context)?;
    Ok(u64::from(count as u32))
}
