//! The LasZip vlr: which items a point record is made of, and how
//! they are laid out in chunks.
//!
//! Its record data is, in little endian:
//!
//! | field                         | type |
//! |-------------------------------|------|
//! | compressor (3, layered)       | u16  |
//! | coder (0, arithmetic)         | u16  |
//! | LasZip version major, minor   | u8   |
//! | LasZip version revision       | u16  |
//! | options                       | u32  |
//! | chunk size                    | u32  |
//! | number of special evlrs       | i64  |
//! | offset to special evlrs       | i64  |
//! | number of items               | u16  |
//! | items (type, size, version)   | 3 * u16 each |
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::las::nir::Nir;
use crate::las::point6::Point6;
use crate::las::rgb::RGB;
use crate::las::wavepacket::LasWavepacket;
use crate::LasZipError;

const LAYERED_CHUNKED_COMPRESSOR: u16 = 3;
const ARITHMETIC_CODER: u16 = 0;
const LASZIP_VERSION: (u8, u8, u16) = (2, 2, 0);
const DEFAULT_CHUNK_SIZE: u32 = 50_000;
/// Items written by this crate all use the version 4 of the layered codecs.
const LAYERED_ITEM_VERSION: u16 = 4;

/// The fields of LAS 1.4 point records (formats 6 to 10).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LazItemType {
    /// Fields of point format 6
    Point14,
    RGB14,
    /// RGB followed by the near infrared
    RGBNIR14,
    WavePacket14,
    /// Extra bytes, with their count
    Byte14(u16),
}

impl LazItemType {
    fn code(self) -> u16 {
        match self {
            LazItemType::Point14 => 10,
            LazItemType::RGB14 => 11,
            LazItemType::RGBNIR14 => 12,
            LazItemType::WavePacket14 => 13,
            LazItemType::Byte14(_) => 14,
        }
    }

    fn from_code(code: u16, size: u16) -> Option<Self> {
        match code {
            10 => Some(LazItemType::Point14),
            11 => Some(LazItemType::RGB14),
            12 => Some(LazItemType::RGBNIR14),
            13 => Some(LazItemType::WavePacket14),
            14 => Some(LazItemType::Byte14(size)),
            _ => None,
        }
    }

    /// Number of bytes of the item in a point record.
    pub fn size(self) -> u16 {
        let size = match self {
            LazItemType::Point14 => Point6::SIZE,
            LazItemType::RGB14 => RGB::SIZE,
            LazItemType::RGBNIR14 => RGB::SIZE + Nir::SIZE,
            LazItemType::WavePacket14 => LasWavepacket::SIZE,
            LazItemType::Byte14(count) => return count,
        };
        size as u16
    }
}

/// One field of the point record and the version of its codec.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LazItem {
    pub(crate) item_type: LazItemType,
    pub(crate) size: u16,
    pub(crate) version: u16,
}

impl LazItem {
    pub fn new(item_type: LazItemType, version: u16) -> Self {
        Self {
            item_type,
            size: item_type.size(),
            version,
        }
    }

    pub fn item_type(&self) -> LazItemType {
        self.item_type
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let code = src.read_u16::<LittleEndian>()?;
        let size = src.read_u16::<LittleEndian>()?;
        let version = src.read_u16::<LittleEndian>()?;
        let item_type =
            LazItemType::from_code(code, size).ok_or(LasZipError::UnknownLazItem(code))?;
        Ok(Self {
            item_type,
            size,
            version,
        })
    }

    fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.item_type.code())?;
        dst.write_u16::<LittleEndian>(self.size)?;
        dst.write_u16::<LittleEndian>(self.version)
    }
}

/// Builds the list of items of a point record.
#[derive(Default)]
pub struct LazItemRecordBuilder {
    item_types: Vec<LazItemType>,
}

impl LazItemRecordBuilder {
    /// Items of the LAS point format `point_format_id` (6 to 10)
    /// followed by `num_extra_bytes` extra bytes.
    pub fn default_for_point_format_id(
        point_format_id: u8,
        num_extra_bytes: u16,
    ) -> crate::Result<Vec<LazItem>> {
        use LazItemType::*;
        let item_types: &[LazItemType] = match point_format_id {
            6 => &[Point14],
            7 => &[Point14, RGB14],
            8 => &[Point14, RGBNIR14],
            9 => &[Point14, WavePacket14],
            10 => &[Point14, RGBNIR14, WavePacket14],
            _ => return Err(LasZipError::UnsupportedPointFormat(point_format_id)),
        };
        let mut builder = Self::new();
        for item_type in item_types {
            builder.add_item(*item_type);
        }
        if num_extra_bytes > 0 {
            builder.add_item(Byte14(num_extra_bytes));
        }
        Ok(builder.build())
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item_type: LazItemType) -> &mut Self {
        self.item_types.push(item_type);
        self
    }

    pub fn build(&self) -> Vec<LazItem> {
        self.item_types
            .iter()
            .map(|t| LazItem::new(*t, LAYERED_ITEM_VERSION))
            .collect()
    }
}

/// The record data of the LasZip vlr.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LazVlr {
    laszip_version: (u8, u8, u16),
    options: u32,
    chunk_size: u32,
    // -1 when unused
    number_of_special_evlrs: i64,
    offset_to_special_evlrs: i64,
    items: Vec<LazItem>,
}

impl LazVlr {
    pub const USER_ID: &'static str = "laszip encoded";
    pub const RECORD_ID: u16 = 22204;
    /// Chunk size of vlrs where the writer decides when a chunk ends.
    pub const VARIABLE_CHUNK_SIZE: u32 = u32::MAX;

    /// Vlr with the default chunk size of 50 000 points.
    pub fn from_laz_items(items: Vec<LazItem>) -> Self {
        Self {
            laszip_version: LASZIP_VERSION,
            options: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            number_of_special_evlrs: -1,
            offset_to_special_evlrs: -1,
            items,
        }
    }

    pub fn from_buffer(record_data: &[u8]) -> crate::Result<Self> {
        Self::read_from(&mut std::io::Cursor::new(record_data))
    }

    /// Reads the record data, only the layered chunked compressor
    /// with the arithmetic coder is accepted.
    pub fn read_from<R: Read>(src: &mut R) -> crate::Result<Self> {
        let compressor = src.read_u16::<LittleEndian>()?;
        if compressor != LAYERED_CHUNKED_COMPRESSOR {
            return Err(LasZipError::UnsupportedCompressor(compressor));
        }
        let coder = src.read_u16::<LittleEndian>()?;
        if coder != ARITHMETIC_CODER {
            return Err(LasZipError::UnsupportedCoder(coder));
        }
        let laszip_version = (
            src.read_u8()?,
            src.read_u8()?,
            src.read_u16::<LittleEndian>()?,
        );
        let options = src.read_u32::<LittleEndian>()?;
        let chunk_size = src.read_u32::<LittleEndian>()?;
        let number_of_special_evlrs = src.read_i64::<LittleEndian>()?;
        let offset_to_special_evlrs = src.read_i64::<LittleEndian>()?;
        let num_items = src.read_u16::<LittleEndian>()?;
        let items = (0..num_items)
            .map(|_| LazItem::read_from(&mut *src))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self {
            laszip_version,
            options,
            chunk_size,
            number_of_special_evlrs,
            offset_to_special_evlrs,
            items,
        })
    }

    /// Writes the record data, the vlr header is up to the caller.
    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        let (major, minor, revision) = self.laszip_version;
        dst.write_u16::<LittleEndian>(LAYERED_CHUNKED_COMPRESSOR)?;
        dst.write_u16::<LittleEndian>(ARITHMETIC_CODER)?;
        dst.write_u8(major)?;
        dst.write_u8(minor)?;
        dst.write_u16::<LittleEndian>(revision)?;
        dst.write_u32::<LittleEndian>(self.options)?;
        dst.write_u32::<LittleEndian>(self.chunk_size)?;
        dst.write_i64::<LittleEndian>(self.number_of_special_evlrs)?;
        dst.write_i64::<LittleEndian>(self.offset_to_special_evlrs)?;
        dst.write_u16::<LittleEndian>(self.items.len() as u16)?;
        for item in &self.items {
            item.write_to(dst)?;
        }
        Ok(())
    }

    pub fn uses_variably_sized_chunks(&self) -> bool {
        self.chunk_size == Self::VARIABLE_CHUNK_SIZE
    }

    /// Number of points of each chunk, [`LazVlr::VARIABLE_CHUNK_SIZE`]
    /// when chunks have a variable size.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn items(&self) -> &[LazItem] {
        &self.items
    }

    /// Size in bytes of an uncompressed point record.
    pub fn items_size(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.size)).sum()
    }
}

pub struct LazVlrBuilder {
    laz_vlr: LazVlr,
}

impl LazVlrBuilder {
    pub fn from_laz_items(laz_items: Vec<LazItem>) -> Self {
        Self {
            laz_vlr: LazVlr::from_laz_items(laz_items),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.laz_vlr.chunk_size = chunk_size;
        self
    }

    /// Chunks will end when the compressor is told to.
    pub fn with_variable_chunk_size(self) -> Self {
        self.with_chunk_size(LazVlr::VARIABLE_CHUNK_SIZE)
    }

    pub fn build(self) -> LazVlr {
        self.laz_vlr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point14_record_data() -> Vec<u8> {
        let items = LazItemRecordBuilder::default_for_point_format_id(6, 0).unwrap();
        let mut data = Vec::<u8>::new();
        LazVlr::from_laz_items(items).write_to(&mut data).unwrap();
        data
    }

    #[test]
    fn default_items_of_point_formats() {
        let items = LazItemRecordBuilder::default_for_point_format_id(8, 0).unwrap();
        assert_eq!(
            items,
            vec![
                LazItem::new(LazItemType::Point14, 4),
                LazItem::new(LazItemType::RGBNIR14, 4),
            ]
        );

        let items = LazItemRecordBuilder::default_for_point_format_id(10, 5).unwrap();
        let sizes: Vec<u16> = items.iter().map(LazItem::size).collect();
        assert_eq!(sizes, vec![30, 8, 29, 5]);

        match LazItemRecordBuilder::default_for_point_format_id(3, 0) {
            Err(LasZipError::UnsupportedPointFormat(3)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn record_data_layout() {
        let items = LazItemRecordBuilder::new()
            .add_item(LazItemType::Point14)
            .add_item(LazItemType::Byte14(2))
            .build();
        let vlr = LazVlrBuilder::from_laz_items(items)
            .with_variable_chunk_size()
            .build();
        let mut data = Vec::<u8>::new();
        vlr.write_to(&mut data).unwrap();

        assert_eq!(data.len(), 34 + 2 * 6);
        assert_eq!(&data[0..4], &[3, 0, 0, 0]);
        assert_eq!(&data[4..8], &[2, 2, 0, 0]);
        assert_eq!(&data[12..16], &[0xFF; 4]);
        assert_eq!(&data[16..32], &[0xFF; 16]);
        assert_eq!(&data[32..34], &[2, 0]);
        assert_eq!(&data[34..40], &[10, 0, 30, 0, 4, 0]);
        assert_eq!(&data[40..46], &[14, 0, 2, 0, 4, 0]);

        let read = LazVlr::from_buffer(&data).unwrap();
        assert_eq!(read, vlr);
        assert!(read.uses_variably_sized_chunks());
        assert_eq!(read.items_size(), 32);
    }

    #[test]
    fn unknown_item_type() {
        let mut data = point14_record_data();
        // point10 item of the pre 1.4 formats
        data[34..40].copy_from_slice(&[6, 0, 20, 0, 2, 0]);
        match LazVlr::from_buffer(&data) {
            Err(LasZipError::UnknownLazItem(6)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn only_layered_arithmetic_coding() {
        let mut data = point14_record_data();
        // pointwise chunked
        data[0] = 2;
        match LazVlr::from_buffer(&data) {
            Err(LasZipError::UnsupportedCompressor(2)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        let mut data = point14_record_data();
        data[2] = 1;
        match LazVlr::from_buffer(&data) {
            Err(LasZipError::UnsupportedCoder(1)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
