//! The error type of the crate.

use std::fmt;
use std::io;

use crate::las::laszip::LazItemType;

/// Everything that can go wrong when setting up a compressor or
/// decompressor, or when compressing / decompressing whole buffers.
///
/// Compressing or decompressing a single point only fails with an [`io::Error`].
#[derive(Debug)]
#[non_exhaustive]
pub enum LasZipError {
    /// The type code of an item is not one of the LAS 1.4 layered items
    UnknownLazItem(u16),
    /// Layered items come in version 3 and 4 only
    UnsupportedLazItemVersion(LazItemType, u16),
    /// The first item must be the point14, the items after it
    /// follow its scanner channel
    FirstItemNotPoint14(LazItemType),
    /// The items describe no field at all
    NoLazItems,
    /// The vlr does not use the layered chunked compressor (code 3)
    UnsupportedCompressor(u16),
    /// The vlr does not use the arithmetic coder (code 0)
    UnsupportedCoder(u16),
    /// There are no default items for this point format
    UnsupportedPointFormat(u8),
    BufferLenNotMultipleOfPointSize {
        buffer_len: usize,
        point_size: usize,
    },
    /// The operation needs the chunk table and the data has none
    MissingChunkTable,
    IoError(io::Error),
}

/// Result of the fallible operations of this crate
pub type Result<T> = std::result::Result<T, LasZipError>;

impl From<io::Error> for LasZipError {
    fn from(e: io::Error) -> Self {
        LasZipError::IoError(e)
    }
}

impl fmt::Display for LasZipError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LasZipError::*;
        match self {
            UnknownLazItem(code) => write!(f, "unknown laz item type code {}", code),
            UnsupportedLazItemVersion(item_type, version) => {
                write!(f, "{:?} item version {} is not supported", item_type, version)
            }
            FirstItemNotPoint14(item_type) => {
                write!(f, "the first laz item is {:?} instead of Point14", item_type)
            }
            NoLazItems => f.write_str("the laz vlr has no items"),
            UnsupportedCompressor(code) => write!(
                f,
                "compressor {} is not supported, only layered chunked (3) is",
                code
            ),
            UnsupportedCoder(code) => write!(f, "coder {} is not supported", code),
            UnsupportedPointFormat(id) => write!(f, "point format {} is not supported", id),
            BufferLenNotMultipleOfPointSize {
                buffer_len,
                point_size,
            } => write!(
                f,
                "buffer of {} bytes does not hold a whole number of {} bytes points",
                buffer_len, point_size
            ),
            MissingChunkTable => f.write_str("the chunk table could not be found"),
            IoError(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for LasZipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LasZipError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
