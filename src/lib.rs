//! Layered LASzip compression of LAS 1.4 point records
//!
//! This crate compresses and decompresses the points of the formats 6 to 10
//! (POINT14 records, optionally followed by RGB, NIR, wave packet and extra bytes)
//! the way LASzip does it: each field of a chunk is written in its own layer
//! so that readers only interested in some fields can skip the others.
//!
//! The compressed points data starts with the offset to the chunk table,
//! then come the chunks, then the chunk table.
//! How the points are compressed is described by the [`LazVlr`], which
//! has to be stored alongside the data (in a LAZ file, as a vlr).
//!
//! # Compressing
//!
//! ```
//! use laz14::{LasZipCompressor, LasZipError, LazItemRecordBuilder, LazItemType};
//!
//! # fn main() -> Result<(), LasZipError> {
//! let items = LazItemRecordBuilder::new()
//!     .add_item(LazItemType::Point14)
//!     .add_item(LazItemType::RGB14)
//!     .build();
//! let mut compressor = LasZipCompressor::from_laz_items(std::io::Cursor::new(vec![]), items)?;
//!
//! let point = vec![0u8; 36];
//! compressor.compress_one(&point)?;
//! // writes the last chunk and the chunk table
//! compressor.done()?;
//!
//! let vlr = compressor.vlr().clone();
//! let compressed_points = compressor.into_inner().into_inner();
//! # assert_eq!(vlr.items_size(), 36);
//! # assert!(!compressed_points.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! The chunk size is set through the [`LazVlrBuilder`]:
//!
//! ```
//! use laz14::{compress_buffer, LasZipError, LazItemRecordBuilder, LazVlrBuilder};
//!
//! # fn main() -> Result<(), LasZipError> {
//! let items = LazItemRecordBuilder::default_for_point_format_id(7, 0)?;
//! let vlr = LazVlrBuilder::from_laz_items(items)
//!     .with_chunk_size(5_000)
//!     .build();
//!
//! let points = vec![0u8; 36 * 12_000];
//! let mut output = std::io::Cursor::new(vec![]);
//! compress_buffer(&mut output, &points, vlr)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Decompressing
//!
//! The [`LasZipDecompressor`] needs the vlr, or its record data.
//! A [`DecompressionSelection`] lets it skip the layers of the fields
//! that are not needed.
//!
//! ```
//! use laz14::{
//!     DecompressionSelection, LasZipCompressor, LasZipDecompressor, LasZipError,
//!     LazItemRecordBuilder, LazVlr,
//! };
//! use std::io::Cursor;
//!
//! # fn main() -> Result<(), LasZipError> {
//! # let items = LazItemRecordBuilder::default_for_point_format_id(6, 0)?;
//! # let mut compressor = LasZipCompressor::from_laz_items(Cursor::new(Vec::new()), items)?;
//! # compressor.compress_many(&[7u8; 60])?;
//! # compressor.done()?;
//! # let vlr = compressor.vlr().clone();
//! # let mut vlr_data = Cursor::new(Vec::new());
//! # vlr.write_to(&mut vlr_data)?;
//! # let laszip_vlr_record_data = vlr_data.into_inner();
//! # let compressed_points = compressor.into_inner().into_inner();
//! let vlr = LazVlr::from_buffer(&laszip_vlr_record_data)?;
//! let mut point = vec![0u8; vlr.items_size() as usize];
//!
//! let mut decompressor = LasZipDecompressor::new(Cursor::new(&compressed_points), vlr.clone())?;
//! decompressor.decompress_one(&mut point)?;
//! assert_eq!(&point, &[7u8; 30]);
//!
//! // x, y, returns and scanner channel are always decoded
//! let mut decompressor = LasZipDecompressor::selective(
//!     Cursor::new(&compressed_points),
//!     vlr,
//!     DecompressionSelection::base(),
//! )?;
//! decompressor.decompress_one(&mut point)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Parallelism
//!
//! With the `parallel` feature, [`par_compress_buffer`] and [`par_decompress_buffer`]
//! work on whole chunks in parallel, using rayon.
//!
//! [`par_compress_buffer`]: las/laszip/fn.par_compress_buffer.html
//! [`par_decompress_buffer`]: las/laszip/fn.par_decompress_buffer.html

pub(crate) mod byteslice;
pub(crate) mod compressors;
pub(crate) mod decoders;
pub(crate) mod decompressors;
pub(crate) mod encoders;
pub(crate) mod models;

pub mod errors;
pub mod las;
pub mod packers;
pub mod record;

pub use errors::{LasZipError, Result};
pub use las::laszip::{compress_buffer, decompress_buffer};
#[cfg(feature = "parallel")]
pub use las::laszip::{par_compress_buffer, par_decompress_buffer};
pub use las::laszip::{
    ChunkTable, ChunkTableEntry, LasZipCompressor, LasZipDecompressor, LazItem,
    LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder,
};
pub use las::selective::DecompressionSelection;
