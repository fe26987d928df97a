//! Module with the important struct that people wishing
//! to compress or decompress LAZ data can use
//!
//! It defines the LasZipCompressor & LasZipDecompressor
//! as well as the LasZip Vlr data, how to build it
//! and the chunk table that indexes the compressed chunks.

mod chunk_table;
mod compression;
mod decompression;
mod details;
#[cfg(feature = "parallel")]
mod parallel;
mod vlr;

pub use chunk_table::{ChunkTable, ChunkTableEntry};
pub use compression::{compress_buffer, LasZipCompressor};
pub use decompression::{decompress_buffer, LasZipDecompressor};
#[cfg(feature = "parallel")]
pub use parallel::{par_compress_buffer, par_decompress_buffer};
pub use vlr::{LazItem, LazItemRecordBuilder, LazItemType, LazVlr, LazVlrBuilder};
