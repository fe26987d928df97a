//! The item codecs of LAS 1.4 point records and the
//! LasZip machinery (vlr, chunk table, compressor & decompressor).
#[macro_use]
mod utils;

pub mod extra_bytes;
pub mod gps;
pub mod laszip;
pub mod nir;
pub mod point6;
pub mod rgb;
pub mod selective;
pub mod wavepacket;

pub use extra_bytes::{LasExtraByteCompressor, LasExtraByteDecompressor};
pub use nir::{LasNIRCompressor, LasNIRDecompressor, Nir};
pub use point6::{LasPoint6Compressor, LasPoint6Decompressor, Point6};
pub use rgb::{LasRGBCompressor, LasRGBDecompressor, RGB};
pub use selective::DecompressionSelection;
pub use wavepacket::{LasWavepacket, LasWavepacketCompressor, LasWavepacketDecompressor};
