//! Compression and decompression of whole buffers using multiple threads.
//!
//! Chunks do not share any state, so each of them is
//! compressed or decompressed on its own thread.
use super::chunk_table::{patch_chunk_table_offset, ChunkTable, ChunkTableEntry};
use super::details::{record_compressor_from_laz_items, record_decompressor_from_laz_items};
use super::LazVlr;
use crate::byteslice::{ChunksIrregular, ChunksIrregularMut};
use crate::las::selective::DecompressionSelection;
use crate::LasZipError;
use byteorder::{LittleEndian, WriteBytesExt};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::io::{Cursor, Seek, SeekFrom, Write};

/// Compresses all points in parallel
///
/// Just like [`compress_buffer`] but the compression is done in multiple threads,
/// the bytes written are the same.
///
/// # Note
///
/// Point order [is conserved](https://github.com/rayon-rs/rayon/issues/551)
///
/// [`compress_buffer`]: fn.compress_buffer.html
pub fn par_compress_buffer<W: Write + Seek>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    let point_size = laz_vlr.items_size() as usize;
    if point_size == 0 {
        return Err(LasZipError::NoLazItems);
    }
    if uncompressed_points.len() % point_size != 0 {
        return Err(LasZipError::BufferLenNotMultipleOfPointSize {
            buffer_len: uncompressed_points.len(),
            point_size,
        });
    }

    let start_pos = dst.seek(SeekFrom::Current(0))?;
    // Reserve the bytes for the chunk table offset that will be updated later
    dst.write_i64::<LittleEndian>(-1)?;

    let chunk_table = par_compress(dst, uncompressed_points, laz_vlr)?;

    patch_chunk_table_offset(dst, start_pos)?;
    chunk_table.write_to(dst, laz_vlr)?;
    Ok(())
}

/// Compresses the points contained in `uncompressed_points` writing the result in the `dst`
/// and returns the entry of each chunk written.
///
/// Variable-size chunks are not delimited here, all the points
/// then go in a single chunk.
fn par_compress<W: Write>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: &LazVlr,
) -> crate::Result<ChunkTable> {
    let point_size = laz_vlr.items_size() as usize;
    let chunk_size_in_bytes = (laz_vlr.chunk_size() as usize)
        .saturating_mul(point_size)
        .max(point_size);

    // The last chunk may not have the same size,
    // the chunks() method takes care of that for us
    let all_slices = uncompressed_points
        .chunks(chunk_size_in_bytes)
        .collect::<Vec<_>>();

    let chunks = all_slices
        .into_par_iter()
        .map(|slc| {
            let mut record_compressor =
                record_compressor_from_laz_items(laz_vlr.items(), Cursor::new(Vec::<u8>::new()))?;
            for raw_point in slc.chunks_exact(point_size) {
                record_compressor.compress_next(raw_point)?;
            }
            record_compressor.done()?;
            let point_count = record_compressor.record_count();
            Ok((point_count, record_compressor.box_into_inner()))
        })
        .collect::<Vec<crate::Result<(u64, Cursor<Vec<u8>>)>>>();

    let mut chunk_table = ChunkTable::default();
    for chunk_result in chunks {
        let (point_count, chunk) = chunk_result?;
        dst.write_all(chunk.get_ref())?;
        chunk_table.push(ChunkTableEntry {
            point_count,
            byte_count: chunk.get_ref().len() as u64,
        });
    }
    log::debug!("compressed {} chunks in parallel", chunk_table.len());
    Ok(chunk_table)
}

/// Decompresses all points from the buffer in parallel.
///
/// Each chunk is sent for decompression in a thread.
///
/// Just like [`decompress_buffer`] but the decompression is done using multiple threads
///
/// # Important
///
/// All the points in the doc of [`decompress_buffer`] applies to this
/// fn with the addition that  the chunk table _IS_ mandatory
///
/// [`decompress_buffer`]: fn.decompress_buffer.html
pub fn par_decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: &LazVlr,
) -> crate::Result<()> {
    let point_size = laz_vlr.items_size() as usize;
    if point_size == 0 {
        return Err(LasZipError::NoLazItems);
    }
    if decompressed_points.len() % point_size != 0 {
        return Err(LasZipError::BufferLenNotMultipleOfPointSize {
            buffer_len: decompressed_points.len(),
            point_size,
        });
    }

    let mut cursor = Cursor::new(compressed_points_data);
    let chunk_table = ChunkTable::read_from(&mut cursor, laz_vlr)?;
    let data_start = cursor.position() as usize;
    let compressed_points = compressed_points_data
        .get(data_start..)
        .ok_or(LasZipError::MissingChunkTable)?;

    let input_chunks_iter = ChunksIrregular::new(
        compressed_points,
        chunk_table.as_ref().iter().map(|e| e.byte_count as usize),
    );
    let output_chunks_iter = ChunksIrregularMut::new(
        decompressed_points,
        chunk_table
            .as_ref()
            .iter()
            .map(|e| (e.point_count as usize).saturating_mul(point_size)),
    );

    // zip cannot be made 'into_par_iter' by rayon, so we collect first
    let decompression_jobs: Vec<(&[u8], &mut [u8])> =
        input_chunks_iter.zip(output_chunks_iter).collect();
    decompression_jobs
        .into_par_iter()
        .map(|(chunk_in, chunk_out)| {
            let src = Cursor::new(chunk_in);
            let mut record_decompressor = record_decompressor_from_laz_items(
                laz_vlr.items(),
                src,
                DecompressionSelection::all(),
            )?;
            for raw_point in chunk_out.chunks_exact_mut(point_size) {
                record_decompressor.decompress_next(raw_point)?;
            }
            Ok(())
        })
        .collect::<crate::Result<()>>()?;
    Ok(())
}
