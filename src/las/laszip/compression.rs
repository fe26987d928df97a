use super::chunk_table::{patch_chunk_table_offset, ChunkTable, ChunkTableEntry, OFFSET_SIZE};
use super::{details, LazVlr};
use crate::record::RecordCompressor;
use crate::{LasZipError, LazItem};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};

/// Where the chunk being written started and how many points it has
#[derive(Copy, Clone, Debug, Default)]
struct OpenChunk {
    start: u64,
    num_points: u32,
}

/// Compresses points, chunk by chunk, into a `Write + Seek` destination.
///
/// The destination receives the offset to the chunk table, the chunks and,
/// once [`done`] is called, the chunk table.
///
/// [`done`]: Self::done
pub struct LasZipCompressor<'a, W: Write + Send + 'a> {
    vlr: LazVlr,
    record_compressor: Box<dyn RecordCompressor<W> + Send + 'a>,
    table: ChunkTable,
    chunk: OpenChunk,
    /// Position of the chunk table offset, known once it is reserved
    offset_pos: Option<u64>,
}

impl<'a, W: Write + Seek + Send + 'a> LasZipCompressor<'a, W> {
    /// Creates a compressor writing to `output` the way the `vlr` describes.
    pub fn new(output: W, vlr: LazVlr) -> crate::Result<Self> {
        let record_compressor = details::record_compressor_from_laz_items(vlr.items(), output)?;
        Ok(Self {
            vlr,
            record_compressor,
            table: ChunkTable::default(),
            chunk: OpenChunk::default(),
            offset_pos: None,
        })
    }

    /// Creates a compressor for these items, with the default chunk size.
    pub fn from_laz_items(output: W, items: Vec<LazItem>) -> crate::Result<Self> {
        Self::new(output, LazVlr::from_laz_items(items))
    }

    /// Writes the placeholder of the chunk table offset at the current position
    /// of the destination.
    ///
    /// The first compressed point does it when it was not done before.
    pub fn reserve_offset_to_chunk_table(&mut self) -> std::io::Result<()> {
        let stream = self.record_compressor.get_mut();
        let pos = stream.seek(SeekFrom::Current(0))?;
        stream.write_i64::<LittleEndian>(-1)?;
        self.offset_pos = Some(pos);
        self.chunk = OpenChunk {
            start: pos + OFFSET_SIZE,
            num_points: 0,
        };
        Ok(())
    }

    /// Compresses one point, given as it is stored in a LAS file
    /// (fields in order, little endian).
    ///
    /// With fixed-size chunks, a new chunk is started when the current one is full.
    pub fn compress_one(&mut self, input: &[u8]) -> std::io::Result<()> {
        if self.offset_pos.is_none() {
            self.reserve_offset_to_chunk_table()?;
        }
        if self.chunk.num_points == self.vlr.chunk_size() {
            self.finish_current_chunk()?;
        }
        self.record_compressor.compress_next(input)?;
        self.chunk.num_points += 1;
        Ok(())
    }

    /// Compresses every whole point of `input`.
    pub fn compress_many(&mut self, input: &[u8]) -> std::io::Result<()> {
        let point_size = self.vlr.items_size() as usize;
        input
            .chunks_exact(point_size)
            .try_for_each(|point| self.compress_one(point))
    }

    /// Closes the current chunk: the next point is the first of a new one.
    ///
    /// Variable-size chunks are delimited this way.
    /// Nothing happens when the current chunk has no point.
    pub fn finish_current_chunk(&mut self) -> std::io::Result<()> {
        if self.chunk.num_points == 0 {
            return Ok(());
        }
        self.record_compressor.done()?;
        self.record_compressor.reset();

        let end = self
            .record_compressor
            .get_mut()
            .seek(SeekFrom::Current(0))?;
        let entry = ChunkTableEntry {
            point_count: u64::from(self.chunk.num_points),
            byte_count: end - self.chunk.start,
        };
        log::debug!(
            "chunk {}: {} points in {} bytes",
            self.table.len(),
            entry.point_count,
            entry.byte_count
        );
        self.table.push(entry);
        self.chunk = OpenChunk {
            start: end,
            num_points: 0,
        };
        Ok(())
    }

    /// Closes the last chunk, writes the chunk table and points the offset to it.
    ///
    /// To be called once, after the last point.
    pub fn done(&mut self) -> std::io::Result<()> {
        if self.offset_pos.is_none() {
            self.reserve_offset_to_chunk_table()?;
        }
        self.finish_current_chunk()?;
        if let Some(offset_pos) = self.offset_pos {
            let stream = self.record_compressor.get_mut();
            patch_chunk_table_offset(stream, offset_pos)?;
            self.table.write_to(stream, &self.vlr)?;
        }
        Ok(())
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    pub fn into_inner(self) -> W {
        self.record_compressor.box_into_inner()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.record_compressor.get_mut()
    }

    pub fn get(&self) -> &W {
        self.record_compressor.get()
    }
}

/// Compresses the points of `uncompressed_points` into `dst`:
/// the chunk table offset (i64), the chunks, then the chunk table.
///
/// The buffer must hold a whole number of points.
pub fn compress_buffer<W: Write + Seek + Send>(
    dst: &mut W,
    uncompressed_points: &[u8],
    laz_vlr: LazVlr,
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
    let mut compressor = LasZipCompressor::new(dst, laz_vlr)?;
    compressor.compress_many(uncompressed_points)?;
    compressor.done()?;
    Ok(())
}
