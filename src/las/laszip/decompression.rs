use super::chunk_table::{ChunkTable, OFFSET_SIZE};
use super::{details, LazVlr};
use crate::las::selective::DecompressionSelection;
use crate::record::RecordDecompressor;
use crate::LasZipError;
use std::io::{Read, Seek, SeekFrom};

/// Progress in the chunk being read.
///
/// The number of points of a chunk is only known
/// once its first point is decoded.
#[derive(Copy, Clone, Debug)]
struct ChunkProgress {
    index: usize,
    points_read: u64,
    num_points: Option<u64>,
}

impl ChunkProgress {
    fn start(index: usize) -> Self {
        Self {
            index,
            points_read: 0,
            num_points: None,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.num_points == Some(self.points_read)
    }
}

/// Decompresses the points of a source of LAZ points data.
pub struct LasZipDecompressor<'a, R: Read + Seek + 'a> {
    vlr: LazVlr,
    record_decompressor: Box<dyn RecordDecompressor<R> + Send + 'a>,
    /// Position of the first chunk
    data_start: u64,
    chunk_table: Option<ChunkTable>,
    chunk: ChunkProgress,
}

impl<'a, R: Read + Seek + Send + 'a> LasZipDecompressor<'a, R> {
    /// Creates a decompressor for the points data that starts at the current
    /// position of `source`, compressed as the `vlr` describes.
    pub fn new(source: R, vlr: LazVlr) -> crate::Result<Self> {
        Self::selective(source, vlr, DecompressionSelection::all())
    }

    /// Creates a decompressor that only decodes the layers in `selection`.
    ///
    /// A field whose layer is skipped keeps, for every point of a chunk,
    /// the value it has in the first point of that chunk.
    pub fn selective(
        mut source: R,
        vlr: LazVlr,
        selection: DecompressionSelection,
    ) -> crate::Result<Self> {
        let start = source.seek(SeekFrom::Current(0))?;
        let chunk_table = ChunkTable::read_from(&mut source, &vlr)
            .map_err(|e| log::debug!("no usable chunk table ({}), seeking is disabled", e))
            .ok();
        let data_start = start + OFFSET_SIZE;
        source.seek(SeekFrom::Start(data_start))?;

        let record_decompressor =
            details::record_decompressor_from_laz_items(vlr.items(), source, selection)?;

        Ok(Self {
            vlr,
            record_decompressor,
            data_start,
            chunk_table,
            chunk: ChunkProgress::start(0),
        })
    }

    /// Same as [`new`](Self::new), with the record data of the laszip vlr.
    pub fn new_with_record_data(source: R, laszip_vlr_record_data: &[u8]) -> crate::Result<Self> {
        let vlr = LazVlr::from_buffer(laszip_vlr_record_data)?;
        Self::new(source, vlr)
    }

    /// Decodes the next point into `out`, as it would be stored in a LAS file.
    ///
    /// `out` must be at least [`LazVlr::items_size`] bytes long.
    pub fn decompress_one(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        if self.chunk.is_exhausted() {
            self.record_decompressor.reset();
            self.chunk = ChunkProgress::start(self.chunk.index + 1);
        }

        self.record_decompressor.decompress_next(out)?;
        self.chunk.points_read += 1;

        if self.chunk.num_points.is_none() {
            let num_points = self.record_decompressor.record_count();
            log::trace!("chunk {} has {} points", self.chunk.index, num_points);
            self.chunk.num_points = Some(num_points);
        }
        Ok(())
    }

    /// Decodes as many points as `out` holds.
    ///
    /// Asking for more points than the data has is an error.
    pub fn decompress_many(&mut self, out: &mut [u8]) -> std::io::Result<()> {
        let point_size = self.vlr.items_size() as usize;
        out.chunks_exact_mut(point_size)
            .try_for_each(|point| self.decompress_one(point))
    }

    pub fn vlr(&self) -> &LazVlr {
        &self.vlr
    }

    /// Moves to the point at `point_idx`, the next decoded point is this one.
    ///
    /// The source is moved to the start of the chunk of the point, then the
    /// points before it in the chunk are decoded.
    /// Moving past the last point succeeds, the next decoding fails.
    pub fn seek(&mut self, point_idx: u64) -> crate::Result<()> {
        let chunk_table = self
            .chunk_table
            .as_ref()
            .ok_or(LasZipError::MissingChunkTable)?;
        let (chunk_index, first_point) = match chunk_table.chunk_of_point(point_idx) {
            Some(found) => found,
            None => return self.move_past_the_end(),
        };
        let chunk_pos = self.data_start + chunk_table.chunk_offset(chunk_index);

        self.record_decompressor
            .get_mut()
            .seek(SeekFrom::Start(chunk_pos))?;
        self.record_decompressor.reset();
        self.chunk = ChunkProgress::start(chunk_index);

        let mut skipped = vec![0u8; self.record_decompressor.record_size()];
        for _ in first_point..point_idx {
            self.decompress_one(&mut skipped)?;
            if self.chunk.is_exhausted() {
                // last chunk of fixed-size chunks, its point count is not in the table
                return self.move_past_the_end();
            }
        }
        Ok(())
    }

    fn move_past_the_end(&mut self) -> crate::Result<()> {
        self.record_decompressor.get_mut().seek(SeekFrom::End(0))?;
        self.chunk = ChunkProgress {
            index: self.chunk.index,
            points_read: 0,
            num_points: Some(0),
        };
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.record_decompressor.box_into_inner()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.record_decompressor.get_mut()
    }

    pub fn get(&self) -> &R {
        self.record_decompressor.get()
    }
}

/// Decompresses `compressed_points_data` (chunk table offset, chunks and
/// optionally the chunk table) into `decompressed_points`, filling it.
///
/// The chunk table offset has to be relative to the start of
/// `compressed_points_data`, not to the start of a LAZ file.
pub fn decompress_buffer(
    compressed_points_data: &[u8],
    decompressed_points: &mut [u8],
    laz_vlr: LazVlr,
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
    let mut decompressor =
        LasZipDecompressor::new(std::io::Cursor::new(compressed_points_data), laz_vlr)?;
    decompressor.decompress_many(decompressed_points)?;
    Ok(())
}
