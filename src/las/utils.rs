/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:

    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.
    (c) 2019, Thomas Montaigu

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation. See the COPYING file for more information.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

  CHANGE HISTORY:
    6 June 2019: Translated to Rust

===============================================================================
*/

//! Small helpers shared by the layered item codecs.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::Zero;

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;

/// Arithmetic encoder writing one layer of a chunk into memory.
pub(crate) type LayerEncoder = ArithmeticEncoder<Cursor<Vec<u8>>>;
/// Arithmetic decoder reading one layer of a chunk from memory.
pub(crate) type LayerDecoder = ArithmeticDecoder<Cursor<Vec<u8>>>;

/// Median of the last 5 values added.
///
/// The values are kept sorted, insertion alternates between
/// the low and the high end so that the oldest values get evicted.
#[derive(Copy, Clone, Debug)]
pub struct StreamingMedian<T: Zero + Copy + PartialOrd> {
    values: [T; 5],
    high: bool,
}

impl<T: Zero + Copy + PartialOrd> StreamingMedian<T> {
    pub fn new() -> Self {
        Self {
            values: [T::zero(); 5],
            high: true,
        }
    }

    pub fn add(&mut self, v: T) {
        let values = &mut self.values;
        if self.high {
            if v < values[2] {
                values[4] = values[3];
                values[3] = values[2];
                if v < values[0] {
                    values[2] = values[1];
                    values[1] = values[0];
                    values[0] = v;
                } else if v < values[1] {
                    values[2] = values[1];
                    values[1] = v;
                } else {
                    values[2] = v;
                }
            } else {
                if v < values[3] {
                    values[4] = values[3];
                    values[3] = v;
                } else {
                    values[4] = v;
                }
                self.high = false;
            }
        } else if values[2] < v {
            values[0] = values[1];
            values[1] = values[2];
            if values[4] < v {
                values[2] = values[3];
                values[3] = values[4];
                values[4] = v;
            } else if values[3] < v {
                values[2] = values[3];
                values[3] = v;
            } else {
                values[2] = v;
            }
        } else {
            if values[1] < v {
                values[0] = values[1];
                values[1] = v;
            } else {
                values[0] = v;
            }
            self.high = true;
        }
    }

    pub fn get(&self) -> T {
        self.values[2]
    }
}

impl<T: Zero + Copy + PartialOrd> Default for StreamingMedian<T> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! is_nth_bit_set {
    ($sym:expr, $n:expr) => {
        ($sym & (1 << $n)) != 0
    };
}

#[inline(always)]
pub(crate) fn u32_zero_bit(n: u32) -> u32 {
    n & 0xFF_FF_FF_FEu32
}

#[inline]
pub(crate) fn u8_clamp(n: i32) -> u8 {
    num_traits::clamp(n, i32::from(std::u8::MIN), i32::from(std::u8::MAX)) as u8
}

/// Wraps a byte difference (or a byte plus a difference) back into `0..=255`.
#[inline(always)]
pub(crate) fn u8_fold(n: i32) -> u8 {
    (n & 0xFF) as u8
}

#[inline(always)]
pub(crate) fn lower_byte(n: u16) -> u8 {
    (n & 0x00_FF) as u8
}

#[inline(always)]
pub(crate) fn upper_byte(n: u16) -> u8 {
    (n >> 8) as u8
}

#[inline]
pub fn i32_quantize(n: f32) -> i32 {
    if n >= 0.0f32 {
        (n + 0.5f32) as i32
    } else {
        (n - 0.5f32) as i32
    }
}

/// Returns `Some(diff)` when the 64 bit difference fits in an i32.
#[inline]
pub(crate) fn i32_diff(diff: i64) -> Option<i32> {
    let small = diff as i32;
    if i64::from(small) == diff {
        Some(small)
    } else {
        None
    }
}

/// Index of the context holding the last item that predicts the current one,
/// once the scanner channel switched from `previous` to `current`.
///
/// Items of version 3 only move to the new context when it was just created.
#[inline]
pub(crate) fn context_of_last_item(
    version: u16,
    previous: usize,
    current: usize,
    created: bool,
) -> usize {
    if created || version >= 4 {
        current
    } else {
        previous
    }
}

pub(crate) fn new_layer_encoder() -> LayerEncoder {
    ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()))
}

pub(crate) fn new_layer_decoder() -> LayerDecoder {
    ArithmeticDecoder::new(Cursor::new(Vec::<u8>::new()))
}

/// Empties the layer so that the encoder can start a new chunk.
pub(crate) fn reset_layer_encoder(encoder: &mut LayerEncoder) {
    encoder.reset();
    let stream = encoder.get_mut();
    stream.get_mut().clear();
    stream.set_position(0);
}

pub(crate) fn inner_buffer_len_of(encoder: &LayerEncoder) -> usize {
    encoder.get_ref().get_ref().len()
}

/// Terminates the layer and writes its size, or 0 when the layer
/// carries no information.
pub(crate) fn write_layer_size<W: Write>(
    encoder: &mut LayerEncoder,
    changed: bool,
    dst: &mut W,
) -> std::io::Result<usize> {
    let size = if changed {
        encoder.done()?;
        inner_buffer_len_of(encoder)
    } else {
        0
    };
    dst.write_u32::<LittleEndian>(size as u32)?;
    Ok(size)
}

#[inline]
pub(crate) fn copy_encoder_content_to<W: Write>(
    encoder: &LayerEncoder,
    changed: bool,
    dst: &mut W,
) -> std::io::Result<()> {
    if changed {
        dst.write_all(encoder.get_ref().get_ref())?;
    }
    Ok(())
}

pub(crate) fn read_layer_size<R: Read>(src: &mut R) -> std::io::Result<usize> {
    Ok(src.read_u32::<LittleEndian>()? as usize)
}

/// Loads the bytes of a layer into its decoder.
///
/// Returns whether the layer is to be decoded: it must be requested
/// and not empty. Layers that are not requested are skipped in `src`.
pub(crate) fn copy_bytes_into_decoder<R: Read + Seek>(
    is_requested: bool,
    num_bytes: usize,
    decoder: &mut LayerDecoder,
    src: &mut R,
) -> std::io::Result<bool> {
    let stream = decoder.get_mut();
    stream.set_position(0);
    if is_requested {
        stream.get_mut().resize(num_bytes, 0);
        if num_bytes > 0 {
            src.read_exact(&mut stream.get_mut()[..num_bytes])?;
            decoder.read_init_bytes()?;
            Ok(true)
        } else {
            Ok(false)
        }
    } else {
        stream.get_mut().clear();
        if num_bytes > 0 {
            log::trace!("skipping layer of {} bytes", num_bytes);
            src.seek(SeekFrom::Current(num_bytes as i64))?;
        }
        Ok(false)
    }
}

// Maps the number of returns (n, row) and the return number (r, column)
// of a point to one of 6 contexts. The valid combinations 1 <= r <= n <= 15
// would give 120 distinct values, higher returns are merged together as they
// do not differ much in entropy. Combinations that are invalid (r or n being 0,
// r > n) still get a context because some files are populated that way.
pub const NUMBER_RETURN_MAP_6CTX: [[u8; 16]; 16] = [
    [0, 1, 2, 3, 4, 5, 3, 4, 4, 5, 5, 5, 5, 5, 5, 5],
    [1, 0, 1, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3],
    [2, 1, 2, 4, 4, 4, 4, 4, 4, 4, 4, 3, 3, 3, 3, 3],
    [3, 3, 4, 5, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    [4, 3, 4, 4, 5, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    [5, 3, 4, 4, 4, 5, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    [3, 3, 4, 4, 4, 4, 5, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    [4, 3, 4, 4, 4, 4, 4, 5, 4, 4, 4, 4, 4, 4, 4, 4],
    [4, 3, 4, 4, 4, 4, 4, 4, 5, 4, 4, 4, 4, 4, 4, 4],
    [5, 3, 4, 4, 4, 4, 4, 4, 4, 5, 4, 4, 4, 4, 4, 4],
    [5, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 4, 4, 4, 4, 4],
    [5, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 4, 4, 4],
    [5, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 4, 4],
    [5, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 4],
    [5, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5],
    [5, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5],
];

// Level of penetration of a return, that is `n - r` for valid
// combinations, saturated at 7. Invalid combinations use the
// distance between r and n instead.
pub const NUMBER_RETURN_LEVEL_8CT: [[u8; 16]; 16] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7, 7, 7, 7, 7, 7],
    [1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7, 7, 7, 7, 7],
    [2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7, 7, 7, 7],
    [3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7, 7, 7],
    [4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7, 7],
    [5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7, 7],
    [6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7, 7],
    [7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7, 7],
    [7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6, 7],
    [7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5, 6],
    [7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4, 5],
    [7, 7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3, 4],
    [7, 7, 7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2, 3],
    [7, 7, 7, 7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1, 2],
    [7, 7, 7, 7, 7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0, 1],
    [7, 7, 7, 7, 7, 7, 7, 7, 7, 6, 5, 4, 3, 2, 1, 0],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_the_last_five() {
        let mut median = StreamingMedian::<i32>::new();
        assert_eq!(median.get(), 0);
        for v in &[5, 3, 9, 7, 1] {
            median.add(*v);
        }
        assert_eq!(median.get(), 5);

        // a value becomes the median once it fills the middle slot
        let mut median = StreamingMedian::<i32>::new();
        for _ in 0..5 {
            median.add(-4);
        }
        assert_eq!(median.get(), -4);
        median.add(10);
        median.add(10);
        assert_eq!(median.get(), -4);
        median.add(10);
        assert_eq!(median.get(), 10);
    }

    #[test]
    fn folding_wraps_byte_differences() {
        assert_eq!(u8_fold(-1), 255);
        assert_eq!(u8_fold(256), 0);
        assert_eq!(u8_fold(200 + 100), 44);
        assert_eq!(u8_fold(3 - 250), 9);
        assert_eq!(u8_clamp(-30), 0);
        assert_eq!(u8_clamp(300), 255);
        assert_eq!(u8_clamp(42), 42);
    }

    #[test]
    fn quantize_rounds_half_away_from_zero() {
        assert_eq!(i32_quantize(1.5), 2);
        assert_eq!(i32_quantize(1.49), 1);
        assert_eq!(i32_quantize(-1.5), -2);
        assert_eq!(i32_quantize(-0.2), 0);
    }

    #[test]
    fn i32_diff_detects_overflow() {
        assert_eq!(i32_diff(-5), Some(-5));
        assert_eq!(i32_diff(i64::from(i32::MAX)), Some(i32::MAX));
        assert_eq!(i32_diff(i64::from(i32::MAX) + 1), None);
        assert_eq!(i32_diff(i64::from(i32::MIN) - 1), None);
    }

    #[test]
    fn version_3_keeps_the_previous_last_item() {
        assert_eq!(context_of_last_item(4, 0, 2, false), 2);
        assert_eq!(context_of_last_item(4, 0, 2, true), 2);
        assert_eq!(context_of_last_item(3, 0, 2, true), 2);
        assert_eq!(context_of_last_item(3, 0, 2, false), 0);
    }

    #[test]
    fn skipped_layers_are_consumed() {
        let mut src = Cursor::new(vec![1u8, 2, 3, 4, 5, 6, 7, 8, 9]);
        let mut decoder = new_layer_decoder();

        let used = copy_bytes_into_decoder(false, 3, &mut decoder, &mut src).unwrap();
        assert!(!used);
        assert_eq!(src.position(), 3);

        let used = copy_bytes_into_decoder(true, 0, &mut decoder, &mut src).unwrap();
        assert!(!used);
        assert_eq!(src.position(), 3);

        let used = copy_bytes_into_decoder(true, 6, &mut decoder, &mut src).unwrap();
        assert!(used);
        assert_eq!(src.position(), 9);
        assert_eq!(decoder.get_ref().get_ref(), &vec![4u8, 5, 6, 7, 8, 9]);
    }
}
