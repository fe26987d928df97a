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
//! GPS time prediction used by the POINT14 codec.
//!
//! Up to 4 time sequences are tracked per scanner channel, each one
//! remembering its last time stamp and its last difference. A new time
//! stamp is coded as a multiple of the last difference when possible,
//! which is very cheap for regularly spaced pulses.

use std::io::{Read, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decoders::ArithmeticDecoder;
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::encoders::ArithmeticEncoder;
use crate::las::utils::{i32_diff, i32_quantize};
use crate::models::{ArithmeticModel, ArithmeticModelBuilder};

const LASZIP_GPS_TIME_MULTI: i32 = 500;
const LASZIP_GPS_TIME_MULTI_MINUS: i32 = -10;
const LASZIP_GPS_TIME_MULTI_CODE_FULL: i32 =
    LASZIP_GPS_TIME_MULTI - LASZIP_GPS_TIME_MULTI_MINUS + 1;
const LASZIP_GPS_TIME_MULTI_TOTAL: i32 = LASZIP_GPS_TIME_MULTI - LASZIP_GPS_TIME_MULTI_MINUS + 5;

const NUM_SEQUENCES: usize = 4;

/// A GPS time stamp seen as the 64 bits of its IEEE 754 representation.
///
/// Predictions and differences are computed on these integers,
/// never on the floating point value.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct GpsTime {
    pub value: i64,
}

impl GpsTime {
    pub fn from_bits(bits: u64) -> Self {
        Self {
            value: bits as i64,
        }
    }

    pub fn to_bits(self) -> u64 {
        self.value as u64
    }

    #[inline]
    fn high(self) -> i32 {
        (self.to_bits() >> 32) as i32
    }

    #[inline]
    fn low(self) -> u32 {
        self.to_bits() as u32
    }
}

impl From<f64> for GpsTime {
    fn from(v: f64) -> Self {
        Self::from_bits(v.to_bits())
    }
}

impl From<GpsTime> for f64 {
    fn from(gps: GpsTime) -> Self {
        f64::from_bits(gps.to_bits())
    }
}

impl From<i64> for GpsTime {
    fn from(value: i64) -> Self {
        Self { value }
    }
}

impl From<GpsTime> for i64 {
    fn from(gps: GpsTime) -> Self {
        gps.value
    }
}

/// The time sequences of one scanner channel.
#[derive(Clone, Debug)]
pub(crate) struct GpsTimeSequences {
    last: usize,
    next: usize,
    last_gps_times: [GpsTime; NUM_SEQUENCES],
    last_gps_diffs: [i32; NUM_SEQUENCES],
    multi_extreme_counter: [i32; NUM_SEQUENCES],
}

impl GpsTimeSequences {
    pub(crate) fn new(seed: GpsTime) -> Self {
        let mut last_gps_times = [GpsTime::default(); NUM_SEQUENCES];
        last_gps_times[0] = seed;
        Self {
            last: 0,
            next: 0,
            last_gps_times,
            last_gps_diffs: [0; NUM_SEQUENCES],
            multi_extreme_counter: [0; NUM_SEQUENCES],
        }
    }

    /// The time stamp of the active sequence.
    pub(crate) fn current(&self) -> GpsTime {
        self.last_gps_times[self.last]
    }

    fn last_diff(&self) -> i32 {
        self.last_gps_diffs[self.last]
    }

    fn diff_to(&self, sequence: usize, gps_time: GpsTime) -> Option<i32> {
        i32_diff(gps_time.value.wrapping_sub(self.last_gps_times[sequence].value))
    }

    /// Finds, among the other sequences, the first one that is close
    /// enough to `gps_time`, returns its offset from the active one.
    fn find_other_sequence(&self, gps_time: GpsTime) -> Option<usize> {
        (1..NUM_SEQUENCES).find(|i| {
            self.diff_to((self.last + i) & 3, gps_time)
                .is_some()
        })
    }

    fn switch_by(&mut self, offset: usize) {
        self.last = (self.last + offset) & 3;
        log::trace!("gps time switched to sequence {}", self.last);
    }

    fn start_new_sequence(&mut self, gps_time: GpsTime) {
        self.next = (self.next + 1) & 3;
        self.last = self.next;
        self.last_gps_diffs[self.last] = 0;
        self.multi_extreme_counter[self.last] = 0;
        self.last_gps_times[self.last] = gps_time;
        log::trace!("gps time started sequence {}", self.last);
    }

    fn start_diff(&mut self, diff: i32) {
        self.last_gps_diffs[self.last] = diff;
        self.multi_extreme_counter[self.last] = 0;
    }

    /// Counts predictions that were far off, after the 4th one
    /// in a row `diff` becomes the new reference difference.
    fn count_extreme(&mut self, diff: i32) {
        self.multi_extreme_counter[self.last] += 1;
        if self.multi_extreme_counter[self.last] > 3 {
            self.last_gps_diffs[self.last] = diff;
            self.multi_extreme_counter[self.last] = 0;
        }
    }

    fn advance(&mut self, diff: i32) {
        let current = &mut self.last_gps_times[self.last];
        current.value = current.value.wrapping_add(i64::from(diff));
    }
}

fn gps_time_models(compress: bool) -> (ArithmeticModel, ArithmeticModel) {
    let mut multi = ArithmeticModelBuilder::new(LASZIP_GPS_TIME_MULTI_TOTAL as u32);
    let mut no_diff = ArithmeticModelBuilder::new(5);
    if compress {
        multi = multi.for_compression();
        no_diff = no_diff.for_compression();
    }
    (multi.build(), no_diff.build())
}

/// Multiplier symbol and integer compressor context of a
/// difference that fits in 32 bits, as well as the predicted difference.
fn multiplier_code(multi: i32, last_diff: i32) -> (u32, i32, u32) {
    if multi == 1 {
        (1, last_diff, 1)
    } else if multi > 1 && multi < LASZIP_GPS_TIME_MULTI {
        (
            multi as u32,
            multi.wrapping_mul(last_diff),
            if multi < 10 { 2 } else { 3 },
        )
    } else if multi >= LASZIP_GPS_TIME_MULTI {
        (
            LASZIP_GPS_TIME_MULTI as u32,
            LASZIP_GPS_TIME_MULTI.wrapping_mul(last_diff),
            4,
        )
    } else if multi < 0 && multi > LASZIP_GPS_TIME_MULTI_MINUS {
        (
            (LASZIP_GPS_TIME_MULTI - multi) as u32,
            multi.wrapping_mul(last_diff),
            5,
        )
    } else if multi <= LASZIP_GPS_TIME_MULTI_MINUS {
        (
            (LASZIP_GPS_TIME_MULTI - LASZIP_GPS_TIME_MULTI_MINUS) as u32,
            LASZIP_GPS_TIME_MULTI_MINUS.wrapping_mul(last_diff),
            6,
        )
    } else {
        (0, 0, 7)
    }
}

/// Contexts in which a prediction is considered extreme.
fn is_extreme_context(context: u32) -> bool {
    context == 4 || context == 6 || context == 7
}

pub(crate) struct GpsTimeCompressionContext {
    sequences: GpsTimeSequences,
    multi_model: ArithmeticModel,
    no_diff_model: ArithmeticModel,
    ic: IntegerCompressor,
}

impl GpsTimeCompressionContext {
    pub(crate) fn new(seed: GpsTime) -> Self {
        let (multi_model, no_diff_model) = gps_time_models(true);
        Self {
            sequences: GpsTimeSequences::new(seed),
            multi_model,
            no_diff_model,
            ic: IntegerCompressorBuilder::new()
                .bits(32)
                .contexts(9)
                .build_initialized(),
        }
    }

    pub(crate) fn init(&mut self, seed: GpsTime) {
        self.sequences = GpsTimeSequences::new(seed);
        self.multi_model.reset();
        self.no_diff_model.reset();
        self.ic.init();
    }

    pub(crate) fn compress_with<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        gps_time: GpsTime,
    ) -> std::io::Result<()> {
        // a sequence switch is followed by exactly one more pass
        loop {
            let last = self.sequences.last;
            let diff = self.sequences.diff_to(last, gps_time);
            if self.sequences.last_diff() == 0 {
                if let Some(diff) = diff {
                    encoder.encode_symbol(&mut self.no_diff_model, 0)?;
                    self.ic.compress(encoder, 0, diff, 0)?;
                    self.sequences.start_diff(diff);
                    self.sequences.last_gps_times[last] = gps_time;
                    return Ok(());
                }
                if let Some(offset) = self.sequences.find_other_sequence(gps_time) {
                    encoder.encode_symbol(&mut self.no_diff_model, (offset + 1) as u32)?;
                    self.sequences.switch_by(offset);
                    continue;
                }
                encoder.encode_symbol(&mut self.no_diff_model, 1)?;
            } else {
                if let Some(diff) = diff {
                    let last_diff = self.sequences.last_diff();
                    let multi = i32_quantize(diff as f32 / last_diff as f32);
                    let (symbol, prediction, context) = multiplier_code(multi, last_diff);
                    encoder.encode_symbol(&mut self.multi_model, symbol)?;
                    self.ic.compress(encoder, prediction, diff, context)?;
                    if context == 1 {
                        self.sequences.multi_extreme_counter[last] = 0;
                    } else if is_extreme_context(context) {
                        self.sequences.count_extreme(diff);
                    }
                    self.sequences.last_gps_times[last] = gps_time;
                    return Ok(());
                }
                if let Some(offset) = self.sequences.find_other_sequence(gps_time) {
                    encoder.encode_symbol(
                        &mut self.multi_model,
                        (LASZIP_GPS_TIME_MULTI_CODE_FULL as usize + offset) as u32,
                    )?;
                    self.sequences.switch_by(offset);
                    continue;
                }
                encoder.encode_symbol(&mut self.multi_model, LASZIP_GPS_TIME_MULTI_CODE_FULL as u32)?;
            }
            // none of the sequences is close, the high bits are
            // predicted from the active sequence, the low ones are raw
            self.ic
                .compress(encoder, self.sequences.current().high(), gps_time.high(), 8)?;
            encoder.write_int(gps_time.low())?;
            self.sequences.start_new_sequence(gps_time);
            return Ok(());
        }
    }
}

pub(crate) struct GpsTimeDecompressionContext {
    sequences: GpsTimeSequences,
    multi_model: ArithmeticModel,
    no_diff_model: ArithmeticModel,
    ic: IntegerDecompressor,
}

impl GpsTimeDecompressionContext {
    pub(crate) fn new(seed: GpsTime) -> Self {
        let (multi_model, no_diff_model) = gps_time_models(false);
        Self {
            sequences: GpsTimeSequences::new(seed),
            multi_model,
            no_diff_model,
            ic: IntegerDecompressorBuilder::new()
                .bits(32)
                .contexts(9)
                .build_initialized(),
        }
    }

    pub(crate) fn init(&mut self, seed: GpsTime) {
        self.sequences = GpsTimeSequences::new(seed);
        self.multi_model.reset();
        self.no_diff_model.reset();
        self.ic.init();
    }

    pub(crate) fn decompress_with<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
    ) -> std::io::Result<GpsTime> {
        loop {
            let last = self.sequences.last;
            if self.sequences.last_diff() == 0 {
                let symbol = decoder.decode_symbol(&mut self.no_diff_model)?;
                match symbol {
                    0 => {
                        let diff = self.ic.decompress(decoder, 0, 0)?;
                        self.sequences.start_diff(diff);
                        self.sequences.advance(diff);
                    }
                    1 => self.read_new_sequence(decoder)?,
                    _ => {
                        self.sequences.switch_by(symbol as usize - 1);
                        continue;
                    }
                }
            } else {
                let symbol = decoder.decode_symbol(&mut self.multi_model)? as i32;
                if symbol < LASZIP_GPS_TIME_MULTI_CODE_FULL {
                    let last_diff = self.sequences.last_diff();
                    let multi = if symbol <= LASZIP_GPS_TIME_MULTI {
                        symbol
                    } else {
                        LASZIP_GPS_TIME_MULTI - symbol
                    };
                    let (_, prediction, context) = multiplier_code(multi, last_diff);
                    let diff = self.ic.decompress(decoder, prediction, context)?;
                    if context == 1 {
                        self.sequences.multi_extreme_counter[last] = 0;
                    } else if is_extreme_context(context) {
                        self.sequences.count_extreme(diff);
                    }
                    self.sequences.advance(diff);
                } else if symbol == LASZIP_GPS_TIME_MULTI_CODE_FULL {
                    self.read_new_sequence(decoder)?;
                } else {
                    self.sequences
                        .switch_by((symbol - LASZIP_GPS_TIME_MULTI_CODE_FULL) as usize);
                    continue;
                }
            }
            return Ok(self.sequences.current());
        }
    }

    fn read_new_sequence<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
    ) -> std::io::Result<()> {
        let high = self
            .ic
            .decompress(decoder, self.sequences.current().high(), 8)?;
        let low = decoder.read_int()?;
        let gps_time = GpsTime::from_bits((u64::from(high as u32) << 32) | u64::from(low));
        self.sequences.start_new_sequence(gps_time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(times: &[f64]) -> (Vec<u8>, Vec<GpsTime>) {
        let mut compressor = GpsTimeCompressionContext::new(GpsTime::from(times[0]));
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for t in &times[1..] {
            compressor
                .compress_with(&mut encoder, GpsTime::from(*t))
                .unwrap();
        }
        encoder.done().unwrap();
        let data = encoder.into_inner().into_inner();

        let mut decompressor = GpsTimeDecompressionContext::new(GpsTime::from(times[0]));
        let mut decoder = ArithmeticDecoder::new(Cursor::new(data.clone()));
        decoder.read_init_bytes().unwrap();
        let decoded = times[1..]
            .iter()
            .map(|_| decompressor.decompress_with(&mut decoder).unwrap())
            .collect();
        (data, decoded)
    }

    #[test]
    fn bits_are_preserved() {
        let gps = GpsTime::from(-0.0f64);
        assert_eq!(gps.to_bits(), 0x8000_0000_0000_0000);
        assert_eq!(f64::from(gps).to_bits(), (-0.0f64).to_bits());
        assert_eq!(gps.high(), i32::MIN);
        assert_eq!(gps.low(), 0);
    }

    #[test]
    fn multiplier_codes() {
        assert_eq!(multiplier_code(1, 10), (1, 10, 1));
        assert_eq!(multiplier_code(3, 10), (3, 30, 2));
        assert_eq!(multiplier_code(12, 10), (12, 120, 3));
        assert_eq!(multiplier_code(700, 10), (500, 5000, 4));
        assert_eq!(multiplier_code(-3, 10), (503, -30, 5));
        assert_eq!(multiplier_code(-40, 10), (510, -100, 6));
        assert_eq!(multiplier_code(0, 10), (0, 0, 7));
    }

    #[test]
    fn regular_spacing_stays_in_one_sequence() {
        let base = 10.0f64.to_bits();
        let times: Vec<f64> = (0..200u64).map(|k| f64::from_bits(base + k * 1000)).collect();

        let mut compressor = GpsTimeCompressionContext::new(GpsTime::from(times[0]));
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for t in &times[1..] {
            compressor
                .compress_with(&mut encoder, GpsTime::from(*t))
                .unwrap();
            assert_eq!(compressor.sequences.last, 0);
            assert_eq!(compressor.sequences.next, 0);
            assert_eq!(compressor.sequences.last_diff(), 1000);
        }

        let (_, decoded) = round_trip(&times);
        for (t, d) in times[1..].iter().zip(&decoded) {
            assert_eq!(t.to_bits(), d.to_bits());
        }
    }

    #[test]
    fn extreme_multipliers_rebase_the_difference() {
        let mut sequences = GpsTimeSequences::new(GpsTime::from(0i64));
        sequences.start_diff(1);
        for i in 0..3 {
            sequences.count_extreme(1000);
            assert_eq!(sequences.last_diff(), 1);
            assert_eq!(sequences.multi_extreme_counter[0], i + 1);
        }
        sequences.count_extreme(1000);
        assert_eq!(sequences.last_diff(), 1000);
        assert_eq!(sequences.multi_extreme_counter[0], 0);

        let mut compressor = GpsTimeCompressionContext::new(GpsTime::from(0i64));
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut t = 0i64;
        for _ in 0..2 {
            t += 1;
            compressor.compress_with(&mut encoder, GpsTime::from(t)).unwrap();
        }
        for k in 0..4 {
            t += 1000;
            compressor.compress_with(&mut encoder, GpsTime::from(t)).unwrap();
            let expected = if k < 3 { 1 } else { 1000 };
            assert_eq!(compressor.sequences.last_diff(), expected);
        }
    }

    #[test]
    fn far_apart_times_use_several_sequences() {
        let times = [
            10.0, 10.0001, 10.0002, 5000.0, 5000.5, 10.0003, 1.0e9, 5001.0, 10.0004, -3.0,
        ];
        let (_, decoded) = round_trip(&times);
        for (t, d) in times[1..].iter().zip(&decoded) {
            assert_eq!(t.to_bits(), d.to_bits());
        }
    }

    #[test]
    fn irregular_spacing_round_trips() {
        let base = 1.0e5f64.to_bits();
        let steps = [5u64, 10, 15, 2, 2, 7000, 3, 0, 1, 1, 40, 400_000, 1, 9, 9];
        let mut times = vec![f64::from_bits(base)];
        for step in steps.iter() {
            let last = times.last().unwrap().to_bits();
            times.push(f64::from_bits(last + step));
        }
        // going back in time
        times.push(f64::from_bits(base + 5));
        times.push(f64::from_bits(base + 2));
        let (_, decoded) = round_trip(&times);
        for (t, d) in times[1..].iter().zip(&decoded) {
            assert_eq!(t.to_bits(), d.to_bits());
        }
    }
}
