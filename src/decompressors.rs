/*
===============================================================================

  CONTENTS:
    Integer decompressor

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

use std::io::Read;

use crate::compressors::{
    corrector_models, corrector_params, DEFAULT_BITS, DEFAULT_BITS_HIGH, DEFAULT_CONTEXTS,
    DEFAULT_RANGE,
};
use crate::decoders::ArithmeticDecoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel};

#[derive(Debug, Clone)]
pub struct IntegerDecompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,

    corr_bits: u32,
    corr_range: u32,
    corr_min: i32,

    m_bits: Vec<ArithmeticModel>,
    m_corrector0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerDecompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        let (corr_bits, corr_range, corr_min, _) = corrector_params(bits, range);
        Self {
            k: 0,
            contexts,
            bits_high,
            corr_bits,
            corr_range,
            corr_min,
            m_bits: vec![],
            m_corrector0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn init(&mut self) {
        if self.m_bits.is_empty() {
            let (m_bits, m_corrector) =
                corrector_models(self.corr_bits, self.bits_high, self.contexts, false);
            self.m_bits = m_bits;
            self.m_corrector = m_corrector;
        } else {
            self.m_bits.iter_mut().for_each(ArithmeticModel::reset);
            self.m_corrector.iter_mut().for_each(ArithmeticModel::reset);
        }
        self.m_corrector0.reset();
        self.k = 0;
    }

    pub fn decompress<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        let corr = self.read_corrector(dec, context as usize)?;
        let real = pred.wrapping_add(corr);
        // unfold back into the valid range
        if real < 0 {
            Ok(real.wrapping_add(self.corr_range as i32))
        } else if real as u32 >= self.corr_range {
            Ok(real.wrapping_sub(self.corr_range as i32))
        } else {
            Ok(real)
        }
    }

    fn read_corrector<T: Read>(
        &mut self,
        dec: &mut ArithmeticDecoder<T>,
        context: usize,
    ) -> std::io::Result<i32> {
        self.k = dec.decode_symbol(&mut self.m_bits[context])?;

        if self.k == 0 {
            return Ok(dec.decode_bit(&mut self.m_corrector0)? as i32);
        }
        if self.k >= 32 {
            return Ok(self.corr_min);
        }

        let model = &mut self.m_corrector[(self.k - 1) as usize];
        let c = if self.k <= self.bits_high {
            dec.decode_symbol(model)? as i32
        } else {
            let k1 = self.k - self.bits_high;
            let high = dec.decode_symbol(model)? as i32;
            let low = dec.read_bits(k1)? as i32;
            (high << k1) | low
        };

        // translate c back into [-(2^k - 1), -(2^(k-1))] or [2^(k-1) + 1, 2^k]
        if c >= (1u32 << (self.k - 1)) as i32 {
            Ok(c + 1)
        } else {
            Ok(c - ((1u32 << self.k) - 1) as i32)
        }
    }
}

pub struct IntegerDecompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl IntegerDecompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
            bits_high: DEFAULT_BITS_HIGH,
            range: DEFAULT_RANGE,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn build(&self) -> IntegerDecompressor {
        IntegerDecompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerDecompressor {
        let mut idc = self.build();
        idc.init();
        idc
    }
}

impl Default for IntegerDecompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::compressors::IntegerCompressorBuilder;
    use crate::encoders::ArithmeticEncoder;

    fn round_trip(bits: u32, contexts: u32, values: &[(i32, i32, u32)]) {
        let mut ic = IntegerCompressorBuilder::new()
            .bits(bits)
            .contexts(contexts)
            .build_initialized();
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut ks = Vec::with_capacity(values.len());
        for &(pred, real, ctx) in values {
            ic.compress(&mut encoder, pred, real, ctx).unwrap();
            ks.push(ic.k());
        }
        encoder.done().unwrap();

        let mut idc = IntegerDecompressorBuilder::new()
            .bits(bits)
            .contexts(contexts)
            .build_initialized();
        let mut decoder = ArithmeticDecoder::new(Cursor::new(encoder.into_inner().into_inner()));
        decoder.read_init_bytes().unwrap();
        for (&(pred, real, ctx), &k) in values.iter().zip(&ks) {
            assert_eq!(idc.decompress(&mut decoder, pred, ctx).unwrap(), real);
            assert_eq!(idc.k(), k);
        }
    }

    #[test]
    fn thirty_two_bits_handles_extremes() {
        round_trip(
            32,
            2,
            &[
                (0, 0, 0),
                (0, 1, 1),
                (0, -1, 0),
                (i32::MAX, i32::MIN, 1),
                (i32::MIN, i32::MAX, 0),
                (-5, 1_000_000, 1),
                (123_456, 123_457, 0),
                (0, i32::MIN, 0),
            ],
        );
    }

    #[test]
    fn sixteen_bits_wraps_around() {
        round_trip(
            16,
            4,
            &[
                (0, 65535, 0),
                (65535, 0, 1),
                (30_000, 2, 2),
                (7, 7, 3),
                (100, 40_000, 2),
            ],
        );
    }

    #[test]
    fn re_init_matches_fresh_models() {
        let mut used = IntegerCompressorBuilder::new().bits(32).build_initialized();
        let mut scratch = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for i in 0..200 {
            used.compress(&mut scratch, 0, i * 37, 0).unwrap();
        }
        used.init();
        let mut fresh = IntegerCompressorBuilder::new().bits(32).build_initialized();

        let mut a = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut b = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for i in 0..50 {
            used.compress(&mut a, 3, i * 11, 0).unwrap();
            fresh.compress(&mut b, 3, i * 11, 0).unwrap();
        }
        a.done().unwrap();
        b.done().unwrap();
        assert_eq!(a.into_inner().into_inner(), b.into_inner().into_inner());
    }
}
