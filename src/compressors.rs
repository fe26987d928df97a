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

//! Integer compressor: codes the difference between a prediction
//! and the real value as an interval index `k` followed by the
//! position of the corrector inside that interval.

use std::io::Write;

use crate::encoders::ArithmeticEncoder;
use crate::models::{ArithmeticBitModel, ArithmeticModel, ArithmeticModelBuilder};

pub const DEFAULT_BITS: u32 = 16;
pub const DEFAULT_CONTEXTS: u32 = 1;
pub const DEFAULT_BITS_HIGH: u32 = 8;
pub const DEFAULT_RANGE: u32 = 0;

/// Significant bits, range and bounds of the corrector for a given
/// number of `bits` or a given `range` (the range wins when non zero).
pub(crate) fn corrector_params(bits: u32, mut range: u32) -> (u32, u32, i32, i32) {
    if range != 0 {
        let corr_range = range;
        let mut corr_bits = 0u32;
        while range != 0 {
            range >>= 1;
            corr_bits += 1;
        }
        if corr_range == (1u32 << (corr_bits - 1)) {
            corr_bits -= 1;
        }
        let corr_min = -((corr_range / 2) as i32);
        let corr_max = corr_min + (corr_range - 1) as i32;
        (corr_bits, corr_range, corr_min, corr_max)
    } else if bits >= 1 && bits < 32 {
        let corr_range = 1u32 << bits;
        let corr_min = -((corr_range / 2) as i32);
        let corr_max = corr_min + (corr_range - 1) as i32;
        (bits, corr_range, corr_min, corr_max)
    } else {
        (32, 0, i32::MIN, i32::MAX)
    }
}

/// Models shared by the integer compressor and decompressor.
///
/// One `k` model per context, then one corrector model per `k`.
pub(crate) fn corrector_models(
    corr_bits: u32,
    bits_high: u32,
    contexts: u32,
    compress: bool,
) -> (Vec<ArithmeticModel>, Vec<ArithmeticModel>) {
    let build = |symbols: u32| {
        let builder = ArithmeticModelBuilder::new(symbols);
        if compress {
            builder.for_compression().build()
        } else {
            builder.build()
        }
    };
    let m_bits = (0..contexts).map(|_| build(corr_bits + 1)).collect();
    let m_corrector = (1..=corr_bits)
        .map(|i| build(1u32 << i.min(bits_high)))
        .collect();
    (m_bits, m_corrector)
}

#[derive(Debug)]
pub struct IntegerCompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,

    corr_bits: u32,
    corr_range: u32,
    corr_min: i32,
    corr_max: i32,

    m_bits: Vec<ArithmeticModel>,
    m_corrector_0: ArithmeticBitModel,
    m_corrector: Vec<ArithmeticModel>,
}

impl IntegerCompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, range: u32) -> Self {
        let (corr_bits, corr_range, corr_min, corr_max) = corrector_params(bits, range);
        Self {
            k: 0,
            contexts,
            bits_high,
            corr_bits,
            corr_range,
            corr_min,
            corr_max,
            m_bits: vec![],
            m_corrector_0: ArithmeticBitModel::new(),
            m_corrector: vec![],
        }
    }

    /// The interval index `k` of the last compressed corrector.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Allocates the models, or puts them back into their
    /// initial state when they already exist.
    pub fn init(&mut self) {
        if self.m_bits.is_empty() {
            let (m_bits, m_corrector) =
                corrector_models(self.corr_bits, self.bits_high, self.contexts, true);
            self.m_bits = m_bits;
            self.m_corrector = m_corrector;
        } else {
            self.m_bits.iter_mut().for_each(ArithmeticModel::reset);
            self.m_corrector.iter_mut().for_each(ArithmeticModel::reset);
        }
        self.m_corrector_0.reset();
        self.k = 0;
    }

    pub fn compress<T: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<T>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        // fold the corrector into [corr_min, corr_max]
        let mut corr = real.wrapping_sub(pred);
        if corr < self.corr_min {
            corr = corr.wrapping_add(self.corr_range as i32);
        } else if corr > self.corr_max {
            corr = corr.wrapping_sub(self.corr_range as i32);
        }
        self.write_corrector(encoder, corr, context as usize)
    }

    fn write_corrector<T: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<T>,
        mut c: i32,
        context: usize,
    ) -> std::io::Result<()> {
        // tightest interval [-(2^k - 1), 2^k] that contains c
        let mut c1 = if c <= 0 { c.wrapping_neg() as u32 } else { (c - 1) as u32 };
        self.k = 32 - c1.leading_zeros();

        encoder.encode_symbol(&mut self.m_bits[context], self.k)?;

        if self.k == 0 {
            debug_assert!(c == 0 || c == 1);
            return encoder.encode_bit(&mut self.m_corrector_0, c as u32);
        }

        if self.k < 32 {
            // translate c into the k-bit interval [0, 2^k - 1]
            if c >= 0 {
                c -= 1;
            } else {
                c += ((1u32 << self.k) - 1) as i32;
            }

            let model = &mut self.m_corrector[(self.k - 1) as usize];
            if self.k <= self.bits_high {
                encoder.encode_symbol(model, c as u32)?;
            } else {
                // high bits are modelled, low k1 bits are stored raw
                let k1 = self.k - self.bits_high;
                c1 = (c as u32) & ((1u32 << k1) - 1);
                encoder.encode_symbol(model, (c >> k1) as u32)?;
                encoder.write_bits(k1, c1)?;
            }
        }
        Ok(())
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl IntegerCompressorBuilder {
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

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerCompressor {
        let mut ic = self.build();
        ic.init();
        ic
    }
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
