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

//! Adaptive frequency models used by the arithmetic coder.
//!
//! Models count the symbols they see and periodically rebuild their
//! cumulative distribution from those counts. Encoder and decoder see
//! the same symbols in the same order, so they rebuild identical tables.

/// Bits of the coder length that are dropped before multiplying
/// by a symbol model distribution.
pub(crate) const DM_LENGTH_SHIFT: u32 = 15;
const DM_MAX_COUNT: u32 = 1 << DM_LENGTH_SHIFT;

/// Same as [`DM_LENGTH_SHIFT`] for bit models.
pub(crate) const BM_LENGTH_SHIFT: u32 = 13;
const BM_MAX_COUNT: u32 = 1 << BM_LENGTH_SHIFT;
const BM_MAX_UPDATE_CYCLE: u32 = 64;

const MAX_SYMBOLS: u32 = 1 << 11;
/// Models with at most this many symbols are searched without a table.
const MAX_SYMBOLS_WITHOUT_TABLE: u32 = 16;

/// Coarse index from a scaled value to the first symbol that may hold it.
#[derive(Debug, Clone)]
struct DecoderTable {
    first_symbols: Vec<u32>,
    size: usize,
    shift: u32,
}

impl DecoderTable {
    fn for_symbols(num_symbols: u32) -> Self {
        let mut table_bits = 3u32;
        while num_symbols > (1u32 << (table_bits + 2)) {
            table_bits += 1;
        }
        let size = 1usize << table_bits;
        Self {
            first_symbols: vec![0u32; size + 2],
            size,
            shift: DM_LENGTH_SHIFT - table_bits,
        }
    }

    fn rebuild(&mut self, cumulative: &[u32]) {
        let mut slot = 0usize;
        for (symbol, &low) in cumulative.iter().enumerate() {
            let end = (low >> self.shift) as usize;
            while slot < end {
                slot += 1;
                // symbol is never 0 here, the first cumulative value is 0
                self.first_symbols[slot] = symbol as u32 - 1;
            }
        }
        self.first_symbols[0] = 0;
        let last_symbol = cumulative.len() as u32 - 1;
        while slot <= self.size {
            slot += 1;
            self.first_symbols[slot] = last_symbol;
        }
    }
}

/// Multi-symbol adaptive model.
#[derive(Debug, Clone)]
pub struct ArithmeticModel {
    counts: Vec<u32>,
    cumulative: Vec<u32>,
    /// Only decoder side models with more than 16 symbols have one.
    table: Option<DecoderTable>,
    total_count: u32,
    update_cycle: u32,
    until_update: u32,
}

impl ArithmeticModel {
    /// # Panics
    ///
    /// If `num_symbols` is not in `2..=2048`
    pub fn new(num_symbols: u32, compress: bool) -> Self {
        assert!(
            (2..=MAX_SYMBOLS).contains(&num_symbols),
            "invalid number of symbols: {}",
            num_symbols
        );
        let table = if !compress && num_symbols > MAX_SYMBOLS_WITHOUT_TABLE {
            Some(DecoderTable::for_symbols(num_symbols))
        } else {
            None
        };
        let mut model = Self {
            counts: vec![1u32; num_symbols as usize],
            cumulative: vec![0u32; num_symbols as usize],
            table,
            total_count: 0,
            update_cycle: 0,
            until_update: 0,
        };
        model.reset();
        model
    }

    /// Puts the model back into its equiprobable initial state.
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 1);
        self.total_count = 0;
        self.update_cycle = self.num_symbols();
        self.rebuild();
        self.update_cycle = (self.num_symbols() + 6) >> 1;
        self.until_update = self.update_cycle;
    }

    pub(crate) fn num_symbols(&self) -> u32 {
        self.counts.len() as u32
    }

    pub(crate) fn last_symbol(&self) -> u32 {
        self.num_symbols() - 1
    }

    /// Scaled cumulative frequency of the symbols lower than `symbol`.
    #[inline]
    pub(crate) fn cumulative(&self, symbol: u32) -> u32 {
        self.cumulative[symbol as usize]
    }

    /// Range of symbols the decoder has to search to find the one
    /// of the scaled `value`, when the model has a decoder table.
    #[inline]
    pub(crate) fn search_range(&self, value: u32) -> Option<(u32, u32)> {
        self.table.as_ref().map(|table| {
            let slot = (value >> table.shift) as usize;
            (table.first_symbols[slot], table.first_symbols[slot + 1] + 1)
        })
    }

    /// Counts one more occurrence of `symbol`.
    #[inline]
    pub(crate) fn record(&mut self, symbol: u32) {
        self.counts[symbol as usize] += 1;
        self.until_update -= 1;
        if self.until_update == 0 {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.total_count += self.update_cycle;
        if self.total_count > DM_MAX_COUNT {
            self.total_count = 0;
            for count in &mut self.counts {
                *count = (*count + 1) >> 1;
                self.total_count += *count;
            }
        }

        let scale = 0x8000_0000u32 / self.total_count;
        let mut sum = 0u32;
        for (low, count) in self.cumulative.iter_mut().zip(&self.counts) {
            *low = (scale * sum) >> (31 - DM_LENGTH_SHIFT);
            sum += *count;
        }
        if let Some(table) = self.table.as_mut() {
            table.rebuild(&self.cumulative);
        }

        let max_cycle = (self.num_symbols() + 6) << 3;
        self.update_cycle = ((5 * self.update_cycle) >> 2).min(max_cycle);
        self.until_update = self.update_cycle;
    }
}

/// Binary adaptive model
#[derive(Debug, Clone)]
pub struct ArithmeticBitModel {
    zeros: u32,
    total: u32,
    zero_probability: u32,
    update_cycle: u32,
    until_update: u32,
}

impl ArithmeticBitModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Scaled probability of the bit being 0.
    #[inline]
    pub(crate) fn zero_probability(&self) -> u32 {
        self.zero_probability
    }

    /// Counts one more occurrence of `bit`.
    #[inline]
    pub(crate) fn record(&mut self, bit: u32) {
        if bit == 0 {
            self.zeros += 1;
        }
        self.until_update -= 1;
        if self.until_update == 0 {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.total += self.update_cycle;
        if self.total > BM_MAX_COUNT {
            self.total = (self.total + 1) >> 1;
            self.zeros = (self.zeros + 1) >> 1;
            if self.zeros == self.total {
                self.total += 1;
            }
        }

        let scale = 0x8000_0000u32 / self.total;
        self.zero_probability = (self.zeros * scale) >> (31 - BM_LENGTH_SHIFT);

        self.update_cycle = ((5 * self.update_cycle) >> 2).min(BM_MAX_UPDATE_CYCLE);
        self.until_update = self.update_cycle;
    }
}

impl Default for ArithmeticBitModel {
    fn default() -> Self {
        Self {
            zeros: 1,
            total: 2,
            zero_probability: 1u32 << (BM_LENGTH_SHIFT - 1),
            update_cycle: 4,
            until_update: 4,
        }
    }
}

pub struct ArithmeticModelBuilder {
    num_symbols: u32,
    compress: bool,
}

impl ArithmeticModelBuilder {
    pub fn new(num_symbols: u32) -> Self {
        Self {
            num_symbols,
            compress: false,
        }
    }

    /// Models used only for encoding do not need the decoder table.
    pub fn for_compression(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn build(self) -> ArithmeticModel {
        ArithmeticModel::new(self.num_symbols, self.compress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_initial_distribution() {
        let fresh = ArithmeticModelBuilder::new(256).build();
        let mut model = fresh.clone();
        for _ in 0..1000 {
            model.record(3);
        }
        assert_ne!(model.cumulative, fresh.cumulative);
        model.reset();
        assert_eq!(model.cumulative, fresh.cumulative);
        assert_eq!(model.search_range(1234), fresh.search_range(1234));
        assert_eq!(model.until_update, fresh.until_update);
    }

    #[test]
    fn small_models_have_no_decoder_table() {
        assert!(ArithmeticModelBuilder::new(16).build().search_range(0).is_none());
        assert!(ArithmeticModelBuilder::new(17).build().search_range(0).is_some());
        assert!(ArithmeticModelBuilder::new(256)
            .for_compression()
            .build()
            .search_range(0)
            .is_none());
    }

    #[test]
    fn decoder_table_brackets_the_symbol() {
        let mut model = ArithmeticModelBuilder::new(100).build();
        for i in 0..5_000u32 {
            model.record((i * i) % 100);
        }
        for symbol in 0..100u32 {
            let value = model.cumulative(symbol);
            if symbol < 99 && model.cumulative(symbol + 1) == value {
                continue;
            }
            let (first, end) = model.search_range(value).unwrap();
            assert!(first <= symbol && symbol < end, "{} not in {}..{}", symbol, first, end);
        }
    }

    #[test]
    fn bit_model_leans_towards_the_frequent_bit() {
        let mut model = ArithmeticBitModel::new();
        let half = model.zero_probability();
        for _ in 0..500 {
            model.record(0);
        }
        assert!(model.zero_probability() > half);
        model.reset();
        assert_eq!(model.zero_probability(), half);
    }
}
