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

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
//                       ****************************                        -
//                        ARITHMETIC CODING EXAMPLES                         -
//                       ****************************                        -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// Fast arithmetic coding implementation                                     -
// -> 32-bit variables, 32-bit product, periodic updates, table decoding     -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// Version 1.00  -  April 25, 2004                                           -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
//                                  WARNING                                  -
//                                 =========                                 -
//                                                                           -
// The only purpose of this program is to demonstrate the basic principles   -
// of arithmetic coding. The original version of this code can be found in   -
// Digital Signal Compression: Principles and Practice                       -
// (Cambridge University Press, 2011, ISBN: 9780511984655)                   -
//                                                                           -
// Copyright (c) 2019 by Amir Said (said@ieee.org) &                         -
//                       William A. Pearlman (pearlw@ecse.rpi.edu)           -
//                                                                           -
// Redistribution and use in source and binary forms, with or without        -
// modification, are permitted provided that the following conditions are    -
// met:                                                                      -
//                                                                           -
// 1. Redistributions of source code must retain the above copyright notice, -
// this list of conditions and the following disclaimer.                     -
//                                                                           -
// 2. Redistributions in binary form must reproduce the above copyright      -
// notice, this list of conditions and the following disclaimer in the       -
// documentation and/or other materials provided with the distribution.      -
//                                                                           -
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS       -
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED -
// TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A           -
// PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER -
// OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,  -
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,       -
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR        -
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF    -
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING      -
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS        -
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.              -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
//                                                                           -
// A description of the arithmetic coding method used here is available in   -
//                                                                           -
// Lossless Compression Handbook, ed. K. Sayood                              -
// Chapter 5: Arithmetic Coding (A. Said), pp. 101-152, Academic Press, 2003 -
//                                                                           -
// A. Said, Introduction to Arithetic Coding Theory and Practice             -
// HP Labs report HPL-2004-76  -  http://www.hpl.hp.com/techreports/         -
//                                                                           -
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -


//! Arithmetic decoder reading from any [`std::io::Read`].

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::encoders::{AC_MAX_LENGTH, AC_MIN_LENGTH};
use crate::models::{ArithmeticBitModel, ArithmeticModel, BM_LENGTH_SHIFT, DM_LENGTH_SHIFT};

pub struct ArithmeticDecoder<T: Read> {
    value: u32,
    length: u32,
    stream: T,
}

impl<T: Read> ArithmeticDecoder<T> {
    pub fn new(stream: T) -> Self {
        Self {
            value: 0,
            length: AC_MAX_LENGTH,
            stream,
        }
    }

    pub fn reset(&mut self) {
        self.value = 0;
        self.length = AC_MAX_LENGTH;
    }

    /// Reads the first 4 bytes of an arithmetic stream,
    /// must be called before anything is decoded.
    pub fn read_init_bytes(&mut self) -> std::io::Result<()> {
        self.length = AC_MAX_LENGTH;
        self.value = self.stream.read_u32::<BigEndian>()?;
        Ok(())
    }

    pub fn decode_bit(&mut self, model: &mut ArithmeticBitModel) -> std::io::Result<u32> {
        let bound = model.zero_probability() * (self.length >> BM_LENGTH_SHIFT);
        let bit = if self.value < bound {
            self.length = bound;
            0
        } else {
            self.value -= bound;
            self.length -= bound;
            1
        };
        model.record(bit);
        self.renormalize_if_needed()?;
        Ok(bit)
    }

    pub fn decode_symbol(&mut self, model: &mut ArithmeticModel) -> std::io::Result<u32> {
        let full_length = self.length;
        self.length >>= DM_LENGTH_SHIFT;
        let (symbol, low, high) = match model.search_range(self.value / self.length) {
            Some((first, end)) => self.find_in_range(model, first, end, full_length),
            None => self.find_by_bisection(model, full_length),
        };
        self.value -= low;
        self.length = high - low;
        model.record(symbol);
        self.renormalize_if_needed()?;
        Ok(symbol)
    }

    /// Bisection between the bounds given by the decoder table.
    fn find_in_range(
        &self,
        model: &ArithmeticModel,
        mut symbol: u32,
        mut end: u32,
        full_length: u32,
    ) -> (u32, u32, u32) {
        let scaled_value = self.value / self.length;
        while end > symbol + 1 {
            let middle = (symbol + end) >> 1;
            if model.cumulative(middle) > scaled_value {
                end = middle;
            } else {
                symbol = middle;
            }
        }
        let low = model.cumulative(symbol) * self.length;
        let high = if symbol == model.last_symbol() {
            full_length
        } else {
            model.cumulative(symbol + 1) * self.length
        };
        (symbol, low, high)
    }

    /// Bisection over all the symbols, for models without a decoder table.
    fn find_by_bisection(&self, model: &ArithmeticModel, full_length: u32) -> (u32, u32, u32) {
        let (mut symbol, mut low) = (0u32, 0u32);
        let mut end = model.num_symbols();
        let mut high = full_length;
        let mut middle = end >> 1;
        loop {
            let bound = self.length * model.cumulative(middle);
            if bound > self.value {
                end = middle;
                high = bound;
            } else {
                symbol = middle;
                low = bound;
            }
            middle = (symbol + end) >> 1;
            if middle == symbol {
                return (symbol, low, high);
            }
        }
    }

    /// Reads `num_bits` bits that were written without modelling.
    pub fn read_bits(&mut self, num_bits: u32) -> std::io::Result<u32> {
        debug_assert!(num_bits > 0 && num_bits <= 32);
        if num_bits > 19 {
            let low = self.read_raw(16)?;
            let high = self.read_raw(num_bits - 16)?;
            Ok((high << 16) | low)
        } else {
            self.read_raw(num_bits)
        }
    }

    pub fn read_int(&mut self) -> std::io::Result<u32> {
        let low = self.read_raw(16)?;
        let high = self.read_raw(16)?;
        Ok((high << 16) | low)
    }

    pub fn read_int_64(&mut self) -> std::io::Result<u64> {
        let low = u64::from(self.read_int()?);
        let high = u64::from(self.read_int()?);
        Ok((high << 32) | low)
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.stream
    }

    pub fn into_inner(self) -> T {
        self.stream
    }

    fn read_raw(&mut self, num_bits: u32) -> std::io::Result<u32> {
        self.length >>= num_bits;
        let value = self.value / self.length;
        self.value -= self.length * value;
        self.renormalize_if_needed()?;
        Ok(value)
    }

    #[inline]
    fn renormalize_if_needed(&mut self) -> std::io::Result<()> {
        while self.length < AC_MIN_LENGTH {
            self.value = (self.value << 8) | u32::from(self.stream.read_u8()?);
            self.length <<= 8;
        }
        Ok(())
    }
}
