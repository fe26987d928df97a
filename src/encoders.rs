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


//! Arithmetic encoder writing into any [`std::io::Write`].

use std::io::Write;

use crate::models::{ArithmeticBitModel, ArithmeticModel, BM_LENGTH_SHIFT, DM_LENGTH_SHIFT};

/// Length of the coding interval of a fresh coder.
pub(crate) const AC_MAX_LENGTH: u32 = 0xFFFF_FFFF;
/// The interval is renormalized when its length drops below this.
pub(crate) const AC_MIN_LENGTH: u32 = 0x0100_0000;

const HALF_BUFFER_SIZE: usize = 1024;
const BUFFER_SIZE: usize = 2 * HALF_BUFFER_SIZE;

/// Output bytes that may still be incremented by a carry.
///
/// The ring is made of two halves, a half is handed to the stream
/// only once the other half starts being filled.
struct PendingBytes {
    ring: Vec<u8>,
    next: usize,
    flush_at: usize,
}

impl PendingBytes {
    fn new() -> Self {
        Self {
            ring: vec![0u8; BUFFER_SIZE],
            next: 0,
            flush_at: BUFFER_SIZE,
        }
    }

    fn clear(&mut self) {
        self.next = 0;
        self.flush_at = BUFFER_SIZE;
    }

    fn push<W: Write>(&mut self, byte: u8, stream: &mut W) -> std::io::Result<()> {
        debug_assert!(self.next < self.flush_at);
        self.ring[self.next] = byte;
        self.next += 1;
        if self.next == self.flush_at {
            if self.next == BUFFER_SIZE {
                self.next = 0;
            }
            stream.write_all(&self.ring[self.next..self.next + HALF_BUFFER_SIZE])?;
            self.flush_at = self.next + HALF_BUFFER_SIZE;
        }
        Ok(())
    }

    fn add_carry(&mut self) {
        let mut i = self.next;
        loop {
            i = if i == 0 { BUFFER_SIZE - 1 } else { i - 1 };
            if self.ring[i] != 0xFF {
                self.ring[i] += 1;
                return;
            }
            self.ring[i] = 0;
        }
    }

    fn write_remaining<W: Write>(&self, stream: &mut W) -> std::io::Result<()> {
        if self.flush_at != BUFFER_SIZE {
            // the second half was not handed out yet
            stream.write_all(&self.ring[HALF_BUFFER_SIZE..])?;
        }
        stream.write_all(&self.ring[..self.next])
    }
}

pub struct ArithmeticEncoder<T: Write> {
    base: u32,
    length: u32,
    pending: PendingBytes,
    stream: T,
}

impl<T: Write> ArithmeticEncoder<T> {
    pub fn new(stream: T) -> Self {
        Self {
            base: 0,
            length: AC_MAX_LENGTH,
            pending: PendingBytes::new(),
            stream,
        }
    }

    /// Gets the encoder ready to start a new arithmetic stream.
    pub fn reset(&mut self) {
        self.base = 0;
        self.length = AC_MAX_LENGTH;
        self.pending.clear();
    }

    /// Terminates the arithmetic stream, everything encoded so far
    /// is written to the inner stream.
    pub fn done(&mut self) -> std::io::Result<()> {
        let one_more_byte = self.length > 2 * AC_MIN_LENGTH;
        if one_more_byte {
            self.move_base(AC_MIN_LENGTH);
            self.length = AC_MIN_LENGTH >> 1;
        } else {
            self.move_base(AC_MIN_LENGTH >> 1);
            self.length = AC_MIN_LENGTH >> 9;
        }
        self.renormalize()?;

        self.pending.write_remaining(&mut self.stream)?;
        let padding: &[u8] = if one_more_byte { &[0, 0, 0] } else { &[0, 0] };
        self.stream.write_all(padding)
    }

    pub fn encode_bit(&mut self, model: &mut ArithmeticBitModel, bit: u32) -> std::io::Result<()> {
        debug_assert!(bit <= 1);
        let bound = model.zero_probability() * (self.length >> BM_LENGTH_SHIFT);
        if bit == 0 {
            self.length = bound;
        } else {
            self.move_base(bound);
            self.length -= bound;
        }
        model.record(bit);
        self.renormalize_if_needed()
    }

    pub fn encode_symbol(&mut self, model: &mut ArithmeticModel, symbol: u32) -> std::io::Result<()> {
        debug_assert!(symbol <= model.last_symbol());
        if symbol == model.last_symbol() {
            let low = model.cumulative(symbol) * (self.length >> DM_LENGTH_SHIFT);
            self.move_base(low);
            self.length -= low;
        } else {
            self.length >>= DM_LENGTH_SHIFT;
            let low = model.cumulative(symbol) * self.length;
            self.move_base(low);
            self.length = model.cumulative(symbol + 1) * self.length - low;
        }
        model.record(symbol);
        self.renormalize_if_needed()
    }

    /// Writes the `num_bits` low bits of `value` without modelling.
    pub fn write_bits(&mut self, mut num_bits: u32, mut value: u32) -> std::io::Result<()> {
        debug_assert!(num_bits > 0 && num_bits <= 32);
        debug_assert!(num_bits == 32 || value < (1u32 << num_bits));
        if num_bits > 19 {
            self.write_raw(16, value & 0xFFFF)?;
            value >>= 16;
            num_bits -= 16;
        }
        self.write_raw(num_bits, value)
    }

    pub fn write_int(&mut self, value: u32) -> std::io::Result<()> {
        self.write_raw(16, value & 0xFFFF)?;
        self.write_raw(16, value >> 16)
    }

    pub fn write_int64(&mut self, value: u64) -> std::io::Result<()> {
        self.write_int(value as u32)?;
        self.write_int((value >> 32) as u32)
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

    fn write_raw(&mut self, num_bits: u32, value: u32) -> std::io::Result<()> {
        self.length >>= num_bits;
        self.move_base(value * self.length);
        self.renormalize_if_needed()
    }

    /// Moves the base of the interval up, carrying into the pending bytes on overflow.
    #[inline]
    fn move_base(&mut self, offset: u32) {
        let (base, carry) = self.base.overflowing_add(offset);
        self.base = base;
        if carry {
            self.pending.add_carry();
        }
    }

    #[inline]
    fn renormalize_if_needed(&mut self) -> std::io::Result<()> {
        if self.length < AC_MIN_LENGTH {
            self.renormalize()?;
        }
        Ok(())
    }

    fn renormalize(&mut self) -> std::io::Result<()> {
        loop {
            self.pending.push((self.base >> 24) as u8, &mut self.stream)?;
            self.base <<= 8;
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                return Ok(());
            }
        }
    }
}
