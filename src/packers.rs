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

//! Little-endian packing of the scalar fields found in point records.

use byteorder::{ByteOrder, LittleEndian};

pub trait Packable: Sized {
    /// Reads the value from the first bytes of `input`.
    ///
    /// Panics if `input` is too short.
    fn unpack_from(input: &[u8]) -> Self;

    /// Writes the value into the first bytes of `output`.
    ///
    /// Panics if `output` is too short.
    fn pack_into(&self, output: &mut [u8]);
}

macro_rules! impl_packable {
    ($($ty:ty => $read:ident, $write:ident);* $(;)?) => {
        $(
            impl Packable for $ty {
                #[inline]
                fn unpack_from(input: &[u8]) -> Self {
                    LittleEndian::$read(input)
                }

                #[inline]
                fn pack_into(&self, output: &mut [u8]) {
                    LittleEndian::$write(output, *self)
                }
            }
        )*
    };
}

impl_packable! {
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    u64 => read_u64, write_u64;
    i64 => read_i64, write_i64;
    f32 => read_f32, write_f32;
    f64 => read_f64, write_f64;
}

impl Packable for u8 {
    #[inline]
    fn unpack_from(input: &[u8]) -> Self {
        input[0]
    }

    #[inline]
    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self;
    }
}

impl Packable for i8 {
    #[inline]
    fn unpack_from(input: &[u8]) -> Self {
        input[0] as i8
    }

    #[inline]
    fn pack_into(&self, output: &mut [u8]) {
        output[0] = *self as u8;
    }
}
