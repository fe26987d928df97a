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

//! Defines the near infrared component of a point and its
//! layered Compressor and Decompressor.

use std::io::{Read, Seek, Write};

use crate::las::selective::DecompressionSelection;
use crate::las::utils::{
    context_of_last_item, copy_bytes_into_decoder, copy_encoder_content_to, lower_byte,
    new_layer_decoder, new_layer_encoder, read_layer_size, reset_layer_encoder, u8_fold,
    upper_byte, write_layer_size, LayerDecoder, LayerEncoder,
};
use crate::models::ArithmeticModel;
use crate::packers::Packable;
use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct Nir(pub u16);

impl Nir {
    pub const SIZE: usize = 2;
}

impl Packable for Nir {
    fn unpack_from(input: &[u8]) -> Self {
        Nir(u16::unpack_from(input))
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.0.pack_into(output)
    }
}

/// bit 0: lower byte changed, bit 1: upper byte changed
fn changed_bytes(current: Nir, last: Nir) -> u32 {
    (lower_byte(current.0) != lower_byte(last.0)) as u32
        | ((upper_byte(current.0) != upper_byte(last.0)) as u32) << 1
}

struct NirContext {
    unused: bool,
    bytes_used: ArithmeticModel,
    diff_0: ArithmeticModel,
    diff_1: ArithmeticModel,
    last: Nir,
}

impl NirContext {
    fn new(compress: bool) -> Self {
        Self {
            unused: true,
            bytes_used: ArithmeticModel::new(4, compress),
            diff_0: ArithmeticModel::new(256, compress),
            diff_1: ArithmeticModel::new(256, compress),
            last: Nir::default(),
        }
    }

    fn create_and_init(&mut self, seed: Nir) {
        self.bytes_used.reset();
        self.diff_0.reset();
        self.diff_1.reset();
        self.last = seed;
        self.unused = false;
    }
}

fn nir_contexts(compress: bool) -> [NirContext; 4] {
    [
        NirContext::new(compress),
        NirContext::new(compress),
        NirContext::new(compress),
        NirContext::new(compress),
    ]
}

fn switch_context(
    contexts: &mut [NirContext; 4],
    current_context: &mut usize,
    context: usize,
    version: u16,
) -> usize {
    let previous = *current_context;
    if previous == context {
        return previous;
    }
    *current_context = context;
    let created = contexts[context].unused;
    if created {
        let seed = contexts[previous].last;
        contexts[context].create_and_init(seed);
    }
    context_of_last_item(version, previous, context, created)
}

pub struct LasNIRCompressor {
    encoder: LayerEncoder,
    changed_nir: bool,
    version: u16,
    current_context: usize,
    contexts: [NirContext; 4],
}

impl LasNIRCompressor {
    pub fn new() -> Self {
        Self::with_version(4)
    }

    pub fn with_version(version: u16) -> Self {
        Self {
            encoder: new_layer_encoder(),
            changed_nir: false,
            version,
            current_context: 0,
            contexts: nir_contexts(true),
        }
    }
}

impl Default for LasNIRCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LasNIRCompressor {
    fn size_of_field(&self) -> usize {
        Nir::SIZE
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        dst.write_all(&first_point[..Nir::SIZE])?;
        reset_layer_encoder(&mut self.encoder);
        self.changed_nir = false;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(Nir::unpack_from(first_point));
        Ok(())
    }

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let last_context = switch_context(
            &mut self.contexts,
            &mut self.current_context,
            *context,
            self.version,
        );
        let current = Nir::unpack_from(current_point);
        let last = self.contexts[last_context].last;
        let the_context = &mut self.contexts[self.current_context];

        let sym = changed_bytes(current, last);
        self.encoder.encode_symbol(&mut the_context.bytes_used, sym)?;
        if is_nth_bit_set!(sym, 0) {
            let diff = i32::from(lower_byte(current.0)) - i32::from(lower_byte(last.0));
            self.encoder
                .encode_symbol(&mut the_context.diff_0, u32::from(u8_fold(diff)))?;
        }
        if is_nth_bit_set!(sym, 1) {
            let diff = i32::from(upper_byte(current.0)) - i32::from(upper_byte(last.0));
            self.encoder
                .encode_symbol(&mut the_context.diff_1, u32::from(u8_fold(diff)))?;
        }
        if sym != 0 {
            self.changed_nir = true;
        }
        self.contexts[last_context].last = current;
        Ok(())
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        write_layer_size(&mut self.encoder, self.changed_nir, dst)?;
        Ok(())
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        copy_encoder_content_to(&self.encoder, self.changed_nir, dst)
    }
}

pub struct LasNIRDecompressor {
    decoder: LayerDecoder,
    is_requested: bool,
    should_decompress: bool,
    layer_size: usize,
    version: u16,
    current_context: usize,
    contexts: [NirContext; 4],
}

impl LasNIRDecompressor {
    pub fn new() -> Self {
        Self::selective(DecompressionSelection::all())
    }

    pub fn selective(selection: DecompressionSelection) -> Self {
        Self {
            decoder: new_layer_decoder(),
            is_requested: selection.should_decompress_nir(),
            should_decompress: false,
            layer_size: 0,
            version: 4,
            current_context: 0,
            contexts: nir_contexts(false),
        }
    }

    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }
}

impl Default for LasNIRDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> LayeredFieldDecompressor<R> for LasNIRDecompressor {
    fn size_of_field(&self) -> usize {
        Nir::SIZE
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..Nir::SIZE])?;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(Nir::unpack_from(first_point));
        Ok(())
    }

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let last_context = switch_context(
            &mut self.contexts,
            &mut self.current_context,
            *context,
            self.version,
        );
        let last = self.contexts[last_context].last;
        if !self.should_decompress {
            last.pack_into(current_point);
            return Ok(());
        }

        let the_context = &mut self.contexts[self.current_context];
        let sym = self.decoder.decode_symbol(&mut the_context.bytes_used)?;

        let mut value = if is_nth_bit_set!(sym, 0) {
            let corr = self.decoder.decode_symbol(&mut the_context.diff_0)? as i32;
            u16::from(u8_fold(corr + i32::from(lower_byte(last.0))))
        } else {
            last.0 & 0x00FF
        };
        if is_nth_bit_set!(sym, 1) {
            let corr = self.decoder.decode_symbol(&mut the_context.diff_1)? as i32;
            value |= u16::from(u8_fold(corr + i32::from(upper_byte(last.0)))) << 8;
        } else {
            value |= last.0 & 0xFF00;
        }

        let current = Nir(value);
        self.contexts[last_context].last = current;
        current.pack_into(current_point);
        Ok(())
    }

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
        self.layer_size = read_layer_size(src)?;
        Ok(())
    }

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
        self.should_decompress =
            copy_bytes_into_decoder(self.is_requested, self.layer_size, &mut self.decoder, src)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_bytes_mask() {
        assert_eq!(changed_bytes(Nir(0x1234), Nir(0x1234)), 0);
        assert_eq!(changed_bytes(Nir(0x1235), Nir(0x1234)), 0b01);
        assert_eq!(changed_bytes(Nir(0x1334), Nir(0x1234)), 0b10);
        assert_eq!(changed_bytes(Nir(0x0000), Nir(0xFFFF)), 0b11);
    }

    #[test]
    fn pack_is_little_endian() {
        let mut out = [0u8; 2];
        Nir(0xABCD).pack_into(&mut out);
        assert_eq!(out, [0xCD, 0xAB]);
        assert_eq!(Nir::unpack_from(&out), Nir(0xABCD));
    }
}
