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

//! Wave packet descriptors and their layered Compressor and Decompressor.

use std::io::{Read, Seek, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::las::selective::DecompressionSelection;
use crate::las::utils::{
    context_of_last_item, copy_bytes_into_decoder, copy_encoder_content_to, new_layer_decoder,
    new_layer_encoder, read_layer_size, reset_layer_encoder, write_layer_size, LayerDecoder,
    LayerEncoder,
};
use crate::models::ArithmeticModel;
use crate::packers::Packable;
use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

const DX_CONTEXT: u32 = 0;
const DY_CONTEXT: u32 = 1;
const DZ_CONTEXT: u32 = 2;

/// ASPRS definition of wavepacket data.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct LasWavepacket {
    pub descriptor_index: u8,
    /// offset in bytes to waveform data
    pub offset: u64,
    /// in bytes
    pub size: u32,
    pub return_point: f32,
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

impl LasWavepacket {
    pub const SIZE: usize = 29;

    /// Compares the raw bytes, so that two NaN with the same
    /// payload are equal.
    fn is_same_as(&self, other: &Self) -> bool {
        self.descriptor_index == other.descriptor_index
            && self.offset == other.offset
            && self.size == other.size
            && self.return_point.to_bits() == other.return_point.to_bits()
            && self.dx.to_bits() == other.dx.to_bits()
            && self.dy.to_bits() == other.dy.to_bits()
            && self.dz.to_bits() == other.dz.to_bits()
    }
}

impl Packable for LasWavepacket {
    fn unpack_from(input: &[u8]) -> Self {
        Self {
            descriptor_index: u8::unpack_from(&input[0..1]),
            offset: u64::unpack_from(&input[1..9]),
            size: u32::unpack_from(&input[9..13]),
            return_point: f32::unpack_from(&input[13..17]),
            dx: f32::unpack_from(&input[17..21]),
            dy: f32::unpack_from(&input[21..25]),
            dz: f32::unpack_from(&input[25..29]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.descriptor_index.pack_into(&mut output[0..1]);
        self.offset.pack_into(&mut output[1..9]);
        self.size.pack_into(&mut output[9..13]);
        self.return_point.pack_into(&mut output[13..17]);
        self.dx.pack_into(&mut output[17..21]);
        self.dy.pack_into(&mut output[21..25]);
        self.dz.pack_into(&mut output[25..29]);
    }
}

/// How the offset of a wave packet is coded relative to the last one.
fn offset_diff_symbol(current: &LasWavepacket, last: &LasWavepacket) -> (u32, i32) {
    let diff_64 = current.offset.wrapping_sub(last.offset) as i64;
    let diff_32 = diff_64 as i32;
    if diff_64 != i64::from(diff_32) {
        (3, 0)
    } else if diff_32 == 0 {
        (0, 0)
    } else if diff_32 == last.size as i32 {
        (1, diff_32)
    } else {
        (2, diff_32)
    }
}

fn offset_diff_models(compress: bool) -> [ArithmeticModel; 4] {
    [
        ArithmeticModel::new(4, compress),
        ArithmeticModel::new(4, compress),
        ArithmeticModel::new(4, compress),
        ArithmeticModel::new(4, compress),
    ]
}

struct WavepacketCompressionContext {
    unused: bool,
    last_diff_32: i32,
    sym_last_offset_diff: u32,
    packet_index: ArithmeticModel,
    offset_diff: [ArithmeticModel; 4],
    ic_offset_diff: IntegerCompressor,
    ic_packet_size: IntegerCompressor,
    ic_return_point: IntegerCompressor,
    // dx, dy and dz each have their context
    ic_xyz: IntegerCompressor,
    last: LasWavepacket,
}

impl WavepacketCompressionContext {
    fn new() -> Self {
        Self {
            unused: true,
            last_diff_32: 0,
            sym_last_offset_diff: 0,
            packet_index: ArithmeticModel::new(256, true),
            offset_diff: offset_diff_models(true),
            ic_offset_diff: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_packet_size: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_return_point: IntegerCompressorBuilder::new().bits(32).build_initialized(),
            ic_xyz: IntegerCompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
            last: LasWavepacket::default(),
        }
    }

    fn create_and_init(&mut self, seed: LasWavepacket) {
        self.packet_index.reset();
        self.offset_diff.iter_mut().for_each(ArithmeticModel::reset);
        self.ic_offset_diff.init();
        self.ic_packet_size.init();
        self.ic_return_point.init();
        self.ic_xyz.init();
        self.last_diff_32 = 0;
        self.sym_last_offset_diff = 0;
        self.last = seed;
        self.unused = false;
    }
}

pub struct LasWavepacketCompressor {
    encoder: LayerEncoder,
    changed_wavepacket: bool,
    version: u16,
    current_context: usize,
    contexts: [WavepacketCompressionContext; 4],
}

impl LasWavepacketCompressor {
    pub fn new() -> Self {
        Self::with_version(4)
    }

    pub fn with_version(version: u16) -> Self {
        Self {
            encoder: new_layer_encoder(),
            changed_wavepacket: false,
            version,
            current_context: 0,
            contexts: [
                WavepacketCompressionContext::new(),
                WavepacketCompressionContext::new(),
                WavepacketCompressionContext::new(),
                WavepacketCompressionContext::new(),
            ],
        }
    }
}

impl Default for LasWavepacketCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LasWavepacketCompressor {
    fn size_of_field(&self) -> usize {
        LasWavepacket::SIZE
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        dst.write_all(&first_point[..LasWavepacket::SIZE])?;
        reset_layer_encoder(&mut self.encoder);
        self.changed_wavepacket = false;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(LasWavepacket::unpack_from(first_point));
        Ok(())
    }

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let mut last_context = self.current_context;
        if self.current_context != *context {
            self.current_context = *context;
            let created = self.contexts[*context].unused;
            if created {
                let seed = self.contexts[last_context].last;
                self.contexts[*context].create_and_init(seed);
            }
            last_context = context_of_last_item(self.version, last_context, *context, created);
        }

        let current = LasWavepacket::unpack_from(current_point);
        let last = self.contexts[last_context].last;
        if !current.is_same_as(&last) {
            self.changed_wavepacket = true;
        }

        let encoder = &mut self.encoder;
        let the_context = &mut self.contexts[self.current_context];
        encoder.encode_symbol(
            &mut the_context.packet_index,
            u32::from(current.descriptor_index),
        )?;

        let (sym, diff_32) = offset_diff_symbol(&current, &last);
        encoder.encode_symbol(
            &mut the_context.offset_diff[the_context.sym_last_offset_diff as usize],
            sym,
        )?;
        the_context.sym_last_offset_diff = sym;
        match sym {
            2 => {
                the_context
                    .ic_offset_diff
                    .compress(encoder, the_context.last_diff_32, diff_32, 0)?;
                the_context.last_diff_32 = diff_32;
            }
            3 => encoder.write_int64(current.offset)?,
            _ => {}
        }

        the_context
            .ic_packet_size
            .compress(encoder, last.size as i32, current.size as i32, 0)?;
        the_context.ic_return_point.compress(
            encoder,
            last.return_point.to_bits() as i32,
            current.return_point.to_bits() as i32,
            0,
        )?;
        the_context.ic_xyz.compress(
            encoder,
            last.dx.to_bits() as i32,
            current.dx.to_bits() as i32,
            DX_CONTEXT,
        )?;
        the_context.ic_xyz.compress(
            encoder,
            last.dy.to_bits() as i32,
            current.dy.to_bits() as i32,
            DY_CONTEXT,
        )?;
        the_context.ic_xyz.compress(
            encoder,
            last.dz.to_bits() as i32,
            current.dz.to_bits() as i32,
            DZ_CONTEXT,
        )?;

        self.contexts[last_context].last = current;
        Ok(())
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        write_layer_size(&mut self.encoder, self.changed_wavepacket, dst)?;
        Ok(())
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        copy_encoder_content_to(&self.encoder, self.changed_wavepacket, dst)
    }
}

struct WavepacketDecompressionContext {
    unused: bool,
    last_diff_32: i32,
    sym_last_offset_diff: u32,
    packet_index: ArithmeticModel,
    offset_diff: [ArithmeticModel; 4],
    idc_offset_diff: IntegerDecompressor,
    idc_packet_size: IntegerDecompressor,
    idc_return_point: IntegerDecompressor,
    idc_xyz: IntegerDecompressor,
    last: LasWavepacket,
}

impl WavepacketDecompressionContext {
    fn new() -> Self {
        Self {
            unused: true,
            last_diff_32: 0,
            sym_last_offset_diff: 0,
            packet_index: ArithmeticModel::new(256, false),
            offset_diff: offset_diff_models(false),
            idc_offset_diff: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            idc_packet_size: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            idc_return_point: IntegerDecompressorBuilder::new().bits(32).build_initialized(),
            idc_xyz: IntegerDecompressorBuilder::new()
                .bits(32)
                .contexts(3)
                .build_initialized(),
            last: LasWavepacket::default(),
        }
    }

    fn create_and_init(&mut self, seed: LasWavepacket) {
        self.packet_index.reset();
        self.offset_diff.iter_mut().for_each(ArithmeticModel::reset);
        self.idc_offset_diff.init();
        self.idc_packet_size.init();
        self.idc_return_point.init();
        self.idc_xyz.init();
        self.last_diff_32 = 0;
        self.sym_last_offset_diff = 0;
        self.last = seed;
        self.unused = false;
    }
}

pub struct LasWavepacketDecompressor {
    decoder: LayerDecoder,
    is_requested: bool,
    should_decompress: bool,
    layer_size: usize,
    version: u16,
    current_context: usize,
    contexts: [WavepacketDecompressionContext; 4],
}

impl LasWavepacketDecompressor {
    pub fn new() -> Self {
        Self::selective(DecompressionSelection::all())
    }

    pub fn selective(selection: DecompressionSelection) -> Self {
        Self {
            decoder: new_layer_decoder(),
            is_requested: selection.should_decompress_wavepacket(),
            should_decompress: false,
            layer_size: 0,
            version: 4,
            current_context: 0,
            contexts: [
                WavepacketDecompressionContext::new(),
                WavepacketDecompressionContext::new(),
                WavepacketDecompressionContext::new(),
                WavepacketDecompressionContext::new(),
            ],
        }
    }

    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }
}

impl Default for LasWavepacketDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> LayeredFieldDecompressor<R> for LasWavepacketDecompressor {
    fn size_of_field(&self) -> usize {
        LasWavepacket::SIZE
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..LasWavepacket::SIZE])?;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(LasWavepacket::unpack_from(first_point));
        Ok(())
    }

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let mut last_context = self.current_context;
        if self.current_context != *context {
            self.current_context = *context;
            let created = self.contexts[*context].unused;
            if created {
                let seed = self.contexts[last_context].last;
                self.contexts[*context].create_and_init(seed);
            }
            last_context = context_of_last_item(self.version, last_context, *context, created);
        }

        let last = self.contexts[last_context].last;
        if !self.should_decompress {
            last.pack_into(current_point);
            return Ok(());
        }

        let decoder = &mut self.decoder;
        let the_context = &mut self.contexts[self.current_context];
        let mut current = LasWavepacket::default();
        current.descriptor_index = decoder.decode_symbol(&mut the_context.packet_index)? as u8;

        let sym = decoder.decode_symbol(
            &mut the_context.offset_diff[the_context.sym_last_offset_diff as usize],
        )?;
        the_context.sym_last_offset_diff = sym;
        current.offset = match sym {
            0 => last.offset,
            1 => last.offset.wrapping_add(u64::from(last.size)),
            2 => {
                the_context.last_diff_32 =
                    the_context
                        .idc_offset_diff
                        .decompress(decoder, the_context.last_diff_32, 0)?;
                last.offset
                    .wrapping_add(i64::from(the_context.last_diff_32) as u64)
            }
            _ => decoder.read_int_64()?,
        };

        current.size = the_context
            .idc_packet_size
            .decompress(decoder, last.size as i32, 0)? as u32;
        current.return_point = f32::from_bits(the_context.idc_return_point.decompress(
            decoder,
            last.return_point.to_bits() as i32,
            0,
        )? as u32);
        current.dx = f32::from_bits(the_context.idc_xyz.decompress(
            decoder,
            last.dx.to_bits() as i32,
            DX_CONTEXT,
        )? as u32);
        current.dy = f32::from_bits(the_context.idc_xyz.decompress(
            decoder,
            last.dy.to_bits() as i32,
            DY_CONTEXT,
        )? as u32);
        current.dz = f32::from_bits(the_context.idc_xyz.decompress(
            decoder,
            last.dz.to_bits() as i32,
            DZ_CONTEXT,
        )? as u32);

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

    fn packet(offset: u64, size: u32) -> LasWavepacket {
        LasWavepacket {
            offset,
            size,
            ..Default::default()
        }
    }

    #[test]
    fn offset_symbols() {
        let last = packet(1000, 256);
        assert_eq!(offset_diff_symbol(&packet(1000, 256), &last), (0, 0));
        assert_eq!(offset_diff_symbol(&packet(1256, 256), &last), (1, 256));
        assert_eq!(offset_diff_symbol(&packet(900, 256), &last), (2, -100));
        assert_eq!(offset_diff_symbol(&packet(1 << 40, 256), &last).0, 3);
    }

    #[test]
    fn pack_layout() {
        let wp = LasWavepacket {
            descriptor_index: 7,
            offset: 0x0102_0304_0506_0708,
            size: 0xAABB_CCDD,
            return_point: 1.5,
            dx: -0.25,
            dy: 0.0,
            dz: 3.0,
        };
        let mut buf = [0u8; LasWavepacket::SIZE];
        wp.pack_into(&mut buf);
        assert_eq!(buf[0], 7);
        assert_eq!(&buf[1..9], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&buf[9..13], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(LasWavepacket::unpack_from(&buf), wp);
    }
}
