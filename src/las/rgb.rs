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

//! Module with the definition of a RGB struct and the layered
//! Compressor and Decompressor of the RGB14 item.

use std::io::{Read, Seek, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::las::selective::DecompressionSelection;
use crate::las::utils::{
    context_of_last_item, copy_bytes_into_decoder, copy_encoder_content_to, lower_byte,
    new_layer_decoder, new_layer_encoder, read_layer_size, reset_layer_encoder, u8_clamp, u8_fold,
    upper_byte, write_layer_size, LayerDecoder, LayerEncoder,
};
use crate::models::ArithmeticModel;
use crate::packers::Packable;
use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

/// Struct representing a RGB component of a point, in compliance with
/// the LAS format
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RGB {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl RGB {
    pub const SIZE: usize = 6;
}

impl Packable for RGB {
    fn unpack_from(input: &[u8]) -> Self {
        Self {
            red: u16::unpack_from(&input[0..2]),
            green: u16::unpack_from(&input[2..4]),
            blue: u16::unpack_from(&input[4..6]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.red.pack_into(&mut output[0..2]);
        self.green.pack_into(&mut output[2..4]);
        self.blue.pack_into(&mut output[4..6]);
    }
}

/// Bits 0 to 5 tell which byte (lower, upper) of red, green and blue
/// changed, bit 6 is set when green or blue differs from red.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct ColorDiff(u8);

impl ColorDiff {
    fn from_points(current: &RGB, last: &RGB) -> Self {
        let v = (lower_byte(last.red) != lower_byte(current.red)) as u8
            | ((upper_byte(last.red) != upper_byte(current.red)) as u8) << 1
            | ((lower_byte(last.green) != lower_byte(current.green)) as u8) << 2
            | ((upper_byte(last.green) != upper_byte(current.green)) as u8) << 3
            | ((lower_byte(last.blue) != lower_byte(current.blue)) as u8) << 4
            | ((upper_byte(last.blue) != upper_byte(current.blue)) as u8) << 5
            | ((lower_byte(current.red) != lower_byte(current.green)
                || lower_byte(current.red) != lower_byte(current.blue)
                || upper_byte(current.red) != upper_byte(current.green)
                || upper_byte(current.red) != upper_byte(current.blue)) as u8)
                << 6;
        Self(v)
    }

    fn lower_red_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 0)
    }

    fn upper_red_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 1)
    }

    fn lower_green_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 2)
    }

    fn upper_green_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 3)
    }

    fn lower_blue_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 4)
    }

    fn upper_blue_byte_changed(self) -> bool {
        is_nth_bit_set!(self.0, 5)
    }

    fn is_colored(self) -> bool {
        is_nth_bit_set!(self.0, 6)
    }
}

pub(crate) struct RGBModels {
    byte_used: ArithmeticModel,
    lower_red_byte: ArithmeticModel,
    upper_red_byte: ArithmeticModel,
    lower_green_byte: ArithmeticModel,
    upper_green_byte: ArithmeticModel,
    lower_blue_byte: ArithmeticModel,
    upper_blue_byte: ArithmeticModel,
}

impl RGBModels {
    pub(crate) fn new(compress: bool) -> Self {
        Self {
            byte_used: ArithmeticModel::new(128, compress),
            lower_red_byte: ArithmeticModel::new(256, compress),
            upper_red_byte: ArithmeticModel::new(256, compress),
            lower_green_byte: ArithmeticModel::new(256, compress),
            upper_green_byte: ArithmeticModel::new(256, compress),
            lower_blue_byte: ArithmeticModel::new(256, compress),
            upper_blue_byte: ArithmeticModel::new(256, compress),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.byte_used.reset();
        self.lower_red_byte.reset();
        self.upper_red_byte.reset();
        self.lower_green_byte.reset();
        self.upper_green_byte.reset();
        self.lower_blue_byte.reset();
        self.upper_blue_byte.reset();
    }
}

/// Compresses `current` and returns the symbol of changed bytes,
/// which is 0 when nothing changed.
pub(crate) fn compress_rgb_using<W: Write>(
    encoder: &mut ArithmeticEncoder<W>,
    models: &mut RGBModels,
    current: &RGB,
    last: &RGB,
) -> std::io::Result<u8> {
    let mut diff_l = 0i32;
    let mut diff_h = 0i32;
    let mut corr;

    let color_diff = ColorDiff::from_points(current, last);
    encoder.encode_symbol(&mut models.byte_used, u32::from(color_diff.0))?;

    if color_diff.lower_red_byte_changed() {
        diff_l = i32::from(lower_byte(current.red)) - i32::from(lower_byte(last.red));
        encoder.encode_symbol(&mut models.lower_red_byte, u32::from(u8_fold(diff_l)))?;
    }
    if color_diff.upper_red_byte_changed() {
        diff_h = i32::from(upper_byte(current.red)) - i32::from(upper_byte(last.red));
        encoder.encode_symbol(&mut models.upper_red_byte, u32::from(u8_fold(diff_h)))?;
    }

    if color_diff.is_colored() {
        if color_diff.lower_green_byte_changed() {
            corr = i32::from(lower_byte(current.green))
                - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.green))));
            encoder.encode_symbol(&mut models.lower_green_byte, u32::from(u8_fold(corr)))?;
        }
        if color_diff.lower_blue_byte_changed() {
            diff_l = (diff_l + i32::from(lower_byte(current.green))
                - i32::from(lower_byte(last.green)))
                / 2;
            corr = i32::from(lower_byte(current.blue))
                - i32::from(u8_clamp(diff_l + i32::from(lower_byte(last.blue))));
            encoder.encode_symbol(&mut models.lower_blue_byte, u32::from(u8_fold(corr)))?;
        }
        if color_diff.upper_green_byte_changed() {
            corr = i32::from(upper_byte(current.green))
                - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.green))));
            encoder.encode_symbol(&mut models.upper_green_byte, u32::from(u8_fold(corr)))?;
        }
        if color_diff.upper_blue_byte_changed() {
            diff_h = (diff_h + i32::from(upper_byte(current.green))
                - i32::from(upper_byte(last.green)))
                / 2;
            corr = i32::from(upper_byte(current.blue))
                - i32::from(u8_clamp(diff_h + i32::from(upper_byte(last.blue))));
            encoder.encode_symbol(&mut models.upper_blue_byte, u32::from(u8_fold(corr)))?;
        }
    }
    Ok(color_diff.0)
}

pub(crate) fn decompress_rgb_using<R: Read>(
    decoder: &mut ArithmeticDecoder<R>,
    models: &mut RGBModels,
    last: &RGB,
) -> std::io::Result<RGB> {
    let color_diff = ColorDiff(decoder.decode_symbol(&mut models.byte_used)? as u8);
    let mut this_val = RGB::default();
    let mut corr;

    if color_diff.lower_red_byte_changed() {
        corr = decoder.decode_symbol(&mut models.lower_red_byte)? as i32;
        this_val.red = u16::from(u8_fold(corr + i32::from(lower_byte(last.red))));
    } else {
        this_val.red = last.red & 0x00FF;
    }
    if color_diff.upper_red_byte_changed() {
        corr = decoder.decode_symbol(&mut models.upper_red_byte)? as i32;
        this_val.red |= u16::from(u8_fold(corr + i32::from(upper_byte(last.red)))) << 8;
    } else {
        this_val.red |= last.red & 0xFF00;
    }

    if color_diff.is_colored() {
        let mut diff = i32::from(lower_byte(this_val.red)) - i32::from(lower_byte(last.red));
        if color_diff.lower_green_byte_changed() {
            corr = decoder.decode_symbol(&mut models.lower_green_byte)? as i32;
            this_val.green = u16::from(u8_fold(
                corr + i32::from(u8_clamp(diff + i32::from(lower_byte(last.green)))),
            ));
        } else {
            this_val.green = last.green & 0x00FF;
        }
        if color_diff.lower_blue_byte_changed() {
            corr = decoder.decode_symbol(&mut models.lower_blue_byte)? as i32;
            diff = (diff + i32::from(lower_byte(this_val.green))
                - i32::from(lower_byte(last.green)))
                / 2;
            this_val.blue = u16::from(u8_fold(
                corr + i32::from(u8_clamp(diff + i32::from(lower_byte(last.blue)))),
            ));
        } else {
            this_val.blue = last.blue & 0x00FF;
        }

        diff = i32::from(upper_byte(this_val.red)) - i32::from(upper_byte(last.red));
        if color_diff.upper_green_byte_changed() {
            corr = decoder.decode_symbol(&mut models.upper_green_byte)? as i32;
            this_val.green |= u16::from(u8_fold(
                corr + i32::from(u8_clamp(diff + i32::from(upper_byte(last.green)))),
            )) << 8;
        } else {
            this_val.green |= last.green & 0xFF00;
        }
        if color_diff.upper_blue_byte_changed() {
            corr = decoder.decode_symbol(&mut models.upper_blue_byte)? as i32;
            diff = (diff + i32::from(upper_byte(this_val.green))
                - i32::from(upper_byte(last.green)))
                / 2;
            this_val.blue |= u16::from(u8_fold(
                corr + i32::from(u8_clamp(diff + i32::from(upper_byte(last.blue)))),
            )) << 8;
        } else {
            this_val.blue |= last.blue & 0xFF00;
        }
    } else {
        this_val.green = this_val.red;
        this_val.blue = this_val.red;
    }
    Ok(this_val)
}

struct RGBContext {
    unused: bool,
    models: RGBModels,
    last: RGB,
}

impl RGBContext {
    fn new(compress: bool) -> Self {
        Self {
            unused: true,
            models: RGBModels::new(compress),
            last: RGB::default(),
        }
    }

    fn create_and_init(&mut self, seed: RGB) {
        self.models.reset();
        self.last = seed;
        self.unused = false;
    }
}

fn rgb_contexts(compress: bool) -> [RGBContext; 4] {
    [
        RGBContext::new(compress),
        RGBContext::new(compress),
        RGBContext::new(compress),
        RGBContext::new(compress),
    ]
}

/// Follows the context set by the point codec, returns the index
/// of the context whose last color predicts the current one.
fn switch_context(
    contexts: &mut [RGBContext; 4],
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

pub struct LasRGBCompressor {
    encoder: LayerEncoder,
    changed_rgb: bool,
    version: u16,
    current_context: usize,
    contexts: [RGBContext; 4],
}

impl LasRGBCompressor {
    pub fn new() -> Self {
        Self::with_version(4)
    }

    pub fn with_version(version: u16) -> Self {
        Self {
            encoder: new_layer_encoder(),
            changed_rgb: false,
            version,
            current_context: 0,
            contexts: rgb_contexts(true),
        }
    }
}

impl Default for LasRGBCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LasRGBCompressor {
    fn size_of_field(&self) -> usize {
        RGB::SIZE
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        dst.write_all(&first_point[..RGB::SIZE])?;
        reset_layer_encoder(&mut self.encoder);
        self.changed_rgb = false;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(RGB::unpack_from(first_point));
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
        let current = RGB::unpack_from(current_point);
        let last = self.contexts[last_context].last;
        let sym = compress_rgb_using(
            &mut self.encoder,
            &mut self.contexts[self.current_context].models,
            &current,
            &last,
        )?;
        if sym != 0 {
            self.changed_rgb = true;
        }
        self.contexts[last_context].last = current;
        Ok(())
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        write_layer_size(&mut self.encoder, self.changed_rgb, dst)?;
        Ok(())
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        copy_encoder_content_to(&self.encoder, self.changed_rgb, dst)
    }
}

pub struct LasRGBDecompressor {
    decoder: LayerDecoder,
    is_requested: bool,
    should_decompress: bool,
    layer_size: usize,
    version: u16,
    current_context: usize,
    contexts: [RGBContext; 4],
}

impl LasRGBDecompressor {
    pub fn new() -> Self {
        Self::selective(DecompressionSelection::all())
    }

    pub fn selective(selection: DecompressionSelection) -> Self {
        Self {
            decoder: new_layer_decoder(),
            is_requested: selection.should_decompress_rgb(),
            should_decompress: false,
            layer_size: 0,
            version: 4,
            current_context: 0,
            contexts: rgb_contexts(false),
        }
    }

    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }
}

impl Default for LasRGBDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> LayeredFieldDecompressor<R> for LasRGBDecompressor {
    fn size_of_field(&self) -> usize {
        RGB::SIZE
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..RGB::SIZE])?;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(RGB::unpack_from(first_point));
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
        if self.should_decompress {
            let current = decompress_rgb_using(
                &mut self.decoder,
                &mut self.contexts[self.current_context].models,
                &last,
            )?;
            self.contexts[last_context].last = current;
            current.pack_into(current_point);
        } else {
            last.pack_into(current_point);
        }
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

    fn rgb(red: u16, green: u16, blue: u16) -> RGB {
        RGB { red, green, blue }
    }

    #[test]
    fn lower_red_changed() {
        let diff = ColorDiff::from_points(&rgb(0x0011, 0, 0), &rgb(0, 0, 0));
        assert!(diff.lower_red_byte_changed());
        assert!(!diff.upper_red_byte_changed());
        assert!(diff.is_colored());
    }

    #[test]
    fn upper_green_and_blue_changed() {
        let diff = ColorDiff::from_points(&rgb(0, 0x1100, 0x2200), &rgb(0, 0, 0));
        assert_eq!(diff.0, 0b110_1000);
        assert!(diff.upper_green_byte_changed());
        assert!(diff.upper_blue_byte_changed());
        assert!(!diff.lower_green_byte_changed());
        assert!(!diff.lower_blue_byte_changed());
    }

    #[test]
    fn gray_colors_are_not_colored() {
        let diff = ColorDiff::from_points(&rgb(0x1234, 0x1234, 0x1234), &rgb(1, 2, 3));
        assert!(!diff.is_colored());
        assert_eq!(diff.0 & 0b11_1111, 0b11_1111);
    }

    #[test]
    fn test_nothing_changes() {
        let color = rgb(300, 300, 300);
        assert_eq!(ColorDiff::from_points(&color, &color).0, 0);
        let color = rgb(300, 20, 300);
        assert_eq!(ColorDiff::from_points(&color, &color).0, 1 << 6);
    }

    #[test]
    fn colors_round_trip() {
        let colors = [
            rgb(0, 0, 0),
            rgb(255, 255, 255),
            rgb(256, 300, 65535),
            rgb(65535, 0, 12),
            rgb(4000, 4000, 4000),
            rgb(4001, 3990, 4100),
            rgb(4001, 3990, 4100),
        ];
        let mut models = RGBModels::new(true);
        let mut encoder = ArithmeticEncoder::new(std::io::Cursor::new(Vec::<u8>::new()));
        for pair in colors.windows(2) {
            compress_rgb_using(&mut encoder, &mut models, &pair[1], &pair[0]).unwrap();
        }
        encoder.done().unwrap();

        let data = encoder.into_inner().into_inner();
        let mut models = RGBModels::new(false);
        let mut decoder = ArithmeticDecoder::new(std::io::Cursor::new(data));
        decoder.read_init_bytes().unwrap();
        let mut last = colors[0];
        for expected in &colors[1..] {
            last = decompress_rgb_using(&mut decoder, &mut models, &last).unwrap();
            assert_eq!(&last, expected);
        }
    }
}
