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

//! Layered compression of the LAS 1.4 point record (point formats 6 to 10).
//!
//! Each attribute group is coded into its own layer. The scanner channel
//! of a point selects one of 4 contexts, each one holding its own models
//! and predictors, so that interleaved channels do not pollute each other.

use std::io::{Read, Seek, Write};

use crate::compressors::{IntegerCompressor, IntegerCompressorBuilder};
use crate::decompressors::{IntegerDecompressor, IntegerDecompressorBuilder};
use crate::las::gps::{GpsTime, GpsTimeCompressionContext, GpsTimeDecompressionContext};
use crate::las::selective::DecompressionSelection;
use crate::las::utils::{
    copy_bytes_into_decoder, copy_encoder_content_to, new_layer_decoder, new_layer_encoder,
    read_layer_size, reset_layer_encoder, u32_zero_bit, write_layer_size, LayerDecoder,
    LayerEncoder, StreamingMedian, NUMBER_RETURN_LEVEL_8CT, NUMBER_RETURN_MAP_6CTX,
};
use crate::models::ArithmeticModel;
use crate::packers::Packable;
use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

const NUM_CONTEXTS: usize = 4;

/// A point record of the point formats 6 and above.
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct Point6 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub intensity: u16,
    /// return number (bits 0 - 3) and number of returns (bits 4 - 7)
    pub bit_fields: u8,
    /// classification flags (bits 0 - 3), scanner channel (bits 4 - 5),
    /// scan direction flag (bit 6) and edge of flight line (bit 7)
    pub flags: u8,
    pub classification: u8,
    pub user_data: u8,
    pub scan_angle: i16,
    pub point_source_id: u16,
    pub gps_time: f64,

    /// Whether the gps time differs from the one of the previous point
    /// of the same scanner channel. Only used as a context, never stored.
    pub gps_time_change: bool,
}

impl Point6 {
    pub const SIZE: usize = 30;

    pub fn return_number(&self) -> u8 {
        self.bit_fields & 0b0000_1111
    }

    pub fn set_return_number(&mut self, value: u8) {
        self.bit_fields = (self.bit_fields & 0b1111_0000) | (value & 0b0000_1111);
    }

    pub fn number_of_returns(&self) -> u8 {
        (self.bit_fields >> 4) & 0b0000_1111
    }

    pub fn set_number_of_returns(&mut self, value: u8) {
        self.bit_fields = (self.bit_fields & 0b0000_1111) | ((value & 0b0000_1111) << 4);
    }

    pub fn classification_flags(&self) -> u8 {
        self.flags & 0b0000_1111
    }

    pub fn set_classification_flags(&mut self, value: u8) {
        self.flags = (self.flags & 0b1111_0000) | (value & 0b0000_1111);
    }

    pub fn scanner_channel(&self) -> u8 {
        (self.flags >> 4) & 0b0000_0011
    }

    pub fn set_scanner_channel(&mut self, value: u8) {
        self.flags = (self.flags & 0b1100_1111) | ((value & 0b0000_0011) << 4);
    }

    pub fn scan_direction_flag(&self) -> bool {
        is_nth_bit_set!(self.flags, 6)
    }

    pub fn set_scan_direction_flag(&mut self, value: bool) {
        self.flags = (self.flags & 0b1011_1111) | ((value as u8) << 6);
    }

    pub fn edge_of_flight_line(&self) -> bool {
        is_nth_bit_set!(self.flags, 7)
    }

    pub fn set_edge_of_flight_line(&mut self, value: bool) {
        self.flags = (self.flags & 0b0111_1111) | ((value as u8) << 7);
    }

    /// The flags without the scanner channel, packed in 6 bits:
    /// edge of flight line, scan direction then the classification flags.
    fn flags_symbol(&self) -> u32 {
        (u32::from(self.edge_of_flight_line()) << 5)
            | (u32::from(self.scan_direction_flag()) << 4)
            | u32::from(self.classification_flags())
    }

    fn set_flags_symbol(&mut self, symbol: u32) {
        self.set_edge_of_flight_line(is_nth_bit_set!(symbol, 5));
        self.set_scan_direction_flag(is_nth_bit_set!(symbol, 4));
        self.set_classification_flags((symbol & 0b1111) as u8);
    }

    /// Single (3) / first (1) / last (2) / intermediate (0) return,
    /// plus 4 when the gps time changed.
    fn return_context(&self) -> usize {
        let mut lpr = (self.return_number() == 1) as usize;
        lpr += ((self.return_number() >= self.number_of_returns()) as usize) << 1;
        lpr + ((self.gps_time_change as usize) << 2)
    }
}

impl Packable for Point6 {
    fn unpack_from(input: &[u8]) -> Self {
        Self {
            x: i32::unpack_from(&input[0..4]),
            y: i32::unpack_from(&input[4..8]),
            z: i32::unpack_from(&input[8..12]),
            intensity: u16::unpack_from(&input[12..14]),
            bit_fields: input[14],
            flags: input[15],
            classification: input[16],
            user_data: input[17],
            scan_angle: i16::unpack_from(&input[18..20]),
            point_source_id: u16::unpack_from(&input[20..22]),
            gps_time: f64::unpack_from(&input[22..30]),
            gps_time_change: false,
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.x.pack_into(&mut output[0..4]);
        self.y.pack_into(&mut output[4..8]);
        self.z.pack_into(&mut output[8..12]);
        self.intensity.pack_into(&mut output[12..14]);
        output[14] = self.bit_fields;
        output[15] = self.flags;
        output[16] = self.classification;
        output[17] = self.user_data;
        self.scan_angle.pack_into(&mut output[18..20]);
        self.point_source_id.pack_into(&mut output[20..22]);
        self.gps_time.pack_into(&mut output[22..30]);
    }
}

/// How the return number changed: same (0), plus one (1),
/// minus one (2) or anything else (3), modulo 16.
fn return_number_change(last_r: u8, r: u8) -> u32 {
    if r == last_r {
        0
    } else if r == (last_r + 1) % 16 {
        1
    } else if r == (last_r + 15) % 16 {
        2
    } else {
        3
    }
}

/// The 7 bit mask that starts the coding of every point.
fn changed_values(
    last: &Point6,
    point: &Point6,
    current_context: usize,
    gps_time_change: bool,
) -> u32 {
    ((point.scanner_channel() as usize != current_context) as u32) << 6
        | ((point.point_source_id != last.point_source_id) as u32) << 5
        | (gps_time_change as u32) << 4
        | ((point.scan_angle != last.scan_angle) as u32) << 3
        | ((point.number_of_returns() != last.number_of_returns()) as u32) << 2
        | return_number_change(last.return_number(), point.return_number())
}

/// Single (3) / first (2) / last (1) / intermediate (0) return.
#[inline]
fn return_position(n: u8, r: u8) -> u32 {
    (if r == 1 { 2 } else { 0 }) + (if r >= n { 1 } else { 0 })
}

#[inline]
fn lazy_model(slot: &mut Option<ArithmeticModel>, symbols: u32, compress: bool) -> &mut ArithmeticModel {
    slot.get_or_insert_with(|| ArithmeticModel::new(symbols, compress))
}

fn lazy_models(count: usize) -> Vec<Option<ArithmeticModel>> {
    (0..count).map(|_| None).collect()
}

/// Symbol models of one context, the sparse ones are only
/// created when first needed and are kept for the following chunks.
struct Point6Models {
    compress: bool,
    changed_values: Vec<ArithmeticModel>,
    scanner_channel: ArithmeticModel,
    number_of_returns: Vec<Option<ArithmeticModel>>,
    return_number: Vec<Option<ArithmeticModel>>,
    return_number_gps_same: ArithmeticModel,
    classification: Vec<Option<ArithmeticModel>>,
    flags: Vec<Option<ArithmeticModel>>,
    user_data: Vec<Option<ArithmeticModel>>,
}

impl Point6Models {
    fn new(compress: bool) -> Self {
        Self {
            compress,
            changed_values: (0..8).map(|_| ArithmeticModel::new(128, compress)).collect(),
            scanner_channel: ArithmeticModel::new(3, compress),
            number_of_returns: lazy_models(16),
            return_number: lazy_models(16),
            return_number_gps_same: ArithmeticModel::new(13, compress),
            classification: lazy_models(64),
            flags: lazy_models(64),
            user_data: lazy_models(64),
        }
    }

    fn reset(&mut self) {
        self.changed_values.iter_mut().for_each(ArithmeticModel::reset);
        self.scanner_channel.reset();
        self.return_number_gps_same.reset();
        for model in self
            .number_of_returns
            .iter_mut()
            .chain(self.return_number.iter_mut())
            .chain(self.classification.iter_mut())
            .chain(self.flags.iter_mut())
            .chain(self.user_data.iter_mut())
            .flatten()
        {
            model.reset();
        }
    }
}

/// Last values of one context used to predict the next point.
#[derive(Clone)]
struct Point6Predictors {
    point: Point6,
    intensities: [u16; 8],
    z: [i32; 8],
    x_diff_median5: [StreamingMedian<i32>; 12],
    y_diff_median5: [StreamingMedian<i32>; 12],
}

impl Point6Predictors {
    fn new(seed: &Point6) -> Self {
        let mut point = *seed;
        point.gps_time_change = false;
        Self {
            point,
            intensities: [seed.intensity; 8],
            z: [seed.z; 8],
            x_diff_median5: [StreamingMedian::new(); 12],
            y_diff_median5: [StreamingMedian::new(); 12],
        }
    }
}

impl Default for Point6Predictors {
    fn default() -> Self {
        Self::new(&Point6::default())
    }
}

fn y_context(n: u8, k_bits: u32) -> u32 {
    (n == 1) as u32 + if k_bits < 20 { u32_zero_bit(k_bits) } else { 20 }
}

fn z_context(n: u8, k_bits: u32) -> u32 {
    (n == 1) as u32 + if k_bits < 18 { u32_zero_bit(k_bits) } else { 18 }
}

/// Layers that carry information in the current chunk.
#[derive(Copy, Clone, Default, Debug)]
struct ChangedLayers {
    z: bool,
    classification: bool,
    flags: bool,
    intensity: bool,
    scan_angle: bool,
    user_data: bool,
    point_source: bool,
    gps_time: bool,
}

/// Size in bytes of each layer of a chunk, in the order they are written.
#[derive(Copy, Clone, Default, Debug)]
struct LayerSizes {
    channel_returns_xy: usize,
    z: usize,
    classification: usize,
    flags: usize,
    intensity: usize,
    scan_angle: usize,
    user_data: usize,
    point_source: usize,
    gps_time: usize,
}

impl LayerSizes {
    fn read_from<R: Read>(src: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            channel_returns_xy: read_layer_size(src)?,
            z: read_layer_size(src)?,
            classification: read_layer_size(src)?,
            flags: read_layer_size(src)?,
            intensity: read_layer_size(src)?,
            scan_angle: read_layer_size(src)?,
            user_data: read_layer_size(src)?,
            point_source: read_layer_size(src)?,
            gps_time: read_layer_size(src)?,
        })
    }
}

/***************************************************************************************************
                    Compression
***************************************************************************************************/

struct Point6CompressionContext {
    unused: bool,
    models: Point6Models,
    last: Point6Predictors,

    ic_dx: IntegerCompressor,
    ic_dy: IntegerCompressor,
    ic_z: IntegerCompressor,
    ic_intensity: IntegerCompressor,
    ic_scan_angle: IntegerCompressor,
    ic_point_source: IntegerCompressor,

    gps_time: GpsTimeCompressionContext,
}

impl Point6CompressionContext {
    fn new() -> Self {
        Self {
            unused: true,
            models: Point6Models::new(true),
            last: Point6Predictors::default(),
            ic_dx: IntegerCompressorBuilder::new().bits(32).contexts(2).build_initialized(),
            ic_dy: IntegerCompressorBuilder::new().bits(32).contexts(22).build_initialized(),
            ic_z: IntegerCompressorBuilder::new().bits(32).contexts(20).build_initialized(),
            ic_intensity: IntegerCompressorBuilder::new().bits(16).contexts(4).build_initialized(),
            ic_scan_angle: IntegerCompressorBuilder::new().bits(16).contexts(2).build_initialized(),
            ic_point_source: IntegerCompressorBuilder::new().bits(16).build_initialized(),
            gps_time: GpsTimeCompressionContext::new(GpsTime::default()),
        }
    }

    fn create_and_init(&mut self, seed: &Point6) {
        self.models.reset();
        self.ic_dx.init();
        self.ic_dy.init();
        self.ic_z.init();
        self.ic_intensity.init();
        self.ic_scan_angle.init();
        self.ic_point_source.init();
        self.gps_time.init(GpsTime::from(seed.gps_time));
        self.last = Point6Predictors::new(seed);
        self.unused = false;
    }
}

struct Point6Encoders {
    channel_returns_xy: LayerEncoder,
    z: LayerEncoder,
    classification: LayerEncoder,
    flags: LayerEncoder,
    intensity: LayerEncoder,
    scan_angle: LayerEncoder,
    user_data: LayerEncoder,
    point_source: LayerEncoder,
    gps_time: LayerEncoder,
}

impl Point6Encoders {
    fn new() -> Self {
        Self {
            channel_returns_xy: new_layer_encoder(),
            z: new_layer_encoder(),
            classification: new_layer_encoder(),
            flags: new_layer_encoder(),
            intensity: new_layer_encoder(),
            scan_angle: new_layer_encoder(),
            user_data: new_layer_encoder(),
            point_source: new_layer_encoder(),
            gps_time: new_layer_encoder(),
        }
    }

    fn reset(&mut self) {
        reset_layer_encoder(&mut self.channel_returns_xy);
        reset_layer_encoder(&mut self.z);
        reset_layer_encoder(&mut self.classification);
        reset_layer_encoder(&mut self.flags);
        reset_layer_encoder(&mut self.intensity);
        reset_layer_encoder(&mut self.scan_angle);
        reset_layer_encoder(&mut self.user_data);
        reset_layer_encoder(&mut self.point_source);
        reset_layer_encoder(&mut self.gps_time);
    }
}

pub struct LasPoint6Compressor {
    encoders: Point6Encoders,
    changed: ChangedLayers,
    current_context: usize,
    contexts: [Point6CompressionContext; NUM_CONTEXTS],
}

impl LasPoint6Compressor {
    pub fn new() -> Self {
        Self {
            encoders: Point6Encoders::new(),
            changed: ChangedLayers::default(),
            current_context: 0,
            contexts: [
                Point6CompressionContext::new(),
                Point6CompressionContext::new(),
                Point6CompressionContext::new(),
                Point6CompressionContext::new(),
            ],
        }
    }
}

impl Default for LasPoint6Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LasPoint6Compressor {
    fn size_of_field(&self) -> usize {
        Point6::SIZE
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        dst.write_all(&first_point[..Point6::SIZE])?;
        let point = Point6::unpack_from(first_point);

        self.encoders.reset();
        self.changed = ChangedLayers::default();
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = point.scanner_channel() as usize;
        *context = self.current_context;
        self.contexts[self.current_context].create_and_init(&point);
        Ok(())
    }

    fn compress_field_with(
        &mut self,
        current_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let point = Point6::unpack_from(current_point);
        let scanner_channel = point.scanner_channel() as usize;

        let lpr = self.contexts[self.current_context].last.point.return_context();
        // the point is compared to the last one of its own channel, when that one exists
        let last_point = if scanner_channel != self.current_context
            && !self.contexts[scanner_channel].unused
        {
            self.contexts[scanner_channel].last.point
        } else {
            self.contexts[self.current_context].last.point
        };

        let gps_time_change = point.gps_time.to_bits() != last_point.gps_time.to_bits();
        let changed_values =
            changed_values(&last_point, &point, self.current_context, gps_time_change);

        self.encoders.channel_returns_xy.encode_symbol(
            &mut self.contexts[self.current_context].models.changed_values[lpr],
            changed_values,
        )?;

        if is_nth_bit_set!(changed_values, 6) {
            let diff = scanner_channel as i32 - self.current_context as i32;
            let symbol = if diff > 0 { diff - 1 } else { diff + 4 - 1 };
            self.encoders.channel_returns_xy.encode_symbol(
                &mut self.contexts[self.current_context].models.scanner_channel,
                symbol as u32,
            )?;
            if self.contexts[scanner_channel].unused {
                let seed = self.contexts[self.current_context].last.point;
                self.contexts[scanner_channel].create_and_init(&seed);
            }
            log::trace!(
                "scanner channel switch {} -> {}",
                self.current_context,
                scanner_channel
            );
            self.current_context = scanner_channel;
        }
        *context = self.current_context;

        let encoders = &mut self.encoders;
        let the_context = &mut self.contexts[self.current_context];
        let compress = the_context.models.compress;
        let last = &mut the_context.last;

        let last_n = last.point.number_of_returns();
        let last_r = last.point.return_number();
        let n = point.number_of_returns();
        let r = point.return_number();

        if is_nth_bit_set!(changed_values, 2) {
            encoders.channel_returns_xy.encode_symbol(
                lazy_model(
                    &mut the_context.models.number_of_returns[last_n as usize],
                    16,
                    compress,
                ),
                u32::from(n),
            )?;
        }

        if changed_values & 3 == 3 {
            if gps_time_change {
                encoders.channel_returns_xy.encode_symbol(
                    lazy_model(
                        &mut the_context.models.return_number[last_r as usize],
                        16,
                        compress,
                    ),
                    u32::from(r),
                )?;
            } else {
                let diff = i32::from(r) - i32::from(last_r);
                let symbol = if diff > 1 { diff - 2 } else { diff + 16 - 2 };
                encoders.channel_returns_xy.encode_symbol(
                    &mut the_context.models.return_number_gps_same,
                    symbol as u32,
                )?;
            }
        }

        let m = usize::from(NUMBER_RETURN_MAP_6CTX[n as usize][r as usize]);
        let l = usize::from(NUMBER_RETURN_LEVEL_8CT[n as usize][r as usize]);
        let cpr = return_position(n, r);
        let idx = (m << 1) | gps_time_change as usize;

        // X and Y
        let median = last.x_diff_median5[idx].get();
        let diff = point.x.wrapping_sub(last.point.x);
        the_context.ic_dx.compress(
            &mut encoders.channel_returns_xy,
            median,
            diff,
            (n == 1) as u32,
        )?;
        last.x_diff_median5[idx].add(diff);

        let k_bits = the_context.ic_dx.k();
        let median = last.y_diff_median5[idx].get();
        let diff = point.y.wrapping_sub(last.point.y);
        the_context.ic_dy.compress(
            &mut encoders.channel_returns_xy,
            median,
            diff,
            y_context(n, k_bits),
        )?;
        last.y_diff_median5[idx].add(diff);

        // Z
        let k_bits = (the_context.ic_dx.k() + the_context.ic_dy.k()) / 2;
        the_context
            .ic_z
            .compress(&mut encoders.z, last.z[l], point.z, z_context(n, k_bits))?;
        last.z[l] = point.z;

        // Classification
        if point.classification != last.point.classification {
            self.changed.classification = true;
        }
        let ccc = (((last.point.classification & 0x1F) << 1) + (cpr == 3) as u8) as usize;
        encoders.classification.encode_symbol(
            lazy_model(&mut the_context.models.classification[ccc], 256, compress),
            u32::from(point.classification),
        )?;

        // Flags
        let last_flags = last.point.flags_symbol();
        let flags = point.flags_symbol();
        if flags != last_flags {
            self.changed.flags = true;
        }
        encoders.flags.encode_symbol(
            lazy_model(&mut the_context.models.flags[last_flags as usize], 64, compress),
            flags,
        )?;

        // Intensity
        if point.intensity != last.point.intensity {
            self.changed.intensity = true;
        }
        let idx = ((cpr << 1) | gps_time_change as u32) as usize;
        the_context.ic_intensity.compress(
            &mut encoders.intensity,
            i32::from(last.intensities[idx]),
            i32::from(point.intensity),
            cpr,
        )?;
        last.intensities[idx] = point.intensity;

        // Scan angle
        if is_nth_bit_set!(changed_values, 3) {
            self.changed.scan_angle = true;
            the_context.ic_scan_angle.compress(
                &mut encoders.scan_angle,
                i32::from(last.point.scan_angle),
                i32::from(point.scan_angle),
                gps_time_change as u32,
            )?;
        }

        // User data
        if point.user_data != last.point.user_data {
            self.changed.user_data = true;
        }
        encoders.user_data.encode_symbol(
            lazy_model(
                &mut the_context.models.user_data[(last.point.user_data / 4) as usize],
                256,
                compress,
            ),
            u32::from(point.user_data),
        )?;

        // Point source id
        if is_nth_bit_set!(changed_values, 5) {
            self.changed.point_source = true;
            the_context.ic_point_source.compress(
                &mut encoders.point_source,
                i32::from(last.point.point_source_id),
                i32::from(point.point_source_id),
                0,
            )?;
        }

        // Gps time
        if gps_time_change {
            self.changed.gps_time = true;
            the_context
                .gps_time
                .compress_with(&mut encoders.gps_time, GpsTime::from(point.gps_time))?;
        }

        last.point = point;
        last.point.gps_time_change = gps_time_change;
        Ok(())
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        let encoders = &mut self.encoders;
        let changed = &self.changed;
        let sizes = LayerSizes {
            channel_returns_xy: write_layer_size(&mut encoders.channel_returns_xy, true, dst)?,
            z: write_layer_size(&mut encoders.z, true, dst)?,
            classification: write_layer_size(
                &mut encoders.classification,
                changed.classification,
                dst,
            )?,
            flags: write_layer_size(&mut encoders.flags, changed.flags, dst)?,
            intensity: write_layer_size(&mut encoders.intensity, changed.intensity, dst)?,
            scan_angle: write_layer_size(&mut encoders.scan_angle, changed.scan_angle, dst)?,
            user_data: write_layer_size(&mut encoders.user_data, changed.user_data, dst)?,
            point_source: write_layer_size(&mut encoders.point_source, changed.point_source, dst)?,
            gps_time: write_layer_size(&mut encoders.gps_time, changed.gps_time, dst)?,
        };
        log::debug!("point14 layers: {:?}", sizes);
        Ok(())
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        let encoders = &self.encoders;
        let changed = &self.changed;
        copy_encoder_content_to(&encoders.channel_returns_xy, true, dst)?;
        copy_encoder_content_to(&encoders.z, true, dst)?;
        copy_encoder_content_to(&encoders.classification, changed.classification, dst)?;
        copy_encoder_content_to(&encoders.flags, changed.flags, dst)?;
        copy_encoder_content_to(&encoders.intensity, changed.intensity, dst)?;
        copy_encoder_content_to(&encoders.scan_angle, changed.scan_angle, dst)?;
        copy_encoder_content_to(&encoders.user_data, changed.user_data, dst)?;
        copy_encoder_content_to(&encoders.point_source, changed.point_source, dst)?;
        copy_encoder_content_to(&encoders.gps_time, changed.gps_time, dst)?;
        Ok(())
    }
}

/***************************************************************************************************
                    Decompression
***************************************************************************************************/

struct Point6DecompressionContext {
    unused: bool,
    models: Point6Models,
    last: Point6Predictors,

    id_dx: IntegerDecompressor,
    id_dy: IntegerDecompressor,
    id_z: IntegerDecompressor,
    id_intensity: IntegerDecompressor,
    id_scan_angle: IntegerDecompressor,
    id_point_source: IntegerDecompressor,

    gps_time: GpsTimeDecompressionContext,
}

impl Point6DecompressionContext {
    fn new() -> Self {
        Self {
            unused: true,
            models: Point6Models::new(false),
            last: Point6Predictors::default(),
            id_dx: IntegerDecompressorBuilder::new().bits(32).contexts(2).build_initialized(),
            id_dy: IntegerDecompressorBuilder::new().bits(32).contexts(22).build_initialized(),
            id_z: IntegerDecompressorBuilder::new().bits(32).contexts(20).build_initialized(),
            id_intensity: IntegerDecompressorBuilder::new()
                .bits(16)
                .contexts(4)
                .build_initialized(),
            id_scan_angle: IntegerDecompressorBuilder::new()
                .bits(16)
                .contexts(2)
                .build_initialized(),
            id_point_source: IntegerDecompressorBuilder::new().bits(16).build_initialized(),
            gps_time: GpsTimeDecompressionContext::new(GpsTime::default()),
        }
    }

    fn create_and_init(&mut self, seed: &Point6) {
        self.models.reset();
        self.id_dx.init();
        self.id_dy.init();
        self.id_z.init();
        self.id_intensity.init();
        self.id_scan_angle.init();
        self.id_point_source.init();
        self.gps_time.init(GpsTime::from(seed.gps_time));
        self.last = Point6Predictors::new(seed);
        self.unused = false;
    }
}

// Each layer has its own decoder that holds the compressed data
// to be decoded
struct Point6Decoders {
    channel_returns_xy: LayerDecoder,
    z: LayerDecoder,
    classification: LayerDecoder,
    flags: LayerDecoder,
    intensity: LayerDecoder,
    scan_angle: LayerDecoder,
    user_data: LayerDecoder,
    point_source: LayerDecoder,
    gps_time: LayerDecoder,
}

impl Point6Decoders {
    fn new() -> Self {
        Self {
            channel_returns_xy: new_layer_decoder(),
            z: new_layer_decoder(),
            classification: new_layer_decoder(),
            flags: new_layer_decoder(),
            intensity: new_layer_decoder(),
            scan_angle: new_layer_decoder(),
            user_data: new_layer_decoder(),
            point_source: new_layer_decoder(),
            gps_time: new_layer_decoder(),
        }
    }
}

pub struct LasPoint6Decompressor {
    decoders: Point6Decoders,
    /// layers that are requested and present in the current chunk
    changed: ChangedLayers,
    layers_sizes: LayerSizes,
    selection: DecompressionSelection,
    current_context: usize,
    contexts: [Point6DecompressionContext; NUM_CONTEXTS],
}

impl LasPoint6Decompressor {
    pub fn new() -> Self {
        Self::selective(DecompressionSelection::all())
    }

    pub fn selective(selection: DecompressionSelection) -> Self {
        Self {
            decoders: Point6Decoders::new(),
            changed: ChangedLayers::default(),
            layers_sizes: LayerSizes::default(),
            selection,
            current_context: 0,
            contexts: [
                Point6DecompressionContext::new(),
                Point6DecompressionContext::new(),
                Point6DecompressionContext::new(),
                Point6DecompressionContext::new(),
            ],
        }
    }
}

impl Default for LasPoint6Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> LayeredFieldDecompressor<R> for LasPoint6Decompressor {
    fn size_of_field(&self) -> usize {
        Point6::SIZE
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        src.read_exact(&mut first_point[..Point6::SIZE])?;
        let point = Point6::unpack_from(first_point);

        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = point.scanner_channel() as usize;
        *context = self.current_context;
        self.contexts[self.current_context].create_and_init(&point);
        Ok(())
    }

    fn decompress_field_with(
        &mut self,
        current_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let changed_values = {
            let the_context = &mut self.contexts[self.current_context];
            let lpr = the_context.last.point.return_context();
            self.decoders
                .channel_returns_xy
                .decode_symbol(&mut the_context.models.changed_values[lpr])?
        };

        if is_nth_bit_set!(changed_values, 6) {
            let diff = self
                .decoders
                .channel_returns_xy
                .decode_symbol(&mut self.contexts[self.current_context].models.scanner_channel)?;
            let scanner_channel = (self.current_context + diff as usize + 1) % NUM_CONTEXTS;
            if self.contexts[scanner_channel].unused {
                let seed = self.contexts[self.current_context].last.point;
                self.contexts[scanner_channel].create_and_init(&seed);
            }
            log::trace!(
                "scanner channel switch {} -> {}",
                self.current_context,
                scanner_channel
            );
            self.current_context = scanner_channel;
        }
        *context = self.current_context;

        let point_source_change = is_nth_bit_set!(changed_values, 5);
        let gps_time_change = is_nth_bit_set!(changed_values, 4);
        let scan_angle_change = is_nth_bit_set!(changed_values, 3);

        let decoders = &mut self.decoders;
        let changed = &self.changed;
        let the_context = &mut self.contexts[self.current_context];
        let compress = the_context.models.compress;
        let last = &mut the_context.last;
        last.point.set_scanner_channel(self.current_context as u8);

        let last_n = last.point.number_of_returns();
        let last_r = last.point.return_number();

        let n = if is_nth_bit_set!(changed_values, 2) {
            decoders.channel_returns_xy.decode_symbol(lazy_model(
                &mut the_context.models.number_of_returns[last_n as usize],
                16,
                compress,
            ))? as u8
        } else {
            last_n
        };
        last.point.set_number_of_returns(n);

        let r = match changed_values & 3 {
            0 => last_r,
            1 => (last_r + 1) % 16,
            2 => (last_r + 15) % 16,
            _ => {
                if gps_time_change {
                    decoders.channel_returns_xy.decode_symbol(lazy_model(
                        &mut the_context.models.return_number[last_r as usize],
                        16,
                        compress,
                    ))? as u8
                } else {
                    let symbol = decoders
                        .channel_returns_xy
                        .decode_symbol(&mut the_context.models.return_number_gps_same)?;
                    ((u32::from(last_r) + symbol + 2) % 16) as u8
                }
            }
        };
        last.point.set_return_number(r);

        let m = usize::from(NUMBER_RETURN_MAP_6CTX[n as usize][r as usize]);
        let l = usize::from(NUMBER_RETURN_LEVEL_8CT[n as usize][r as usize]);
        let cpr = return_position(n, r);
        let idx = (m << 1) | gps_time_change as usize;

        // X and Y
        let median = last.x_diff_median5[idx].get();
        let diff = the_context.id_dx.decompress(
            &mut decoders.channel_returns_xy,
            median,
            (n == 1) as u32,
        )?;
        last.point.x = last.point.x.wrapping_add(diff);
        last.x_diff_median5[idx].add(diff);

        let k_bits = the_context.id_dx.k();
        let median = last.y_diff_median5[idx].get();
        let diff = the_context.id_dy.decompress(
            &mut decoders.channel_returns_xy,
            median,
            y_context(n, k_bits),
        )?;
        last.point.y = last.point.y.wrapping_add(diff);
        last.y_diff_median5[idx].add(diff);

        if changed.z {
            let k_bits = (the_context.id_dx.k() + the_context.id_dy.k()) / 2;
            last.point.z =
                the_context
                    .id_z
                    .decompress(&mut decoders.z, last.z[l], z_context(n, k_bits))?;
            last.z[l] = last.point.z;
        }

        if changed.classification {
            let ccc = (((last.point.classification & 0x1F) << 1) + (cpr == 3) as u8) as usize;
            last.point.classification = decoders.classification.decode_symbol(lazy_model(
                &mut the_context.models.classification[ccc],
                256,
                compress,
            ))? as u8;
        }

        if changed.flags {
            let last_flags = last.point.flags_symbol() as usize;
            let flags = decoders.flags.decode_symbol(lazy_model(
                &mut the_context.models.flags[last_flags],
                64,
                compress,
            ))?;
            last.point.set_flags_symbol(flags);
        }

        if changed.intensity {
            let idx = ((cpr << 1) | gps_time_change as u32) as usize;
            last.point.intensity = the_context.id_intensity.decompress(
                &mut decoders.intensity,
                i32::from(last.intensities[idx]),
                cpr,
            )? as u16;
            last.intensities[idx] = last.point.intensity;
        }

        if changed.scan_angle && scan_angle_change {
            last.point.scan_angle = the_context.id_scan_angle.decompress(
                &mut decoders.scan_angle,
                i32::from(last.point.scan_angle),
                gps_time_change as u32,
            )? as i16;
        }

        if changed.user_data {
            last.point.user_data = decoders.user_data.decode_symbol(lazy_model(
                &mut the_context.models.user_data[(last.point.user_data / 4) as usize],
                256,
                compress,
            ))? as u8;
        }

        if changed.point_source && point_source_change {
            last.point.point_source_id = the_context.id_point_source.decompress(
                &mut decoders.point_source,
                i32::from(last.point.point_source_id),
                0,
            )? as u16;
        }

        if changed.gps_time && gps_time_change {
            let gps_time = the_context.gps_time.decompress_with(&mut decoders.gps_time)?;
            last.point.gps_time = f64::from(gps_time);
        }

        last.point.gps_time_change = gps_time_change;
        last.point.pack_into(current_point);
        Ok(())
    }

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
        self.layers_sizes = LayerSizes::read_from(src)?;
        Ok(())
    }

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
        let sizes = self.layers_sizes;
        let selection = self.selection;
        let decoders = &mut self.decoders;
        copy_bytes_into_decoder(
            true,
            sizes.channel_returns_xy,
            &mut decoders.channel_returns_xy,
            src,
        )?;
        self.changed = ChangedLayers {
            z: copy_bytes_into_decoder(selection.should_decompress_z(), sizes.z, &mut decoders.z, src)?,
            classification: copy_bytes_into_decoder(
                selection.should_decompress_classification(),
                sizes.classification,
                &mut decoders.classification,
                src,
            )?,
            flags: copy_bytes_into_decoder(
                selection.should_decompress_flags(),
                sizes.flags,
                &mut decoders.flags,
                src,
            )?,
            intensity: copy_bytes_into_decoder(
                selection.should_decompress_intensity(),
                sizes.intensity,
                &mut decoders.intensity,
                src,
            )?,
            scan_angle: copy_bytes_into_decoder(
                selection.should_decompress_scan_angle(),
                sizes.scan_angle,
                &mut decoders.scan_angle,
                src,
            )?,
            user_data: copy_bytes_into_decoder(
                selection.should_decompress_user_data(),
                sizes.user_data,
                &mut decoders.user_data,
                src,
            )?,
            point_source: copy_bytes_into_decoder(
                selection.should_decompress_point_source_id(),
                sizes.point_source,
                &mut decoders.point_source,
                src,
            )?,
            gps_time: copy_bytes_into_decoder(
                selection.should_decompress_gps_time(),
                sizes.gps_time,
                &mut decoders.gps_time,
                src,
            )?,
        };
        Ok(())
    }
}
