/*
===============================================================================

  PROGRAMMERS:

    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.
    andrew.bell.ia@gmail.com - Hobu Inc.

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
//! Compressor and decompressor of the extra bytes (BYTE14) of points.
//!
//! Every extra byte is delta coded against the same byte of the last
//! point of the scanner channel, in its own layer with its own encoder.

use std::io::{Read, Seek, Write};

use crate::las::selective::DecompressionSelection;
use crate::las::utils::{
    context_of_last_item, copy_bytes_into_decoder, copy_encoder_content_to, new_layer_decoder,
    new_layer_encoder, read_layer_size, reset_layer_encoder, u8_fold, write_layer_size,
    LayerDecoder, LayerEncoder,
};
use crate::models::ArithmeticModel;
use crate::record::{LayeredFieldCompressor, LayeredFieldDecompressor};

struct ExtraBytesContext {
    last_bytes: Vec<u8>,
    models: Vec<ArithmeticModel>,
    unused: bool,
}

impl ExtraBytesContext {
    fn new(count: usize, compress: bool) -> Self {
        Self {
            last_bytes: vec![0u8; count],
            models: (0..count)
                .map(|_i| ArithmeticModel::new(256, compress))
                .collect(),
            unused: true,
        }
    }

    fn create_and_init(&mut self, seed: &[u8]) {
        self.models.iter_mut().for_each(ArithmeticModel::reset);
        self.last_bytes.copy_from_slice(seed);
        self.unused = false;
    }
}

fn extra_bytes_contexts(count: usize, compress: bool) -> Vec<ExtraBytesContext> {
    (0..4)
        .map(|_i| ExtraBytesContext::new(count, compress))
        .collect()
}

fn switch_context(
    contexts: &mut [ExtraBytesContext],
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
        let seed = contexts[previous].last_bytes.clone();
        contexts[context].create_and_init(&seed);
    }
    context_of_last_item(version, previous, context, created)
}

pub struct LasExtraByteCompressor {
    // Each extra byte has its own layer, thus its own encoder
    encoders: Vec<LayerEncoder>,
    has_byte_changed: Vec<bool>,
    contexts: Vec<ExtraBytesContext>,
    num_extra_bytes: usize,
    version: u16,
    current_context: usize,
}

impl LasExtraByteCompressor {
    pub fn new(count: usize) -> Self {
        Self::with_version(count, 4)
    }

    pub fn with_version(count: usize, version: u16) -> Self {
        Self {
            encoders: (0..count).map(|_i| new_layer_encoder()).collect(),
            has_byte_changed: vec![false; count],
            contexts: extra_bytes_contexts(count, true),
            num_extra_bytes: count,
            version,
            current_context: 0,
        }
    }
}

impl<W: Write> LayeredFieldCompressor<W> for LasExtraByteCompressor {
    fn size_of_field(&self) -> usize {
        self.num_extra_bytes
    }

    fn init_first_point(
        &mut self,
        dst: &mut W,
        first_point: &[u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let first_bytes = &first_point[..self.num_extra_bytes];
        dst.write_all(first_bytes)?;
        self.encoders.iter_mut().for_each(reset_layer_encoder);
        self.has_byte_changed.iter_mut().for_each(|c| *c = false);
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(first_bytes);
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
        for i in 0..self.num_extra_bytes {
            let last = self.contexts[last_context].last_bytes[i];
            let diff = i32::from(current_point[i]) - i32::from(last);
            self.encoders[i].encode_symbol(
                &mut self.contexts[self.current_context].models[i],
                u32::from(u8_fold(diff)),
            )?;
            if diff != 0 {
                self.has_byte_changed[i] = true;
                self.contexts[last_context].last_bytes[i] = current_point[i];
            }
        }
        Ok(())
    }

    fn write_layers_sizes(&mut self, dst: &mut W) -> std::io::Result<()> {
        for (encoder, changed) in self.encoders.iter_mut().zip(&self.has_byte_changed) {
            write_layer_size(encoder, *changed, dst)?;
        }
        Ok(())
    }

    fn write_layers(&mut self, dst: &mut W) -> std::io::Result<()> {
        for (encoder, changed) in self.encoders.iter().zip(&self.has_byte_changed) {
            copy_encoder_content_to(encoder, *changed, dst)?;
        }
        Ok(())
    }
}

pub struct LasExtraByteDecompressor {
    // Each extra byte has its own layer, thus its own decoder
    decoders: Vec<LayerDecoder>,
    num_bytes_per_layer: Vec<usize>,
    has_byte_changed: Vec<bool>,
    is_requested: bool,
    contexts: Vec<ExtraBytesContext>,
    num_extra_bytes: usize,
    version: u16,
    current_context: usize,
}

impl LasExtraByteDecompressor {
    pub fn new(count: usize) -> Self {
        Self::selective(count, DecompressionSelection::all())
    }

    pub fn selective(count: usize, selection: DecompressionSelection) -> Self {
        Self {
            decoders: (0..count).map(|_i| new_layer_decoder()).collect(),
            num_bytes_per_layer: vec![0; count],
            has_byte_changed: vec![false; count],
            is_requested: selection.should_decompress_extra_bytes(),
            contexts: extra_bytes_contexts(count, false),
            num_extra_bytes: count,
            version: 4,
            current_context: 0,
        }
    }

    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }
}

impl<R: Read + Seek> LayeredFieldDecompressor<R> for LasExtraByteDecompressor {
    fn size_of_field(&self) -> usize {
        self.num_extra_bytes
    }

    fn init_first_point(
        &mut self,
        src: &mut R,
        first_point: &mut [u8],
        context: &mut usize,
    ) -> std::io::Result<()> {
        let first_bytes = &mut first_point[..self.num_extra_bytes];
        src.read_exact(first_bytes)?;
        for ctx in &mut self.contexts {
            ctx.unused = true;
        }
        self.current_context = *context;
        self.contexts[*context].create_and_init(first_bytes);
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
        for i in 0..self.num_extra_bytes {
            let last = self.contexts[last_context].last_bytes[i];
            let value = if self.has_byte_changed[i] {
                let corr = self.decoders[i]
                    .decode_symbol(&mut self.contexts[self.current_context].models[i])?;
                let value = u8_fold(corr as i32 + i32::from(last));
                self.contexts[last_context].last_bytes[i] = value;
                value
            } else {
                last
            };
            current_point[i] = value;
        }
        Ok(())
    }

    fn read_layers_sizes(&mut self, src: &mut R) -> std::io::Result<()> {
        for layer_size in &mut self.num_bytes_per_layer {
            *layer_size = read_layer_size(src)?;
        }
        Ok(())
    }

    fn read_layers(&mut self, src: &mut R) -> std::io::Result<()> {
        for i in 0..self.num_extra_bytes {
            self.has_byte_changed[i] = copy_bytes_into_decoder(
                self.is_requested,
                self.num_bytes_per_layer[i],
                &mut self.decoders[i],
                src,
            )?;
        }
        Ok(())
    }
}
