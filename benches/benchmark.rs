#[macro_use]
extern crate criterion;

use std::io::Cursor;

use criterion::Criterion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use laz14::las::{Point6, RGB};
use laz14::packers::Packable;
use laz14::{
    compress_buffer, decompress_buffer, LasZipCompressor, LazItemRecordBuilder, LazVlr,
    LazVlrBuilder,
};

const NUM_POINTS: usize = 50_000;

fn point14_rgb_vlr() -> LazVlr {
    let items = LazItemRecordBuilder::default_for_point_format_id(7, 0).unwrap();
    LazVlrBuilder::from_laz_items(items)
        .with_chunk_size(10_000)
        .build()
}

/// Point format 7 records of two scanner channels
/// flying over a slowly changing scene.
fn synthetic_points(num_points: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(2019);
    let record_size = Point6::SIZE + RGB::SIZE;
    let mut data = vec![0u8; num_points * record_size];
    let mut point = Point6::default();
    point.gps_time = 400_000.0;
    let mut rgb = RGB::default();
    for record in data.chunks_exact_mut(record_size) {
        point.set_scanner_channel(rng.gen_range(0..2));
        point.set_number_of_returns(rng.gen_range(1..4));
        point.set_return_number(rng.gen_range(1..=point.number_of_returns()));
        point.x = point.x.wrapping_add(rng.gen_range(-20..20));
        point.y = point.y.wrapping_add(rng.gen_range(-20..20));
        point.z = point.z.wrapping_add(rng.gen_range(-100..100));
        point.intensity = rng.gen_range(0..2048);
        point.classification = rng.gen_range(1..3);
        point.scan_angle = rng.gen_range(-3_000..3_000);
        point.gps_time += 0.000_01;
        rgb.red = rgb.red.wrapping_add(rng.gen_range(0..64));
        rgb.green = rgb.red;
        rgb.blue = rgb.blue.wrapping_add(rng.gen_range(0..64));

        point.pack_into(&mut record[..Point6::SIZE]);
        rgb.pack_into(&mut record[Point6::SIZE..]);
    }
    data
}

fn compress(points: &[u8], vlr: &LazVlr) -> Vec<u8> {
    let mut output = Cursor::new(Vec::<u8>::new());
    compress_buffer(&mut output, points, vlr.clone()).unwrap();
    output.into_inner()
}

fn point14_rgb_compression_benchmark(c: &mut Criterion) {
    let vlr = point14_rgb_vlr();
    let points = synthetic_points(NUM_POINTS);
    c.bench_function("point14_rgb_compress_buffer", move |b| {
        b.iter(|| compress(&points, &vlr))
    });
}

fn point14_rgb_decompression_benchmark(c: &mut Criterion) {
    let vlr = point14_rgb_vlr();
    let points = synthetic_points(NUM_POINTS);
    let compressed = compress(&points, &vlr);
    let mut decompressed = vec![0u8; points.len()];
    c.bench_function("point14_rgb_decompress_buffer", move |b| {
        b.iter(|| decompress_buffer(&compressed, &mut decompressed, vlr.clone()).unwrap())
    });
}

fn point14_rgb_compress_one_benchmark(c: &mut Criterion) {
    let vlr = point14_rgb_vlr();
    let points = synthetic_points(NUM_POINTS);
    let point_size = vlr.items_size() as usize;
    let mut compressor =
        LasZipCompressor::new(Cursor::new(Vec::<u8>::with_capacity(1 << 20)), vlr).unwrap();
    let mut raw_points = points
        .chunks_exact(point_size)
        .map(|p| p.to_vec())
        .collect::<Vec<_>>()
        .into_iter()
        .cycle();
    c.bench_function("point14_rgb_compress_one", move |b| {
        b.iter(|| {
            if let Some(point) = raw_points.next() {
                compressor.compress_one(&point).unwrap();
            }
        })
    });
}

criterion_group!(
    benches,
    point14_rgb_compression_benchmark,
    point14_rgb_decompression_benchmark,
    point14_rgb_compress_one_benchmark
);
criterion_main!(benches);
