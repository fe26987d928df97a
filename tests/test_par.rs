#![cfg(feature = "parallel")]
mod common;

use std::io::Cursor;

use laz14::{
    compress_buffer, decompress_buffer, par_compress_buffer, par_decompress_buffer, LasZipError,
    LazItemRecordBuilder, LazVlr, LazVlrBuilder,
};

use common::PointGenerator;

fn vlr_for(point_format_id: u8, num_extra_bytes: u16, chunk_size: u32) -> LazVlr {
    let items =
        LazItemRecordBuilder::default_for_point_format_id(point_format_id, num_extra_bytes).unwrap();
    LazVlrBuilder::from_laz_items(items)
        .with_chunk_size(chunk_size)
        .build()
}

#[test]
fn par_compression_is_the_same_as_sequential() {
    for point_format_id in 6..=10u8 {
        let vlr = vlr_for(point_format_id, 3, 1_000);
        let mut generator = PointGenerator::new(30 + u64::from(point_format_id), 4);
        let points = generator.records(point_format_id, 3, 4_321);

        let mut sequential = Cursor::new(Vec::<u8>::new());
        compress_buffer(&mut sequential, &points, vlr.clone()).unwrap();
        let mut parallel = Cursor::new(Vec::<u8>::new());
        par_compress_buffer(&mut parallel, &points, &vlr).unwrap();
        assert_eq!(sequential.get_ref(), parallel.get_ref());

        let mut decompressed = vec![0u8; points.len()];
        par_decompress_buffer(parallel.get_ref(), &mut decompressed, &vlr).unwrap();
        assert_eq!(decompressed, points);
    }
}

#[test]
fn par_decompress_less_than_all_the_points() {
    let vlr = vlr_for(7, 0, 100);
    let point_size = vlr.items_size() as usize;
    let mut generator = PointGenerator::new(40, 2);
    let points = generator.records(7, 0, 1_050);

    let mut compressed = Cursor::new(Vec::<u8>::new());
    par_compress_buffer(&mut compressed, &points, &vlr).unwrap();

    let num_points = 250;
    let mut decompressed = vec![0u8; num_points * point_size];
    par_decompress_buffer(compressed.get_ref(), &mut decompressed, &vlr).unwrap();
    assert_eq!(&decompressed[..], &points[..num_points * point_size]);

    let mut all_points = vec![0u8; points.len()];
    decompress_buffer(compressed.get_ref(), &mut all_points, vlr).unwrap();
    assert_eq!(all_points, points);
}

#[test]
fn par_variable_size_chunks_are_one_chunk() {
    let vlr = LazVlrBuilder::from_laz_items(
        LazItemRecordBuilder::default_for_point_format_id(6, 0).unwrap(),
    )
    .with_variable_chunk_size()
    .build();
    let mut generator = PointGenerator::new(41, 4);
    let points = generator.records(6, 0, 2_000);

    let mut compressed = Cursor::new(Vec::<u8>::new());
    par_compress_buffer(&mut compressed, &points, &vlr).unwrap();
    let chunk_table = laz14::ChunkTable::read_from(Cursor::new(compressed.get_ref()), &vlr).unwrap();
    assert_eq!(chunk_table.len(), 1);
    assert_eq!(chunk_table[0].point_count, 2_000);

    let mut decompressed = vec![0u8; points.len()];
    par_decompress_buffer(compressed.get_ref(), &mut decompressed, &vlr).unwrap();
    assert_eq!(decompressed, points);
}

#[test]
fn par_decompression_needs_the_chunk_table() {
    let vlr = vlr_for(6, 0, 100);
    let mut generator = PointGenerator::new(42, 1);
    let points = generator.records(6, 0, 300);
    let mut compressed = Cursor::new(Vec::<u8>::new());
    par_compress_buffer(&mut compressed, &points, &vlr).unwrap();

    let mut data = compressed.into_inner();
    // the offset was not written and there is nothing at the end of the data
    data[..8].copy_from_slice(&(-1i64).to_le_bytes());
    let len = data.len();
    data[len - 8..].copy_from_slice(&[0u8; 8]);

    let mut decompressed = vec![0u8; points.len()];
    match par_decompress_buffer(&data, &mut decompressed, &vlr) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other),
    }
}
