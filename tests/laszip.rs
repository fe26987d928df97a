mod common;

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use laz14::las::{Point6, RGB};
use laz14::packers::Packable;
use laz14::{
    compress_buffer, decompress_buffer, ChunkTable, DecompressionSelection,
    LasZipCompressor, LasZipDecompressor, LasZipError, LazItemRecordBuilder, LazItemType, LazVlr,
    LazVlrBuilder,
};

use common::PointGenerator;

fn vlr_for(point_format_id: u8, chunk_size: u32) -> LazVlr {
    let items = LazItemRecordBuilder::default_for_point_format_id(point_format_id, 0).unwrap();
    LazVlrBuilder::from_laz_items(items)
        .with_chunk_size(chunk_size)
        .build()
}

fn compress(points: &[u8], vlr: &LazVlr) -> Vec<u8> {
    let mut output = Cursor::new(Vec::<u8>::new());
    compress_buffer(&mut output, points, vlr.clone()).unwrap();
    output.into_inner()
}

/// Compresses the points with chunks of the given sizes.
fn compress_variable(points: &[u8], chunk_sizes: &[usize], vlr: &LazVlr) -> Vec<u8> {
    let point_size = vlr.items_size() as usize;
    let mut compressor = LasZipCompressor::new(Cursor::new(Vec::<u8>::new()), vlr.clone()).unwrap();
    let mut start = 0;
    for &chunk_size in chunk_sizes {
        let end = start + chunk_size * point_size;
        compressor.compress_many(&points[start..end]).unwrap();
        compressor.finish_current_chunk().unwrap();
        start = end;
    }
    assert_eq!(start, points.len());
    compressor.done().unwrap();
    compressor.into_inner().into_inner()
}

#[test]
fn vlr_round_trip() {
    let items = LazItemRecordBuilder::default_for_point_format_id(10, 7).unwrap();
    let item_types = items.iter().map(|item| item.item_type()).collect::<Vec<_>>();
    assert_eq!(
        item_types,
        vec![
            LazItemType::Point14,
            LazItemType::RGBNIR14,
            LazItemType::WavePacket14,
            LazItemType::Byte14(7)
        ]
    );
    assert!(items.iter().all(|item| item.version() == 4));

    let vlr = LazVlrBuilder::from_laz_items(items)
        .with_chunk_size(1234)
        .build();
    assert_eq!(vlr.items_size(), 30 + 8 + 29 + 7);

    let mut record_data = Cursor::new(Vec::<u8>::new());
    vlr.write_to(&mut record_data).unwrap();
    let record_data = record_data.into_inner();
    // layered chunked compressor, arithmetic coder
    assert_eq!(&record_data[..4], &[3, 0, 0, 0]);
    // 34 bytes of header then 6 bytes per item
    assert_eq!(record_data.len(), 34 + 4 * 6);

    let read_vlr = LazVlr::from_buffer(&record_data).unwrap();
    assert_eq!(read_vlr, vlr);
    assert_eq!(read_vlr.chunk_size(), 1234);
    assert!(!read_vlr.uses_variably_sized_chunks());
}

#[test]
fn unknown_point_format_is_refused() {
    match LazItemRecordBuilder::default_for_point_format_id(1, 0) {
        Err(LasZipError::UnsupportedPointFormat(1)) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn compressor_without_items_is_refused() {
    match LasZipCompressor::from_laz_items(Cursor::new(Vec::<u8>::new()), vec![]) {
        Err(LasZipError::NoLazItems) => {}
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("a compressor without items was created"),
    }
}

#[test]
fn items_must_start_with_point14() {
    let items = LazItemRecordBuilder::new()
        .add_item(LazItemType::RGB14)
        .add_item(LazItemType::Point14)
        .build();
    match LasZipCompressor::from_laz_items(Cursor::new(Vec::<u8>::new()), items) {
        Err(LasZipError::FirstItemNotPoint14(LazItemType::RGB14)) => {}
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("a compressor was created for items not starting with Point14"),
    }
}

#[test]
fn buffer_len_must_be_a_multiple_of_the_point_size() {
    let vlr = vlr_for(6, 50_000);
    let mut output = Cursor::new(Vec::<u8>::new());
    match compress_buffer(&mut output, &[0u8; 31], vlr.clone()) {
        Err(LasZipError::BufferLenNotMultipleOfPointSize {
            buffer_len: 31,
            point_size: 30,
        }) => {}
        other => panic!("unexpected result {:?}", other),
    }

    let compressed = compress(&[0u8; 60], &vlr);
    let mut out = vec![0u8; 45];
    assert!(decompress_buffer(&compressed, &mut out, vlr).is_err());
}

#[test]
fn no_points() {
    let vlr = vlr_for(7, 50_000);
    let compressed = compress(&[], &vlr);
    // offset, then the chunk table header
    assert_eq!(compressed.len(), 8 + 8);
    let chunk_table = ChunkTable::read_from(Cursor::new(&compressed), &vlr).unwrap();
    assert!(chunk_table.is_empty());
}

#[test]
fn fixed_size_chunks() {
    let vlr = vlr_for(7, 500);
    let point_size = vlr.items_size() as usize;
    let mut generator = PointGenerator::new(21, 2);
    let points = generator.records(7, 0, 1_234);
    let compressed = compress(&points, &vlr);

    let offset_to_chunk_table = Cursor::new(&compressed)
        .read_i64::<LittleEndian>()
        .unwrap();
    let chunk_table = ChunkTable::read_from(Cursor::new(&compressed), &vlr).unwrap();
    assert_eq!(chunk_table.len(), 3);
    assert!(chunk_table.as_ref().iter().all(|e| e.point_count == 500));
    let total_bytes: u64 = chunk_table.as_ref().iter().map(|e| e.byte_count).sum();
    assert_eq!(total_bytes + 8, offset_to_chunk_table as u64);

    let mut decompressed = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut decompressed, vlr).unwrap();
    for (i, (expected, actual)) in points
        .chunks_exact(point_size)
        .zip(decompressed.chunks_exact(point_size))
        .enumerate()
    {
        assert_eq!(expected, actual, "point {} differs", i);
    }
}

#[test]
fn variable_size_chunks() {
    let vlr = LazVlrBuilder::from_laz_items(
        LazItemRecordBuilder::default_for_point_format_id(8, 2).unwrap(),
    )
    .with_variable_chunk_size()
    .build();
    assert!(vlr.uses_variably_sized_chunks());
    let mut generator = PointGenerator::new(22, 4);
    let chunk_sizes = [100usize, 250, 1, 649];
    let points = generator.records(8, 2, chunk_sizes.iter().sum());
    let compressed = compress_variable(&points, &chunk_sizes, &vlr);

    let chunk_table = ChunkTable::read_from(Cursor::new(&compressed), &vlr).unwrap();
    let point_counts = chunk_table
        .as_ref()
        .iter()
        .map(|e| e.point_count as usize)
        .collect::<Vec<_>>();
    assert_eq!(point_counts, chunk_sizes);

    let mut decompressed = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut decompressed, vlr).unwrap();
    assert_eq!(decompressed, points);
}

#[test]
fn seek_to_points() {
    let vlr = vlr_for(7, 500);
    let point_size = vlr.items_size() as usize;
    let mut generator = PointGenerator::new(23, 4);
    let points = generator.records(7, 0, 1_234);
    let compressed = compress(&points, &vlr);

    let mut decompressor = LasZipDecompressor::new(Cursor::new(compressed), vlr).unwrap();
    let mut point = vec![0u8; point_size];
    for &index in &[777usize, 0, 499, 500, 1233, 3, 1000] {
        decompressor.seek(index as u64).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        let expected = &points[index * point_size..(index + 1) * point_size];
        assert_eq!(&point[..], expected, "point {} differs", index);
    }

    // reading goes on after a seek
    decompressor.seek(498).unwrap();
    let mut two_points = vec![0u8; 2 * point_size];
    decompressor.decompress_many(&mut two_points).unwrap();
    assert_eq!(&two_points[..], &points[498 * point_size..500 * point_size]);

    decompressor.seek(1_234).unwrap();
    assert!(decompressor.decompress_one(&mut point).is_err());
}

#[test]
fn seek_in_variable_size_chunks() {
    let vlr = LazVlrBuilder::from_laz_items(
        LazItemRecordBuilder::default_for_point_format_id(6, 0).unwrap(),
    )
    .with_variable_chunk_size()
    .build();
    let point_size = vlr.items_size() as usize;
    let mut generator = PointGenerator::new(24, 2);
    let chunk_sizes = [10usize, 300, 42];
    let points = generator.records(6, 0, chunk_sizes.iter().sum());
    let compressed = compress_variable(&points, &chunk_sizes, &vlr);

    let mut decompressor = LasZipDecompressor::new(Cursor::new(compressed), vlr).unwrap();
    let mut point = vec![0u8; point_size];
    for &index in &[351usize, 9, 10, 309, 310, 0] {
        decompressor.seek(index as u64).unwrap();
        decompressor.decompress_one(&mut point).unwrap();
        assert_eq!(
            &point[..],
            &points[index * point_size..(index + 1) * point_size]
        );
    }
}

/// Replaces the chunk table with garbage the readers cannot use.
fn remove_chunk_table(compressed: &mut Vec<u8>) {
    let offset = Cursor::new(compressed.as_slice())
        .read_i64::<LittleEndian>()
        .unwrap();
    compressed.truncate(offset as usize);
    compressed.extend_from_slice(&[0u8; 8]);
    let mut cursor = Cursor::new(compressed);
    cursor.write_i64::<LittleEndian>(-1).unwrap();
}

#[test]
fn missing_chunk_table() {
    let vlr = vlr_for(6, 100);
    let mut generator = PointGenerator::new(25, 1);
    let points = generator.records(6, 0, 250);
    let mut compressed = compress(&points, &vlr);
    remove_chunk_table(&mut compressed);

    match ChunkTable::read_from(Cursor::new(&compressed), &vlr) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other),
    }

    // Sequential reading does not need it
    let mut decompressed = vec![0u8; points.len()];
    decompress_buffer(&compressed, &mut decompressed, vlr.clone()).unwrap();
    assert_eq!(decompressed, points);

    let mut decompressor = LasZipDecompressor::new(Cursor::new(compressed), vlr).unwrap();
    match decompressor.seek(120) {
        Err(LasZipError::MissingChunkTable) => {}
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn data_may_start_anywhere_in_the_stream() {
    let vlr = vlr_for(7, 300);
    let mut generator = PointGenerator::new(26, 2);
    let points = generator.records(7, 0, 1_000);

    let mut output = Cursor::new(Vec::<u8>::new());
    output.write_all(b"some header").unwrap();
    {
        let mut compressor = LasZipCompressor::new(&mut output, vlr.clone()).unwrap();
        compressor.compress_many(&points).unwrap();
        compressor.done().unwrap();
    }

    output.seek(SeekFrom::Start(11)).unwrap();
    let mut decompressor = LasZipDecompressor::new(&mut output, vlr.clone()).unwrap();
    let point_size = vlr.items_size() as usize;
    let mut point = vec![0u8; point_size];
    decompressor.seek(650).unwrap();
    decompressor.decompress_one(&mut point).unwrap();
    assert_eq!(&point[..], &points[650 * point_size..651 * point_size]);
}

#[test]
fn selective_decompression() {
    let chunk_size = 300;
    let vlr = vlr_for(7, chunk_size);
    let point_size = vlr.items_size() as usize;
    let mut generator = PointGenerator::new(27, 1);
    let points = generator.records(7, 0, 1_000);
    let compressed = compress(&points, &vlr);

    let selection = DecompressionSelection::base()
        .decompress_intensity()
        .decompress_classification();
    let mut decompressor =
        LasZipDecompressor::selective(Cursor::new(&compressed), vlr.clone(), selection).unwrap();
    let mut decompressed = vec![0u8; points.len()];
    decompressor.decompress_many(&mut decompressed).unwrap();

    for (i, (expected, actual)) in points
        .chunks_exact(point_size)
        .zip(decompressed.chunks_exact(point_size))
        .enumerate()
    {
        let first = (i / chunk_size as usize) * chunk_size as usize;
        let seed = Point6::unpack_from(&points[first * point_size..]);
        let seed_rgb = RGB::unpack_from(&points[first * point_size + Point6::SIZE..]);

        let mut expected_point = Point6::unpack_from(expected);
        expected_point.z = seed.z;
        expected_point.flags = seed.flags;
        expected_point.user_data = seed.user_data;
        expected_point.scan_angle = seed.scan_angle;
        expected_point.point_source_id = seed.point_source_id;
        expected_point.gps_time = seed.gps_time;

        let mut expected_record = vec![0u8; point_size];
        expected_point.pack_into(&mut expected_record[..Point6::SIZE]);
        seed_rgb.pack_into(&mut expected_record[Point6::SIZE..]);
        assert_eq!(actual, &expected_record[..], "point {} differs", i);
    }

    // Selecting everything is the same as a full decompression
    let mut decompressor = LasZipDecompressor::selective(
        Cursor::new(&compressed),
        vlr,
        DecompressionSelection::all(),
    )
    .unwrap();
    decompressor.decompress_many(&mut decompressed).unwrap();
    assert_eq!(decompressed, points);
}
