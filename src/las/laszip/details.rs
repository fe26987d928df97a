use crate::las::selective::DecompressionSelection;
use crate::record::{
    LayeredPointRecordCompressor, LayeredPointRecordDecompressor, RecordCompressor,
    RecordDecompressor,
};
use crate::{LasZipError, LazItem};
use std::io::{Read, Seek, Write};

use super::LazItemType;

/// The first item has to be the point14, all items have to be layered (version 3 or 4).
fn check_items(items: &[LazItem]) -> crate::Result<()> {
    let first_item = items.first().ok_or(LasZipError::NoLazItems)?;
    if first_item.item_type != LazItemType::Point14 {
        return Err(LasZipError::FirstItemNotPoint14(first_item.item_type));
    }
    match items.iter().find(|item| !matches!(item.version, 3 | 4)) {
        Some(item) => Err(LasZipError::UnsupportedLazItemVersion(
            item.item_type,
            item.version,
        )),
        None => Ok(()),
    }
}

pub(super) fn record_decompressor_from_laz_items<'a, R: Read + Seek + Send + 'a>(
    items: &[LazItem],
    input: R,
    selection: DecompressionSelection,
) -> crate::Result<Box<dyn RecordDecompressor<R> + Send + 'a>> {
    check_items(items)?;
    let mut decompressor = LayeredPointRecordDecompressor::new(input);
    decompressor.set_selection(selection);
    decompressor.set_fields_from(items)?;
    Ok(Box::new(decompressor))
}

pub(super) fn record_compressor_from_laz_items<'a, W: Write + Send + 'a>(
    items: &[LazItem],
    output: W,
) -> crate::Result<Box<dyn RecordCompressor<W> + Send + 'a>> {
    check_items(items)?;
    let mut compressor = LayeredPointRecordCompressor::new(output);
    compressor.set_fields_from(items)?;
    Ok(Box::new(compressor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_checked_before_building_a_record_compressor() {
        assert!(matches!(check_items(&[]), Err(LasZipError::NoLazItems)));

        let rgb_first = [
            LazItem::new(LazItemType::RGB14, 3),
            LazItem::new(LazItemType::Point14, 3),
        ];
        assert!(matches!(
            check_items(&rgb_first),
            Err(LasZipError::FirstItemNotPoint14(LazItemType::RGB14))
        ));

        let old_nir = [
            LazItem::new(LazItemType::Point14, 4),
            LazItem::new(LazItemType::RGBNIR14, 2),
        ];
        assert!(matches!(
            check_items(&old_nir),
            Err(LasZipError::UnsupportedLazItemVersion(LazItemType::RGBNIR14, 2))
        ));

        let layered = [
            LazItem::new(LazItemType::Point14, 3),
            LazItem::new(LazItemType::Byte14(4), 4),
        ];
        assert!(check_items(&layered).is_ok());
    }

    #[test]
    fn record_compressor_refuses_items_not_starting_with_point14() {
        let items = [LazItem::new(LazItemType::WavePacket14, 3)];
        let result = record_compressor_from_laz_items(&items, std::io::Cursor::new(Vec::new()));
        assert!(matches!(
            result,
            Err(LasZipError::FirstItemNotPoint14(LazItemType::WavePacket14))
        ));
    }
}
