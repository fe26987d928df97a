//! Selection of the layers to decode.

/// Bit set of the optional layers a decompressor should decode.
///
/// The layer holding the coordinates, the return numbers and the
/// scanner channel is always decoded. A layer that is not selected is
/// skipped in the input and its field keeps the value it had in the
/// first point of the chunk.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct DecompressionSelection(pub u32);

/// Declares the bit of each optional layer, with the methods that
/// select it, skip it and query it.
macro_rules! optional_layers {
    ($($(#[$doc:meta])* $mask:ident = $bit:expr => $select:ident, $skip:ident, $query:ident;)+) => {
        impl DecompressionSelection {
            $(
                $(#[$doc])*
                pub const $mask: u32 = 1 << $bit;
            )+

            $(
                pub fn $select(self) -> Self {
                    Self(self.0 | Self::$mask)
                }

                pub fn $skip(self) -> Self {
                    Self(self.0 & !Self::$mask)
                }

                pub fn $query(self) -> bool {
                    self.0 & Self::$mask != 0
                }
            )+
        }
    };
}

optional_layers! {
    Z = 0 => decompress_z, skip_z, should_decompress_z;
    CLASSIFICATION = 1 => decompress_classification, skip_classification,
        should_decompress_classification;
    /// Classification flags, scan direction and edge of flight line
    FLAGS = 2 => decompress_flags, skip_flags, should_decompress_flags;
    INTENSITY = 3 => decompress_intensity, skip_intensity, should_decompress_intensity;
    SCAN_ANGLE = 4 => decompress_scan_angle, skip_scan_angle, should_decompress_scan_angle;
    USER_DATA = 5 => decompress_user_data, skip_user_data, should_decompress_user_data;
    POINT_SOURCE_ID = 6 => decompress_point_source_id, skip_point_source_id,
        should_decompress_point_source_id;
    GPS_TIME = 7 => decompress_gps_time, skip_gps_time, should_decompress_gps_time;
    RGB = 8 => decompress_rgb, skip_rgb, should_decompress_rgb;
    NIR = 9 => decompress_nir, skip_nir, should_decompress_nir;
    WAVEPACKET = 10 => decompress_wavepacket, skip_wavepacket, should_decompress_wavepacket;
    /// Every extra byte, they are selected together
    ALL_EXTRA_BYTES = 11 => decompress_extra_bytes, skip_extra_bytes,
        should_decompress_extra_bytes;
}

impl DecompressionSelection {
    pub const ALL: u32 = u32::MAX;
    /// The layer that is always decoded, no bit
    pub const XY_RETURNS_CHANNEL: u32 = 0;

    /// Every layer is decoded.
    pub fn all() -> Self {
        Self(Self::ALL)
    }

    /// Only x, y, the return number, the number of returns
    /// and the scanner channel are decoded.
    pub fn base() -> Self {
        Self(Self::XY_RETURNS_CHANNEL)
    }
}

impl Default for DecompressionSelection {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_decodes_everything() {
        let selection = DecompressionSelection::default();
        assert!(selection.should_decompress_z());
        assert!(selection.should_decompress_gps_time());
        assert!(selection.should_decompress_nir());
        assert!(selection.should_decompress_extra_bytes());
    }

    #[test]
    fn setters_only_touch_their_bit() {
        let selection = DecompressionSelection::base()
            .decompress_intensity()
            .decompress_rgb();
        assert_eq!(
            selection.0,
            DecompressionSelection::INTENSITY | DecompressionSelection::RGB
        );
        assert!(!selection.should_decompress_z());

        let selection = DecompressionSelection::all().skip_gps_time().skip_wavepacket();
        assert!(!selection.should_decompress_gps_time());
        assert!(!selection.should_decompress_wavepacket());
        assert!(selection.should_decompress_point_source_id());
    }
}
