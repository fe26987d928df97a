//! Synthetic point records for the integration tests.
#![allow(dead_code)]

use laz14::las::{LasWavepacket, Nir, Point6, RGB};
use laz14::packers::Packable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates points that look like the output of a multi-channel scanner:
/// slowly moving coordinates, pulses of 1 to 5 returns
/// and regularly spaced gps times.
pub struct PointGenerator {
    rng: StdRng,
    num_channels: u8,
    last: Point6,
    rgb: RGB,
    nir: u16,
    wavepacket: LasWavepacket,
    remaining_returns: u8,
}

impl PointGenerator {
    pub fn new(seed: u64, num_channels: u8) -> Self {
        let mut last = Point6::default();
        last.x = 1_000_000;
        last.y = 2_000_000;
        last.z = 500;
        last.gps_time = 250_000.0;
        last.point_source_id = 12;
        Self {
            rng: seeded_rng(seed),
            num_channels,
            last,
            rgb: RGB {
                red: 30_000,
                green: 31_000,
                blue: 29_000,
            },
            nir: 40_000,
            wavepacket: LasWavepacket {
                descriptor_index: 1,
                offset: 4096,
                size: 256,
                return_point: 12.5,
                dx: 0.25,
                dy: -0.5,
                dz: 1.0,
            },
            remaining_returns: 0,
        }
    }

    pub fn next_point(&mut self) -> Point6 {
        let rng = &mut self.rng;
        let mut p = self.last;

        if self.remaining_returns == 0 {
            let n = rng.gen_range(1..=5u8);
            p.set_number_of_returns(n);
            p.set_return_number(1);
            self.remaining_returns = n - 1;
            p.gps_time += 0.000_01;
            if rng.gen_bool(0.01) {
                // a new flight line
                p.gps_time += 120.0;
                p.point_source_id = p.point_source_id.wrapping_add(1);
            }
            p.set_scanner_channel(rng.gen_range(0..self.num_channels));
            p.x = p.x.wrapping_add(rng.gen_range(-50..50));
            p.y = p.y.wrapping_add(rng.gen_range(-50..50));
            p.scan_angle = rng.gen_range(-15_000..15_000);
            p.set_scan_direction_flag(rng.gen_bool(0.5));
            p.set_edge_of_flight_line(rng.gen_bool(0.02));
        } else {
            p.set_return_number(p.return_number() + 1);
            self.remaining_returns -= 1;
            p.x = p.x.wrapping_add(rng.gen_range(-3..3));
            p.y = p.y.wrapping_add(rng.gen_range(-3..3));
        }
        p.z = p.z.wrapping_add(rng.gen_range(-200..200));
        p.intensity = rng.gen_range(0..4096);
        p.classification = [1u8, 2, 2, 2, 5, 6][rng.gen_range(0..6)];
        p.set_classification_flags(if rng.gen_bool(0.05) { 1 } else { 0 });
        if rng.gen_bool(0.1) {
            p.user_data = rng.gen();
        }

        self.last = p;
        p
    }

    pub fn next_rgb(&mut self) -> RGB {
        let rng = &mut self.rng;
        if rng.gen_bool(0.2) {
            let gray = rng.gen();
            self.rgb = RGB {
                red: gray,
                green: gray,
                blue: gray,
            };
        } else {
            self.rgb.red = self.rgb.red.wrapping_add(rng.gen_range(0..512));
            self.rgb.green = self.rgb.green.wrapping_sub(rng.gen_range(0..512));
            self.rgb.blue = self.rgb.blue.wrapping_add(rng.gen_range(0..16));
        }
        self.rgb
    }

    pub fn next_nir(&mut self) -> Nir {
        if self.rng.gen_bool(0.7) {
            self.nir = self.nir.wrapping_add(self.rng.gen_range(0..300));
        }
        Nir(self.nir)
    }

    pub fn next_wavepacket(&mut self) -> LasWavepacket {
        let rng = &mut self.rng;
        let wp = &mut self.wavepacket;
        wp.offset += u64::from(wp.size);
        if rng.gen_bool(0.05) {
            // waveform stored far away
            wp.offset += 1 << 40;
        }
        if rng.gen_bool(0.1) {
            wp.size = rng.gen_range(64..1024);
            wp.descriptor_index = rng.gen_range(1..4);
        }
        wp.return_point = rng.gen_range(0.0..100.0);
        wp.dx = rng.gen_range(-1.0..1.0);
        wp.dy = rng.gen_range(-1.0..1.0);
        wp.dz = rng.gen_range(-1.0..1.0);
        *wp
    }

    /// Extra bytes where the first byte is a counter,
    /// the second one is constant and the rest is noise.
    pub fn next_extra_bytes(&mut self, out: &mut [u8]) {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = match i {
                0 => byte.wrapping_add(1),
                1 => 42,
                _ => self.rng.gen(),
            };
        }
    }

    /// Writes `num_points` records of the given point format,
    /// followed by `num_extra_bytes` extra bytes, in LAS layout.
    pub fn records(&mut self, point_format_id: u8, num_extra_bytes: usize, num_points: usize) -> Vec<u8> {
        let size = record_size(point_format_id, num_extra_bytes);
        let mut data = vec![0u8; size * num_points];
        let mut extra = vec![0u8; num_extra_bytes];
        for record in data.chunks_exact_mut(size) {
            let point = self.next_point();
            point.pack_into(&mut record[..Point6::SIZE]);
            let mut offset = Point6::SIZE;
            if matches!(point_format_id, 7 | 8 | 10) {
                self.next_rgb().pack_into(&mut record[offset..offset + RGB::SIZE]);
                offset += RGB::SIZE;
            }
            if matches!(point_format_id, 8 | 10) {
                self.next_nir().pack_into(&mut record[offset..offset + Nir::SIZE]);
                offset += Nir::SIZE;
            }
            if matches!(point_format_id, 9 | 10) {
                self.next_wavepacket()
                    .pack_into(&mut record[offset..offset + LasWavepacket::SIZE]);
                offset += LasWavepacket::SIZE;
            }
            self.next_extra_bytes(&mut extra);
            record[offset..].copy_from_slice(&extra);
        }
        data
    }
}

pub fn record_size(point_format_id: u8, num_extra_bytes: usize) -> usize {
    let base = match point_format_id {
        6 => Point6::SIZE,
        7 => Point6::SIZE + RGB::SIZE,
        8 => Point6::SIZE + RGB::SIZE + Nir::SIZE,
        9 => Point6::SIZE + LasWavepacket::SIZE,
        10 => Point6::SIZE + RGB::SIZE + Nir::SIZE + LasWavepacket::SIZE,
        _ => panic!("point format {} is not a LAS 1.4 format", point_format_id),
    };
    base + num_extra_bytes
}
