//! Packing decoded planes into bytes.

use crate::error::{DecodeError, Result};
use crate::host::{PixelSink, Plane};

/// Decoded pixel data packed into bytes.
///
/// Single-component images keep their full precision: samples are stored in
/// `bytes_per_sample` little-endian bytes. Images with three or four components
/// are interleaved with one byte per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageData {
    /// The width of the image.
    pub width: u32,
    /// The height of the image.
    pub height: u32,
    /// The number of interleaved channels (1, 3 or 4).
    pub channels: u8,
    /// The number of bytes used for each sample.
    pub bytes_per_sample: u8,
    /// The packed samples.
    pub data: Vec<u8>,
}

impl ImageData {
    /// Create an empty buffer, to be filled by a decode call.
    pub fn new() -> Self {
        Self::default()
    }

    fn interleave(&mut self, planes: &[Plane<'_>], pixel_count: usize) -> Result<()> {
        let planes = planes
            .iter()
            .map(|p| p.samples.get(..pixel_count))
            .collect::<Option<Vec<_>>>()
            .ok_or(DecodeError::IncompletePlane)?;

        self.data = Vec::with_capacity(pixel_count * planes.len());

        for i in 0..pixel_count {
            for plane in &planes {
                self.data.push(clamp_u8(plane[i]));
            }
        }

        self.channels = planes.len() as u8;
        self.bytes_per_sample = 1;

        Ok(())
    }
}

impl PixelSink for ImageData {
    fn begin(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn single_plane(&mut self, plane: Plane<'_>, pixel_count: usize) -> Result<()> {
        let bytes = plane.precision.div_ceil(8);
        let samples = plane
            .samples
            .get(..pixel_count)
            .ok_or(DecodeError::IncompletePlane)?;

        self.data = match bytes {
            1 => samples.iter().map(|s| clamp_u8(*s)).collect(),
            2..=4 => samples
                .iter()
                .flat_map(|s| {
                    // Two's complement bits, truncated to the sample width.
                    let le = s.to_le_bytes();
                    le.into_iter().take(bytes as usize)
                })
                .collect(),
            _ => return Err(DecodeError::UnsupportedPrecision(plane.precision)),
        };

        self.channels = 1;
        self.bytes_per_sample = bytes as u8;

        Ok(())
    }

    fn three_planes(&mut self, planes: [Plane<'_>; 3], pixel_count: usize) -> Result<()> {
        self.interleave(&planes, pixel_count)
    }

    fn four_planes(&mut self, planes: [Plane<'_>; 4], pixel_count: usize) -> Result<()> {
        self.interleave(&planes, pixel_count)
    }
}

#[inline(always)]
fn clamp_u8(sample: i32) -> u8 {
    sample.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(samples: &[i32], precision: u32) -> Plane<'_> {
        Plane { samples, precision }
    }

    #[test]
    fn gray_8bit_is_clamped() {
        let mut data = ImageData::new();
        data.begin(4, 1);
        data.single_plane(plane(&[-5, 0, 200, 300], 8), 4).unwrap();

        assert_eq!(data.data, vec![0, 0, 200, 255]);
        assert_eq!((data.width, data.height), (4, 1));
        assert_eq!((data.channels, data.bytes_per_sample), (1, 1));
    }

    #[test]
    fn low_precision_uses_one_byte() {
        let mut data = ImageData::new();
        data.single_plane(plane(&[0, 1, 1], 1), 3).unwrap();

        assert_eq!(data.data, vec![0, 1, 1]);
        assert_eq!(data.bytes_per_sample, 1);
    }

    #[test]
    fn gray_12bit_is_little_endian() {
        let mut data = ImageData::new();
        data.single_plane(plane(&[0x0ABC, 0x0001], 12), 2).unwrap();

        assert_eq!(data.data, vec![0xBC, 0x0A, 0x01, 0x00]);
        assert_eq!(data.bytes_per_sample, 2);
    }

    #[test]
    fn wide_samples_are_masked() {
        let mut data = ImageData::new();
        data.single_plane(plane(&[0x0123_4567, -1], 24), 2).unwrap();

        assert_eq!(data.data, vec![0x67, 0x45, 0x23, 0xFF, 0xFF, 0xFF]);
        assert_eq!(data.bytes_per_sample, 3);

        data.single_plane(plane(&[0x0123_4567], 32), 1).unwrap();
        assert_eq!(data.data, vec![0x67, 0x45, 0x23, 0x01]);
        assert_eq!(data.bytes_per_sample, 4);
    }

    #[test]
    fn unsupported_precision() {
        let mut data = ImageData::new();

        assert_eq!(
            data.single_plane(plane(&[1], 0), 1),
            Err(DecodeError::UnsupportedPrecision(0))
        );
        assert_eq!(
            data.single_plane(plane(&[1], 33), 1),
            Err(DecodeError::UnsupportedPrecision(33))
        );
    }

    #[test]
    fn rgb_is_interleaved_and_clamped() {
        let mut data = ImageData::new();
        data.three_planes(
            [
                plane(&[1, 400], 8),
                plane(&[2, 5], 8),
                plane(&[3, -1], 8),
            ],
            2,
        )
        .unwrap();

        assert_eq!(data.data, vec![1, 2, 3, 255, 5, 0]);
        assert_eq!((data.channels, data.bytes_per_sample), (3, 1));
    }

    #[test]
    fn four_planes_are_interleaved() {
        let mut data = ImageData::new();
        data.four_planes(
            [
                plane(&[10, 11], 8),
                plane(&[20, 21], 8),
                plane(&[30, 31], 8),
                plane(&[40, 41], 8),
            ],
            2,
        )
        .unwrap();

        assert_eq!(data.data, vec![10, 20, 30, 40, 11, 21, 31, 41]);
        assert_eq!(data.channels, 4);
    }

    #[test]
    fn short_planes_are_rejected() {
        let mut data = ImageData::new();

        assert_eq!(
            data.single_plane(plane(&[1], 8), 2),
            Err(DecodeError::IncompletePlane)
        );
        assert_eq!(
            data.three_planes([plane(&[1, 2], 8), plane(&[1], 8), plane(&[1, 2], 8)], 2),
            Err(DecodeError::IncompletePlane)
        );
    }
}
