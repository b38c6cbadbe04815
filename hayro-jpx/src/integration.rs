//! Integration with the [image] crate

use crate::ImageData;
use ::image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};

impl ImageData {
    /// Convert the decoded pixels into a [`DynamicImage`].
    ///
    /// Returns `None` for sample layouts `image` has no buffer type for, i.e.
    /// single-component images with more than 16 bits per sample.
    pub fn into_dynamic_image(self) -> Option<DynamicImage> {
        let Self {
            width,
            height,
            channels,
            bytes_per_sample,
            data,
        } = self;

        match (channels, bytes_per_sample) {
            (1, 1) => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            (1, 2) => {
                let samples = data
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();

                ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, samples)
                    .map(DynamicImage::ImageLuma16)
            }
            (3, 1) => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            (4, 1) => RgbaImage::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }
}
