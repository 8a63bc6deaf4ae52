use glam::{uvec2, UVec2, Vec4};

use crate::gpu;

/// Decoded environment map plus its sampling distribution, ready for upload.
#[derive(Clone, Debug)]
pub struct EnvMap {
    pixels: Vec<Vec4>,
    cdf: Vec<f32>,
    size: UVec2,
}

impl EnvMap {
    /// Decodes given image into linear radiance; returns `None` for an empty
    /// image, which callers are expected to treat as "no environment map".
    pub fn from_image(image: &image::DynamicImage) -> Option<Self> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }

        let pixels = image
            .to_rgba32f()
            .pixels()
            .map(|pixel| Vec4::new(pixel[0], pixel[1], pixel[2], pixel[3]))
            .collect();

        Some(Self::from_pixels(
            pixels,
            uvec2(image.width(), image.height()),
        ))
    }

    /// Decodes given image off-thread; decoding plus the CDF build can take
    /// a while for large maps, and this way it overlaps scene setup the same
    /// way kernel compilation does.
    pub fn from_image_in_background(
        image: image::DynamicImage,
    ) -> std::thread::JoinHandle<Option<Self>> {
        std::thread::spawn(move || Self::from_image(&image))
    }

    pub fn from_pixels(pixels: Vec<Vec4>, size: UVec2) -> Self {
        assert_eq!(pixels.len(), (size.x * size.y) as usize);

        let cdf = gpu::build_cdf(&pixels, size);

        Self { pixels, cdf, size }
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn cdf(&self) -> &[f32] {
        &self.cdf
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_is_rejected() {
        let image = image::DynamicImage::new_rgb8(0, 0);

        assert!(EnvMap::from_image(&image).is_none());
    }

    #[test]
    fn decoded_map_carries_its_distribution() {
        let image = image::DynamicImage::new_rgb8(8, 4);
        let map = EnvMap::from_image(&image).unwrap();

        assert_eq!(map.size(), uvec2(8, 4));
        assert_eq!(map.pixels().len(), 32);

        // `height + 1` marginal entries plus `width + 1` per row
        assert_eq!(map.cdf().len(), 5 + 4 * 9);
    }
}
