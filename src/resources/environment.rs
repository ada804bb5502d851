//! Loading of Radiance HDR panoramas.

use anyhow::Context as _;
use image::{ImageFormat, load_from_memory_with_format};

use crate::resources::texture::load_binary;

/// An equirectangular panorama in linear RGBA, 32-bit float per channel.
#[derive(Clone, Debug)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl HdrImage {
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Halves both dimensions (never below one pixel), averaging 2x2 blocks.
    pub fn downsample(&self) -> HdrImage {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let (x0, y0) = ((x * 2).min(self.width - 1), (y * 2).min(self.height - 1));
                let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
                let texels = [
                    self.pixel(x0, y0),
                    self.pixel(x1, y0),
                    self.pixel(x0, y1),
                    self.pixel(x1, y1),
                ];
                for c in 0..4 {
                    pixels.push(texels.iter().map(|t| t[c]).sum::<f32>() * 0.25);
                }
            }
        }
        HdrImage {
            width,
            height,
            pixels,
        }
    }

    /// The image and its downsampled versions, down to a single row or
    /// column. The first level is already shrunk to fit `max_dimension`.
    pub fn mip_chain(&self, max_dimension: u32) -> Vec<HdrImage> {
        let mut level = self.clone();
        while level.width > max_dimension || level.height > max_dimension {
            level = level.downsample();
        }
        let mut chain = Vec::new();
        while level.width > 1 && level.height > 1 {
            let next = level.downsample();
            chain.push(std::mem::replace(&mut level, next));
        }
        chain.push(level);
        chain
    }
}

pub fn decode_hdr(bytes: &[u8]) -> anyhow::Result<HdrImage> {
    let img = load_from_memory_with_format(bytes, ImageFormat::Hdr)
        .context("not a valid Radiance HDR image")?;
    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    Ok(HdrImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

pub async fn load_hdri(url: &str) -> anyhow::Result<HdrImage> {
    let bytes = load_binary(url)
        .await
        .with_context(|| format!("failed to fetch environment {}", url))?;
    let image = decode_hdr(&bytes)?;
    log::info!(
        "Decoded environment {} ({}x{})",
        url,
        image.width,
        image.height
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uncompressed RGBE scanlines, valid because the width is below 8.
    fn radiance(width: usize, height: usize, pixel: impl Fn(usize, usize) -> [u8; 4]) -> Vec<u8> {
        let mut bytes =
            format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y {} +X {}\n", height, width)
                .into_bytes();
        for y in 0..height {
            for x in 0..width {
                bytes.extend_from_slice(&pixel(x, y));
            }
        }
        bytes
    }

    #[test]
    fn decodes_dimensions_and_brightness() {
        let bytes = radiance(4, 2, |x, _| if x == 0 { [128, 128, 128, 129] } else { [0, 0, 0, 0] });
        let image = decode_hdr(&bytes).unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.pixels.len(), 4 * 2 * 4);
        let bright = image.pixel(0, 1);
        let dark = image.pixel(3, 1);
        assert!(bright[0] > 0.5, "{:?}", bright);
        assert_eq!(dark[0], 0.0);
        assert_eq!(bright[3], 1.0);
    }

    fn flat(width: u32, height: u32, value: f32) -> HdrImage {
        HdrImage {
            width,
            height,
            pixels: vec![value; (width * height * 4) as usize],
        }
    }

    #[test]
    fn downsampling_averages_blocks() {
        let mut image = flat(2, 2, 0.0);
        image.pixels[0] = 4.0;
        let half = image.downsample();
        assert_eq!((half.width, half.height), (1, 1));
        assert_eq!(half.pixel(0, 0)[0], 1.0);
    }

    #[test]
    fn mip_chain_fits_the_limit_and_halves() {
        let chain = flat(64, 32, 1.0).mip_chain(32);
        let sizes: Vec<_> = chain.iter().map(|level| (level.width, level.height)).collect();
        assert_eq!(sizes, vec![(32, 16), (16, 8), (8, 4), (4, 2), (2, 1)]);
        assert!(chain.iter().all(|level| level.pixel(0, 0)[0] == 1.0));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_hdr(b"definitely not an image").is_err());
    }
}
