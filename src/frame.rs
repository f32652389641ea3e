use crate::error::{QualityError, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use std::path::Path;

/// One captured still, stored as interleaved 8-bit RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl Frame {
    /// Black frame of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize) * 3;
        Self {
            data: vec![0u8; size],
            width,
            height,
            channels: 3,
        }
    }

    pub fn from_raw(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let frame = Self {
            data,
            width,
            height,
            channels,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_raw(width, height, 3, rgb.into_raw())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            QualityError::InvalidFrame(format!("cannot decode {}: {}", path.display(), e))
        })?;
        Self::from_image(&image)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(QualityError::InvalidFrame("frame buffer is empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(QualityError::InvalidFrame(format!(
                "frame has zero area ({}x{})",
                self.width, self.height
            )));
        }
        if self.channels != 3 {
            return Err(QualityError::InvalidFrame(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        let expected = self.pixel_count() * 3;
        if self.data.len() != expected {
            return Err(QualityError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{}x3 needs {}",
                self.data.len(),
                self.width,
                self.height,
                expected
            )));
        }
        Ok(())
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        self.validate()?;
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| QualityError::InvalidFrame("failed to create image buffer".into()))
    }

    pub fn rows(&self) -> u32 {
        self.height
    }

    pub fn cols(&self) -> u32 {
        self.width
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    /// Luma plane using the ITU-R BT.601 weights.
    pub fn to_gray(&self) -> GrayImage {
        let luma: Vec<u8> = self
            .pixels()
            .map(|[r, g, b]| {
                let y = r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    /// Row-major HSV triplets, hue in 0..=180.
    pub fn to_hsv(&self) -> Vec<[u8; 3]> {
        self.pixels().map(|[r, g, b]| rgb_to_hsv(r, g, b)).collect()
    }
}

/// 8-bit RGB to HSV in the half-degree hue convention (H 0..=180, S and V 0..=255).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        60.0 * (bf - rf) / delta + 120.0
    } else {
        60.0 * (rf - gf) / delta + 240.0
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        max as u8,
    ]
}
