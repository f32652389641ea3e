//! Raw image measurements.
//!
//! Every metric is a pure function of the frame (plus the crop colour band for
//! the colour metrics). Nothing here keeps state between frames.

use crate::crop::HsvBand;
use crate::error::Result;
use crate::frame::Frame;
use crate::thresholds::ThresholdSet;
use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::filter::{filter3x3, median_filter};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Brightness,
    Contrast,
    Sharpness,
    GreenCoverage,
    TextureVariance,
    Focus,
    Noise,
    CropHealth,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Brightness,
        Metric::Contrast,
        Metric::Sharpness,
        Metric::GreenCoverage,
        Metric::TextureVariance,
        Metric::Focus,
        Metric::Noise,
        Metric::CropHealth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Brightness => "brightness",
            Metric::Contrast => "contrast",
            Metric::Sharpness => "sharpness",
            Metric::GreenCoverage => "green_coverage",
            Metric::TextureVariance => "texture_variance",
            Metric::Focus => "focus",
            Metric::Noise => "noise",
            Metric::CropHealth => "crop_health",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Share of vegetation pixels per colour class, plus the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthBreakdown {
    pub score: f64,
    pub healthy_ratio: f64,
    pub stressed_ratio: f64,
    pub diseased_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
    pub green_coverage: f64,
    pub texture_variance: f64,
    pub focus: f64,
    pub noise: f64,
    pub crop_health: f64,
    #[serde(skip)]
    pub health: HealthBreakdown,
}

impl FrameMetrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Brightness => self.brightness,
            Metric::Contrast => self.contrast,
            Metric::Sharpness => self.sharpness,
            Metric::GreenCoverage => self.green_coverage,
            Metric::TextureVariance => self.texture_variance,
            Metric::Focus => self.focus,
            Metric::Noise => self.noise,
            Metric::CropHealth => self.crop_health,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

// Sharpness blend: Laplacian variance misses directional blur, Sobel catches it.
const LAPLACIAN_WEIGHT: f64 = 0.7;
const SOBEL_WEIGHT: f64 = 0.3;

// Hue bands (half-degree scale) below the crop's green band.
const STRESSED_HUE_MIN: u8 = 20;
const DISEASED_HUE_MIN: u8 = 10;

#[derive(Debug, Clone)]
pub struct MetricExtractor {
    /// Side of the sliding window used for local texture variance
    pub texture_window: u32,
    /// Longest side the frame is reduced to before the FFT
    pub focus_max_side: u32,
    /// Normalised radius (1.0 = Nyquist) where the high-frequency band starts
    pub focus_cutoff: f64,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self {
            texture_window: 5,
            focus_max_side: 256,
            focus_cutoff: 0.25,
        }
    }
}

impl MetricExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, frame: &Frame, thresholds: &ThresholdSet) -> Result<FrameMetrics> {
        frame.validate()?;

        let gray = frame.to_gray();
        let hsv = frame.to_hsv();

        let (brightness, contrast) = mean_and_std(&gray);
        let health = crop_health(&hsv, &thresholds.green_band);

        let metrics = FrameMetrics {
            brightness,
            contrast,
            sharpness: sharpness(&gray),
            green_coverage: green_coverage(&hsv, &thresholds.green_band),
            texture_variance: texture_variance(&gray, self.texture_window),
            focus: self.focus(&gray),
            noise: noise_level(&gray),
            crop_health: health.score,
            health,
        };

        debug!(
            "Metrics {}x{}: brightness {:.1}, contrast {:.1}, sharpness {:.1}, coverage {:.3}, focus {:.3}",
            frame.cols(),
            frame.rows(),
            metrics.brightness,
            metrics.contrast,
            metrics.sharpness,
            metrics.green_coverage,
            metrics.focus
        );
        Ok(metrics)
    }

    /// Share of spectral magnitude above the cutoff radius, DC excluded.
    pub fn focus(&self, gray: &GrayImage) -> f64 {
        let (w, h) = gray.dimensions();
        let longest = w.max(h);
        let reduced;
        let img = if longest > self.focus_max_side {
            let scale = self.focus_max_side as f64 / longest as f64;
            let nw = ((w as f64 * scale).round() as u32).max(1);
            let nh = ((h as f64 * scale).round() as u32).max(1);
            reduced = imageops::resize(gray, nw, nh, FilterType::Triangle);
            &reduced
        } else {
            gray
        };
        high_frequency_ratio(img, self.focus_cutoff)
    }
}

pub fn mean_and_std(gray: &GrayImage) -> (f64, f64) {
    let n = gray.as_raw().len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = gray.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let variance = gray
        .as_raw()
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    (mean, variance.sqrt())
}

const K_LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Variance of the 4-neighbour Laplacian over interior pixels.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let lap: Vec<f32> = filter3x3(gray, &K_LAPLACIAN).into_raw();
    let (w, h) = (width as usize, height as usize);
    // Border responses see replicated edges; keep the interior only.
    let values: Vec<f64> = (1..h - 1)
        .flat_map(|y| (1..w - 1).map(move |x| y * w + x))
        .map(|i| lap[i] as f64)
        .collect();

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn sobel_magnitude_mean(gray: &GrayImage) -> f64 {
    let n = gray.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    gx.as_raw()
        .iter()
        .zip(gy.as_raw().iter())
        .map(|(&x, &y)| ((x as f64).powi(2) + (y as f64).powi(2)).sqrt())
        .sum::<f64>()
        / n as f64
}

pub fn sharpness(gray: &GrayImage) -> f64 {
    laplacian_variance(gray) * LAPLACIAN_WEIGHT + sobel_magnitude_mean(gray) * SOBEL_WEIGHT
}

pub fn green_coverage(hsv: &[[u8; 3]], band: &HsvBand) -> f64 {
    if hsv.is_empty() {
        return 0.0;
    }
    let inside = hsv.iter().filter(|&&p| band.contains(p)).count();
    inside as f64 / hsv.len() as f64
}

/// Mean of the local grayscale variance over every `window`-sized square.
pub fn texture_variance(gray: &GrayImage, window: u32) -> f64 {
    let (w, h) = gray.dimensions();
    let win = window.max(1).min(w).min(h) as usize;
    if win == 0 {
        return 0.0;
    }
    let (w, h) = (w as usize, h as usize);

    // Summed-area tables with a zero border row/column.
    let stride = w + 1;
    let mut sum = vec![0f64; stride * (h + 1)];
    let mut sq = vec![0f64; stride * (h + 1)];
    let raw = gray.as_raw();
    for y in 0..h {
        let mut row_sum = 0.0;
        let mut row_sq = 0.0;
        for x in 0..w {
            let v = raw[y * w + x] as f64;
            row_sum += v;
            row_sq += v * v;
            sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
            sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
        }
    }

    let area = (win * win) as f64;
    let box_sum = |t: &[f64], x: usize, y: usize| {
        t[(y + win) * stride + x + win] - t[y * stride + x + win] - t[(y + win) * stride + x]
            + t[y * stride + x]
    };

    let mut total = 0.0;
    let mut count = 0usize;
    for y in 0..=h - win {
        for x in 0..=w - win {
            let mean = box_sum(&sum, x, y) / area;
            let var = box_sum(&sq, x, y) / area - mean * mean;
            total += var.max(0.0);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// 2-D FFT (rows then columns) of the mean-removed image; returns the share of
/// magnitude whose normalised radius exceeds `cutoff`.
pub fn high_frequency_ratio(gray: &GrayImage, cutoff: f64) -> f64 {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let raw = gray.as_raw();
    let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / raw.len() as f64;
    let mut buf: Vec<Complex<f64>> = raw
        .iter()
        .map(|&v| Complex::new(v as f64 - mean, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(w);
    for row in buf.chunks_exact_mut(w) {
        row_fft.process(row);
    }

    let col_fft = planner.plan_fft_forward(h);
    let mut column = vec![Complex::new(0.0, 0.0); h];
    for x in 0..w {
        for y in 0..h {
            column[y] = buf[y * w + x];
        }
        col_fft.process(&mut column);
        for y in 0..h {
            buf[y * w + x] = column[y];
        }
    }

    let mut total = 0.0;
    let mut high = 0.0;
    for v in 0..h {
        let fv = v.min(h - v) as f64 / h as f64;
        for u in 0..w {
            if u == 0 && v == 0 {
                continue;
            }
            let fu = u.min(w - u) as f64 / w as f64;
            let radius = (fu * fu + fv * fv).sqrt() / 0.5;
            let magnitude = buf[v * w + u].norm();
            total += magnitude;
            if radius > cutoff {
                high += magnitude;
            }
        }
    }

    if total <= f64::EPSILON {
        0.0
    } else {
        high / total
    }
}

/// Mean absolute residual after a 3x3 median filter.
pub fn noise_level(gray: &GrayImage) -> f64 {
    let n = gray.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let smoothed = median_filter(gray, 1, 1);
    gray.as_raw()
        .iter()
        .zip(smoothed.as_raw().iter())
        .map(|(&a, &b)| (a as f64 - b as f64).abs())
        .sum::<f64>()
        / n as f64
}

/// Colour-based health proxy over the vegetation mask.
///
/// The mask keeps pixels with the crop band's minimum saturation and value and a
/// hue anywhere from brown to the top of the green band. Inside it, green pixels
/// count fully, yellow ones half and brown ones not at all; saturated foliage and
/// an even value distribution add to the score.
pub fn crop_health(hsv: &[[u8; 3]], band: &HsvBand) -> HealthBreakdown {
    let green_min = band.lower[0];
    let mut healthy = 0usize;
    let mut stressed = 0usize;
    let mut diseased = 0usize;
    let mut healthy_sat = 0f64;
    let mut values = Vec::new();

    for &[h, s, v] in hsv {
        if s < band.lower[1] || v < band.lower[2] || h < DISEASED_HUE_MIN || h > band.upper[0] {
            continue;
        }
        values.push(v as f64);
        if h >= green_min {
            healthy += 1;
            healthy_sat += s as f64;
        } else if h >= STRESSED_HUE_MIN {
            stressed += 1;
        } else {
            diseased += 1;
        }
    }

    let vegetation = values.len();
    if vegetation == 0 {
        return HealthBreakdown::default();
    }

    let n = vegetation as f64;
    let healthy_ratio = healthy as f64 / n;
    let stressed_ratio = stressed as f64 / n;
    let diseased_ratio = diseased as f64 / n;

    let hue_score = healthy_ratio + 0.5 * stressed_ratio;
    let saturation = if healthy > 0 {
        healthy_sat / healthy as f64 / 255.0
    } else {
        0.0
    };
    let v_mean = values.iter().sum::<f64>() / n;
    let v_std = (values.iter().map(|v| (v - v_mean).powi(2)).sum::<f64>() / n).sqrt();
    let uniformity = 1.0 - (v_std / 64.0).min(1.0);

    HealthBreakdown {
        score: (0.7 * hue_score + 0.2 * saturation + 0.1 * uniformity).clamp(0.0, 1.0),
        healthy_ratio,
        stressed_ratio,
        diseased_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{CropType, WeatherCondition};
    use crate::thresholds::ThresholdResolver;
    use image::Luma;

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([30])
            } else {
                Luma([220])
            }
        })
    }

    #[test]
    fn flat_image_has_no_detail() {
        let gray = GrayImage::from_pixel(32, 32, Luma([128]));
        assert_eq!(mean_and_std(&gray), (128.0, 0.0));
        assert_eq!(laplacian_variance(&gray), 0.0);
        assert_eq!(sobel_magnitude_mean(&gray), 0.0);
        assert_eq!(texture_variance(&gray, 5), 0.0);
        assert_eq!(high_frequency_ratio(&gray, 0.25), 0.0);
        assert_eq!(noise_level(&gray), 0.0);
    }

    #[test]
    fn laplacian_of_a_single_spike() {
        let mut gray = GrayImage::new(5, 5);
        gray.put_pixel(2, 2, Luma([100]));
        // Interior responses: -400 at the spike, 100 at its four neighbours.
        let expected = (400.0f64.powi(2) + 4.0 * 100.0f64.powi(2)) / 9.0;
        assert!((laplacian_variance(&gray) - expected).abs() < 1e-6);
    }

    #[test]
    fn fine_detail_beats_coarse_detail() {
        let fine = checkerboard(64, 2);
        let coarse = checkerboard(64, 16);
        assert!(sharpness(&fine) > sharpness(&coarse));
        assert!(texture_variance(&fine, 5) > texture_variance(&coarse, 5));
        assert!(high_frequency_ratio(&fine, 0.25) > high_frequency_ratio(&coarse, 0.25));
    }

    #[test]
    fn blur_lowers_focus_and_sharpness() {
        // Deterministic broadband texture
        let sharp = GrayImage::from_fn(64, 64, |x, y| {
            Luma([((x * 7919 + y * 104_729 + x * y * 31) % 251) as u8])
        });
        let blurred = imageops::blur(&sharp, 2.0);
        assert!(sharpness(&sharp) > sharpness(&blurred));
        assert!(high_frequency_ratio(&sharp, 0.25) > high_frequency_ratio(&blurred, 0.25));
    }

    #[test]
    fn texture_window_larger_than_frame_is_clamped() {
        let gray = checkerboard(3, 1);
        assert!(texture_variance(&gray, 9) > 0.0);
    }

    #[test]
    fn green_field_is_covered_and_healthy() {
        let frame = Frame::from_raw(4, 4, 3, [20u8, 180, 30].repeat(16)).unwrap();
        let t = ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear);
        let metrics = MetricExtractor::new().extract(&frame, &t).unwrap();
        assert_eq!(metrics.green_coverage, 1.0);
        assert!(metrics.crop_health > 0.9);
        assert_eq!(metrics.health.healthy_ratio, 1.0);
    }

    #[test]
    fn yellowing_lowers_health() {
        let band = CropType::General.profile().green_band;
        let green = vec![[60u8, 200, 150]; 10];
        let mut mixed = vec![[60u8, 200, 150]; 5];
        mixed.extend(vec![[25u8, 200, 150]; 3]);
        mixed.extend(vec![[15u8, 200, 150]; 2]);

        let healthy = crop_health(&green, &band);
        let stressed = crop_health(&mixed, &band);
        assert!(stressed.score < healthy.score);
        assert!((stressed.stressed_ratio - 0.3).abs() < 1e-9);
        assert!((stressed.diseased_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn no_vegetation_means_zero_health() {
        let band = CropType::General.profile().green_band;
        let gray_pixels = vec![[0u8, 0, 120]; 10];
        assert_eq!(crop_health(&gray_pixels, &band), HealthBreakdown::default());
    }

    #[test]
    fn focus_downsamples_large_frames() {
        let extractor = MetricExtractor {
            focus_max_side: 32,
            ..MetricExtractor::default()
        };
        let ratio = extractor.focus(&checkerboard(128, 8));
        assert!(ratio > 0.0 && ratio <= 1.0);
    }

    #[test]
    fn extraction_rejects_bad_frame() {
        let t = ThresholdResolver::resolve(CropType::General, WeatherCondition::Clear);
        let frame = Frame {
            data: vec![],
            width: 0,
            height: 0,
            channels: 3,
        };
        assert!(MetricExtractor::new().extract(&frame, &t).is_err());
    }
}
