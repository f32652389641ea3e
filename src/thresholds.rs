//! Threshold resolution.
//!
//! A [`ThresholdSet`] is built from a per-capture-mode base table, scaled by the
//! crop's texture sensitivity and the weather multipliers. The weather delta only
//! multiplies the lighting-dependent rows, so crop-specific values survive every
//! weather change. Resolution is a pure function of its inputs.

use crate::crop::{CropType, HsvBand, WeatherCondition};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Nadir shots over a crop field
    #[default]
    Field,
    /// Close inspection of a few plants (or a bench test on a desk)
    CloseUp,
}

/// Two-sided range: values outside `[min, max]` are a problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundedThreshold {
    pub min: f64,
    pub optimal: f64,
    pub max: f64,
}

/// Single lower bound; `optimal` marks the start of the "excess" band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloorThreshold {
    pub min: f64,
    pub optimal: f64,
}

/// Inverted floor: small values are good.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CeilingThreshold {
    pub good: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSet {
    pub crop: CropType,
    pub weather: WeatherCondition,
    pub mode: CaptureMode,
    pub brightness: BoundedThreshold,
    /// Below this the frame is unusable rather than merely dark
    pub brightness_critical_low: f64,
    /// Above this the frame is blown out
    pub brightness_critical_high: f64,
    pub contrast: BoundedThreshold,
    pub sharpness: FloorThreshold,
    /// Below this the blur is severe enough to demand an immediate correction
    pub sharpness_critical: f64,
    pub green_coverage: FloorThreshold,
    pub texture_variance: FloorThreshold,
    pub focus: FloorThreshold,
    pub noise: CeilingThreshold,
    pub green_band: HsvBand,
}

struct BaseTable {
    brightness: (f64, f64, f64),
    contrast: (f64, f64, f64),
    sharpness: (f64, f64),
    green_coverage: (f64, f64),
    texture_variance: (f64, f64),
    focus: (f64, f64),
    noise: (f64, f64),
}

static FIELD_BASE: BaseTable = BaseTable {
    brightness: (60.0, 120.0, 180.0),
    contrast: (25.0, 40.0, 80.0),
    sharpness: (80.0, 150.0),
    green_coverage: (0.3, 0.6),
    texture_variance: (50.0, 100.0),
    focus: (0.35, 0.55),
    noise: (5.0, 15.0),
};

static CLOSE_UP_BASE: BaseTable = BaseTable {
    brightness: (30.0, 100.0, 220.0),
    contrast: (15.0, 30.0, 70.0),
    sharpness: (20.0, 80.0),
    green_coverage: (0.05, 0.3),
    texture_variance: (20.0, 60.0),
    focus: (0.25, 0.45),
    noise: (5.0, 15.0),
};

/// Blur below this fraction of the sharpness minimum is critical.
const CRITICAL_BLUR_FRACTION: f64 = 0.5;
/// Fraction of the distance from the bound to the end of the 0..=255 scale.
const CRITICAL_EXPOSURE_FRACTION: f64 = 0.5;

pub struct ThresholdResolver;

impl ThresholdResolver {
    pub fn resolve(crop: CropType, weather: WeatherCondition) -> ThresholdSet {
        Self::resolve_with_mode(crop, weather, CaptureMode::Field)
    }

    /// Lossy variant for raw operator input; unknown names fall back to
    /// general / clear.
    pub fn resolve_names(crop: &str, weather: &str) -> ThresholdSet {
        Self::resolve(
            CropType::from_name_lossy(crop),
            WeatherCondition::from_name_lossy(weather),
        )
    }

    pub fn resolve_with_mode(
        crop: CropType,
        weather: WeatherCondition,
        mode: CaptureMode,
    ) -> ThresholdSet {
        let base = match mode {
            CaptureMode::Field => &FIELD_BASE,
            CaptureMode::CloseUp => &CLOSE_UP_BASE,
        };
        let profile = crop.profile();
        let adj = weather.adjustment();

        let (b_min, b_opt, b_max) = base.brightness;
        let brightness = BoundedThreshold {
            min: b_min * adj.brightness_mult,
            optimal: b_opt * adj.brightness_mult,
            max: (b_max * adj.brightness_mult).min(255.0),
        };

        let (c_min, c_opt, c_max) = base.contrast;
        let contrast = BoundedThreshold {
            min: c_min * adj.contrast_mult,
            optimal: c_opt * adj.contrast_mult,
            max: c_max * adj.contrast_mult,
        };

        let sharpness = FloorThreshold {
            min: base.sharpness.0 * adj.sharpness_mult,
            optimal: base.sharpness.1 * adj.sharpness_mult,
        };

        let texture_variance = FloorThreshold {
            min: base.texture_variance.0 * profile.texture_sensitivity,
            optimal: base.texture_variance.1 * profile.texture_sensitivity,
        };

        let set = ThresholdSet {
            crop,
            weather,
            mode,
            brightness,
            brightness_critical_low: brightness.min * CRITICAL_EXPOSURE_FRACTION,
            brightness_critical_high: brightness.max
                + (255.0 - brightness.max) * CRITICAL_EXPOSURE_FRACTION,
            contrast,
            sharpness,
            sharpness_critical: sharpness.min * CRITICAL_BLUR_FRACTION,
            green_coverage: FloorThreshold {
                min: base.green_coverage.0,
                optimal: base.green_coverage.1,
            },
            texture_variance,
            focus: FloorThreshold {
                min: base.focus.0,
                optimal: base.focus.1,
            },
            noise: CeilingThreshold {
                good: base.noise.0,
                max: base.noise.1,
            },
            green_band: profile.green_band,
        };

        debug!(
            "Resolved thresholds for {}/{} ({:?}): brightness {:.0}-{:.0}, sharpness >= {:.0}",
            crop, weather, mode, set.brightness.min, set.brightness.max, set.sharpness.min
        );
        set
    }
}
