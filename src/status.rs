//! Metric classification.
//!
//! Each metric has its own closed status enum. Class boundaries are inclusive on
//! the acceptable side, so a value sitting exactly on `min` (or on a ceiling) is
//! never the problem class. NaN lands in the metric's worst class, which keeps
//! the mapping total.

use crate::metrics::{FrameMetrics, Metric};
use crate::thresholds::ThresholdSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None = 0,
    Minor = 1,
    Moderate = 2,
    Critical = 3,
}

impl Severity {
    pub fn priority(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrightnessStatus {
    ExtremelyDark,
    TooDark,
    Optimal,
    TooBright,
    ExtremelyBright,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContrastStatus {
    Low,
    Good,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharpnessStatus {
    VeryBlurry,
    Blurry,
    Good,
    VerySharp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverageStatus {
    Low,
    Good,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureStatus {
    Low,
    Good,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusStatus {
    OutOfFocus,
    Acceptable,
    Sharp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoiseStatus {
    Low,
    Acceptable,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Moderate,
    Poor,
}

/// Health score bounds; fixed, independent of crop and weather.
const HEALTH_EXCELLENT: f64 = 0.8;
const HEALTH_GOOD: f64 = 0.6;
const HEALTH_MODERATE: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "metric", content = "status", rename_all = "snake_case")]
pub enum StatusKind {
    Brightness(BrightnessStatus),
    Contrast(ContrastStatus),
    Sharpness(SharpnessStatus),
    GreenCoverage(CoverageStatus),
    TextureVariance(TextureStatus),
    Focus(FocusStatus),
    Noise(NoiseStatus),
    CropHealth(HealthStatus),
}

impl StatusKind {
    pub fn metric(&self) -> Metric {
        match self {
            StatusKind::Brightness(_) => Metric::Brightness,
            StatusKind::Contrast(_) => Metric::Contrast,
            StatusKind::Sharpness(_) => Metric::Sharpness,
            StatusKind::GreenCoverage(_) => Metric::GreenCoverage,
            StatusKind::TextureVariance(_) => Metric::TextureVariance,
            StatusKind::Focus(_) => Metric::Focus,
            StatusKind::Noise(_) => Metric::Noise,
            StatusKind::CropHealth(_) => Metric::CropHealth,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::Brightness(s) => match s {
                BrightnessStatus::ExtremelyDark => "Extremely Dark",
                BrightnessStatus::TooDark => "Too Dark",
                BrightnessStatus::Optimal => "Optimal Brightness",
                BrightnessStatus::TooBright => "Too Bright",
                BrightnessStatus::ExtremelyBright => "Extremely Bright",
            },
            StatusKind::Contrast(s) => match s {
                ContrastStatus::Low => "Low Contrast",
                ContrastStatus::Good => "Good Contrast",
                ContrastStatus::High => "High Contrast",
            },
            StatusKind::Sharpness(s) => match s {
                SharpnessStatus::VeryBlurry => "Very Blurry",
                SharpnessStatus::Blurry => "Blurry",
                SharpnessStatus::Good => "Good Sharpness",
                SharpnessStatus::VerySharp => "Very Sharp",
            },
            StatusKind::GreenCoverage(s) => match s {
                CoverageStatus::Low => "Low Crop Coverage",
                CoverageStatus::Good => "Good Crop Coverage",
                CoverageStatus::High => "High Crop Coverage",
            },
            StatusKind::TextureVariance(s) => match s {
                TextureStatus::Low => "Low Texture",
                TextureStatus::Good => "Good Texture",
                TextureStatus::High => "High Texture",
            },
            StatusKind::Focus(s) => match s {
                FocusStatus::OutOfFocus => "Out of Focus",
                FocusStatus::Acceptable => "Acceptable Focus",
                FocusStatus::Sharp => "Sharp Focus",
            },
            StatusKind::Noise(s) => match s {
                NoiseStatus::Low => "Low Noise",
                NoiseStatus::Acceptable => "Acceptable Noise",
                NoiseStatus::High => "High Noise",
            },
            StatusKind::CropHealth(s) => match s {
                HealthStatus::Excellent => "Excellent",
                HealthStatus::Good => "Good",
                HealthStatus::Moderate => "Moderate",
                HealthStatus::Poor => "Poor",
            },
        }
    }

    pub fn severity(&self) -> Severity {
        use Severity::*;
        match self {
            StatusKind::Brightness(s) => match s {
                BrightnessStatus::ExtremelyDark | BrightnessStatus::ExtremelyBright => Critical,
                BrightnessStatus::TooDark | BrightnessStatus::TooBright => Moderate,
                BrightnessStatus::Optimal => None,
            },
            StatusKind::Contrast(s) => match s {
                ContrastStatus::Low => Moderate,
                ContrastStatus::High => Minor,
                ContrastStatus::Good => None,
            },
            StatusKind::Sharpness(s) => match s {
                SharpnessStatus::VeryBlurry => Critical,
                SharpnessStatus::Blurry => Moderate,
                SharpnessStatus::Good | SharpnessStatus::VerySharp => None,
            },
            StatusKind::GreenCoverage(s) => match s {
                CoverageStatus::Low => Minor,
                CoverageStatus::Good | CoverageStatus::High => None,
            },
            StatusKind::TextureVariance(s) => match s {
                TextureStatus::Low => Minor,
                TextureStatus::Good | TextureStatus::High => None,
            },
            StatusKind::Focus(s) => match s {
                FocusStatus::OutOfFocus => Moderate,
                FocusStatus::Acceptable | FocusStatus::Sharp => None,
            },
            StatusKind::Noise(s) => match s {
                NoiseStatus::High => Minor,
                NoiseStatus::Low | NoiseStatus::Acceptable => None,
            },
            StatusKind::CropHealth(s) => match s {
                HealthStatus::Poor => Minor,
                _ => None,
            },
        }
    }

    /// Share of the metric's weight this status earns in the quality score.
    pub fn fraction(&self) -> f64 {
        match self {
            StatusKind::Brightness(s) => match s {
                BrightnessStatus::ExtremelyDark | BrightnessStatus::ExtremelyBright => 0.1,
                BrightnessStatus::TooDark => 0.3,
                BrightnessStatus::TooBright => 0.4,
                BrightnessStatus::Optimal => 1.0,
            },
            StatusKind::Contrast(s) => match s {
                ContrastStatus::Low => 0.4,
                ContrastStatus::High => 0.7,
                ContrastStatus::Good => 0.8,
            },
            StatusKind::Sharpness(s) => match s {
                SharpnessStatus::VeryBlurry => 0.1,
                SharpnessStatus::Blurry => 0.2,
                SharpnessStatus::Good => 0.9,
                SharpnessStatus::VerySharp => 1.0,
            },
            StatusKind::GreenCoverage(s) => match s {
                CoverageStatus::Low => 0.3,
                CoverageStatus::Good => 0.8,
                CoverageStatus::High => 0.9,
            },
            StatusKind::TextureVariance(s) => match s {
                TextureStatus::Low => 0.4,
                TextureStatus::Good => 0.8,
                TextureStatus::High => 0.9,
            },
            StatusKind::Focus(s) => match s {
                FocusStatus::OutOfFocus => 0.3,
                FocusStatus::Acceptable => 0.8,
                FocusStatus::Sharp => 1.0,
            },
            StatusKind::Noise(s) => match s {
                NoiseStatus::High => 0.4,
                NoiseStatus::Acceptable => 0.7,
                NoiseStatus::Low => 0.9,
            },
            StatusKind::CropHealth(s) => match s {
                HealthStatus::Poor => 0.3,
                HealthStatus::Moderate => 0.6,
                HealthStatus::Good => 0.8,
                HealthStatus::Excellent => 1.0,
            },
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified metric: the status plus the raw value it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStatus {
    pub kind: StatusKind,
    pub value: f64,
}

impl MetricStatus {
    pub fn metric(&self) -> Metric {
        self.kind.metric()
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_best_class(&self) -> bool {
        self.severity() == Severity::None
    }
}

pub type StatusMap = BTreeMap<Metric, MetricStatus>;

pub fn classify(metric: Metric, value: f64, t: &ThresholdSet) -> MetricStatus {
    let kind = match metric {
        Metric::Brightness => StatusKind::Brightness(if value.is_nan()
            || value < t.brightness_critical_low
        {
            BrightnessStatus::ExtremelyDark
        } else if value < t.brightness.min {
            BrightnessStatus::TooDark
        } else if value <= t.brightness.max {
            BrightnessStatus::Optimal
        } else if value <= t.brightness_critical_high {
            BrightnessStatus::TooBright
        } else {
            BrightnessStatus::ExtremelyBright
        }),
        Metric::Contrast => StatusKind::Contrast(if value.is_nan() || value < t.contrast.min {
            ContrastStatus::Low
        } else if value <= t.contrast.max {
            ContrastStatus::Good
        } else {
            ContrastStatus::High
        }),
        Metric::Sharpness => StatusKind::Sharpness(if value.is_nan() || value < t.sharpness_critical
        {
            SharpnessStatus::VeryBlurry
        } else if value < t.sharpness.min {
            SharpnessStatus::Blurry
        } else if value <= t.sharpness.optimal {
            SharpnessStatus::Good
        } else {
            SharpnessStatus::VerySharp
        }),
        Metric::GreenCoverage => {
            StatusKind::GreenCoverage(if value.is_nan() || value < t.green_coverage.min {
                CoverageStatus::Low
            } else if value <= t.green_coverage.optimal {
                CoverageStatus::Good
            } else {
                CoverageStatus::High
            })
        }
        Metric::TextureVariance => {
            StatusKind::TextureVariance(if value.is_nan() || value < t.texture_variance.min {
                TextureStatus::Low
            } else if value <= t.texture_variance.optimal {
                TextureStatus::Good
            } else {
                TextureStatus::High
            })
        }
        Metric::Focus => StatusKind::Focus(if value.is_nan() || value < t.focus.min {
            FocusStatus::OutOfFocus
        } else if value < t.focus.optimal {
            FocusStatus::Acceptable
        } else {
            FocusStatus::Sharp
        }),
        Metric::Noise => StatusKind::Noise(if value <= t.noise.good {
            NoiseStatus::Low
        } else if value <= t.noise.max {
            NoiseStatus::Acceptable
        } else {
            // NaN falls through to here as well
            NoiseStatus::High
        }),
        Metric::CropHealth => StatusKind::CropHealth(if value >= HEALTH_EXCELLENT {
            HealthStatus::Excellent
        } else if value >= HEALTH_GOOD {
            HealthStatus::Good
        } else if value >= HEALTH_MODERATE {
            HealthStatus::Moderate
        } else {
            HealthStatus::Poor
        }),
    };
    MetricStatus { kind, value }
}

pub fn classify_all(metrics: &FrameMetrics, t: &ThresholdSet) -> StatusMap {
    metrics
        .iter()
        .map(|(metric, value)| (metric, classify(metric, value, t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{CropType, WeatherCondition};
    use crate::thresholds::{CaptureMode, ThresholdResolver};

    fn wheat() -> ThresholdSet {
        ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear)
    }

    fn sweep() -> Vec<f64> {
        let mut values: Vec<f64> = (-20..=600).map(|v| v as f64 * 0.5).collect();
        values.extend((0..=100).map(|v| v as f64 / 100.0));
        values.extend([f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        values
    }

    #[test]
    fn boundaries_belong_to_the_acceptable_side() {
        let t = wheat();
        assert_eq!(
            classify(Metric::Brightness, t.brightness.min, &t).kind,
            StatusKind::Brightness(BrightnessStatus::Optimal)
        );
        assert_eq!(
            classify(Metric::Brightness, t.brightness.max, &t).kind,
            StatusKind::Brightness(BrightnessStatus::Optimal)
        );
        assert_eq!(
            classify(Metric::Sharpness, t.sharpness.min, &t).kind,
            StatusKind::Sharpness(SharpnessStatus::Good)
        );
        assert_eq!(
            classify(Metric::Sharpness, t.sharpness_critical, &t).kind,
            StatusKind::Sharpness(SharpnessStatus::Blurry)
        );
        assert_eq!(
            classify(Metric::GreenCoverage, t.green_coverage.min, &t).kind,
            StatusKind::GreenCoverage(CoverageStatus::Good)
        );
        assert_eq!(
            classify(Metric::Noise, t.noise.max, &t).kind,
            StatusKind::Noise(NoiseStatus::Acceptable)
        );
    }

    #[test]
    fn brightness_walks_through_every_class() {
        let t = wheat();
        let labels: Vec<&str> = [10.0, 45.0, 125.0, 200.0, 250.0]
            .iter()
            .map(|&v| classify(Metric::Brightness, v, &t).label())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Extremely Dark",
                "Too Dark",
                "Optimal Brightness",
                "Too Bright",
                "Extremely Bright"
            ]
        );
    }

    #[test]
    fn classification_is_total_and_metric_consistent() {
        for mode in [CaptureMode::Field, CaptureMode::CloseUp] {
            let t = ThresholdResolver::resolve_with_mode(CropType::Corn, WeatherCondition::Sunny, mode);
            for metric in Metric::ALL {
                for value in sweep() {
                    let status = classify(metric, value, &t);
                    assert_eq!(status.metric(), metric);
                    assert!(!status.label().is_empty());
                }
            }
        }
    }

    #[test]
    fn nan_is_never_acceptable() {
        let t = wheat();
        for metric in Metric::ALL {
            assert!(
                !classify(metric, f64::NAN, &t).is_best_class(),
                "{} accepted NaN",
                metric
            );
        }
    }

    #[test]
    fn fraction_never_rises_with_severity() {
        let t = wheat();
        for metric in Metric::ALL {
            let statuses: Vec<MetricStatus> =
                sweep().into_iter().map(|v| classify(metric, v, &t)).collect();
            for a in &statuses {
                for b in &statuses {
                    if a.severity() > b.severity() {
                        assert!(
                            a.kind.fraction() < b.kind.fraction(),
                            "{} ranks above {}",
                            a.label(),
                            b.label()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn classify_all_covers_every_metric() {
        let metrics = FrameMetrics {
            brightness: 125.0,
            contrast: 45.0,
            sharpness: 150.0,
            green_coverage: 0.65,
            texture_variance: 90.0,
            focus: 0.7,
            noise: 3.0,
            crop_health: 0.9,
            ..FrameMetrics::default()
        };
        let statuses = classify_all(&metrics, &wheat());
        assert_eq!(statuses.len(), Metric::ALL.len());
        assert!(statuses.values().all(MetricStatus::is_best_class));
    }
}
