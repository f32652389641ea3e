use crate::crop::CropType;
use crate::error::{QualityError, Result};
use crate::status::Severity;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub const DEFAULT_HEIGHT_CEILING_M: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightStatus {
    /// No reading received yet
    Unknown,
    Optimal,
    TooLow,
    TooHigh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightFeedback {
    pub status: HeightStatus,
    pub text: String,
    /// Signed correction: positive ascends, negative descends, zero inside the band.
    pub delta_m: f64,
    pub severity: Severity,
}

impl HeightFeedback {
    fn unknown() -> Self {
        Self {
            status: HeightStatus::Unknown,
            text: "Height unknown - no telemetry yet".to_string(),
            delta_m: 0.0,
            severity: Severity::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightAdvisor {
    current_height_m: Option<f64>,
    optimal_height_m: f64,
    tolerance_m: f64,
    ceiling_m: f64,
}

impl HeightAdvisor {
    pub fn new(crop: CropType) -> Self {
        let profile = crop.profile();
        Self {
            current_height_m: None,
            optimal_height_m: profile.optimal_height_m,
            tolerance_m: profile.height_tolerance_m,
            ceiling_m: DEFAULT_HEIGHT_CEILING_M,
        }
    }

    pub fn with_ceiling(mut self, ceiling_m: f64) -> Self {
        self.ceiling_m = ceiling_m;
        self
    }

    pub fn current_height_m(&self) -> Option<f64> {
        self.current_height_m
    }

    pub fn optimal_height_m(&self) -> f64 {
        self.optimal_height_m
    }

    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    pub fn band(&self) -> (f64, f64) {
        (
            self.optimal_height_m - self.tolerance_m,
            self.optimal_height_m + self.tolerance_m,
        )
    }

    /// Recomputes the optimum and tolerance; the current reading is kept.
    pub fn set_crop(&mut self, crop: CropType) {
        let profile = crop.profile();
        self.optimal_height_m = profile.optimal_height_m;
        self.tolerance_m = profile.height_tolerance_m;
        debug!(
            "Height target for {}: {:.1}m +/- {:.1}m",
            crop, self.optimal_height_m, self.tolerance_m
        );
    }

    /// Accepts readings in (0, ceiling]. A rejected reading leaves the last good
    /// value in place.
    pub fn update_height(&mut self, value_m: f64) -> Result<()> {
        if let Err(e) = self.validate_height(value_m) {
            warn!("Rejected height reading {:.2}m", value_m);
            return Err(e);
        }
        self.current_height_m = Some(value_m);
        Ok(())
    }

    pub fn validate_height(&self, value_m: f64) -> Result<()> {
        if !value_m.is_finite() || value_m <= 0.0 || value_m > self.ceiling_m {
            return Err(QualityError::InvalidHeight {
                value: value_m,
                ceiling: self.ceiling_m,
            });
        }
        Ok(())
    }

    pub fn feedback(&self) -> HeightFeedback {
        let Some(current) = self.current_height_m else {
            return HeightFeedback::unknown();
        };
        let (lower, upper) = self.band();

        if current < lower {
            let delta = lower - current;
            HeightFeedback {
                status: HeightStatus::TooLow,
                text: format!("Too low - ascend by {:.1}m", delta),
                delta_m: delta,
                severity: self.severity_for(delta),
            }
        } else if current > upper {
            let delta = current - upper;
            HeightFeedback {
                status: HeightStatus::TooHigh,
                text: format!("Too high - descend by {:.1}m", delta),
                delta_m: -delta,
                severity: self.severity_for(delta),
            }
        } else {
            HeightFeedback {
                status: HeightStatus::Optimal,
                text: "Height optimal - maintain position".to_string(),
                delta_m: 0.0,
                severity: Severity::None,
            }
        }
    }

    fn severity_for(&self, excess: f64) -> Severity {
        if excess > self.tolerance_m {
            Severity::Critical
        } else if excess > self.tolerance_m / 2.0 {
            Severity::Moderate
        } else {
            Severity::Minor
        }
    }
}

/// Median of the last `window` readings, to damp single-sample spikes.
#[derive(Debug, Clone)]
pub struct HeightSmoother {
    window: usize,
    samples: VecDeque<f64>,
}

impl HeightSmoother {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, value: f64) -> f64 {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(value);

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corn_above_band_descends() {
        let mut advisor = HeightAdvisor::new(CropType::Corn);
        advisor.update_height(5.2).unwrap();
        let fb = advisor.feedback();
        assert_eq!(fb.status, HeightStatus::TooHigh);
        assert!((fb.delta_m + 0.4).abs() < 1e-9);
        assert!(fb.severity > Severity::None);
        assert!(fb.text.contains("descend by 0.4m"));
    }

    #[test]
    fn delta_is_zero_exactly_inside_band() {
        for crop in CropType::ALL {
            let mut advisor = HeightAdvisor::new(crop);
            let (lower, upper) = advisor.band();
            for i in 1..=200 {
                let h = i as f64 * 0.05;
                advisor.update_height(h).unwrap();
                let inside = h >= lower && h <= upper;
                assert_eq!(advisor.feedback().delta_m == 0.0, inside, "{} at {}", crop, h);
            }
        }
    }

    #[test]
    fn bad_readings_keep_last_good_value() {
        let mut advisor = HeightAdvisor::new(CropType::Wheat);
        advisor.update_height(3.1).unwrap();
        for bad in [-3.0, 0.0, 151.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                advisor.update_height(bad),
                Err(QualityError::InvalidHeight { .. })
            ));
            assert_eq!(advisor.current_height_m(), Some(3.1));
        }
        assert!(advisor.update_height(150.0).is_ok());
    }

    #[test]
    fn severity_grows_with_distance() {
        let mut advisor = HeightAdvisor::new(CropType::Wheat);
        advisor.update_height(2.4).unwrap();
        assert_eq!(advisor.feedback().severity, Severity::Minor);
        advisor.update_height(2.1).unwrap();
        assert_eq!(advisor.feedback().severity, Severity::Moderate);
        advisor.update_height(1.0).unwrap();
        let fb = advisor.feedback();
        assert_eq!(fb.severity, Severity::Critical);
        assert!(fb.delta_m > 0.0);
    }

    #[test]
    fn crop_change_moves_the_band() {
        let mut advisor = HeightAdvisor::new(CropType::Wheat);
        advisor.update_height(4.5).unwrap();
        assert_eq!(advisor.feedback().status, HeightStatus::TooHigh);
        advisor.set_crop(CropType::Corn);
        assert_eq!(advisor.feedback().status, HeightStatus::Optimal);
    }

    #[test]
    fn no_reading_is_unknown_and_silent() {
        let fb = HeightAdvisor::new(CropType::Rice).feedback();
        assert_eq!(fb.status, HeightStatus::Unknown);
        assert_eq!(fb.severity, Severity::None);
        assert_eq!(fb.delta_m, 0.0);
    }

    #[test]
    fn smoother_takes_the_median() {
        let mut smoother = HeightSmoother::new(5);
        assert_eq!(smoother.push(3.0), 3.0);
        assert_eq!(smoother.push(5.0), 4.0);
        assert_eq!(smoother.push(40.0), 5.0);
        smoother.push(3.2);
        smoother.push(3.1);
        assert_eq!(smoother.push(3.3), 3.3);
        assert_eq!(smoother.len(), 5);
    }
}
