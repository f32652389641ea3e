use crate::metrics::Metric;
use crate::status::StatusMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed metric weights. The gating metrics (sharpness, brightness, contrast)
/// carry the most; the table sums to 100.
pub static METRIC_WEIGHTS: [(Metric, f64); 8] = [
    (Metric::Sharpness, 20.0),
    (Metric::Brightness, 18.0),
    (Metric::Contrast, 14.0),
    (Metric::GreenCoverage, 14.0),
    (Metric::Focus, 10.0),
    (Metric::CropHealth, 10.0),
    (Metric::TextureVariance, 8.0),
    (Metric::Noise, 6.0),
];

pub fn weight(metric: Metric) -> f64 {
    METRIC_WEIGHTS
        .iter()
        .find(|(m, _)| *m == metric)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

/// Weighted sum of per-metric fractions, clamped to 0..=100. Metrics missing
/// from the map contribute nothing.
pub fn score(statuses: &StatusMap) -> f64 {
    let total: f64 = METRIC_WEIGHTS
        .iter()
        .filter_map(|(metric, w)| statuses.get(metric).map(|s| w * s.kind.fraction()))
        .sum();
    total.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityBand {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl QualityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            QualityBand::Excellent
        } else if score >= 70.0 {
            QualityBand::Good
        } else if score >= 50.0 {
            QualityBand::Moderate
        } else {
            QualityBand::Poor
        }
    }
}

impl fmt::Display for QualityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityBand::Excellent => "Excellent",
            QualityBand::Good => "Good",
            QualityBand::Moderate => "Moderate",
            QualityBand::Poor => "Poor",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{CropType, WeatherCondition};
    use crate::metrics::FrameMetrics;
    use crate::status::{classify, classify_all};
    use crate::thresholds::ThresholdResolver;

    #[test]
    fn weights_sum_to_one_hundred() {
        let sum: f64 = METRIC_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert_eq!(sum, 100.0);
        for metric in Metric::ALL {
            assert!(weight(metric) > 0.0);
        }
        assert!(weight(Metric::Sharpness) > weight(Metric::Noise));
        assert!(weight(Metric::Brightness) > weight(Metric::TextureVariance));
    }

    #[test]
    fn improving_a_metric_never_lowers_the_score() {
        let t = ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear);
        let base = FrameMetrics {
            brightness: 40.0,
            contrast: 20.0,
            sharpness: 50.0,
            green_coverage: 0.2,
            texture_variance: 30.0,
            focus: 0.2,
            noise: 20.0,
            crop_health: 0.3,
            ..FrameMetrics::default()
        };
        let baseline = classify_all(&base, &t);
        let before = score(&baseline);

        let better = [
            (Metric::Brightness, 125.0),
            (Metric::Contrast, 45.0),
            (Metric::Sharpness, 200.0),
            (Metric::GreenCoverage, 0.7),
            (Metric::TextureVariance, 130.0),
            (Metric::Focus, 0.7),
            (Metric::Noise, 2.0),
            (Metric::CropHealth, 0.9),
        ];
        for (metric, value) in better {
            let mut improved = baseline.clone();
            improved.insert(metric, classify(metric, value, &t));
            assert!(score(&improved) >= before, "{} lowered the score", metric);
        }
    }

    #[test]
    fn score_is_deterministic_and_clamped() {
        let t = ThresholdResolver::resolve(CropType::Corn, WeatherCondition::Cloudy);
        let statuses = classify_all(&FrameMetrics::default(), &t);
        let s = score(&statuses);
        assert_eq!(s, score(&statuses));
        assert!((0.0..=100.0).contains(&s));
        assert_eq!(score(&StatusMap::new()), 0.0);
    }

    #[test]
    fn bands_follow_score() {
        assert_eq!(QualityBand::from_score(85.0), QualityBand::Excellent);
        assert_eq!(QualityBand::from_score(70.0), QualityBand::Good);
        assert_eq!(QualityBand::from_score(55.0), QualityBand::Moderate);
        assert_eq!(QualityBand::from_score(10.0), QualityBand::Poor);
    }
}
