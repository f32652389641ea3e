use crate::error::QualityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropType {
    Wheat,
    Corn,
    Rice,
    Cotton,
    Soybean,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Overcast,
    Sunny,
    Rainy,
}

/// Inclusive HSV box in OpenCV scale: hue 0..=180, saturation and value 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvBand {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropProfile {
    pub crop: CropType,
    /// Hue/saturation/value box that counts as crop foliage
    pub green_band: HsvBand,
    /// Scales the texture-variance thresholds
    pub texture_sensitivity: f64,
    pub optimal_height_m: f64,
    pub height_tolerance_m: f64,
}

/// Indexed by `CropType as usize`.
static CROP_PROFILES: [CropProfile; 6] = [
    CropProfile {
        crop: CropType::Wheat,
        green_band: HsvBand::new([35, 40, 40], [85, 255, 255]),
        texture_sensitivity: 1.2,
        optimal_height_m: 3.0,
        height_tolerance_m: 0.5,
    },
    CropProfile {
        crop: CropType::Corn,
        green_band: HsvBand::new([35, 50, 50], [85, 255, 255]),
        texture_sensitivity: 1.0,
        optimal_height_m: 4.0,
        height_tolerance_m: 0.8,
    },
    CropProfile {
        crop: CropType::Rice,
        green_band: HsvBand::new([35, 60, 60], [85, 255, 255]),
        texture_sensitivity: 1.1,
        optimal_height_m: 2.5,
        height_tolerance_m: 0.4,
    },
    CropProfile {
        crop: CropType::Cotton,
        green_band: HsvBand::new([35, 40, 40], [85, 255, 255]),
        texture_sensitivity: 0.9,
        optimal_height_m: 3.5,
        height_tolerance_m: 0.6,
    },
    CropProfile {
        crop: CropType::Soybean,
        green_band: HsvBand::new([35, 45, 45], [85, 255, 255]),
        texture_sensitivity: 1.0,
        optimal_height_m: 3.0,
        height_tolerance_m: 0.5,
    },
    CropProfile {
        crop: CropType::General,
        green_band: HsvBand::new([35, 50, 50], [85, 255, 255]),
        texture_sensitivity: 1.0,
        optimal_height_m: 3.0,
        height_tolerance_m: 0.5,
    },
];

/// Multipliers applied over the crop base thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherAdjustment {
    pub condition: WeatherCondition,
    pub brightness_mult: f64,
    pub contrast_mult: f64,
    pub sharpness_mult: f64,
}

/// Indexed by `WeatherCondition as usize`.
static WEATHER_ADJUSTMENTS: [WeatherAdjustment; 5] = [
    WeatherAdjustment {
        condition: WeatherCondition::Clear,
        brightness_mult: 1.0,
        contrast_mult: 1.0,
        sharpness_mult: 1.0,
    },
    WeatherAdjustment {
        condition: WeatherCondition::Cloudy,
        brightness_mult: 0.8,
        contrast_mult: 1.2,
        sharpness_mult: 0.9,
    },
    WeatherAdjustment {
        condition: WeatherCondition::Overcast,
        brightness_mult: 0.7,
        contrast_mult: 1.3,
        sharpness_mult: 0.8,
    },
    WeatherAdjustment {
        condition: WeatherCondition::Sunny,
        brightness_mult: 1.2,
        contrast_mult: 0.9,
        sharpness_mult: 1.1,
    },
    WeatherAdjustment {
        condition: WeatherCondition::Rainy,
        brightness_mult: 0.6,
        contrast_mult: 1.4,
        sharpness_mult: 0.7,
    },
];

impl CropType {
    pub const ALL: [CropType; 6] = [
        CropType::Wheat,
        CropType::Corn,
        CropType::Rice,
        CropType::Cotton,
        CropType::Soybean,
        CropType::General,
    ];

    pub fn profile(self) -> &'static CropProfile {
        &CROP_PROFILES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CropType::Wheat => "wheat",
            CropType::Corn => "corn",
            CropType::Rice => "rice",
            CropType::Cotton => "cotton",
            CropType::Soybean => "soybean",
            CropType::General => "general",
        }
    }

    /// Field-tolerant parse: unknown names fall back to `General` with a warning.
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown crop type '{}', using general thresholds", name);
            CropType::General
        })
    }
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 5] = [
        WeatherCondition::Clear,
        WeatherCondition::Cloudy,
        WeatherCondition::Overcast,
        WeatherCondition::Sunny,
        WeatherCondition::Rainy,
    ];

    pub fn adjustment(self) -> &'static WeatherAdjustment {
        &WEATHER_ADJUSTMENTS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeatherCondition::Clear => "clear",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Overcast => "overcast",
            WeatherCondition::Sunny => "sunny",
            WeatherCondition::Rainy => "rainy",
        }
    }

    /// Field-tolerant parse: unknown names fall back to `Clear` with a warning.
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown weather condition '{}', using clear-sky adjustments", name);
            WeatherCondition::Clear
        })
    }
}

impl FromStr for CropType {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        CropType::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| QualityError::UnknownParameter {
                kind: "crop type",
                value: s.to_string(),
            })
    }
}

impl FromStr for WeatherCondition {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        WeatherCondition::ALL
            .into_iter()
            .find(|w| w.as_str() == name)
            .ok_or_else(|| QualityError::UnknownParameter {
                kind: "weather condition",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_table_is_indexed_by_crop() {
        for crop in CropType::ALL {
            assert_eq!(crop.profile().crop, crop);
        }
        for weather in WeatherCondition::ALL {
            assert_eq!(weather.adjustment().condition, weather);
        }
    }

    #[test]
    fn height_table_matches_field_guidance() {
        let expect = [
            (CropType::Wheat, 3.0, 0.5),
            (CropType::Corn, 4.0, 0.8),
            (CropType::Rice, 2.5, 0.4),
            (CropType::Cotton, 3.5, 0.6),
            (CropType::Soybean, 3.0, 0.5),
            (CropType::General, 3.0, 0.5),
        ];
        for (crop, optimal, tolerance) in expect {
            assert_eq!(crop.profile().optimal_height_m, optimal);
            assert_eq!(crop.profile().height_tolerance_m, tolerance);
        }
    }

    #[test]
    fn parsing_is_case_insensitive_and_lossy_falls_back() {
        assert_eq!("  Corn ".parse::<CropType>().unwrap(), CropType::Corn);
        assert!("barleyXYZ".parse::<CropType>().is_err());
        assert_eq!(CropType::from_name_lossy("barleyXYZ"), CropType::General);
        assert_eq!(WeatherCondition::from_name_lossy("hail"), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_name_lossy("OVERCAST"), WeatherCondition::Overcast);
    }

    #[test]
    fn hsv_band_is_inclusive() {
        let band = CropType::Wheat.profile().green_band;
        assert!(band.contains([35, 40, 40]));
        assert!(band.contains([85, 255, 255]));
        assert!(!band.contains([34, 200, 200]));
        assert!(!band.contains([60, 39, 200]));
    }
}
