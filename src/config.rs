use crate::session::CaptureSetting;
use crate::telemetry::TelemetrySource;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSightConfig {
    pub analysis: AnalysisConfig,
    pub height: HeightConfig,
    pub telemetry: TelemetryConfig,
    pub recorder: RecorderConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Crop profile name; unknown names fall back to "general"
    pub crop_type: String,
    /// Weather condition; unknown names fall back to "clear"
    pub weather_condition: String,
    /// field, close_up, or auto
    pub capture_mode: CaptureSetting,
    /// Run the secondary assessor every N frames
    pub ai_interval_frames: u64,
    /// Reuse the last assessor answer for up to N frames
    pub ai_cache_frames: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightConfig {
    /// Height to assume before the first telemetry reading
    pub initial_height_m: Option<f64>,
    /// Readings above this are treated as sensor faults
    pub sanity_ceiling_m: f64,
    /// Median window applied to telemetry readings
    pub smoothing_window: usize,
    /// Bounds for the target height written to command records
    pub min_target_m: f64,
    pub max_target_m: f64,
    /// Minimum spacing between height command records
    pub command_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub source: TelemetrySource,
    /// Height log replayed by the file source
    pub path: Option<String>,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub enabled: bool,
    pub analysis_path: String,
    pub commands_path: String,
    /// Oldest records are dropped beyond this
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Pause between frames in milliseconds
    pub processing_interval_ms: u64,
    /// Log throughput every N frames
    pub stats_every_frames: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            crop_type: "general".to_string(),
            weather_condition: "clear".to_string(),
            capture_mode: CaptureSetting::Field,
            ai_interval_frames: 5,
            ai_cache_frames: 30,
        }
    }
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self {
            initial_height_m: None,
            sanity_ceiling_m: 150.0,
            smoothing_window: 5,
            min_target_m: 1.0,
            max_target_m: 10.0,
            command_interval_ms: 2000,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            source: TelemetrySource::None,
            path: None,
            interval_ms: 200,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            analysis_path: "crop_analysis.json".to_string(),
            commands_path: "height_commands.json".to_string(),
            max_entries: 100,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            processing_interval_ms: 100,
            stats_every_frames: 100,
        }
    }
}

impl CropSightConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            // Create default config file
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}
