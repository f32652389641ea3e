//! JSON records for downstream readers (flight controller bridge, log review).

use crate::crop::{CropType, WeatherCondition};
use crate::error::{QualityError, Result};
use crate::feedback::{Adjustment, Command};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: DateTime<Utc>,
    pub frame_count: u64,
    pub crop_type: CropType,
    pub weather_condition: WeatherCondition,
    pub quality_score: f64,
    pub priority: u8,
    /// "optimal", "adjust" or "move_closer"
    #[serde(default)]
    pub action_needed: String,
    /// metric name -> [status label, raw value]
    pub analysis: BTreeMap<String, (String, f64)>,
    pub feedback: Vec<String>,
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub brightness: f64,
    pub sharpness: f64,
    pub green_coverage: f64,
}

/// Record consumed by the height controller bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightCommandRecord {
    #[serde(flatten)]
    pub analysis: AnalysisRecord,
    pub command: Command,
    pub current_height: Option<f64>,
    pub target_height: Option<f64>,
    pub height_change: f64,
    pub reason: String,
    pub camera_type: String,
    pub quality_metrics: QualitySnapshot,
}

/// Appends records to a JSON array file, keeping the newest `max_entries`.
#[derive(Debug, Clone)]
pub struct JsonRecorder {
    path: PathBuf,
    max_entries: usize,
}

impl JsonRecorder {
    pub fn new<P: Into<PathBuf>>(path: P, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut entries = self.read_entries().await?;
        entries.push(serde_json::to_value(record)?);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, content).await?;
        debug!("Recorded entry {} in {}", entries.len(), self.path.display());
        Ok(())
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.read_entries()
            .await?
            .into_iter()
            .map(|v| serde_json::from_value::<T>(v).map_err(QualityError::from))
            .collect()
    }

    pub async fn latest<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.read_entries().await?.pop() {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    async fn read_entries(&self) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(single) => Ok(vec![single]),
            Err(e) => {
                warn!(
                    "Discarding unreadable record file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }
}
