use crate::assessor::{AiAssessment, CachedAssessor};
use crate::crop::{CropType, WeatherCondition};
use crate::error::Result;
use crate::feedback::{FeedbackEngine, FeedbackResult};
use crate::frame::Frame;
use crate::height::{HeightAdvisor, HeightFeedback};
use crate::metrics::{FrameMetrics, MetricExtractor};
use crate::record::{AnalysisRecord, HeightCommandRecord, QualitySnapshot};
use crate::score::{self, QualityBand};
use crate::status::{classify_all, StatusMap};
use crate::thresholds::{CaptureMode, ThresholdResolver, ThresholdSet};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Capture mode as configured; `Auto` re-detects from frame statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSetting {
    #[default]
    Field,
    CloseUp,
    Auto,
}

pub const AUTO_DETECT_EVERY_FRAMES: u64 = 30;

/// Dark, busy frames look like close-ups; bright, flat ones like open field.
fn detect_mode(mean: f64, std: f64) -> Option<CaptureMode> {
    if mean < 100.0 && std > 40.0 {
        Some(CaptureMode::CloseUp)
    } else if mean > 120.0 && std < 35.0 {
        Some(CaptureMode::Field)
    } else {
        None
    }
}

/// Caller-owned analysis context: the active crop, weather and capture mode,
/// their resolved thresholds, and the altitude state.
pub struct AnalysisSession {
    crop: CropType,
    weather: WeatherCondition,
    mode: CaptureMode,
    auto_detect: bool,
    thresholds: ThresholdSet,
    extractor: MetricExtractor,
    height: HeightAdvisor,
    assessor: Option<CachedAssessor>,
    frame_count: u64,
}

impl AnalysisSession {
    pub fn new(crop: CropType, weather: WeatherCondition) -> Self {
        Self {
            crop,
            weather,
            mode: CaptureMode::Field,
            auto_detect: false,
            thresholds: ThresholdResolver::resolve(crop, weather),
            extractor: MetricExtractor::default(),
            height: HeightAdvisor::new(crop),
            assessor: None,
            frame_count: 0,
        }
    }

    /// Unknown names degrade to general / clear with a warning.
    pub fn from_names(crop: &str, weather: &str) -> Self {
        Self::new(
            CropType::from_name_lossy(crop),
            WeatherCondition::from_name_lossy(weather),
        )
    }

    pub fn with_capture(mut self, setting: CaptureSetting) -> Self {
        self.auto_detect = setting == CaptureSetting::Auto;
        let mode = match setting {
            CaptureSetting::CloseUp => CaptureMode::CloseUp,
            _ => CaptureMode::Field,
        };
        self.set_mode(mode);
        self
    }

    pub fn with_height_advisor(mut self, height: HeightAdvisor) -> Self {
        self.height = height;
        self
    }

    pub fn with_assessor(mut self, assessor: CachedAssessor) -> Self {
        self.assessor = Some(assessor);
        self
    }

    pub fn with_extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn crop(&self) -> CropType {
        self.crop
    }

    pub fn weather(&self) -> WeatherCondition {
        self.weather
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn height(&self) -> &HeightAdvisor {
        &self.height
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Swaps crop and weather and re-resolves the whole threshold set.
    pub fn reconfigure(&mut self, crop: CropType, weather: WeatherCondition) {
        self.crop = crop;
        self.weather = weather;
        self.thresholds = ThresholdResolver::resolve_with_mode(crop, weather, self.mode);
        self.height.set_crop(crop);
        info!("Reconfigured analysis for {} under {} sky", crop, weather);
    }

    pub fn set_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
        self.thresholds = ThresholdResolver::resolve_with_mode(self.crop, self.weather, mode);
    }

    pub fn update_height(&mut self, value_m: f64) -> Result<()> {
        self.height.update_height(value_m)
    }

    pub fn analyze(&mut self, frame: &Frame) -> Result<FrameReport> {
        let metrics = self.extractor.extract(frame, &self.thresholds)?;
        self.frame_count += 1;

        if self.auto_detect && (self.frame_count - 1) % AUTO_DETECT_EVERY_FRAMES == 0 {
            if let Some(mode) = detect_mode(metrics.brightness, metrics.contrast) {
                if mode != self.mode {
                    info!("Switching capture mode to {:?}", mode);
                    self.set_mode(mode);
                }
            }
        }

        let statuses = classify_all(&metrics, &self.thresholds);
        let quality_score = score::score(&statuses);
        let height = self.height.feedback();
        let assessment = self
            .assessor
            .as_mut()
            .map(|a| a.poll(self.frame_count, frame, &metrics));
        let feedback = FeedbackEngine::evaluate(&statuses, &height, assessment.as_ref());

        debug!(
            "Frame {}: score {:.1}, priority {}, {}",
            self.frame_count,
            quality_score,
            feedback.priority,
            feedback.primary_reason()
        );

        Ok(FrameReport {
            frame_count: self.frame_count,
            crop: self.crop,
            weather: self.weather,
            mode: self.mode,
            metrics,
            statuses,
            score: quality_score,
            band: QualityBand::from_score(quality_score),
            feedback,
            height,
            assessment,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_count: u64,
    pub crop: CropType,
    pub weather: WeatherCondition,
    pub mode: CaptureMode,
    pub metrics: FrameMetrics,
    pub statuses: StatusMap,
    pub score: f64,
    pub band: QualityBand,
    pub feedback: FeedbackResult,
    pub height: HeightFeedback,
    pub assessment: Option<AiAssessment>,
}

impl FrameReport {
    pub fn to_record(&self) -> AnalysisRecord {
        AnalysisRecord {
            timestamp: Utc::now(),
            frame_count: self.frame_count,
            crop_type: self.crop,
            weather_condition: self.weather,
            quality_score: self.score,
            priority: self.feedback.priority,
            action_needed: self.feedback.action_needed().to_string(),
            analysis: self
                .statuses
                .iter()
                .map(|(metric, s)| (metric.name().to_string(), (s.label().to_string(), s.value)))
                .collect(),
            feedback: self.feedback.messages.clone(),
            adjustments: self.feedback.adjustments.clone(),
        }
    }

    /// Height-controller variant. The target is clamped to `[min_target, max_target]`;
    /// it is absent while no height reading has been accepted.
    pub fn to_height_command(
        &self,
        current_height: Option<f64>,
        min_target: f64,
        max_target: f64,
    ) -> HeightCommandRecord {
        let change = self.feedback.altitude_change_m;
        let target_height = current_height.map(|h| (h + change).clamp(min_target, max_target));
        let camera_type = match self.mode {
            CaptureMode::Field => "field",
            CaptureMode::CloseUp => "close_up",
        };

        HeightCommandRecord {
            analysis: self.to_record(),
            command: self.feedback.command(),
            current_height,
            target_height,
            height_change: target_height
                .zip(current_height)
                .map(|(t, c)| t - c)
                .unwrap_or(change),
            reason: self.feedback.primary_reason().to_string(),
            camera_type: camera_type.to_string(),
            quality_metrics: QualitySnapshot {
                brightness: self.metrics.brightness,
                sharpness: self.metrics.sharpness,
                green_coverage: self.metrics.green_coverage,
            },
        }
    }
}
