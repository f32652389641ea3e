//! Secondary quality assessment.
//!
//! An external model may grade frames alongside the metric pipeline. It is a
//! best-effort source: it runs on a frame interval, its last answer is reused
//! for a bounded number of frames, and any failure falls back to a score built
//! from the traditional metrics.

use crate::error::Result;
use crate::frame::Frame;
use crate::metrics::FrameMetrics;
use crate::status::Severity;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Model,
    Traditional,
}

/// Normalised grades in 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAssessment {
    pub overall: f64,
    pub sharpness: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub crop_health: f64,
    pub source: AssessmentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AiAssessment {
    pub fn severity(&self) -> Severity {
        if self.overall.is_nan() || self.overall < 0.3 {
            Severity::Moderate
        } else if self.overall < 0.5 {
            Severity::Minor
        } else {
            Severity::None
        }
    }

    pub fn message(&self) -> String {
        match &self.notes {
            Some(notes) => format!("Assessor flagged low quality ({:.2}): {}", self.overall, notes),
            None => format!("Assessor flagged low quality ({:.2})", self.overall),
        }
    }
}

pub trait QualityAssessor: Send {
    fn name(&self) -> &str;

    /// `Ok(None)` means the assessor had nothing to say for this frame.
    fn assess(&mut self, frame: &Frame, metrics: &FrameMetrics) -> Result<Option<AiAssessment>>;
}

/// Metric-derived stand-in used when no model answer is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraditionalAssessor;

impl TraditionalAssessor {
    pub fn from_metrics(metrics: &FrameMetrics) -> AiAssessment {
        AiAssessment {
            overall: 0.7,
            sharpness: (metrics.sharpness / 200.0).clamp(0.0, 1.0),
            brightness: (metrics.brightness / 255.0).clamp(0.0, 1.0),
            contrast: (metrics.contrast / 100.0).clamp(0.0, 1.0),
            crop_health: metrics.crop_health.clamp(0.0, 1.0),
            source: AssessmentSource::Traditional,
            notes: None,
        }
    }
}

impl QualityAssessor for TraditionalAssessor {
    fn name(&self) -> &str {
        "traditional"
    }

    fn assess(&mut self, _frame: &Frame, metrics: &FrameMetrics) -> Result<Option<AiAssessment>> {
        Ok(Some(Self::from_metrics(metrics)))
    }
}

/// Runs the wrapped assessor every `interval` frames and serves its last answer
/// for up to `max_age` frames.
pub struct CachedAssessor {
    inner: Box<dyn QualityAssessor>,
    interval: u64,
    max_age: u64,
    cached: Option<(u64, AiAssessment)>,
}

impl CachedAssessor {
    pub fn new(inner: Box<dyn QualityAssessor>, interval: u64, max_age: u64) -> Self {
        Self {
            inner,
            interval: interval.max(1),
            max_age,
            cached: None,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn poll(&mut self, frame_count: u64, frame: &Frame, metrics: &FrameMetrics) -> AiAssessment {
        if frame_count % self.interval == 0 {
            match self.inner.assess(frame, metrics) {
                Ok(Some(assessment)) => {
                    debug!(
                        "{} assessment at frame {}: overall {:.2}",
                        self.inner.name(),
                        frame_count,
                        assessment.overall
                    );
                    self.cached = Some((frame_count, assessment.clone()));
                    return assessment;
                }
                Ok(None) => {}
                Err(e) => warn!("{} assessment failed: {}", self.inner.name(), e),
            }
        }

        match &self.cached {
            Some((at, assessment)) if frame_count.saturating_sub(*at) <= self.max_age => {
                assessment.clone()
            }
            _ => TraditionalAssessor::from_metrics(metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QualityError;

    struct Scripted {
        answers: Vec<Result<Option<AiAssessment>>>,
        calls: usize,
    }

    impl QualityAssessor for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn assess(&mut self, _: &Frame, _: &FrameMetrics) -> Result<Option<AiAssessment>> {
            self.calls += 1;
            if self.answers.is_empty() {
                Ok(None)
            } else {
                self.answers.remove(0)
            }
        }
    }

    fn model(overall: f64) -> AiAssessment {
        AiAssessment {
            overall,
            sharpness: overall,
            brightness: overall,
            contrast: overall,
            crop_health: overall,
            source: AssessmentSource::Model,
            notes: None,
        }
    }

    #[test]
    fn severity_follows_overall_grade() {
        assert_eq!(model(0.2).severity(), Severity::Moderate);
        assert_eq!(model(0.4).severity(), Severity::Minor);
        assert_eq!(model(0.9).severity(), Severity::None);
    }

    #[test]
    fn traditional_fallback_normalises_metrics() {
        let metrics = FrameMetrics {
            sharpness: 400.0,
            brightness: 127.5,
            contrast: 50.0,
            crop_health: 0.8,
            ..FrameMetrics::default()
        };
        let a = TraditionalAssessor::from_metrics(&metrics);
        assert_eq!(a.overall, 0.7);
        assert_eq!(a.sharpness, 1.0);
        assert_eq!(a.brightness, 0.5);
        assert_eq!(a.contrast, 0.5);
        assert_eq!(a.source, AssessmentSource::Traditional);
        assert_eq!(a.severity(), Severity::None);
    }

    #[test]
    fn cache_serves_between_runs_and_expires() {
        let scripted = Scripted {
            answers: vec![Ok(Some(model(0.2)))],
            calls: 0,
        };
        let mut cached = CachedAssessor::new(Box::new(scripted), 5, 6);
        let frame = Frame::new(2, 2);
        let metrics = FrameMetrics::default();

        assert_eq!(cached.poll(0, &frame, &metrics).overall, 0.2);
        assert_eq!(cached.poll(3, &frame, &metrics).source, AssessmentSource::Model);
        // Frame 5 runs the model again, gets nothing, still inside max_age.
        assert_eq!(cached.poll(5, &frame, &metrics).source, AssessmentSource::Model);
        assert_eq!(cached.poll(7, &frame, &metrics).source, AssessmentSource::Traditional);
    }

    #[test]
    fn errors_fall_back_to_traditional() {
        let scripted = Scripted {
            answers: vec![Err(QualityError::InvalidFrame("model offline".into()))],
            calls: 0,
        };
        let mut cached = CachedAssessor::new(Box::new(scripted), 1, 30);
        let a = cached.poll(0, &Frame::new(2, 2), &FrameMetrics::default());
        assert_eq!(a.source, AssessmentSource::Traditional);
    }
}
