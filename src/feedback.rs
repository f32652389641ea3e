//! Turns statuses and height deviation into ordered operator feedback.
//!
//! Priority is the worst severity among all issues. Issues are listed worst
//! first; equal severities fall back to a fixed source precedence (sharpness,
//! brightness, contrast, coverage, height, then the secondary metrics). The
//! first listed issue that carries an altitude delta decides the direction;
//! deltas pointing the other way are dropped from the adjustment list.

use crate::assessor::AiAssessment;
use crate::height::{HeightFeedback, HeightStatus};
use crate::metrics::Metric;
use crate::status::{
    BrightnessStatus, ContrastStatus, CoverageStatus, FocusStatus, HealthStatus, MetricStatus,
    NoiseStatus, Severity, SharpnessStatus, StatusKind, StatusMap, TextureStatus,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use tracing::debug;

pub const OPTIMAL_MESSAGE: &str = "Optimal quality - maintain position";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MaintainPosition,
    FineTune,
    GradualAdjustment,
    ImmediateAdjustment,
}

impl Command {
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::None => Command::MaintainPosition,
            Severity::Minor => Command::FineTune,
            Severity::Moderate => Command::GradualAdjustment,
            Severity::Critical => Command::ImmediateAdjustment,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::MaintainPosition => "maintain_position",
            Command::FineTune => "fine_tune",
            Command::GradualAdjustment => "gradual_adjustment",
            Command::ImmediateAdjustment => "immediate_adjustment",
        }
    }

    /// Short operator-facing summary of the intent.
    pub fn summary(self) -> &'static str {
        match self {
            Command::MaintainPosition => "Optimal quality achieved",
            Command::FineTune => "Minor quality issues",
            Command::GradualAdjustment => "Moderate quality issues",
            Command::ImmediateAdjustment => "Critical quality issues",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Metric(Metric),
    Height,
    Assessor,
}

impl IssueSource {
    /// Lower wins ties between issues of equal severity.
    pub fn precedence(self) -> u8 {
        match self {
            IssueSource::Metric(Metric::Sharpness) => 0,
            IssueSource::Metric(Metric::Brightness) => 1,
            IssueSource::Metric(Metric::Contrast) => 2,
            IssueSource::Metric(Metric::GreenCoverage) => 3,
            IssueSource::Height => 4,
            IssueSource::Metric(Metric::Focus) => 5,
            IssueSource::Metric(Metric::TextureVariance) => 6,
            IssueSource::Metric(Metric::Noise) => 7,
            IssueSource::Metric(Metric::CropHealth) => 8,
            IssueSource::Assessor => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub source: IssueSource,
    pub severity: Severity,
    pub message: String,
    pub delta_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub command: Command,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub messages: Vec<String>,
    pub priority: u8,
    pub adjustments: Vec<Adjustment>,
    /// Winning signed altitude change; zero when no issue asks for one.
    pub altitude_change_m: f64,
    #[serde(skip)]
    pub issues: Vec<Issue>,
}

impl FeedbackResult {
    pub fn command(&self) -> Command {
        self.adjustments
            .first()
            .map(|a| a.command)
            .unwrap_or(Command::MaintainPosition)
    }

    /// Coarse operator summary: "optimal", "adjust" up to moderate, "move_closer" when critical.
    pub fn action_needed(&self) -> &'static str {
        match self.priority {
            0 => "optimal",
            1 | 2 => "adjust",
            _ => "move_closer",
        }
    }

    /// Reason text of the issue that set the altitude change.
    pub fn primary_reason(&self) -> &str {
        self.messages
            .first()
            .map(String::as_str)
            .unwrap_or(OPTIMAL_MESSAGE)
    }
}

/// Cause text and suggested altitude delta for a problem status.
fn describe(kind: StatusKind) -> Option<(&'static str, Option<f64>)> {
    let described = match kind {
        StatusKind::Sharpness(SharpnessStatus::VeryBlurry) => {
            ("Very blurry - critical sharpness issues", Some(-1.5))
        }
        StatusKind::Sharpness(SharpnessStatus::Blurry) => {
            ("Blurry - need sharper crop details", Some(-0.75))
        }
        StatusKind::Brightness(BrightnessStatus::ExtremelyDark) => {
            ("Extremely dark - frame barely usable", Some(-0.75))
        }
        StatusKind::Brightness(BrightnessStatus::TooDark) => {
            ("Too dark - need better lighting", Some(-0.5))
        }
        StatusKind::Brightness(BrightnessStatus::TooBright) => {
            ("Too bright - reduce overexposure", Some(0.5))
        }
        StatusKind::Brightness(BrightnessStatus::ExtremelyBright) => {
            ("Extremely bright - frame washed out", Some(0.75))
        }
        StatusKind::Contrast(ContrastStatus::Low) => ("Low contrast - adjust camera exposure", None),
        StatusKind::Contrast(ContrastStatus::High) => {
            ("High contrast - harsh lighting, check exposure", None)
        }
        StatusKind::GreenCoverage(CoverageStatus::Low) => {
            ("Low crop coverage - focus on field", Some(-0.5))
        }
        StatusKind::TextureVariance(TextureStatus::Low) => {
            ("Low texture - crop detail not resolved", Some(-0.75))
        }
        StatusKind::Focus(FocusStatus::OutOfFocus) => ("Out of focus - check camera focus", None),
        StatusKind::Noise(NoiseStatus::High) => ("High noise - check camera gain", None),
        StatusKind::CropHealth(HealthStatus::Poor) => {
            ("Poor crop health - possible stress or disease", None)
        }
        _ => return None,
    };
    Some(described)
}

fn metric_issue(status: &MetricStatus) -> Option<Issue> {
    let severity = status.severity();
    if severity == Severity::None {
        return None;
    }
    let (cause, delta_m) = describe(status.kind)?;
    let message = match delta_m {
        Some(d) if d < 0.0 => format!("{} (descend {:.2}m)", cause, -d),
        Some(d) => format!("{} (ascend {:.2}m)", cause, d),
        None => cause.to_string(),
    };
    Some(Issue {
        source: IssueSource::Metric(status.metric()),
        severity,
        message,
        delta_m,
    })
}

fn height_issue(height: &HeightFeedback) -> Option<Issue> {
    match height.status {
        HeightStatus::TooLow | HeightStatus::TooHigh if height.severity > Severity::None => {
            Some(Issue {
                source: IssueSource::Height,
                severity: height.severity,
                message: height.text.clone(),
                delta_m: Some(height.delta_m),
            })
        }
        _ => None,
    }
}

fn assessor_issue(ai: &AiAssessment) -> Option<Issue> {
    let severity = ai.severity();
    (severity > Severity::None).then(|| Issue {
        source: IssueSource::Assessor,
        severity,
        message: ai.message(),
        delta_m: None,
    })
}

pub struct FeedbackEngine;

impl FeedbackEngine {
    pub fn evaluate(
        statuses: &StatusMap,
        height: &HeightFeedback,
        ai: Option<&AiAssessment>,
    ) -> FeedbackResult {
        let mut issues: Vec<Issue> = statuses.values().filter_map(metric_issue).collect();
        issues.extend(height_issue(height));
        issues.extend(ai.and_then(assessor_issue));
        issues.sort_by_key(|i| (Reverse(i.severity), i.source.precedence()));

        let priority = issues
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::None);

        if priority == Severity::None {
            return FeedbackResult {
                messages: vec![OPTIMAL_MESSAGE.to_string()],
                priority: 0,
                adjustments: vec![Adjustment {
                    command: Command::MaintainPosition,
                    reason: Command::MaintainPosition.summary().to_string(),
                    delta_m: None,
                }],
                altitude_change_m: 0.0,
                issues,
            };
        }

        let altitude_change_m = issues
            .iter()
            .find_map(|i| i.delta_m.filter(|d| *d != 0.0))
            .unwrap_or(0.0);

        let adjustments = issues
            .iter()
            .map(|issue| {
                let delta_m = issue.delta_m.filter(|d| {
                    let agrees = d.signum() == altitude_change_m.signum();
                    if !agrees {
                        debug!(
                            "Dropping {:+.2}m from '{}', overruled by {:+.2}m",
                            d, issue.message, altitude_change_m
                        );
                    }
                    agrees
                });
                Adjustment {
                    command: Command::from_severity(issue.severity),
                    reason: issue.message.clone(),
                    delta_m,
                }
            })
            .collect();

        FeedbackResult {
            messages: issues.iter().map(|i| i.message.clone()).collect(),
            priority: priority.priority(),
            adjustments,
            altitude_change_m,
            issues,
        }
    }
}
