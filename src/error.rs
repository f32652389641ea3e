use thiserror::Error;

pub type Result<T> = std::result::Result<T, QualityError>;

#[derive(Debug, Error)]
pub enum QualityError {
    /// Frame is empty, has zero area, or carries a channel layout we cannot read.
    /// The caller should skip the frame and try again on the next capture.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Telemetry reading outside (0, ceiling]. The last good height is kept.
    #[error("invalid height reading {value:.2}m (accepted range: 0 < h <= {ceiling:.1}m)")]
    InvalidHeight { value: f64, ceiling: f64 },

    /// Only produced by strict parsing; the engine itself substitutes defaults.
    #[error("unknown {kind} '{value}'")]
    UnknownParameter { kind: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
