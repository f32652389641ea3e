pub mod assessor;
pub mod config;
pub mod crop;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod height;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod score;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod thresholds;

pub use crop::{CropType, WeatherCondition};
pub use error::{QualityError, Result};
pub use feedback::{Command, FeedbackEngine, FeedbackResult};
pub use frame::Frame;
pub use height::{HeightAdvisor, HeightFeedback};
pub use metrics::{FrameMetrics, Metric, MetricExtractor};
pub use session::{AnalysisSession, FrameReport};
pub use status::{classify, MetricStatus, Severity};
pub use thresholds::{ThresholdResolver, ThresholdSet};
