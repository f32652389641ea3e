use crate::assessor::{CachedAssessor, QualityAssessor};
use crate::config::CropSightConfig;
use crate::error::QualityError;
use crate::frame::Frame;
use crate::height::HeightAdvisor;
use crate::record::JsonRecorder;
use crate::session::{AnalysisSession, FrameReport};
use crate::telemetry::{FileAltimeter, HeightFeed, SimulatedAltimeter, TelemetrySource};
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub mean_score: f64,
    pub worst_priority: u8,
}

/// Builds a session from the configuration, applying the initial height if set.
pub fn build_session(config: &CropSightConfig) -> AnalysisSession {
    let mut session =
        AnalysisSession::from_names(&config.analysis.crop_type, &config.analysis.weather_condition)
            .with_capture(config.analysis.capture_mode);
    let advisor = HeightAdvisor::new(session.crop()).with_ceiling(config.height.sanity_ceiling_m);
    session = session.with_height_advisor(advisor);

    if let Some(h) = config.height.initial_height_m {
        if let Err(e) = session.update_height(h) {
            warn!("Ignoring configured initial height: {}", e);
        }
    }
    session
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files under `input` (a single file or a directory), in name order.
pub fn list_frames(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("input path {} does not exist", input.display()));
    }
    let mut frames: Vec<PathBuf> = std::fs::read_dir(input)
        .with_context(|| format!("reading {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    frames.sort();
    Ok(frames)
}

pub struct MonitorPipeline {
    session: AnalysisSession,
    config: CropSightConfig,
    input: PathBuf,
    watch: bool,
    feed: Option<HeightFeed>,
    analysis_recorder: Option<JsonRecorder>,
    command_recorder: Option<JsonRecorder>,
    last_command: Option<Instant>,
    running: Arc<RwLock<bool>>,
}

impl MonitorPipeline {
    pub fn new(config: CropSightConfig, input: impl Into<PathBuf>) -> Result<Self> {
        let session = build_session(&config);
        info!(
            "Monitoring {} under {} conditions ({:?} capture)",
            session.crop(),
            session.weather(),
            config.analysis.capture_mode
        );

        let interval = Duration::from_millis(config.telemetry.interval_ms);
        let feed = match config.telemetry.source {
            TelemetrySource::None => None,
            TelemetrySource::Simulated => Some(
                SimulatedAltimeter::around(session.height().optimal_height_m()).spawn(interval),
            ),
            TelemetrySource::File => {
                let path = config
                    .telemetry
                    .path
                    .as_deref()
                    .ok_or_else(|| anyhow!("telemetry source 'file' needs telemetry.path"))?;
                Some(FileAltimeter::new(path).spawn(interval)?)
            }
        }
        .map(|feed| feed.with_window(config.height.smoothing_window));

        let (analysis_recorder, command_recorder) = if config.recorder.enabled {
            (
                Some(JsonRecorder::new(
                    &config.recorder.analysis_path,
                    config.recorder.max_entries,
                )),
                Some(JsonRecorder::new(
                    &config.recorder.commands_path,
                    config.recorder.max_entries,
                )),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            session,
            config,
            input: input.into(),
            watch: false,
            feed,
            analysis_recorder,
            command_recorder,
            last_command: None,
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// Keep polling the input directory for new frames until stopped.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_assessor(mut self, assessor: Box<dyn QualityAssessor>) -> Self {
        let cached = CachedAssessor::new(
            assessor,
            self.config.analysis.ai_interval_frames,
            self.config.analysis.ai_cache_frames,
        );
        info!("Secondary assessor enabled: {}", cached.name());
        self.session = self.session.with_assessor(cached);
        self
    }

    pub fn with_height_feed(mut self, feed: HeightFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn session(&self) -> &AnalysisSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AnalysisSession {
        &mut self.session
    }

    pub fn running_flag(&self) -> Arc<RwLock<bool>> {
        self.running.clone()
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    pub async fn run(&mut self) -> Result<PipelineSummary> {
        info!("Starting crop monitoring loop on {}", self.input.display());

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let stats_every = self.config.performance.stats_every_frames.max(1);
        let mut summary = PipelineSummary::default();
        let mut score_total = 0.0;
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut last_stats_time = Instant::now();

        loop {
            if !*self.running.read().await {
                break;
            }

            let pending: Vec<PathBuf> = list_frames(&self.input)?
                .into_iter()
                .filter(|p| !seen.contains(p))
                .collect();

            if pending.is_empty() {
                if !self.watch {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(
                    self.config.performance.processing_interval_ms.max(100),
                ))
                .await;
                continue;
            }

            for path in pending {
                if !*self.running.read().await {
                    break;
                }
                seen.insert(path.clone());

                match self.process_frame(&path).await {
                    Ok(report) => {
                        summary.frames_processed += 1;
                        score_total += report.score;
                        summary.worst_priority = summary.worst_priority.max(report.feedback.priority);

                        if summary.frames_processed % stats_every == 0 {
                            let elapsed = last_stats_time.elapsed();
                            let fps = stats_every as f32 / elapsed.as_secs_f32();
                            info!(
                                "Processed {} frames, current FPS: {:.2}, mean score {:.1}",
                                summary.frames_processed,
                                fps,
                                score_total / summary.frames_processed as f64
                            );
                            last_stats_time = Instant::now();
                        }
                    }
                    Err(e) => {
                        summary.frames_skipped += 1;
                        match e.downcast_ref::<QualityError>() {
                            Some(QualityError::InvalidFrame(_)) => {
                                warn!("Skipping {}: {}", path.display(), e)
                            }
                            _ => error!("Frame processing error on {}: {:#}", path.display(), e),
                        }
                        // Continue processing despite errors
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }

                tokio::time::sleep(Duration::from_millis(
                    self.config.performance.processing_interval_ms,
                ))
                .await;
            }
        }

        if summary.frames_processed > 0 {
            summary.mean_score = score_total / summary.frames_processed as f64;
        }
        info!(
            "Monitoring stopped after {} frames ({} skipped)",
            summary.frames_processed, summary.frames_skipped
        );
        Ok(summary)
    }

    async fn process_frame(&mut self, path: &Path) -> Result<FrameReport> {
        if let Some(feed) = self.feed.as_mut() {
            let accepted = feed.apply(&mut self.session);
            if accepted > 0 {
                debug!("Applied {} height readings", accepted);
            }
        }

        let frame = Frame::load(path)?;
        let report = self.session.analyze(&frame)?;

        info!(
            "{}: score {:.1} ({}), priority {} - {}",
            path.display(),
            report.score,
            report.band,
            report.feedback.priority,
            report.feedback.primary_reason()
        );

        // Recording failures are logged; the frame still counts as analyzed.
        if let Some(recorder) = &self.analysis_recorder {
            if let Err(e) = recorder.append(&report.to_record()).await {
                error!("Failed to record analysis in {}: {}", recorder.path().display(), e);
            }
        }

        let interval = Duration::from_millis(self.config.height.command_interval_ms);
        let command_due = self.last_command.map_or(true, |at| at.elapsed() >= interval);
        match &self.command_recorder {
            Some(recorder) if command_due => {
                let command = report.to_height_command(
                    self.session.height().current_height_m(),
                    self.config.height.min_target_m,
                    self.config.height.max_target_m,
                );
                if let Err(e) = recorder.append(&command).await {
                    error!("Failed to record height command in {}: {}", recorder.path().display(), e);
                }
                self.last_command = Some(Instant::now());
            }
            Some(_) => debug!("Height command throttled for frame {}", report.frame_count),
            None => {}
        }
        Ok(report)
    }
}
