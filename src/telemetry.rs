//! Altitude readings from outside the engine.
//!
//! Each source runs on its own thread and pushes raw heights into a channel.
//! The consumer drains the channel, smooths the readings, and feeds them to
//! the session; sources never touch the session directly.

use crate::height::HeightSmoother;
use crate::session::AnalysisSession;
use crossbeam::channel::{self, Receiver, Sender};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetrySource {
    #[default]
    None,
    Simulated,
    File,
}

/// Sweeps slowly around a centre height with a little jitter.
#[derive(Debug, Clone)]
pub struct SimulatedAltimeter {
    pub center_m: f64,
    pub amplitude_m: f64,
    pub jitter_m: f64,
    pub period_steps: u32,
}

impl SimulatedAltimeter {
    pub fn around(center_m: f64) -> Self {
        Self {
            center_m,
            amplitude_m: 1.5,
            jitter_m: 0.05,
            period_steps: 120,
        }
    }

    pub fn reading<R: Rng>(&self, step: u64, rng: &mut R) -> f64 {
        let phase = (step % self.period_steps.max(1) as u64) as f64 / self.period_steps.max(1) as f64;
        let sweep = (phase * std::f64::consts::TAU).sin() * self.amplitude_m;
        let jitter = if self.jitter_m > 0.0 {
            rng.gen_range(-self.jitter_m..self.jitter_m)
        } else {
            0.0
        };
        (self.center_m + sweep + jitter).max(0.1)
    }

    pub fn spawn(self, interval: Duration) -> HeightFeed {
        let (tx, rx) = channel::unbounded();
        let handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut step = 0u64;
            loop {
                if tx.send(self.reading(step, &mut rng)).is_err() {
                    break;
                }
                step += 1;
                thread::sleep(interval);
            }
            debug!("Simulated altimeter stopped after {} readings", step);
        });
        HeightFeed::new(rx, handle)
    }
}

/// Replays heights from a text file, one reading per line.
#[derive(Debug, Clone)]
pub struct FileAltimeter {
    pub path: PathBuf,
}

impl FileAltimeter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str) -> Vec<f64> {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| match l.parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Skipping unreadable height line '{}'", l);
                    None
                }
            })
            .collect()
    }

    pub fn spawn(self, interval: Duration) -> std::io::Result<HeightFeed> {
        let readings = Self::parse(&std::fs::read_to_string(&self.path)?);
        info!("Replaying {} heights from {}", readings.len(), self.path.display());
        let (tx, rx) = channel::unbounded();
        let handle = thread::spawn(move || {
            for value in readings {
                if tx.send(value).is_err() {
                    break;
                }
                thread::sleep(interval);
            }
        });
        Ok(HeightFeed::new(rx, handle))
    }
}

/// Receiving end of a height source plus its smoother.
pub struct HeightFeed {
    rx: Receiver<f64>,
    smoother: HeightSmoother,
    _worker: Option<JoinHandle<()>>,
}

impl HeightFeed {
    fn new(rx: Receiver<f64>, handle: JoinHandle<()>) -> Self {
        Self {
            rx,
            smoother: HeightSmoother::new(5),
            _worker: Some(handle),
        }
    }

    /// Feed driven by the caller instead of a worker thread.
    pub fn manual(window: usize) -> (Sender<f64>, Self) {
        let (tx, rx) = channel::unbounded();
        let feed = Self {
            rx,
            smoother: HeightSmoother::new(window),
            _worker: None,
        };
        (tx, feed)
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.smoother = HeightSmoother::new(window);
        self
    }

    /// Drains pending readings into the session. Returns the number accepted.
    pub fn apply(&mut self, session: &mut AnalysisSession) -> usize {
        let mut accepted = 0;
        for raw in self.rx.try_iter() {
            // Reject before smoothing so a corrupt read never enters the window.
            if let Err(e) = session.height().validate_height(raw) {
                warn!("Ignoring telemetry reading: {}", e);
                continue;
            }
            let smoothed = self.smoother.push(raw);
            match session.update_height(smoothed) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("Ignoring smoothed height: {}", e),
            }
        }
        accepted
    }
}
