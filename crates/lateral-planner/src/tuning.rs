//! Slow-cadence tuning reads with a cached fallback

use crate::config::Tuning;
use crate::error::PlannerError;
use signal_core::seconds_to_ticks;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where runtime tuning comes from
pub trait TuningSource {
    fn read(&mut self) -> Result<Tuning, PlannerError>;
}

/// Fixed tuning, never changes
#[derive(Debug, Clone, Default)]
pub struct StaticTuning(pub Tuning);

impl TuningSource for StaticTuning {
    fn read(&mut self) -> Result<Tuning, PlannerError> {
        Ok(self.0.clone())
    }
}

/// Tuning file re-read on every poll (TOML, JSON or YAML by extension)
#[derive(Debug, Clone)]
pub struct FileTuning {
    path: PathBuf,
}

impl FileTuning {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TuningSource for FileTuning {
    fn read(&mut self) -> Result<Tuning, PlannerError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(self.path.as_path()))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Polls a `TuningSource` once per refresh period and keeps the last good value
pub struct TuningCache<S: TuningSource> {
    source: S,
    cached: Tuning,
    period_ticks: u32,
    countdown: u32,
}

impl<S: TuningSource> TuningCache<S> {
    pub fn new(source: S, initial: Tuning, refresh_s: f64) -> Self {
        Self {
            source,
            cached: initial,
            period_ticks: seconds_to_ticks(refresh_s).max(1),
            countdown: 0,
        }
    }

    pub fn current(&self) -> &Tuning {
        &self.cached
    }

    /// Advance one tick. Returns true when fresh values were read.
    pub fn tick(&mut self) -> bool {
        if self.countdown > 0 {
            self.countdown -= 1;
            return false;
        }
        self.countdown = self.period_ticks - 1;

        match self.source.read() {
            Ok(tuning) => {
                let changed = tuning != self.cached;
                if changed {
                    debug!("Tuning updated: {:?}", tuning);
                }
                self.cached = tuning;
                true
            }
            Err(e) => {
                warn!("Tuning read failed, keeping cached values: {}", e);
                false
            }
        }
    }
}
