//! Engine-wide configuration knobs.
//!
//! Timing constants can be loaded from JSON so hosts can tune them without a
//! rebuild; the logger and metrics handles are wired in code.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{FileSink, Logger};
use crate::metrics::{DEFAULT_METRICS_TARGET, NavigationMetrics};
use crate::Result;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(600);
pub const MIN_SETTLE_DELAY: Duration = Duration::from_millis(400);
pub const DEFAULT_DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(400);

/// Configuration shared by coordinators and the root context.
#[derive(Clone, Debug)]
pub struct NavigatorConfig {
    /// Pause inserted after each routing command.
    pub settle_delay: Duration,
    /// Lower bound applied to `settle_delay`.
    pub settle_floor: Duration,
    /// Window in which a second selection of the same tab counts as a double tap.
    pub double_tap_window: Duration,
    /// Optional structured logger used by every component.
    pub logger: Option<Logger>,
    /// Metrics accumulator, shared across components.
    pub metrics: Option<Arc<Mutex<NavigationMetrics>>>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            settle_floor: MIN_SETTLE_DELAY,
            double_tap_window: DEFAULT_DOUBLE_TAP_WINDOW,
            logger: None,
            metrics: None,
            metrics_target: DEFAULT_METRICS_TARGET.to_string(),
        }
    }
}

impl NavigatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse [`TimingSettings`] from JSON and apply them over the defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let timing: TimingSettings = serde_json::from_str(raw)?;
        Ok(Self::default().with_timing(timing))
    }

    pub fn with_timing(mut self, timing: TimingSettings) -> Self {
        self.settle_delay = Duration::from_millis(timing.settle_delay_ms);
        self.settle_floor = Duration::from_millis(timing.settle_floor_ms);
        self.double_tap_window = Duration::from_millis(timing.double_tap_window_ms);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Log JSON lines to `path`, truncating the file once it would exceed
    /// `max_bytes` (`0` disables rotation).
    pub fn with_log_file(self, path: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
        let sink = FileSink::new(path, max_bytes)?;
        Ok(self.with_logger(Logger::new(sink)))
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// The delay actually slept between commands; never below the floor.
    pub fn effective_settle_delay(&self) -> Duration {
        self.settle_delay.max(self.settle_floor)
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(NavigationMetrics::new())));
        }
    }

    /// Disable metrics collection.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<NavigationMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }

    /// Log a snapshot of the shared metrics under `metrics_target`. No-op
    /// unless both a logger and metrics are configured.
    pub fn emit_metrics(&self, uptime: Duration) {
        if let (Some(logger), Some(metrics)) = (self.logger.as_ref(), self.metrics.as_ref()) {
            let snapshot = metrics
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .snapshot(uptime);
            let _ = logger.log_event(snapshot.to_log_event(&self.metrics_target));
        }
    }

    pub(crate) fn record<F>(&self, update: F)
    where
        F: FnOnce(&mut NavigationMetrics),
    {
        if let Some(metrics) = self.metrics.as_ref() {
            update(&mut metrics.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

/// Serializable timing constants. Missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub settle_delay_ms: u64,
    pub settle_floor_ms: u64,
    pub double_tap_window_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            settle_floor_ms: MIN_SETTLE_DELAY.as_millis() as u64,
            double_tap_window_ms: DEFAULT_DOUBLE_TAP_WINDOW.as_millis() as u64,
        }
    }
}
