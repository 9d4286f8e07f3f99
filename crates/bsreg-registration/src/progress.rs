//! Progress reporting for optimizer runs.
//!
//! The optimizer pushes one [`ProgressInfo`] per iteration through a
//! [`ProgressTracker`], which fans it out to every registered callback.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Snapshot of one optimizer iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Iterations completed so far.
    pub iteration: usize,
    /// Iteration cap, if known.
    pub max_iterations: Option<usize>,
    /// Cost at the current parameters.
    pub cost: f64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
    /// Current step size.
    pub step_size: f64,
}

impl ProgressInfo {
    pub fn new(
        iteration: usize,
        max_iterations: Option<usize>,
        cost: f64,
        elapsed: Duration,
        step_size: f64,
    ) -> Self {
        Self {
            iteration,
            max_iterations,
            cost,
            elapsed,
            step_size,
        }
    }

    /// Share of the iteration cap used so far, in percent.
    pub fn progress_percent(&self) -> Option<f64> {
        self.max_iterations
            .filter(|&total| total > 0)
            .map(|total| (self.iteration as f64 / total as f64) * 100.0)
    }
}

/// Receives progress events from an optimizer run.
pub trait ProgressCallback: Send + Sync {
    /// Called after every iteration.
    fn on_progress(&self, info: &ProgressInfo);

    fn on_start(&self) {}

    fn on_complete(&self, _info: &ProgressInfo) {}

    fn on_error(&self, _error: &str) {}
}

/// Logs progress through `tracing` every `log_interval` iterations.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.max_iterations == Some(info.iteration) {
            tracing::info!(
                "Iter {}/{} ({:.1}%) | Cost: {:.6} | Step: {:.3e} | Elapsed: {:.2}s",
                info.iteration,
                info.max_iterations
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                info.cost,
                info.step_size,
                info.elapsed.as_secs_f64()
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Optimization started");
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Optimization finished after {} iterations in {:.2}s with cost {:.6}",
            info.iteration,
            info.elapsed.as_secs_f64(),
            info.cost
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Optimization failed: {}", error);
    }
}

/// Records every progress event, for inspection after a run.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded iterations in order.
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded cost values in order.
    pub fn costs(&self) -> Vec<f64> {
        self.history().iter().map(|info| info.cost).collect()
    }

    pub fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(info.clone());
    }
}

/// Fans progress events out to registered callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with a single [`ConsoleProgressCallback`].
    pub fn console() -> Self {
        let mut tracker = Self::new();
        tracker.add_callback(Arc::new(ConsoleProgressCallback::default()));
        tracker
    }

    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn start(&self) {
        *self
            .start_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    pub fn update(&self, iteration: usize, max_iterations: Option<usize>, cost: f64, step_size: f64) {
        let info = ProgressInfo::new(iteration, max_iterations, cost, self.elapsed(), step_size);
        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    pub fn complete(&self, iterations: usize, final_cost: f64, step_size: f64) {
        let info = ProgressInfo::new(iterations, None, final_cost, self.elapsed(), step_size);
        for callback in &self.callbacks {
            callback.on_complete(&info);
        }
    }

    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}
