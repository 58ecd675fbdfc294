//! Service traits the commit workflow is wired with, plus default implementations.
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::crop::CropRectangle;
use crate::destination::Destination;
use crate::workflow::WorkflowPhase;

/// Opaque failure reason reported by a persister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistError(pub String);

impl PersistError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PersistError {}

/// Applies a crop to a wallpaper slot. This is where the system actually paints pixels.
pub trait WallpaperPersister: Send + Sync + 'static {
    /// Called with `Destination::Home` or `Destination::Lock` only.
    fn apply_crop(
        &self,
        destination: Destination,
        crop: CropRectangle,
        zoom: f64,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;
}

/// Receives user-facing "set wallpaper" events.
pub trait UserEventLogger: Send + Sync {
    /// One call per commit or retry request.
    fn log_wallpaper_set(&self, destinations: &[Destination]);

    /// One call per terminal transition of a commit attempt.
    fn log_wallpaper_set_result(&self, phase: WorkflowPhase);
}

/// Default logger that forwards events to the `log` facade.
pub struct LogEventLogger;

impl UserEventLogger for LogEventLogger {
    fn log_wallpaper_set(&self, destinations: &[Destination]) {
        log::info!("wallpaper set requested for {:?}", destinations);
    }

    fn log_wallpaper_set_result(&self, phase: WorkflowPhase) {
        match phase {
            WorkflowPhase::AllSucceeded => log::info!("wallpaper set result: {:?}", phase),
            _ => log::warn!("wallpaper set result: {:?}", phase),
        }
    }
}

/// Counts events, handy for summaries and assertions.
#[derive(Default)]
pub struct CountingEventLogger {
    set_events: AtomicUsize,
    result_events: AtomicUsize,
    failed_results: AtomicUsize,
}

impl CountingEventLogger {
    pub fn set_events(&self) -> usize {
        self.set_events.load(Ordering::SeqCst)
    }

    pub fn result_events(&self) -> usize {
        self.result_events.load(Ordering::SeqCst)
    }

    /// Result events whose phase was not `AllSucceeded`.
    pub fn failed_results(&self) -> usize {
        self.failed_results.load(Ordering::SeqCst)
    }
}

impl UserEventLogger for CountingEventLogger {
    fn log_wallpaper_set(&self, _destinations: &[Destination]) {
        self.set_events.fetch_add(1, Ordering::SeqCst);
    }

    fn log_wallpaper_set_result(&self, phase: WorkflowPhase) {
        self.result_events.fetch_add(1, Ordering::SeqCst);
        if phase != WorkflowPhase::AllSucceeded {
            self.failed_results.fetch_add(1, Ordering::SeqCst);
        }
    }
}
