//! Drives one "set wallpaper" request across its destinations.
//!
//! ```text
//! NotStarted ──commit──▶ InProgress ──all terminal──▶ AllSucceeded
//!                            ▲                   ├──▶ PartiallyFailed ──┐
//!                            │                   └──▶ AllFailed ────────┤
//!                            └──────────────── retry (failed only) ◀────┘
//! ```
//!
//! Each destination is applied by its own tokio task. Outcomes land in a
//! shared map; the last task to finish computes the terminal phase under the
//! state lock, so the change notification fires exactly once per full success.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::crop::CropRectangle;
use crate::destination::{CommitOutcome, Destination};
use crate::error::{Error, Result};
use crate::geometry::Dimensions;
use crate::notifier::{ChangeNotifier, WallpaperChanged};
use crate::services::{LogEventLogger, PersistError, UserEventLogger, WallpaperPersister};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowPhase {
    NotStarted,
    InProgress,
    AllSucceeded,
    PartiallyFailed,
    AllFailed,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowPhase::AllSucceeded | WorkflowPhase::PartiallyFailed | WorkflowPhase::AllFailed
        )
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WorkflowPhase::NotStarted => "not started",
            WorkflowPhase::InProgress => "in progress",
            WorkflowPhase::AllSucceeded => "all succeeded",
            WorkflowPhase::PartiallyFailed => "partially failed",
            WorkflowPhase::AllFailed => "all failed",
        };
        f.write_str(text)
    }
}

struct CommitState {
    phase: WorkflowPhase,
    /// Bumped by every commit so late completions can be told apart.
    attempt: u64,
    outcomes: BTreeMap<Destination, CommitOutcome>,
    last_request: Option<(CropRectangle, f64)>,
    /// Set once the current request has published its change event.
    notified: bool,
}

impl CommitState {
    fn terminal_phase(&self) -> WorkflowPhase {
        let succeeded = self
            .outcomes
            .values()
            .filter(|o| **o == CommitOutcome::Succeeded)
            .count();
        if succeeded == self.outcomes.len() {
            WorkflowPhase::AllSucceeded
        } else if succeeded == 0 {
            WorkflowPhase::AllFailed
        } else {
            WorkflowPhase::PartiallyFailed
        }
    }
}

struct Shared {
    surface: Dimensions,
    notifier: ChangeNotifier,
    events: Arc<dyn UserEventLogger>,
    state: Mutex<CommitState>,
    phase_tx: watch::Sender<WorkflowPhase>,
    /// Cleared when the owning workflow is dropped.
    active: AtomicBool,
}

impl Shared {
    fn complete(&self, attempt: u64, destination: Destination, result: std::result::Result<(), PersistError>) {
        let outcome = match result {
            Ok(()) => {
                log::info!("wallpaper applied to {}", destination);
                CommitOutcome::Succeeded
            }
            Err(e) => {
                log::warn!("failed to apply wallpaper to {}: {}", destination, e);
                CommitOutcome::Failed(e.0)
            }
        };

        let (phase, event) = {
            let mut state = self.state.lock();
            if state.attempt != attempt {
                log::debug!("ignoring stale completion for {} from attempt {}", destination, attempt);
                return;
            }
            state.outcomes.insert(destination, outcome);
            if state.outcomes.values().any(|o| !o.is_terminal()) {
                return;
            }

            let phase = state.terminal_phase();
            state.phase = phase;

            let mut event = None;
            if phase == WorkflowPhase::AllSucceeded && !state.notified {
                state.notified = true;
                if let Some((crop, zoom)) = state.last_request {
                    event = Some(WallpaperChanged {
                        destinations: state.outcomes.keys().copied().collect(),
                        crop,
                        zoom,
                    });
                }
            }
            (phase, event)
        };

        self.events.log_wallpaper_set_result(phase);

        if let Some(event) = event {
            if self.active.load(Ordering::SeqCst) {
                self.notifier.publish(&event);
            } else {
                log::info!("commit finished after its workflow was discarded, not notifying");
            }
        }

        // Published last so anyone awaiting the phase also sees the notification.
        let state = self.state.lock();
        if state.attempt == attempt {
            self.phase_tx.send_replace(phase);
        }
    }
}

/// Records a failure if a destination task goes away without reporting.
struct Completion {
    shared: Arc<Shared>,
    attempt: u64,
    destination: Destination,
    finished: bool,
}

impl Completion {
    fn finish(mut self, result: std::result::Result<(), PersistError>) {
        self.finished = true;
        self.shared.complete(self.attempt, self.destination, result);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.complete(
                self.attempt,
                self.destination,
                Err(PersistError::new("commit task ended before reporting a result")),
            );
        }
    }
}

fn expand(destinations: &[Destination]) -> Vec<Destination> {
    destinations
        .iter()
        .flat_map(|d| d.expand().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One commit attempt and its retries.
///
/// Dropping the workflow lets in-flight destinations finish and record their
/// outcome, but suppresses the change notification.
pub struct WallpaperCommitWorkflow<P: WallpaperPersister> {
    persister: Arc<P>,
    runtime: Handle,
    shared: Arc<Shared>,
}

impl<P: WallpaperPersister> WallpaperCommitWorkflow<P> {
    /// Must be called from within a tokio runtime; destination tasks are spawned on it.
    pub fn new(persister: Arc<P>, surface: Dimensions, notifier: ChangeNotifier) -> Result<Self> {
        Self::with_event_logger(persister, surface, notifier, Arc::new(LogEventLogger))
    }

    pub fn with_event_logger(
        persister: Arc<P>,
        surface: Dimensions,
        notifier: ChangeNotifier,
        events: Arc<dyn UserEventLogger>,
    ) -> Result<Self> {
        let surface = surface.validate()?;
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let (phase_tx, _) = watch::channel(WorkflowPhase::NotStarted);

        Ok(Self {
            persister,
            runtime,
            shared: Arc::new(Shared {
                surface,
                notifier,
                events,
                state: Mutex::new(CommitState {
                    phase: WorkflowPhase::NotStarted,
                    attempt: 0,
                    outcomes: BTreeMap::new(),
                    last_request: None,
                    notified: false,
                }),
                phase_tx,
                active: AtomicBool::new(true),
            }),
        })
    }

    /// Starts applying `crop` at `zoom` to `destinations` and returns without waiting.
    ///
    /// Rejects rectangles that cannot cover the crop surface, destinations
    /// that already succeeded, and calls made while an attempt is running.
    pub fn commit(&self, crop: CropRectangle, zoom: f64, destinations: &[Destination]) -> Result<WorkflowPhase> {
        crop.ensure_covers(self.shared.surface, zoom)?;

        let requested = expand(destinations);
        if requested.is_empty() {
            return Err(Error::NoDestinations);
        }

        let attempt = {
            let mut state = self.shared.state.lock();
            if state.phase == WorkflowPhase::InProgress {
                return Err(Error::CommitInProgress);
            }
            if let Some(done) = requested
                .iter()
                .find(|d| state.outcomes.get(*d) == Some(&CommitOutcome::Succeeded))
            {
                return Err(Error::AlreadyCommitted(*done));
            }

            for destination in &requested {
                state.outcomes.insert(*destination, CommitOutcome::Pending);
            }
            state.phase = WorkflowPhase::InProgress;
            state.attempt += 1;
            state.last_request = Some((crop, zoom));
            state.notified = false;
            self.shared.phase_tx.send_replace(WorkflowPhase::InProgress);
            state.attempt
        };

        log::info!(
            "committing crop {} at zoom {:.4} to {:?} (attempt {})",
            crop,
            zoom,
            requested,
            attempt
        );
        self.shared.events.log_wallpaper_set(&requested);

        for destination in requested {
            let persister = Arc::clone(&self.persister);
            let completion = Completion {
                shared: Arc::clone(&self.shared),
                attempt,
                destination,
                finished: false,
            };
            self.runtime.spawn(async move {
                let result = persister.apply_crop(destination, crop, zoom).await;
                completion.finish(result);
            });
        }

        Ok(WorkflowPhase::InProgress)
    }

    /// Re-commits whichever of `destinations` currently failed, with the last crop and zoom.
    ///
    /// Succeeded destinations are skipped. If nothing requested has failed this
    /// is a no-op that returns the current phase.
    pub fn retry(&self, destinations: &[Destination]) -> Result<WorkflowPhase> {
        let (failed, crop, zoom) = {
            let state = self.shared.state.lock();
            if state.phase == WorkflowPhase::InProgress {
                return Err(Error::CommitInProgress);
            }
            let failed: Vec<Destination> = expand(destinations)
                .into_iter()
                .filter(|d| state.outcomes.get(d).is_some_and(CommitOutcome::is_failed))
                .collect();
            match state.last_request {
                Some((crop, zoom)) if !failed.is_empty() => (failed, crop, zoom),
                _ => {
                    log::debug!("nothing to retry for {:?}", destinations);
                    return Ok(state.phase);
                }
            }
        };

        log::info!("retrying {:?}", failed);
        self.commit(crop, zoom, &failed)
    }

    /// Retries every failed destination.
    pub fn retry_failed(&self) -> Result<WorkflowPhase> {
        self.retry(&[Destination::Both])
    }

    /// Phase as last published; a terminal phase is published after its notification.
    pub fn phase(&self) -> WorkflowPhase {
        *self.shared.phase_tx.borrow()
    }

    /// Resolves once the current attempt reaches a terminal phase.
    ///
    /// Returns immediately when nothing is in flight.
    pub async fn wait(&self) -> WorkflowPhase {
        let mut rx = self.shared.phase_tx.subscribe();
        let result = rx.wait_for(|phase| *phase != WorkflowPhase::InProgress).await;
        match result {
            Ok(phase) => *phase,
            Err(_) => self.phase(),
        }
    }

    pub fn outcome(&self, destination: Destination) -> Option<CommitOutcome> {
        self.shared.state.lock().outcomes.get(&destination).cloned()
    }

    pub fn outcomes(&self) -> BTreeMap<Destination, CommitOutcome> {
        self.shared.state.lock().outcomes.clone()
    }

    pub fn failed_destinations(&self) -> Vec<Destination> {
        self.shared
            .state
            .lock()
            .outcomes
            .iter()
            .filter(|(_, o)| o.is_failed())
            .map(|(d, _)| *d)
            .collect()
    }

    /// The failure of `destination` as an error value, if it failed.
    pub fn failure(&self, destination: Destination) -> Option<Error> {
        match self.outcome(destination) {
            Some(CommitOutcome::Failed(reason)) => Some(Error::PersistenceFailed(reason)),
            _ => None,
        }
    }
}

impl<P: WallpaperPersister> Drop for WallpaperCommitWorkflow<P> {
    fn drop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
    }
}
