//! Undo ledger for move batches.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use desksort_core::{UndoAction, log_error};
use tracing::{debug, info, warn};

use crate::worker::run_blocking;
use crate::{BackupVault, Dispatcher, MoveStrategies, OpsError, SerialWorker};

/// Counts from replaying one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl UndoOutcome {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Reverse every action of a batch, last first.
///
/// Failures are logged and counted; they never stop the remaining actions.
pub fn undo_batch(strategies: &MoveStrategies, actions: &[UndoAction]) -> UndoOutcome {
    let mut outcome = UndoOutcome::default();

    for action in actions.iter().rev() {
        debug!("{}", action.undo_description());
        match undo_action(strategies, action) {
            Ok(()) => outcome.succeeded += 1,
            Err(e @ OpsError::Blocked { .. }) => {
                warn!("Cannot undo: {e}");
                outcome.failed += 1;
            }
            Err(e) => {
                log_error(&e, Some(action.dest()));
                outcome.failed += 1;
            }
        }
    }

    outcome
}

fn undo_action(strategies: &MoveStrategies, action: &UndoAction) -> Result<(), OpsError> {
    match action {
        UndoAction::Move { src, dest } => {
            if fs::symlink_metadata(dest).is_err() {
                return Err(OpsError::Blocked {
                    path: dest.clone(),
                    reason: "Moved item no longer exists",
                });
            }
            if let Some(parent) = src.parent() {
                fs::create_dir_all(parent).map_err(|e| OpsError::io(parent, e))?;
            }
            if fs::symlink_metadata(src).is_ok() {
                return Err(OpsError::Blocked {
                    path: src.clone(),
                    reason: "Original location is occupied",
                });
            }
            strategies.move_item(dest, src)?;
            debug!("Undid move: {} -> {}", dest.display(), src.display());
        }
        UndoAction::Replace { dest, backup } => {
            if fs::symlink_metadata(backup).is_err() {
                return Err(OpsError::Blocked {
                    path: backup.clone(),
                    reason: "Backup no longer exists",
                });
            }
            set_aside(strategies, dest, backup)?;
            strategies.move_item(backup, dest)?;
            debug!("Restored backup: {} -> {}", backup.display(), dest.display());

            // Only succeeds once the session directory is empty.
            if let Some(session_dir) = backup.parent() {
                let _ = fs::remove_dir(session_dir);
            }
        }
    }
    Ok(())
}

/// Move whatever occupies `dest` into the backup's directory so the restore
/// never destroys data. This happens when the paired move could not be
/// undone and `dest` still holds the moved-in item.
fn set_aside(strategies: &MoveStrategies, dest: &Path, backup: &Path) -> Result<(), OpsError> {
    if fs::symlink_metadata(dest).is_err() {
        return Ok(());
    }
    let (Some(dir), Some(name)) = (backup.parent(), dest.file_name()) else {
        return Err(OpsError::Blocked {
            path: dest.to_path_buf(),
            reason: "Destination is occupied",
        });
    };

    let aside = BackupVault::make_unique_name(name, dir);
    strategies.move_item(dest, &aside)?;
    warn!(
        "{} was occupied, kept its content at {}",
        dest.display(),
        aside.display()
    );
    Ok(())
}

/// LIFO stack of move batches for the running session.
///
/// The stack lives in memory only. Popping a batch removes it for good,
/// whatever the replay outcome.
pub struct UndoLedger {
    stack: Mutex<Vec<Vec<UndoAction>>>,
    strategies: Arc<MoveStrategies>,
    worker: SerialWorker,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for UndoLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoLedger")
            .field("depth", &self.stack_depth())
            .field("worker", &self.worker)
            .finish_non_exhaustive()
    }
}

impl UndoLedger {
    /// Must be called inside a tokio runtime.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_strategies(dispatcher, MoveStrategies::platform_default())
    }

    /// Create a ledger that replays with `strategies`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_strategies(dispatcher: Dispatcher, strategies: MoveStrategies) -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
            strategies: Arc::new(strategies),
            worker: SerialWorker::spawn("undo"),
            dispatcher,
        }
    }

    fn stack(&self) -> MutexGuard<'_, Vec<Vec<UndoAction>>> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a batch. Empty batches are ignored.
    pub fn push_batch(&self, actions: Vec<UndoAction>) {
        if actions.is_empty() {
            return;
        }
        let mut stack = self.stack();
        let count = actions.len();
        stack.push(actions);
        debug!("Pushed undo batch of {count} actions (depth {})", stack.len());
    }

    /// Check if there is a batch to undo.
    pub fn can_undo(&self) -> bool {
        !self.stack().is_empty()
    }

    /// Number of batches on the stack.
    pub fn stack_depth(&self) -> usize {
        self.stack().len()
    }

    /// The batch the next undo would replay.
    pub fn peek(&self) -> Option<Vec<UndoAction>> {
        self.stack().last().cloned()
    }

    pub fn clear(&self) {
        self.stack().clear();
        info!("Undo stack cleared");
    }

    /// Jobs accepted by the worker so far.
    pub fn submitted(&self) -> usize {
        self.worker.submitted()
    }

    /// Pop the newest batch and replay it on the undo worker.
    ///
    /// The pop happens immediately, so back-to-back calls take successive
    /// batches. `on_done` runs on the interactive thread.
    pub fn undo_last<F>(&self, on_done: F)
    where
        F: FnOnce(UndoOutcome) + Send + 'static,
    {
        let Some(batch) = self.stack().pop() else {
            debug!("Nothing to undo");
            self.dispatcher.schedule(move || on_done(UndoOutcome::default()));
            return;
        };

        info!("Undoing batch of {} actions", batch.len());

        if !self.worker.is_open() {
            warn!("Undo requested after shutdown");
            let outcome = UndoOutcome {
                succeeded: 0,
                failed: batch.len(),
            };
            self.dispatcher.schedule(move || on_done(outcome));
            return;
        }

        let strategies = Arc::clone(&self.strategies);
        let dispatcher = self.dispatcher.clone();
        let submitted = self.worker.submit(async move {
            let count = batch.len();
            let outcome = run_blocking(move || undo_batch(&strategies, &batch))
                .await
                .unwrap_or_else(|e| {
                    log_error(&e, None);
                    UndoOutcome {
                        succeeded: 0,
                        failed: count,
                    }
                });

            info!(
                "Undo completed: {} succeeded, {} failed",
                outcome.succeeded, outcome.failed
            );
            dispatcher.schedule(move || on_done(outcome));
        });

        if let Err(e) = submitted {
            warn!("Could not queue undo: {e}");
        }
    }

    /// Let a queued replay finish.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}
