//! Background delete-to-trash engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use desksort_core::{DeleteResult, log_error};
use indexmap::IndexSet;
use tracing::{error, info, warn};

use crate::worker::run_blocking;
use crate::{Dispatcher, OpsError, SerialWorker, ShellNotifier, TrashFacility};

/// Sends batches of paths to the trash on a single background worker.
///
/// Trashing is never recorded for undo; the platform trash is the way back.
pub struct DeleteEngine {
    worker: SerialWorker,
    facility: Arc<dyn TrashFacility>,
    notifier: Arc<ShellNotifier>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for DeleteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteEngine")
            .field("worker", &self.worker)
            .field("available", &self.facility.is_available())
            .finish_non_exhaustive()
    }
}

impl DeleteEngine {
    /// Must be called inside a tokio runtime.
    pub fn new(facility: Arc<dyn TrashFacility>, notifier: Arc<ShellNotifier>, dispatcher: Dispatcher) -> Self {
        Self {
            worker: SerialWorker::spawn("delete"),
            facility,
            notifier,
            dispatcher,
        }
    }

    pub fn is_available(&self) -> bool {
        self.facility.is_available()
    }

    /// Jobs accepted by the worker so far.
    pub fn submitted(&self) -> usize {
        self.worker.submitted()
    }

    /// Trash `paths` and report one result per path, in input order, to
    /// `on_done` on the interactive thread.
    pub fn delete_many<F>(&self, paths: Vec<PathBuf>, on_done: F)
    where
        F: FnOnce(Vec<DeleteResult>) + Send + 'static,
    {
        if !self.facility.is_available() {
            warn!("Trash is not available, refusing to delete {} items", paths.len());
            let message = OpsError::TrashUnavailable.to_string();
            let results = paths
                .into_iter()
                .map(|path| DeleteResult::error(path, message.clone()))
                .collect();
            self.dispatcher.schedule(move || on_done(results));
            return;
        }

        if !self.worker.is_open() {
            warn!("Delete requested after shutdown");
            let results = paths
                .into_iter()
                .map(|path| DeleteResult::error(path, "Delete engine is shut down"))
                .collect();
            self.dispatcher.schedule(move || on_done(results));
            return;
        }

        let facility = Arc::clone(&self.facility);
        let notifier = Arc::clone(&self.notifier);
        let dispatcher = self.dispatcher.clone();
        let submitted = self.worker.submit(async move {
            info!("Starting delete operation: {} items", paths.len());

            let requested = paths.clone();
            let results = run_blocking(move || {
                let results = trash_batch(facility.as_ref(), paths);
                notify_deleted(&notifier, &results);
                results
            })
            .await
            .unwrap_or_else(|e| {
                let message = log_error(&e, None);
                requested
                    .into_iter()
                    .map(|path| DeleteResult::error(path, message.clone()))
                    .collect()
            });

            let done = results.iter().filter(|r| r.is_ok()).count();
            info!("Delete operation completed: {done} of {} items trashed", results.len());

            dispatcher.schedule(move || on_done(results));
        });

        if let Err(e) = submitted {
            error!("Could not queue delete batch: {e}");
        }
    }

    /// Let queued batches finish.
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}

/// Trash `paths`, preferring one batched transaction and falling back to the
/// legacy single call when a transaction cannot be set up.
fn trash_batch(facility: &dyn TrashFacility, paths: Vec<PathBuf>) -> Vec<DeleteResult> {
    let mut transaction = match facility.begin() {
        Ok(transaction) => transaction,
        Err(e) => {
            warn!("Batched trash unavailable ({e}), using single-call fallback");
            return trash_legacy(facility, paths);
        }
    };

    let mut results: Vec<DeleteResult> = paths
        .into_iter()
        .map(|path| match transaction.register(&path) {
            Ok(()) => DeleteResult::ok(path),
            Err(e) => {
                let message = log_error(&e, Some(&path));
                DeleteResult::error(path, message)
            }
        })
        .collect();

    if !results.iter().any(DeleteResult::is_ok) {
        return results;
    }

    if let Err(e) = transaction.perform() {
        let message = format!("Batch operation failed: {e}");
        error!("{message}");
        for result in results.iter_mut().filter(|r| r.is_ok()) {
            *result = DeleteResult::error(std::mem::take(&mut result.path), message.clone());
        }
    }

    results
}

fn trash_legacy(facility: &dyn TrashFacility, paths: Vec<PathBuf>) -> Vec<DeleteResult> {
    match facility.delete_legacy(&paths) {
        Ok(()) => paths.into_iter().map(DeleteResult::ok).collect(),
        Err(e) => {
            let message = log_error(&e, None);
            paths
                .into_iter()
                .map(|path| DeleteResult::error(path, message.clone()))
                .collect()
        }
    }
}

fn notify_deleted(notifier: &ShellNotifier, results: &[DeleteResult]) {
    let deleted: Vec<PathBuf> = results
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| r.path.clone())
        .collect();
    if deleted.is_empty() {
        return;
    }

    let parents: IndexSet<PathBuf> = deleted
        .iter()
        .filter_map(|p| p.parent())
        .map(Path::to_path_buf)
        .collect();
    notifier.notify_batch(parents, &deleted);
}
