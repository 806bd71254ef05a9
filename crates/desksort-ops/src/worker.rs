//! Single-consumer background job queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::OpsError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs submitted jobs one at a time, in submission order.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct SerialWorker {
    name: &'static str,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    submitted: AtomicUsize,
}

impl SerialWorker {
    /// Spawn the worker task.
    pub fn spawn(name: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let handle = tokio::spawn(async move {
            debug!(worker = name, "worker started");
            while let Some(job) = rx.recv().await {
                job.await;
            }
            debug!(worker = name, "worker drained");
        });

        Self {
            name,
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Name used in this worker's log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether [`submit`](Self::submit) still accepts jobs.
    pub fn is_open(&self) -> bool {
        self.tx
            .lock()
            .map(|tx| tx.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Number of jobs accepted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Queue a job behind every job already submitted.
    pub fn submit<F>(&self, job: F) -> Result<(), OpsError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let closed = || OpsError::WorkerClosed { name: self.name };
        let guard = self.tx.lock().map_err(|_| closed())?;
        let tx = guard.as_ref().ok_or_else(closed)?;
        tx.send(Box::pin(job)).map_err(|_| closed())?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    pub async fn shutdown(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }

        let handle = self.handle.lock().ok().and_then(|mut handle| handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(worker = self.name, "worker task ended abnormally: {e}");
            }
        }
    }
}

/// Run blocking filesystem work off the async threads.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, OpsError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let worker = SerialWorker::spawn("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u64 {
            let log = Arc::clone(&log);
            worker
                .submit(async move {
                    // Later jobs sleep less; order must still hold.
                    tokio::time::sleep(Duration::from_millis(10 - i * 2)).await;
                    log.lock().unwrap().push(i);
                })
                .unwrap();
        }

        assert_eq!(worker.submitted(), 5);
        worker.shutdown().await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let worker = SerialWorker::spawn("closed");
        assert!(worker.is_open());
        worker.shutdown().await;
        assert!(!worker.is_open());

        let err = worker.submit(async {}).unwrap_err();
        assert!(matches!(err, OpsError::WorkerClosed { name: "closed" }));

        // A second shutdown is a no-op.
        worker.shutdown().await;
    }
}
