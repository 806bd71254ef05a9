//! Delivery of work onto the interactive thread.

use std::future::Future;

use tokio::sync::mpsc;

/// A unit of work that must run on the interactive thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle for scheduling callbacks onto the interactive thread.
///
/// Cloned into every engine. Scheduling never blocks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<UiTask>,
}

/// Single consumer of scheduled callbacks, driven by the interactive thread.
#[derive(Debug)]
pub struct DispatchLoop {
    rx: mpsc::UnboundedReceiver<UiTask>,
}

impl Dispatcher {
    /// Create a dispatcher and the loop that consumes it.
    pub fn channel() -> (Self, DispatchLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DispatchLoop { rx })
    }

    /// Queue `callback` to run on the interactive thread.
    ///
    /// Returns `false` if the loop is gone, in which case the callback is
    /// dropped without running.
    pub fn schedule<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(callback)).is_err() {
            tracing::warn!("Dispatch loop closed, dropping callback");
            return false;
        }
        true
    }
}

impl DispatchLoop {
    /// Wait for the next callback and run it.
    ///
    /// Returns `false` once every dispatcher is dropped and the queue is empty.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run every callback that is already queued, without waiting.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run callbacks until every dispatcher is dropped.
    pub async fn run(mut self) {
        while self.turn().await {}
    }

    /// Keep running callbacks while waiting for `until` to finish.
    ///
    /// Queued callbacks take priority, so a completion callback that feeds
    /// `until` is observed on the following iteration.
    pub async fn run_until<F: Future>(&mut self, until: F) -> F::Output {
        tokio::pin!(until);
        loop {
            tokio::select! {
                biased;
                task = self.rx.recv() => match task {
                    Some(task) => task(),
                    None => return until.await,
                },
                output = &mut until => return output,
            }
        }
    }
}
