//! Cross-thread rendezvous for conflict decisions.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use desksort_core::OverwriteChoice;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::Dispatcher;

/// Modal overwrite prompt, run on the interactive thread.
pub trait OverwritePrompt: Send + Sync {
    /// Ask what to do about an existing `dest`. `None` cancels the batch.
    fn prompt_overwrite(&self, dest: &Path) -> Option<OverwriteChoice>;
}

/// Confirmation before sending items to the trash.
pub trait RecycleConfirm: Send + Sync {
    fn confirm_recycle(&self, count: usize) -> bool;
}

impl<F> OverwritePrompt for F
where
    F: Fn(&Path) -> Option<OverwriteChoice> + Send + Sync,
{
    fn prompt_overwrite(&self, dest: &Path) -> Option<OverwriteChoice> {
        self(dest)
    }
}

/// Lets a worker obtain an overwrite decision from the interactive thread.
///
/// Each request schedules one prompt and waits on a single-slot channel for
/// its answer. A timeout or a dropped answer counts as cancel. A panicking
/// prompt counts as cancel only where panics unwind, release builds abort.
pub struct ConflictGateway {
    dispatcher: Dispatcher,
    prompt: Arc<dyn OverwritePrompt>,
    timeout: Duration,
}

impl std::fmt::Debug for ConflictGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictGateway")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ConflictGateway {
    /// Prompts run through `dispatcher` and are abandoned after `timeout`.
    pub fn new(dispatcher: Dispatcher, prompt: Arc<dyn OverwritePrompt>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            prompt,
            timeout,
        }
    }

    /// Ask the interactive thread about `dest` and wait for the answer.
    pub async fn request_decision(&self, dest: &Path) -> Option<OverwriteChoice> {
        let (tx, rx) = oneshot::channel();
        let prompt = Arc::clone(&self.prompt);
        let path = dest.to_path_buf();

        let scheduled = self.dispatcher.schedule(move || {
            let choice = catch_unwind(AssertUnwindSafe(|| prompt.prompt_overwrite(&path)))
                .unwrap_or_else(|_| {
                    error!("Overwrite prompt for {} panicked", path.display());
                    None
                });
            let _ = tx.send(choice);
        });
        if !scheduled {
            error!("Could not schedule overwrite prompt for {}", dest.display());
            return None;
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(choice)) => {
                debug!(dest = %dest.display(), ?choice, "overwrite decision");
                choice
            }
            Ok(Err(_)) => {
                error!("Overwrite prompt for {} closed without an answer", dest.display());
                None
            }
            Err(_) => {
                error!("Overwrite prompt timed out for {}", dest.display());
                None
            }
        }
    }
}
