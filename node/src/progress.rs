use cluster::counter::AtomicCounter;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::runtime::Handle;
use utilities::logger::{error, warn};

pub struct ProgressReporter {
    counter: Arc<dyn AtomicCounter>,
    reported: AtomicU64,
}

impl ProgressReporter {
    pub fn new(counter: Arc<dyn AtomicCounter>) -> Self {
        Self {
            counter,
            reported: AtomicU64::new(0),
        }
    }

    pub async fn report_completed_operation(&self) {
        self.reported.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.counter.increment().await {
            error!(error = %e, "Could not report a completed operation, the barrier will not be reached");
        }
    }

    pub fn reset_local(&self) -> u64 {
        self.reported.swap(0, Ordering::AcqRel)
    }

    pub fn begin(self: &Arc<Self>) -> CompletionGuard {
        CompletionGuard {
            reporter: Some(self.clone()),
        }
    }
}

/// Reports exactly one completed operation: explicitly through `complete`, or on drop
/// when the unit of work ended any other way (panic, cancelled task, refused submission).
#[must_use = "dropping the guard reports the operation as completed"]
pub struct CompletionGuard {
    reporter: Option<Arc<ProgressReporter>>,
}

impl CompletionGuard {
    pub async fn complete(mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.report_completed_operation().await;
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let Some(reporter) = self.reporter.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { reporter.report_completed_operation().await });
            }
            Err(_) => warn!("No runtime left to report a completed operation"),
        }
    }
}
