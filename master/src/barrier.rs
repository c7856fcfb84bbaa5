use std::{error::Error, fmt::Display, sync::Arc, time::Duration};

use tokio::time::{Instant, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use utilities::logger::{info, instrument};

use cluster::{counter::AtomicCounter, error::CoordinationError};

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum BarrierError {
    Cancelled { target: u64, reached: u64 },
    Coordination(CoordinationError),
}

impl Display for BarrierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarrierError::Cancelled { target, reached } => {
                write!(f, "Cancelled at {} of {} operations", reached, target)
            }
            BarrierError::Coordination(e) => write!(f, "{}", e),
        }
    }
}

impl Error for BarrierError {}

impl From<CoordinationError> for BarrierError {
    fn from(value: CoordinationError) -> Self {
        BarrierError::Coordination(value)
    }
}

pub struct ProgressBarrier {
    counter: Arc<dyn AtomicCounter>,
    poll_interval: Duration,
    log_interval: Duration,
}

impl ProgressBarrier {
    pub fn new(counter: Arc<dyn AtomicCounter>) -> Self {
        Self {
            counter,
            poll_interval: POLL_INTERVAL,
            log_interval: PROGRESS_LOG_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, poll_interval: Duration, log_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.log_interval = log_interval;
        self
    }

    #[instrument(name = "barrier_await_completion", skip(self, cancellation))]
    pub async fn await_operation_completion(
        &self,
        target: u64,
        cancellation: &CancellationToken,
    ) -> Result<u64, BarrierError> {
        let mut progress_log = interval_at(Instant::now() + self.log_interval, self.log_interval);
        if let Some(mut changes) = self.counter.subscribe() {
            loop {
                let current = *changes.borrow_and_update();
                if current >= target {
                    return Ok(current);
                }
                tokio::select! {
                    _ = cancellation.cancelled() => {
                        return Err(BarrierError::Cancelled { target, reached: current });
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = progress_log.tick() => {
                        info!(completed = current, target, "Waiting for operations");
                    }
                }
            }
        }
        loop {
            let current = self.counter.get().await?;
            if current >= target {
                return Ok(current);
            }
            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(BarrierError::Cancelled { target, reached: current });
                }
                _ = sleep(self.poll_interval) => {}
                _ = progress_log.tick() => {
                    info!(completed = current, target, "Waiting for operations");
                }
            }
        }
    }

    pub async fn reset(&self) -> Result<(), BarrierError> {
        self.counter.set(0).await?;
        Ok(())
    }

    pub async fn current(&self) -> Result<u64, BarrierError> {
        Ok(self.counter.get().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cluster::counter::LocalAtomicCounter;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct PolledCounter(AtomicU64);

    #[async_trait]
    impl AtomicCounter for PolledCounter {
        async fn get(&self) -> Result<u64, CoordinationError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
        async fn increment(&self) -> Result<u64, CoordinationError> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
        async fn compare_and_swap(&self, expected: u64, new: u64) -> Result<bool, CoordinationError> {
            Ok(self
                .0
                .compare_exchange(expected, new, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok())
        }
        async fn set(&self, value: u64) -> Result<(), CoordinationError> {
            self.0.store(value, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn completes_when_target_is_reached(counter: Arc<dyn AtomicCounter>) {
        let barrier = ProgressBarrier::new(counter.clone())
            .with_intervals(Duration::from_millis(5), Duration::from_millis(20));
        let incrementer = tokio::spawn(async move {
            for _ in 0..25 {
                counter.increment().await.unwrap();
                sleep(Duration::from_millis(1)).await;
            }
        });
        let reached = barrier
            .await_operation_completion(25, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reached, 25);
        incrementer.await.unwrap();
        barrier.reset().await.unwrap();
        assert_eq!(barrier.current().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn waits_on_notifications() {
        completes_when_target_is_reached(Arc::new(LocalAtomicCounter::default())).await;
    }

    #[tokio::test]
    async fn falls_back_to_polling() {
        completes_when_target_is_reached(Arc::new(PolledCounter::default())).await;
    }

    #[tokio::test]
    async fn a_reached_target_returns_immediately() {
        let counter = Arc::new(LocalAtomicCounter::new(7));
        let barrier = ProgressBarrier::new(counter);
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        // an already satisfied barrier does not look at the token
        assert_eq!(barrier.await_operation_completion(7, &cancelled).await.unwrap(), 7);
        assert_eq!(barrier.await_operation_completion(0, &cancelled).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        for counter in [
            Arc::new(LocalAtomicCounter::new(3)) as Arc<dyn AtomicCounter>,
            Arc::new(PolledCounter(AtomicU64::new(3))) as Arc<dyn AtomicCounter>,
        ] {
            let barrier = ProgressBarrier::new(counter);
            let cancellation = CancellationToken::new();
            let trigger = cancellation.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(20)).await;
                trigger.cancel();
            });
            match barrier.await_operation_completion(10, &cancellation).await {
                Err(BarrierError::Cancelled { target, reached }) => {
                    assert_eq!(target, 10);
                    assert_eq!(reached, 3);
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }
}
