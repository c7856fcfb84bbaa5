use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::CoordinationError;

#[async_trait]
pub trait AtomicCounter: Send + Sync {
    async fn get(&self) -> Result<u64, CoordinationError>;
    async fn increment(&self) -> Result<u64, CoordinationError>;
    async fn compare_and_swap(&self, expected: u64, new: u64) -> Result<bool, CoordinationError>;
    async fn set(&self, value: u64) -> Result<(), CoordinationError>;
    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

#[derive(Debug)]
pub struct LocalAtomicCounter {
    value: watch::Sender<u64>,
}

impl LocalAtomicCounter {
    pub fn new(initial: u64) -> Self {
        let (value, _) = watch::channel(initial);
        Self { value }
    }
}

impl Default for LocalAtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl AtomicCounter for LocalAtomicCounter {
    async fn get(&self) -> Result<u64, CoordinationError> {
        Ok(*self.value.borrow())
    }
    async fn increment(&self) -> Result<u64, CoordinationError> {
        let mut new_value = 0;
        self.value.send_modify(|value| {
            *value += 1;
            new_value = *value;
        });
        Ok(new_value)
    }
    async fn compare_and_swap(&self, expected: u64, new: u64) -> Result<bool, CoordinationError> {
        let mut swapped = false;
        self.value.send_if_modified(|value| {
            if *value != expected {
                return false;
            }
            swapped = true;
            let changed = *value != new;
            *value = new;
            changed
        });
        Ok(swapped)
    }
    async fn set(&self, value: u64) -> Result<(), CoordinationError> {
        self.value.send_replace(value);
        Ok(())
    }
    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        Some(self.value.subscribe())
    }
}
