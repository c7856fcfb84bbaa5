use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_threads() -> usize {
    100
}
fn default_slow_operation_ms() -> u64 {
    10_000
}
fn default_poll_initial_ms() -> u64 {
    1
}
fn default_poll_max_ms() -> u64 {
    50
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NodeConfig {
    // size of the worker pool executing filesystem calls
    #[serde(default = "default_threads")]
    pub threads: usize,
    // calls slower than this are logged, they still count as successful
    #[serde(default = "default_slow_operation_ms")]
    pub slow_operation_ms: u64,
    // backoff bounds while waiting for a namespace entry created on another node
    #[serde(default = "default_poll_initial_ms")]
    pub poll_initial_ms: u64,
    #[serde(default = "default_poll_max_ms")]
    pub poll_max_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            slow_operation_ms: default_slow_operation_ms(),
            poll_initial_ms: default_poll_initial_ms(),
            poll_max_ms: default_poll_max_ms(),
        }
    }
}

impl NodeConfig {
    pub fn slow_operation_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_operation_ms)
    }
    pub fn poll_initial(&self) -> Duration {
        Duration::from_millis(self.poll_initial_ms.max(1))
    }
    pub fn poll_max(&self) -> Duration {
        Duration::from_millis(self.poll_max_ms.max(self.poll_initial_ms).max(1))
    }
}
