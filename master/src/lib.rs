pub mod barrier;
pub mod config;
pub mod error;
pub mod local_cluster;
pub mod master;
pub mod measurement;
pub mod namespace;
pub mod workload;

#[cfg(test)]
mod test_support;
