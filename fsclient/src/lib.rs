pub mod client;
pub mod simulated;

pub use client::{FileSystemClient, FsError, FsErrorKind};
pub use simulated::{SimulatedFileSystem, SimulatedFsConfig};
