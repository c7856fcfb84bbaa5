pub mod config;
pub mod executor;
pub mod handler;
pub mod measurements;
pub mod node;
pub mod progress;

pub use config::NodeConfig;
pub use node::Node;
