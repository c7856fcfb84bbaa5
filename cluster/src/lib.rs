pub mod counter;
pub mod dispatcher;
pub mod error;
pub mod local;
pub mod measurement;
pub mod namespace_map;
pub mod operation;
pub mod path;
pub mod substrate;

pub type NodeId = String;
pub type DirectoryId = u64;
pub type FileId = u64;

pub const ROOT_DIRECTORY_ID: DirectoryId = 1;
pub const FIRST_DIRECTORY_ID: DirectoryId = 2;
