pub mod directory_strategy;
pub mod file_strategy;
pub mod generator;
pub mod selection;

pub use directory_strategy::DirectoryCreationStrategy;
pub use file_strategy::{FileCreationStrategy, file_strategy, UniformFileStrategy, ZipfianFileStrategy};
pub use generator::{NamespaceGenerator, RootRole};
