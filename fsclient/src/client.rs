use async_trait::async_trait;
use std::{error::Error, fmt::Display, time::Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    Io,
}

impl FsErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            FsErrorKind::NotFound => "NotFound",
            FsErrorKind::AlreadyExists => "AlreadyExists",
            FsErrorKind::NotADirectory => "NotADirectory",
            FsErrorKind::IsADirectory => "IsADirectory",
            FsErrorKind::Io => "Io",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsError {
    pub kind: FsErrorKind,
    pub path: String,
}

impl FsError {
    pub fn new(kind: FsErrorKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_owned(),
        }
    }
    pub fn class_name(&self) -> &'static str {
        self.kind.name()
    }
}

impl Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.kind.name(), self.path)
    }
}

impl Error for FsError {}

/// Metadata calls of the filesystem under test. Every call returns the elapsed time
/// it measured itself; callers record that value rather than timing the call.
#[async_trait]
pub trait FileSystemClient: Send + Sync {
    async fn create(&self, path: &str) -> Result<Duration, FsError>;
    async fn delete(&self, path: &str) -> Result<Duration, FsError>;
    async fn mkdir(&self, path: &str) -> Result<Duration, FsError>;
    async fn open(&self, path: &str) -> Result<Duration, FsError>;
    async fn rename(&self, from: &str, to: &str) -> Result<Duration, FsError>;
    async fn move_to(&self, from: &str, to_dir: &str) -> Result<Duration, FsError>;
    async fn list_status(&self, path: &str) -> Result<Duration, FsError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub async fn client_test(client: impl FileSystemClient) -> Result<(), FsError> {
        client.mkdir("/bench/dir1/dir2").await?;
        client.list_status("/bench/dir1").await?;

        client.create("/bench/dir1/file1").await?;
        let duplicate = client.create("/bench/dir1/file1").await.unwrap_err();
        assert_eq!(duplicate.kind, FsErrorKind::AlreadyExists);
        client.open("/bench/dir1/file1").await?;
        client.list_status("/bench/dir1/file1").await?;

        client
            .rename("/bench/dir1/file1", "/bench/dir1/file1.renamed")
            .await?;
        let moved_away = client.open("/bench/dir1/file1").await.unwrap_err();
        assert_eq!(moved_away.kind, FsErrorKind::NotFound);

        client
            .move_to("/bench/dir1/file1.renamed", "/bench/dir1/dir2")
            .await?;
        client.open("/bench/dir1/dir2/file1.renamed").await?;

        client.delete("/bench/dir1/dir2/file1.renamed").await?;
        let deleted = client.delete("/bench/dir1/dir2/file1.renamed").await.unwrap_err();
        assert_eq!(deleted.kind, FsErrorKind::NotFound);
        assert_eq!(deleted.class_name(), "NotFound");
        Ok(())
    }
}
