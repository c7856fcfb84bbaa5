use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use utilities::logger::{instrument, trace};

use crate::client::{FileSystemClient, FsError, FsErrorKind};

const SEPARATOR: char = '/';

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedFsConfig {
    #[serde(default)]
    pub latency_us: u64,
    #[serde(default)]
    pub latency_jitter_us: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

// Paths are absolute, the root `/` always exists and is not stored.
pub struct SimulatedFileSystem {
    entries: Mutex<BTreeMap<String, EntryKind>>,
    config: SimulatedFsConfig,
}

type Entries = BTreeMap<String, EntryKind>;

impl SimulatedFileSystem {
    pub fn new(config: SimulatedFsConfig) -> Self {
        Self {
            entries: Mutex::default(),
            config,
        }
    }

    pub async fn is_dir(&self, path: &str) -> bool {
        self.entries.lock().await.get(path) == Some(&EntryKind::Directory)
    }

    pub async fn is_file(&self, path: &str) -> bool {
        self.entries.lock().await.get(path) == Some(&EntryKind::File)
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn service_time(&self) -> Duration {
        let jitter = match self.config.latency_jitter_us {
            0 => 0,
            bound => rand::rng().random_range(0..=bound),
        };
        Duration::from_micros(self.config.latency_us + jitter)
    }

    async fn timed(
        &self,
        call: impl FnOnce(&mut Entries) -> Result<(), FsError>,
    ) -> Result<Duration, FsError> {
        let start = Instant::now();
        let service_time = self.service_time();
        if !service_time.is_zero() {
            tokio::time::sleep(service_time).await;
        }
        let mut entries = self.entries.lock().await;
        call(&mut entries)?;
        Ok(start.elapsed())
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices(SEPARATOR)
        .filter(|(idx, _)| *idx > 0)
        .map(move |(idx, _)| &path[..idx])
}

fn descendants(entries: &Entries, path: &str) -> Vec<String> {
    let prefix = format!("{path}{SEPARATOR}");
    entries
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(&prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

fn require_directory(entries: &Entries, path: &str) -> Result<(), FsError> {
    if path.is_empty() {
        return Ok(());
    }
    match entries.get(path) {
        Some(EntryKind::Directory) => Ok(()),
        Some(EntryKind::File) => Err(FsError::new(FsErrorKind::NotADirectory, path)),
        None => Err(FsError::new(FsErrorKind::NotFound, path)),
    }
}

fn relocate(entries: &mut Entries, from: &str, to: &str) -> Result<(), FsError> {
    let kind = *entries
        .get(from)
        .ok_or_else(|| FsError::new(FsErrorKind::NotFound, from))?;
    if entries.contains_key(to) {
        return Err(FsError::new(FsErrorKind::AlreadyExists, to));
    }
    require_directory(entries, parent_of(to))?;
    if kind == EntryKind::Directory && to.starts_with(&format!("{from}{SEPARATOR}")) {
        return Err(FsError::new(FsErrorKind::Io, to));
    }
    for descendant in descendants(entries, from) {
        if let Some(kind) = entries.remove(&descendant) {
            entries.insert(format!("{to}{}", &descendant[from.len()..]), kind);
        }
    }
    entries.remove(from);
    entries.insert(to.to_owned(), kind);
    Ok(())
}

#[async_trait]
impl FileSystemClient for SimulatedFileSystem {
    #[instrument(name = "simulated_fs_create", skip(self))]
    async fn create(&self, path: &str) -> Result<Duration, FsError> {
        self.timed(|entries| {
            if entries.contains_key(path) {
                return Err(FsError::new(FsErrorKind::AlreadyExists, path));
            }
            require_directory(entries, parent_of(path))?;
            entries.insert(path.to_owned(), EntryKind::File);
            Ok(())
        })
        .await
    }

    #[instrument(name = "simulated_fs_delete", skip(self))]
    async fn delete(&self, path: &str) -> Result<Duration, FsError> {
        self.timed(|entries| {
            if entries.remove(path).is_none() {
                return Err(FsError::new(FsErrorKind::NotFound, path));
            }
            for descendant in descendants(entries, path) {
                entries.remove(&descendant);
            }
            Ok(())
        })
        .await
    }

    #[instrument(name = "simulated_fs_mkdir", skip(self))]
    async fn mkdir(&self, path: &str) -> Result<Duration, FsError> {
        self.timed(|entries| {
            for dir in ancestors(path).chain(std::iter::once(path)) {
                match entries.get(dir) {
                    Some(EntryKind::Directory) => {}
                    Some(EntryKind::File) => {
                        return Err(FsError::new(FsErrorKind::NotADirectory, dir));
                    }
                    None => {
                        trace!(%dir, "creating directory");
                        entries.insert(dir.to_owned(), EntryKind::Directory);
                    }
                }
            }
            Ok(())
        })
        .await
    }

    #[instrument(name = "simulated_fs_open", skip(self))]
    async fn open(&self, path: &str) -> Result<Duration, FsError> {
        self.timed(|entries| match entries.get(path) {
            Some(EntryKind::File) => Ok(()),
            Some(EntryKind::Directory) => Err(FsError::new(FsErrorKind::IsADirectory, path)),
            None => Err(FsError::new(FsErrorKind::NotFound, path)),
        })
        .await
    }

    #[instrument(name = "simulated_fs_rename", skip(self))]
    async fn rename(&self, from: &str, to: &str) -> Result<Duration, FsError> {
        self.timed(|entries| relocate(entries, from, to)).await
    }

    #[instrument(name = "simulated_fs_move", skip(self))]
    async fn move_to(&self, from: &str, to_dir: &str) -> Result<Duration, FsError> {
        self.timed(|entries| {
            require_directory(entries, to_dir)?;
            let name = &from[parent_of(from).len()..];
            relocate(entries, from, &format!("{to_dir}{name}"))
        })
        .await
    }

    #[instrument(name = "simulated_fs_list_status", skip(self))]
    async fn list_status(&self, path: &str) -> Result<Duration, FsError> {
        self.timed(|entries| match entries.get(path) {
            Some(EntryKind::File) => Ok(()),
            Some(EntryKind::Directory) => {
                let prefix = format!("{path}{SEPARATOR}");
                let children = entries
                    .range(prefix.clone()..)
                    .take_while(|(key, _)| key.starts_with(&prefix))
                    .filter(|(key, _)| !key[prefix.len()..].contains(SEPARATOR))
                    .count();
                trace!(%path, children, "listed directory");
                Ok(())
            }
            None => Err(FsError::new(FsErrorKind::NotFound, path)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::client_test;

    #[tokio::test]
    async fn simulated_fs_test() -> Result<(), FsError> {
        client_test(SimulatedFileSystem::new(SimulatedFsConfig::default())).await
    }

    #[tokio::test]
    async fn reports_its_own_service_time() -> Result<(), FsError> {
        let fs = SimulatedFileSystem::new(SimulatedFsConfig {
            latency_us: 2_000,
            latency_jitter_us: 0,
        });
        let elapsed = fs.mkdir("/bench").await?;
        assert!(elapsed >= Duration::from_micros(2_000));
        Ok(())
    }

    #[tokio::test]
    async fn create_requires_an_existing_parent_directory() -> Result<(), FsError> {
        let fs = SimulatedFileSystem::new(SimulatedFsConfig::default());
        let missing = fs.create("/bench/dir1/file1").await.unwrap_err();
        assert_eq!(missing.kind, FsErrorKind::NotFound);

        fs.mkdir("/bench/dir1").await?;
        fs.create("/bench/dir1/file1").await?;
        let under_file = fs.create("/bench/dir1/file1/file2").await.unwrap_err();
        assert_eq!(under_file.kind, FsErrorKind::NotADirectory);
        assert!(fs.is_dir("/bench").await);
        assert!(fs.is_file("/bench/dir1/file1").await);
        Ok(())
    }

    #[tokio::test]
    async fn renaming_a_directory_carries_its_subtree() -> Result<(), FsError> {
        let fs = SimulatedFileSystem::new(SimulatedFsConfig::default());
        fs.mkdir("/w/dir1/dir2").await?;
        fs.create("/w/dir1/dir2/file1").await?;
        fs.rename("/w/dir1", "/w/dir9").await?;
        assert!(fs.is_file("/w/dir9/dir2/file1").await);
        assert!(!fs.is_dir("/w/dir1").await);
        assert_eq!(fs.entry_count().await, 4);

        fs.delete("/w/dir9").await?;
        assert_eq!(fs.entry_count().await, 1);
        Ok(())
    }
}
