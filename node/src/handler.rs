use cluster::{
    ROOT_DIRECTORY_ID,
    error::CoordinationError,
    namespace_map::NamespaceMap,
    operation::Operation,
    path::{dir_path, file_path, normalize_working_directory, parent_path, renamed_path},
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use utilities::logger::{error, instrument, trace};

use crate::{
    config::NodeConfig,
    executor::{ExecutorHandle, FsCall},
    measurements::Measurements,
    progress::ProgressReporter,
};

#[derive(Clone, Copy, Debug)]
enum EntryKind {
    Directory,
    File,
}

pub struct OperationHandler {
    namespace: Arc<dyn NamespaceMap>,
    executor: ExecutorHandle,
    measurements: Arc<Measurements>,
    progress: Arc<ProgressReporter>,
    working_directory: String,
    poll_initial: Duration,
    poll_max: Duration,
}

impl OperationHandler {
    pub fn new(
        namespace: Arc<dyn NamespaceMap>,
        executor: ExecutorHandle,
        measurements: Arc<Measurements>,
        progress: Arc<ProgressReporter>,
        working_directory: &str,
        config: &NodeConfig,
    ) -> Self {
        Self {
            namespace,
            executor,
            measurements,
            progress,
            working_directory: normalize_working_directory(working_directory),
            poll_initial: config.poll_initial(),
            poll_max: config.poll_max(),
        }
    }

    pub fn handle_operation(self: &Arc<Self>, operation: Operation) {
        let completion = self.progress.begin();
        let handler = self.clone();
        // Not capped: a resolution waiting for an entry must never hold a slot the
        // operation publishing that entry needs, on this node or another one.
        // Filesystem concurrency is bounded by the executor pool.
        tokio::spawn(async move {
            let operation_type = operation.operation_type();
            match handler.resolve(&operation).await {
                Ok(call) => handler.executor.submit(call, completion).await,
                Err(e) => {
                    error!(error = %e, ?operation, "Could not resolve operation");
                    handler
                        .measurements
                        .report_exception(operation_type, "CoordinationError")
                        .await;
                    completion.complete().await;
                }
            }
        });
    }

    #[instrument(name = "node_resolve_operation", skip(self))]
    pub async fn resolve(&self, operation: &Operation) -> Result<FsCall, CoordinationError> {
        let call = match *operation {
            Operation::CreateDir {
                id,
                parent_id: None,
                ..
            } => {
                let path = dir_path(&self.working_directory, id);
                self.namespace.create_dir(id, &path).await?;
                FsCall::Mkdir(path)
            }
            Operation::CreateDir {
                id,
                parent_id: Some(parent_id),
                use_grandparent,
            } => {
                let mut parent = self.await_entry(EntryKind::Directory, parent_id).await?;
                // the root's parent is the working directory, not a generated entry
                if use_grandparent && parent_id != ROOT_DIRECTORY_ID {
                    if let Some(grandparent) = parent_path(&parent) {
                        parent = grandparent.to_owned();
                    }
                }
                let path = dir_path(&parent, id);
                self.namespace.create_dir(id, &path).await?;
                FsCall::Mkdir(path)
            }
            Operation::CreateFile { id, parent_id } => {
                let directory = self.await_entry(EntryKind::Directory, parent_id).await?;
                let path = file_path(&directory, id);
                self.namespace.create_file(id, &path).await?;
                FsCall::Create(path)
            }
            Operation::Delete { file_id } => {
                FsCall::Delete(self.await_entry(EntryKind::File, file_id).await?)
            }
            Operation::Open { file_id } => {
                FsCall::Open(self.await_entry(EntryKind::File, file_id).await?)
            }
            Operation::ListDir { dir_id } => {
                FsCall::ListStatusDir(self.await_entry(EntryKind::Directory, dir_id).await?)
            }
            Operation::ListFile { file_id } => {
                FsCall::ListStatusFile(self.await_entry(EntryKind::File, file_id).await?)
            }
            Operation::Rename { file_id } => {
                let from = self.await_entry(EntryKind::File, file_id).await?;
                let to = renamed_path(&from);
                FsCall::Rename { from, to }
            }
            Operation::Move {
                file_id,
                target_dir_id,
            } => FsCall::Move {
                from: self.await_entry(EntryKind::File, file_id).await?,
                to_dir: self.await_entry(EntryKind::Directory, target_dir_id).await?,
            },
        };
        Ok(call)
    }

    // Polls the namespace map until `id` is visible. Not-found only means the creating
    // node has not published the entry yet, so there is no deadline.
    async fn await_entry(&self, kind: EntryKind, id: u64) -> Result<String, CoordinationError> {
        let mut backoff = self.poll_initial;
        loop {
            let found = match kind {
                EntryKind::Directory => self.namespace.get_dir(id).await?,
                EntryKind::File => self.namespace.get_file(id).await?,
            };
            if let Some(path) = found {
                return Ok(path);
            }
            trace!(?kind, id, ?backoff, "entry not visible yet");
            sleep(backoff).await;
            backoff = (backoff * 2).min(self.poll_max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::OperationExecutor;
    use cluster::{
        counter::{AtomicCounter, LocalAtomicCounter},
        namespace_map::LocalNamespaceMap,
    };
    use fsclient::{SimulatedFileSystem, SimulatedFsConfig};

    fn handler_fixture(namespace: Arc<LocalNamespaceMap>) -> (Arc<OperationHandler>, OperationExecutor) {
        handler_fixture_with_counter(namespace, Arc::new(LocalAtomicCounter::default()))
    }

    fn handler_fixture_with_counter(
        namespace: Arc<LocalNamespaceMap>,
        counter: Arc<LocalAtomicCounter>,
    ) -> (Arc<OperationHandler>, OperationExecutor) {
        let measurements = Arc::new(Measurements::new("node-0".to_owned()));
        let progress = Arc::new(ProgressReporter::new(counter));
        let executor = OperationExecutor::new(
            Arc::new(SimulatedFileSystem::new(SimulatedFsConfig::default())),
            measurements.clone(),
            2,
            Duration::from_secs(10),
        );
        let handler = OperationHandler::new(
            namespace,
            executor.handle(),
            measurements,
            progress,
            "/bench/",
            &NodeConfig::default(),
        );
        (Arc::new(handler), executor)
    }

    #[tokio::test]
    async fn resolves_directories_and_climbs_to_the_grandparent() -> Result<(), CoordinationError> {
        let namespace = Arc::new(LocalNamespaceMap::new());
        let (handler, _executor) = handler_fixture(namespace.clone());

        let root = handler
            .resolve(&Operation::CreateDir {
                id: 1,
                parent_id: None,
                use_grandparent: false,
            })
            .await?;
        assert_eq!(root, FsCall::Mkdir("/bench/dir1".to_owned()));

        // climbing above the root is suppressed
        let second = handler
            .resolve(&Operation::CreateDir {
                id: 2,
                parent_id: Some(1),
                use_grandparent: true,
            })
            .await?;
        assert_eq!(second, FsCall::Mkdir("/bench/dir1/dir2".to_owned()));

        let third = handler
            .resolve(&Operation::CreateDir {
                id: 3,
                parent_id: Some(2),
                use_grandparent: true,
            })
            .await?;
        assert_eq!(third, FsCall::Mkdir("/bench/dir1/dir3".to_owned()));
        assert_eq!(namespace.get_dir(3).await?.as_deref(), Some("/bench/dir1/dir3"));
        Ok(())
    }

    #[tokio::test]
    async fn waits_for_an_entry_published_later() -> Result<(), CoordinationError> {
        let namespace = Arc::new(LocalNamespaceMap::new());
        let (handler, _executor) = handler_fixture(namespace.clone());

        let pending = {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler
                    .resolve(&Operation::Move {
                        file_id: 1,
                        target_dir_id: 2,
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        namespace.create_dir(2, "/bench/dir1/dir2").await?;
        namespace.create_file(1, "/bench/dir1/file1").await?;
        let call = pending.await.expect("resolution task")?;
        assert_eq!(
            call,
            FsCall::Move {
                from: "/bench/dir1/file1".to_owned(),
                to_dir: "/bench/dir1/dir2".to_owned(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn pending_resolutions_do_not_hold_up_later_operations() -> Result<(), CoordinationError> {
        let namespace = Arc::new(LocalNamespaceMap::new());
        let counter = Arc::new(LocalAtomicCounter::default());
        let (handler, executor) = handler_fixture_with_counter(namespace.clone(), counter.clone());

        // every open waits for a file created by an operation handled after it
        for id in 1..=300 {
            handler.handle_operation(Operation::Open { file_id: id });
        }
        handler.handle_operation(Operation::CreateDir {
            id: 1,
            parent_id: None,
            use_grandparent: false,
        });
        for id in 1..=300 {
            handler.handle_operation(Operation::CreateFile { id, parent_id: 1 });
        }

        let mut rx = counter.subscribe().expect("local counter pushes changes");
        tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|v| *v >= 601))
            .await
            .expect("every operation completes")
            .expect("counter alive");
        assert_eq!(namespace.get_file(300).await?.as_deref(), Some("/bench/dir1/file300"));
        drop(handler);
        executor.shutdown().await;
        Ok(())
    }
}
