use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use utilities::logger::{debug, info, instrument};

use cluster::{
    FIRST_DIRECTORY_ID, ROOT_DIRECTORY_ID,
    counter::AtomicCounter,
    dispatcher::OperationDispatcher,
    namespace_map::NamespaceMap,
    operation::Operation,
    path::{dir_path, normalize_working_directory},
};

use super::{DirectoryCreationStrategy, FileCreationStrategy};
use crate::error::MasterError;

pub const ROOT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootRole {
    Leader,
    Follower,
}

/// Drives the directory and file creation loops of one master.
///
/// Master `lane` of `masters` owns the creation indices `i` with
/// `(i - 1) % masters == lane`, so concurrent masters never create the same id.
pub struct NamespaceGenerator {
    lane: u64,
    masters: u64,
    working_directory: String,
    directory_strategy: DirectoryCreationStrategy,
    file_strategy: Box<dyn FileCreationStrategy>,
    root_counter: Arc<dyn AtomicCounter>,
    namespace: Arc<dyn NamespaceMap>,
    dispatcher: Arc<dyn OperationDispatcher>,
}

impl NamespaceGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lane: u64,
        masters: u64,
        working_directory: &str,
        directory_strategy: DirectoryCreationStrategy,
        file_strategy: Box<dyn FileCreationStrategy>,
        root_counter: Arc<dyn AtomicCounter>,
        namespace: Arc<dyn NamespaceMap>,
        dispatcher: Arc<dyn OperationDispatcher>,
    ) -> Self {
        Self {
            lane,
            masters: masters.max(1),
            working_directory: normalize_working_directory(working_directory),
            directory_strategy,
            file_strategy,
            root_counter,
            namespace,
            dispatcher,
        }
    }

    fn owns(&self, index: u64) -> bool {
        (index - 1) % self.masters == self.lane
    }

    #[instrument(name = "master_create_root", skip(self), fields(lane = self.lane))]
    pub async fn create_root(&self) -> Result<RootRole, MasterError> {
        if self.root_counter.compare_and_swap(0, 1).await? {
            let root = dir_path(&self.working_directory, ROOT_DIRECTORY_ID);
            let first = dir_path(&root, FIRST_DIRECTORY_ID);
            self.namespace.create_dir(ROOT_DIRECTORY_ID, &root).await?;
            self.dispatcher.dispatch(Operation::CreateDir {
                id: ROOT_DIRECTORY_ID,
                parent_id: None,
                use_grandparent: false,
            })?;
            self.namespace.create_dir(FIRST_DIRECTORY_ID, &first).await?;
            self.dispatcher.dispatch(Operation::CreateDir {
                id: FIRST_DIRECTORY_ID,
                parent_id: Some(ROOT_DIRECTORY_ID),
                use_grandparent: false,
            })?;
            self.root_counter.set(FIRST_DIRECTORY_ID).await?;
            info!(%root, "Created the root directories");
            return Ok(RootRole::Leader);
        }
        self.await_root().await?;
        debug!("Root directories published by another master");
        Ok(RootRole::Follower)
    }

    async fn await_root(&self) -> Result<(), MasterError> {
        if let Some(mut changes) = self.root_counter.subscribe() {
            // a closed channel only drops us to polling
            if changes
                .wait_for(|value| *value >= FIRST_DIRECTORY_ID)
                .await
                .is_ok()
            {
                return Ok(());
            }
        }
        while self.root_counter.get().await? < FIRST_DIRECTORY_ID {
            sleep(ROOT_POLL_INTERVAL).await;
        }
        Ok(())
    }

    #[instrument(name = "master_generate_dirs", skip(self), fields(lane = self.lane))]
    pub async fn generate_dirs(&mut self, number_of_dirs: u64) -> Result<u64, MasterError> {
        if number_of_dirs == 0 {
            return Ok(0);
        }
        let mut dispatched = match self.create_root().await? {
            RootRole::Leader => 2,
            RootRole::Follower => 0,
        };
        for index in (FIRST_DIRECTORY_ID + 1)..=number_of_dirs {
            if !self.owns(index) {
                continue;
            }
            let operation = self.directory_strategy.create_next_directory(index);
            self.dispatcher.dispatch(operation)?;
            dispatched += 1;
        }
        info!(dispatched, "Dispatched directory creations");
        Ok(dispatched)
    }

    #[instrument(name = "master_generate_files", skip(self), fields(lane = self.lane))]
    pub async fn generate_files(&mut self, number_of_files: u64) -> Result<u64, MasterError> {
        if number_of_files == 0 {
            return Ok(0);
        }
        let directories = self.namespace.dir_count().await?;
        if directories == 0 {
            return Err(MasterError::EmptyNamespace);
        }
        let mut dispatched = 0;
        for id in 1..=number_of_files {
            if !self.owns(id) {
                continue;
            }
            if let Some(operation) = self.file_strategy.create_next_file(id, directories) {
                self.dispatcher.dispatch(operation)?;
                dispatched += 1;
            }
        }
        info!(dispatched, directories, "Dispatched file creations");
        Ok(dispatched)
    }
}
