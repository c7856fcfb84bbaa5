use cluster::operation::OperationType;
use fsclient::{FileSystemClient, FsError};
use futures::FutureExt;
use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use utilities::logger::{debug, error, info, warn};

use crate::{measurements::Measurements, progress::CompletionGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsCall {
    Mkdir(String),
    Create(String),
    Delete(String),
    Open(String),
    ListStatusDir(String),
    ListStatusFile(String),
    Rename { from: String, to: String },
    Move { from: String, to_dir: String },
}

impl FsCall {
    pub fn operation_type(&self) -> OperationType {
        match self {
            FsCall::Mkdir(_) => OperationType::Mkdirs,
            FsCall::Create(_) => OperationType::Create,
            FsCall::Delete(_) => OperationType::DeleteFile,
            FsCall::Open(_) => OperationType::OpenFile,
            FsCall::ListStatusDir(_) => OperationType::ListStatusDir,
            FsCall::ListStatusFile(_) => OperationType::ListStatusFile,
            FsCall::Rename { .. } => OperationType::RenameFile,
            FsCall::Move { .. } => OperationType::MoveFile,
        }
    }

    async fn invoke(&self, client: &dyn FileSystemClient) -> Result<Duration, FsError> {
        match self {
            FsCall::Mkdir(path) => client.mkdir(path).await,
            FsCall::Create(path) => client.create(path).await,
            FsCall::Delete(path) => client.delete(path).await,
            FsCall::Open(path) => client.open(path).await,
            FsCall::ListStatusDir(path) | FsCall::ListStatusFile(path) => {
                client.list_status(path).await
            }
            FsCall::Rename { from, to } => client.rename(from, to).await,
            FsCall::Move { from, to_dir } => client.move_to(from, to_dir).await,
        }
    }
}

struct WorkUnit {
    call: FsCall,
    completion: CompletionGuard,
}

#[derive(Clone)]
pub struct ExecutorHandle {
    sender: mpsc::UnboundedSender<WorkUnit>,
    measurements: Arc<Measurements>,
}

impl ExecutorHandle {
    // Queues `call` for the worker pool. The completion is reported once the call was
    // attempted, or right away when the pool no longer accepts work.
    pub async fn submit(&self, call: FsCall, completion: CompletionGuard) {
        if let Err(mpsc::error::SendError(unit)) = self.sender.send(WorkUnit { call, completion }) {
            let operation_type = unit.call.operation_type();
            warn!(%operation_type, "Executor is shut down, operation is not executed");
            self.measurements
                .report_exception(operation_type, "ExecutorShutdown")
                .await;
            unit.completion.complete().await;
        }
    }
}

pub struct OperationExecutor {
    handle: ExecutorHandle,
    workers: Vec<JoinHandle<()>>,
}

impl OperationExecutor {
    pub fn new(
        client: Arc<dyn FileSystemClient>,
        measurements: Arc<Measurements>,
        threads: usize,
        slow_threshold: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<WorkUnit>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..threads.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                let client = client.clone();
                let measurements = measurements.clone();
                tokio::spawn(async move {
                    loop {
                        let unit = receiver.lock().await.recv().await;
                        let Some(unit) = unit else {
                            break;
                        };
                        execute(client.as_ref(), &measurements, unit, slow_threshold).await;
                    }
                })
            })
            .collect();
        info!(threads = threads.max(1), "Operation executor started");
        Self {
            handle: ExecutorHandle {
                sender,
                measurements,
            },
            workers,
        }
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    pub async fn submit(&self, call: FsCall, completion: CompletionGuard) {
        self.handle.submit(call, completion).await
    }

    pub async fn shutdown(self) {
        drop(self.handle);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Executor worker ended abnormally");
            }
        }
        info!("Operation executor drained");
    }
}

async fn execute(
    client: &dyn FileSystemClient,
    measurements: &Measurements,
    unit: WorkUnit,
    slow_threshold: Duration,
) {
    let WorkUnit { call, completion } = unit;
    let operation_type = call.operation_type();
    let outcome = AssertUnwindSafe(call.invoke(client)).catch_unwind().await;
    match outcome {
        Err(_) => {
            error!(%operation_type, ?call, "Filesystem call panicked");
            measurements.report_exception(operation_type, "Panic").await;
        }
        Ok(Ok(elapsed)) => {
            if elapsed > slow_threshold {
                debug!(%operation_type, ?elapsed, ?call, "Operation took too long");
            }
            measurements.measure(operation_type, elapsed).await;
        }
        Ok(Err(e)) => {
            measurements
                .report_exception(operation_type, e.class_name())
                .await;
            debug!(error = %e, "{operation_type} operation cannot be executed");
        }
    }
    completion.complete().await;
}
