use cluster::{
    NodeId,
    local::{Envelope, NodeMailbox},
    operation::{ControlMessage, ControlReply},
    substrate::{CoordinationSubstrate, PROGRESS_COUNTER},
};
use fsclient::FileSystemClient;
use std::sync::Arc;
use utilities::logger::{debug, info, instrument, warn};

use crate::{
    config::NodeConfig,
    executor::OperationExecutor,
    handler::OperationHandler,
    measurements::Measurements,
    progress::ProgressReporter,
};

pub struct Node {
    node_id: NodeId,
    handler: Arc<OperationHandler>,
    executor: OperationExecutor,
    measurements: Arc<Measurements>,
    progress: Arc<ProgressReporter>,
}

impl Node {
    pub fn new(
        node_id: NodeId,
        substrate: &dyn CoordinationSubstrate,
        client: Arc<dyn FileSystemClient>,
        working_directory: &str,
        config: &NodeConfig,
    ) -> Self {
        let measurements = Arc::new(Measurements::new(node_id.clone()));
        let progress = Arc::new(ProgressReporter::new(substrate.counter(PROGRESS_COUNTER)));
        let executor = OperationExecutor::new(
            client,
            measurements.clone(),
            config.threads,
            config.slow_operation_threshold(),
        );
        let handler = Arc::new(OperationHandler::new(
            substrate.namespace_map(),
            executor.handle(),
            measurements.clone(),
            progress.clone(),
            working_directory,
            config,
        ));
        Self {
            node_id,
            handler,
            executor,
            measurements,
            progress,
        }
    }

    pub fn measurements(&self) -> Arc<Measurements> {
        self.measurements.clone()
    }

    pub async fn run(self, mut mailbox: NodeMailbox) {
        info!(node_id = %self.node_id, "Node started");
        while let Some(envelope) = mailbox.receiver.recv().await {
            match envelope {
                Envelope::Operation(operation) => self.handler.handle_operation(operation),
                Envelope::Control { message, reply_to } => {
                    let reply = self.handle_control(message).await;
                    if reply_to.send(reply).is_err() {
                        warn!(node_id = %self.node_id, %message, "Master stopped waiting for the reply");
                    }
                }
            }
        }
        info!(node_id = %self.node_id, "Mailbox closed, draining operations");
        let Node {
            handler, executor, ..
        } = self;
        // pending resolutions hold executor handles, the pool drains once they are done
        drop(handler);
        executor.shutdown().await;
    }

    #[instrument(name = "node_control_message", skip(self), fields(node_id = %self.node_id))]
    pub async fn handle_control(&self, message: ControlMessage) -> ControlReply {
        match message {
            ControlMessage::ResetProgress => {
                let reported = self.progress.reset_local();
                debug!(reported, "progress reset");
                ControlReply::ProgressReset {
                    node_id: self.node_id.clone(),
                    reported,
                }
            }
            ControlMessage::ResetMeasurements => {
                self.measurements.clean().await;
                ControlReply::MeasurementsReset {
                    node_id: self.node_id.clone(),
                }
            }
            ControlMessage::CollectMeasurements => {
                ControlReply::Measurements(self.measurements.snapshot().await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::{
        counter::AtomicCounter,
        dispatcher::OperationDispatcher,
        local::LocalDispatcher,
        operation::{Operation, OperationType},
        substrate::LocalSubstrate,
    };
    use fsclient::{SimulatedFileSystem, SimulatedFsConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn executes_dispatched_operations_and_answers_control_messages() {
        let substrate = LocalSubstrate::new();
        let (dispatcher, mailboxes) =
            LocalDispatcher::new(vec!["node-0".to_owned(), "node-1".to_owned()], Duration::from_secs(5));
        let client: Arc<dyn FileSystemClient> =
            Arc::new(SimulatedFileSystem::new(SimulatedFsConfig::default()));
        let mut nodes = vec![];
        for mailbox in mailboxes {
            let node = Node::new(
                mailbox.node_id.clone(),
                &substrate,
                client.clone(),
                "/bench",
                &NodeConfig::default(),
            );
            nodes.push(tokio::spawn(node.run(mailbox)));
        }

        dispatcher
            .dispatch(Operation::CreateDir {
                id: 1,
                parent_id: None,
                use_grandparent: false,
            })
            .unwrap();
        dispatcher
            .dispatch(Operation::CreateDir {
                id: 2,
                parent_id: Some(1),
                use_grandparent: false,
            })
            .unwrap();
        dispatcher
            .dispatch(Operation::CreateFile { id: 1, parent_id: 2 })
            .unwrap();
        dispatcher.dispatch(Operation::Open { file_id: 1 }).unwrap();

        let progress = substrate.counter(PROGRESS_COUNTER);
        let mut rx = progress.subscribe().unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| *v >= 4)).await;
        assert_eq!(progress.get().await.unwrap(), 4);

        let replies = dispatcher
            .broadcast(ControlMessage::CollectMeasurements)
            .await
            .unwrap();
        let mut total = 0;
        for reply in replies {
            let ControlReply::Measurements(data) = reply else {
                panic!("unexpected reply");
            };
            total += data.total_attempts();
            // open raced the create on another node or ran after it, either way it was attempted once
            if let Some(open) = data.operations.get(&OperationType::OpenFile) {
                assert_eq!(open.attempts, 1);
            }
        }
        assert_eq!(total, 4);

        let replies = dispatcher
            .broadcast(ControlMessage::ResetProgress)
            .await
            .unwrap();
        let reported: u64 = replies
            .iter()
            .map(|reply| match reply {
                ControlReply::ProgressReset { reported, .. } => *reported,
                _ => 0,
            })
            .sum();
        assert_eq!(reported, 4);

        dispatcher
            .broadcast(ControlMessage::ResetMeasurements)
            .await
            .unwrap();
        for reply in dispatcher
            .broadcast(ControlMessage::CollectMeasurements)
            .await
            .unwrap()
        {
            let ControlReply::Measurements(data) = reply else {
                panic!("unexpected reply");
            };
            assert_eq!(data.total_attempts(), 0);
        }

        drop(dispatcher);
        for node in nodes {
            node.await.unwrap();
        }
    }
}
