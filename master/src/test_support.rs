use std::sync::Mutex;

use async_trait::async_trait;

use cluster::{
    dispatcher::{DispatchError, OperationDispatcher},
    operation::{ControlMessage, ControlReply, Operation},
};

pub struct RecordingDispatcher {
    nodes: usize,
    operations: Mutex<Vec<Operation>>,
}

impl RecordingDispatcher {
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            operations: Mutex::new(vec![]),
        }
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperationDispatcher for RecordingDispatcher {
    fn node_count(&self) -> usize {
        self.nodes
    }
    fn dispatch(&self, operation: Operation) -> Result<(), DispatchError> {
        self.operations.lock().unwrap().push(operation);
        Ok(())
    }
    async fn broadcast(&self, message: ControlMessage) -> Result<Vec<ControlReply>, DispatchError> {
        Err(DispatchError::MissingReplies {
            message,
            replies: vec![],
            missing: (0..self.nodes).map(|idx| format!("node-{idx}")).collect(),
        })
    }
}
