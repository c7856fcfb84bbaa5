use async_trait::async_trait;
use std::error::Error;
use std::fmt::Display;

use crate::{
    NodeId,
    operation::{ControlMessage, ControlReply, Operation},
};

#[derive(Debug)]
pub enum DispatchError {
    NoNodes,
    NodeUnavailable(NodeId),
    MissingReplies {
        message: ControlMessage,
        replies: Vec<ControlReply>,
        missing: Vec<NodeId>,
    },
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::NoNodes => write!(f, "No node is known to the dispatcher"),
            DispatchError::NodeUnavailable(node_id) => {
                write!(f, "Node {} does not accept messages anymore", node_id)
            }
            DispatchError::MissingReplies {
                message,
                replies,
                missing,
            } => write!(
                f,
                "Broadcast {} got {} replies, missing nodes : {}",
                message,
                replies.len(),
                missing.join(",")
            ),
        }
    }
}

impl Error for DispatchError {}

impl DispatchError {
    pub fn into_partial_replies(self) -> Vec<ControlReply> {
        match self {
            DispatchError::MissingReplies { replies, .. } => replies,
            _ => vec![],
        }
    }
}

#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    fn node_count(&self) -> usize;
    // Fire and forget: completion is only observable through the progress counter.
    fn dispatch(&self, operation: Operation) -> Result<(), DispatchError>;
    async fn broadcast(&self, message: ControlMessage) -> Result<Vec<ControlReply>, DispatchError>;
}

pub fn partition(key: u64, node_count: usize) -> usize {
    (key % node_count as u64) as usize
}
