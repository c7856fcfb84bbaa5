use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use utilities::logger::{debug, instrument, warn};

use crate::{
    NodeId,
    dispatcher::{DispatchError, OperationDispatcher, partition},
    operation::{ControlMessage, ControlReply, Operation},
};

#[derive(Debug)]
pub enum Envelope {
    Operation(Operation),
    Control {
        message: ControlMessage,
        reply_to: oneshot::Sender<ControlReply>,
    },
}

#[derive(Debug)]
pub struct NodeMailbox {
    pub node_id: NodeId,
    pub receiver: mpsc::UnboundedReceiver<Envelope>,
}

#[derive(Clone, Debug)]
pub struct LocalDispatcher {
    nodes: Vec<(NodeId, mpsc::UnboundedSender<Envelope>)>,
    reply_timeout: Duration,
}

impl LocalDispatcher {
    pub fn new(
        node_ids: impl IntoIterator<Item = NodeId>,
        reply_timeout: Duration,
    ) -> (Self, Vec<NodeMailbox>) {
        let mut nodes = vec![];
        let mut mailboxes = vec![];
        for node_id in node_ids {
            let (tx, rx) = mpsc::unbounded_channel();
            nodes.push((node_id.clone(), tx));
            mailboxes.push(NodeMailbox {
                node_id,
                receiver: rx,
            });
        }
        (
            Self {
                nodes,
                reply_timeout,
            },
            mailboxes,
        )
    }
}

#[async_trait]
impl OperationDispatcher for LocalDispatcher {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn dispatch(&self, operation: Operation) -> Result<(), DispatchError> {
        if self.nodes.is_empty() {
            return Err(DispatchError::NoNodes);
        }
        let (node_id, sender) = &self.nodes[partition(operation.partition_key(), self.nodes.len())];
        sender
            .send(Envelope::Operation(operation))
            .map_err(|_| DispatchError::NodeUnavailable(node_id.clone()))
    }

    #[instrument(name = "local_dispatcher_broadcast", skip(self))]
    async fn broadcast(&self, message: ControlMessage) -> Result<Vec<ControlReply>, DispatchError> {
        if self.nodes.is_empty() {
            return Err(DispatchError::NoNodes);
        }
        let mut missing = vec![];
        let mut pending = vec![];
        for (node_id, sender) in &self.nodes {
            let (reply_to, reply) = oneshot::channel();
            if sender.send(Envelope::Control { message, reply_to }).is_err() {
                warn!(%node_id, "Node mailbox is closed");
                missing.push(node_id.clone());
                continue;
            }
            pending.push((node_id.clone(), reply));
        }
        let reply_timeout = self.reply_timeout;
        let results = join_all(
            pending
                .into_iter()
                .map(|(node_id, reply)| async move { (node_id, timeout(reply_timeout, reply).await) }),
        )
        .await;
        let mut replies = vec![];
        for (node_id, result) in results {
            match result {
                Ok(Ok(reply)) => replies.push(reply),
                Ok(Err(_)) => {
                    warn!(%node_id, "Node dropped the reply channel");
                    missing.push(node_id);
                }
                Err(_) => {
                    warn!(%node_id, ?reply_timeout, "Node did not reply in time");
                    missing.push(node_id);
                }
            }
        }
        if !missing.is_empty() {
            return Err(DispatchError::MissingReplies {
                message,
                replies,
                missing,
            });
        }
        debug!(replies = replies.len(), "Broadcast collected every reply");
        Ok(replies)
    }
}
