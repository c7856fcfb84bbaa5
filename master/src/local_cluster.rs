use std::{io, sync::Arc};

use futures::future::join_all;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use utilities::logger::{error, info};

use cluster::{NodeId, dispatcher::OperationDispatcher, local::LocalDispatcher, substrate::LocalSubstrate};
use fsclient::{FileSystemClient, SimulatedFileSystem};
use node::Node;

use crate::{
    config::Config,
    error::MasterError,
    master::{Master, MasterSettings},
    measurement::{MeasurementsExporter, PhaseReport, TextMeasurementsExporter},
};

pub struct LocalCluster {
    substrate: Arc<LocalSubstrate>,
    filesystem: Arc<SimulatedFileSystem>,
    dispatcher: LocalDispatcher,
    nodes: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    pub fn start(config: &Config) -> Self {
        let substrate = Arc::new(LocalSubstrate::new());
        let filesystem = Arc::new(SimulatedFileSystem::new(config.simulated_fs_config()));
        let node_ids: Vec<NodeId> = (0..config.nodes).map(|idx| format!("node-{idx}")).collect();
        let (dispatcher, mailboxes) = LocalDispatcher::new(node_ids, config.broadcast_timeout());
        let node_config = config.node_config();
        let client: Arc<dyn FileSystemClient> = filesystem.clone();
        let nodes = mailboxes
            .into_iter()
            .map(|mailbox| {
                let node = Node::new(
                    mailbox.node_id.clone(),
                    substrate.as_ref(),
                    client.clone(),
                    &config.working_directory,
                    &node_config,
                );
                tokio::spawn(node.run(mailbox))
            })
            .collect();
        info!(nodes = config.nodes, "Local cluster started");
        Self {
            substrate,
            filesystem,
            dispatcher,
            nodes,
        }
    }

    pub fn filesystem(&self) -> Arc<SimulatedFileSystem> {
        self.filesystem.clone()
    }

    pub fn substrate(&self) -> Arc<LocalSubstrate> {
        self.substrate.clone()
    }

    /// Runs `config.masters` masters to the end and returns the coordinator's reports.
    /// A failing master cancels the others, so does a coordinator that stops early.
    pub async fn run_masters(
        &self,
        config: &Config,
        run_id: &str,
        exporter: Box<dyn MeasurementsExporter>,
        reports: Option<mpsc::Sender<PhaseReport>>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<PhaseReport>, MasterError> {
        let dispatcher: Arc<dyn OperationDispatcher> = Arc::new(self.dispatcher.clone());
        // stopping the run never cancels the caller's token
        let run_token = cancellation.child_token();
        let mut exporter = Some(exporter);
        let mut masters = vec![];
        for lane in 0..config.masters.max(1) as u64 {
            let exporter: Box<dyn MeasurementsExporter> = match exporter.take() {
                Some(exporter) => exporter,
                None => Box::new(TextMeasurementsExporter::new(io::sink())),
            };
            let mut master = Master::new(
                lane,
                config,
                MasterSettings::new(run_id, config),
                self.substrate.as_ref(),
                dispatcher.clone(),
                exporter,
                reports.clone(),
            );
            let cancellation = run_token.clone();
            masters.push(tokio::spawn(async move {
                // followers wait on the coordinator, they must not outlive it
                let _release_followers = (lane == 0).then(|| cancellation.clone().drop_guard());
                let result = master.run(&cancellation).await;
                if let Err(e) = &result {
                    error!(lane, error = %e, "Master failed, stopping the run");
                    cancellation.cancel();
                }
                result
            }));
        }
        drop(reports);

        let mut coordinator_reports = vec![];
        let mut failure = None;
        for (lane, result) in join_all(masters).await.into_iter().enumerate() {
            match result {
                Ok(Ok(reports)) if lane == 0 => coordinator_reports = reports,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => error!(lane, error = %e, "Master task panicked"),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(coordinator_reports),
        }
    }

    pub async fn shutdown(self) {
        let LocalCluster {
            dispatcher, nodes, ..
        } = self;
        drop(dispatcher);
        for node in join_all(nodes).await {
            if let Err(e) = node {
                error!(error = %e, "Node task panicked");
            }
        }
        info!("Local cluster stopped");
    }
}
