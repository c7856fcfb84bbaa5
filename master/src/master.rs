use std::{sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use utilities::logger::{debug, error, info, instrument, warn};

use cluster::{
    counter::AtomicCounter,
    dispatcher::{DispatchError, OperationDispatcher},
    namespace_map::NamespaceMap,
    operation::{ControlMessage, ControlReply},
    substrate::{CoordinationSubstrate, PHASE_COUNTER, PROGRESS_COUNTER, ROOT_ELECTION_COUNTER},
};

use crate::{
    barrier::{BarrierError, ProgressBarrier},
    config::{Config, WorkloadConfig},
    error::MasterError,
    measurement::{MeasurementDataCollection, MeasurementsExporter, Phase, PhaseReport},
    namespace::{DirectoryCreationStrategy, NamespaceGenerator, file_strategy},
    workload::{Population, WorkloadGenerator},
};

// keeps the random streams of the strategies of one master apart
const DIRECTORY_STREAM: u64 = 0;
const FILE_STREAM: u64 = 1;
const WORKLOAD_STREAM: u64 = 2;

fn stream_seed(seed: Option<u64>, lane: u64, stream: u64) -> Option<u64> {
    seed.map(|seed| seed ^ (lane << 8) ^ (stream << 32))
}

fn stream_rng(seed: Option<u64>, lane: u64, stream: u64) -> StdRng {
    match stream_seed(seed, lane, stream) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[derive(Clone, Debug)]
pub struct MasterSettings {
    pub run_id: String,
    pub dirs: u64,
    pub files: u64,
    pub operations: u64,
    pub workload: WorkloadConfig,
    pub zipf_exponent: f64,
    pub seed: Option<u64>,
    pub phase_pause: Duration,
    pub per_node_report: bool,
}

impl MasterSettings {
    pub fn new(run_id: &str, config: &Config) -> Self {
        Self {
            run_id: run_id.to_owned(),
            dirs: config.dirs,
            files: config.files,
            operations: config.operations,
            workload: config.workload.clone(),
            zipf_exponent: config.zipf_exponent,
            seed: config.seed,
            phase_pause: config.phase_pause(),
            per_node_report: config.per_node_report,
        }
    }

    fn target(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Directories => self.dirs,
            Phase::Files => self.files,
            Phase::Workload => self.operations,
        }
    }
}

/// Drives the directories, files and workload phases.
///
/// Every master dispatches its lane of each phase. Lane 0 coordinates: it waits
/// for the cluster to finish the phase, resets the counters, collects and exports
/// the measurements, then releases the other masters through the phase counter.
pub struct Master {
    lane: u64,
    masters: u64,
    settings: MasterSettings,
    dispatcher: Arc<dyn OperationDispatcher>,
    namespace: Arc<dyn NamespaceMap>,
    generator: NamespaceGenerator,
    progress: ProgressBarrier,
    phase_counter: Arc<dyn AtomicCounter>,
    phases: ProgressBarrier,
    collection: MeasurementDataCollection,
    exporter: Box<dyn MeasurementsExporter>,
    reports: Option<mpsc::Sender<PhaseReport>>,
}

impl Master {
    pub fn new(
        lane: u64,
        config: &Config,
        settings: MasterSettings,
        substrate: &dyn CoordinationSubstrate,
        dispatcher: Arc<dyn OperationDispatcher>,
        exporter: Box<dyn MeasurementsExporter>,
        reports: Option<mpsc::Sender<PhaseReport>>,
    ) -> Self {
        let masters = config.masters.max(1) as u64;
        let generator = NamespaceGenerator::new(
            lane,
            masters,
            &config.working_directory,
            DirectoryCreationStrategy::from_kind(
                config.directory_strategy,
                masters,
                stream_seed(settings.seed, lane, DIRECTORY_STREAM),
            ),
            file_strategy(
                config.file_strategy,
                config.zipf_exponent,
                stream_rng(settings.seed, lane, FILE_STREAM),
            ),
            substrate.counter(ROOT_ELECTION_COUNTER),
            substrate.namespace_map(),
            dispatcher.clone(),
        );
        let phase_counter = substrate.counter(PHASE_COUNTER);
        Self {
            lane,
            masters,
            settings,
            namespace: substrate.namespace_map(),
            dispatcher,
            generator,
            progress: ProgressBarrier::new(substrate.counter(PROGRESS_COUNTER)),
            phases: ProgressBarrier::new(phase_counter.clone()),
            phase_counter,
            collection: MeasurementDataCollection::new(),
            exporter,
            reports,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.lane == 0
    }

    /// Runs every phase and returns the reports of the phases this master closed.
    /// After an interruption the current phase is still closed, later ones are skipped.
    #[instrument(name = "master_run", skip(self, cancellation), fields(lane = self.lane, run_id = %self.settings.run_id))]
    pub async fn run(&mut self, cancellation: &CancellationToken) -> Result<Vec<PhaseReport>, MasterError> {
        info!(masters = self.masters, "Master started");
        let mut reports = vec![];
        for (number, phase) in (1u64..).zip(Phase::ALL) {
            if cancellation.is_cancelled() {
                warn!(%phase, "Run interrupted, skipping the remaining phases");
                break;
            }
            // every master sees the same targets, so all of them skip together
            if self.settings.target(phase) == 0 {
                info!(%phase, "Nothing to do, phase skipped");
                continue;
            }
            if let Some(report) = self.run_phase(phase, number, cancellation).await? {
                reports.push(report);
            }
            if phase != Phase::Workload && !self.settings.phase_pause.is_zero() {
                tokio::select! {
                    _ = cancellation.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.phase_pause) => {}
                }
            }
        }
        info!(phases = reports.len(), "Master finished");
        // lets the report writer finish once every master is done
        self.reports = None;
        Ok(reports)
    }

    #[instrument(name = "master_phase", skip(self, cancellation))]
    async fn run_phase(
        &mut self,
        phase: Phase,
        number: u64,
        cancellation: &CancellationToken,
    ) -> Result<Option<PhaseReport>, MasterError> {
        let start = Instant::now();
        let dispatched = match phase {
            Phase::Directories => self.generator.generate_dirs(self.settings.dirs).await?,
            Phase::Files => self.generator.generate_files(self.settings.files).await?,
            Phase::Workload => self.generate_workload().await?,
        };
        debug!(dispatched, "Phase dispatched");

        if !self.is_coordinator() {
            return match self.phases.await_operation_completion(number, cancellation).await {
                Ok(_) => Ok(None),
                Err(BarrierError::Cancelled { .. }) => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        let target = self.settings.target(phase);
        let completed = match self.progress.await_operation_completion(target, cancellation).await {
            Ok(reached) => {
                info!(reached, target, elapsed = ?start.elapsed(), "Phase finished");
                true
            }
            Err(BarrierError::Cancelled { reached, .. }) => {
                warn!(reached, target, "Interrupted while waiting for the phase");
                false
            }
            Err(e) => return Err(e.into()),
        };
        let elapsed = start.elapsed();
        let report = self.close_phase(phase, target, elapsed, completed).await;
        self.phase_counter.set(number).await?;
        Ok(Some(report))
    }

    async fn generate_workload(&mut self) -> Result<u64, MasterError> {
        // workload creates grow the map, the configured counts bound what every master sees
        let population = Population {
            directories: self.namespace.dir_count().await?.min(self.settings.dirs),
            files: self.namespace.file_count().await?.min(self.settings.files),
        };
        let mut workload = WorkloadGenerator::new(
            &self.settings.workload,
            self.settings.zipf_exponent,
            population,
            self.lane,
            self.masters,
            stream_rng(self.settings.seed, self.lane, WORKLOAD_STREAM),
        )?;
        workload.generate(self.settings.operations, &self.dispatcher)
    }

    async fn close_phase(
        &mut self,
        phase: Phase,
        target: u64,
        elapsed: Duration,
        completed: bool,
    ) -> PhaseReport {
        if let Err(e) = self.progress.reset().await {
            error!(error = %e, "Could not reset the progress counter");
        }
        match self.dispatcher.broadcast(ControlMessage::ResetProgress).await {
            Ok(replies) => {
                let reported: u64 = replies
                    .iter()
                    .map(|reply| match reply {
                        ControlReply::ProgressReset { reported, .. } => *reported,
                        _ => 0,
                    })
                    .sum();
                debug!(reported, target, "Nodes reset their progress");
            }
            Err(e) => error!(error = %e, "Not every node acknowledged the progress reset"),
        }

        let missing_nodes = match self.dispatcher.broadcast(ControlMessage::CollectMeasurements).await {
            Ok(replies) => {
                self.collection.add_replies(replies);
                vec![]
            }
            Err(e) => {
                error!(error = %e, "Collecting measurements failed, reporting partial results");
                let missing = match &e {
                    DispatchError::MissingReplies { missing, .. } => missing.clone(),
                    _ => vec![],
                };
                self.collection.add_replies(e.into_partial_replies());
                missing
            }
        };
        let report = PhaseReport::new(
            &self.settings.run_id,
            phase,
            completed,
            target,
            elapsed,
            &self.collection,
            self.settings.per_node_report,
        )
        .with_missing_nodes(missing_nodes);

        if let Err(e) = self.exporter.export(&report) {
            error!(error = %e, "Could not export the phase report");
        }
        if let Some(reports) = &self.reports {
            if reports.send(report.clone()).await.is_err() {
                warn!("Report writer stopped, phase report not persisted");
            }
        }
        if let Err(e) = self.dispatcher.broadcast(ControlMessage::ResetMeasurements).await {
            error!(error = %e, "Not every node cleared its measurements");
        }
        self.collection.reset();
        report
    }
}
