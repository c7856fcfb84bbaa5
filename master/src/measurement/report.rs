use std::{collections::BTreeMap, fmt::Display, time::Duration};

use serde::Serialize;

use cluster::{
    NodeId,
    measurement::{NodeMeasurementData, OperationMeasurement},
    operation::OperationType,
};

use super::MeasurementDataCollection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Directories,
    Files,
    Workload,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Directories, Phase::Files, Phase::Workload];
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Directories => write!(f, "directories"),
            Phase::Files => write!(f, "files"),
            Phase::Workload => write!(f, "workload"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperationSummary {
    pub operation: OperationType,
    pub attempts: u64,
    pub failures: u64,
    pub average_latency_us: Option<f64>,
    pub min_latency_us: Option<u64>,
    pub max_latency_us: Option<u64>,
    pub p50_latency_us: Option<u64>,
    pub p95_latency_us: Option<u64>,
    pub p99_latency_us: Option<u64>,
    pub exceptions: BTreeMap<String, u64>,
}

impl OperationSummary {
    fn new(operation: OperationType, measurement: &OperationMeasurement) -> Self {
        let measured = measurement.measured > 0;
        Self {
            operation,
            attempts: measurement.attempts,
            failures: measurement.failures(),
            average_latency_us: measurement.average_latency_us(),
            min_latency_us: measured.then_some(measurement.min_latency_us),
            max_latency_us: measured.then_some(measurement.max_latency_us),
            p50_latency_us: measurement.percentile_us(0.50),
            p95_latency_us: measurement.percentile_us(0.95),
            p99_latency_us: measurement.percentile_us(0.99),
            exceptions: measurement.exceptions.clone(),
        }
    }
}

fn summarize(data: &NodeMeasurementData) -> Vec<OperationSummary> {
    data.operations
        .iter()
        .map(|(operation, measurement)| OperationSummary::new(*operation, measurement))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeSummary {
    pub node_id: NodeId,
    pub operations: Vec<OperationSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseReport {
    pub run_id: String,
    pub phase: Phase,
    pub completed: bool,
    pub dispatched: u64,
    pub attempted: u64,
    pub elapsed_ms: u64,
    pub throughput_ops_per_sec: f64,
    pub nodes: usize,
    pub missing_nodes: Vec<NodeId>,
    pub operations: Vec<OperationSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub per_node: Vec<NodeSummary>,
}

impl PhaseReport {
    pub fn new(
        run_id: &str,
        phase: Phase,
        completed: bool,
        dispatched: u64,
        elapsed: Duration,
        collection: &MeasurementDataCollection,
        with_nodes: bool,
    ) -> Self {
        let attempted = collection.total_attempts();
        let seconds = elapsed.as_secs_f64();
        let throughput_ops_per_sec = if seconds > 0.0 {
            attempted as f64 / seconds
        } else {
            0.0
        };
        let per_node = if with_nodes {
            collection
                .per_node()
                .map(|data| NodeSummary {
                    node_id: data.node_id.clone(),
                    operations: summarize(data),
                })
                .collect()
        } else {
            vec![]
        };
        Self {
            run_id: run_id.to_owned(),
            phase,
            completed,
            dispatched,
            attempted,
            elapsed_ms: elapsed.as_millis() as u64,
            throughput_ops_per_sec,
            nodes: collection.node_count(),
            missing_nodes: vec![],
            operations: summarize(&collection.aggregate()),
            per_node,
        }
    }

    pub fn with_missing_nodes(mut self, missing_nodes: Vec<NodeId>) -> Self {
        self.missing_nodes = missing_nodes;
        self
    }
}
