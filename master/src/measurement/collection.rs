use std::collections::BTreeMap;

use utilities::logger::warn;

use cluster::{NodeId, measurement::NodeMeasurementData, operation::ControlReply};

pub const CLUSTER_NODE_ID: &str = "cluster";

#[derive(Debug, Default)]
pub struct MeasurementDataCollection {
    per_node: BTreeMap<NodeId, NodeMeasurementData>,
}

impl MeasurementDataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_measurement_data(&mut self, data: NodeMeasurementData) {
        match self.per_node.get_mut(&data.node_id) {
            Some(existing) => {
                warn!(node_id = %data.node_id, "Node reported measurements twice, merging");
                existing.merge(&data);
            }
            None => {
                self.per_node.insert(data.node_id.clone(), data);
            }
        }
    }

    pub fn add_replies(&mut self, replies: Vec<ControlReply>) {
        for reply in replies {
            match reply {
                ControlReply::Measurements(data) => self.add_measurement_data(data),
                other => warn!(node_id = %other.node_id(), "Unexpected reply to a collect"),
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.per_node.len()
    }

    pub fn per_node(&self) -> impl Iterator<Item = &NodeMeasurementData> {
        self.per_node.values()
    }

    pub fn aggregate(&self) -> NodeMeasurementData {
        let mut merged = NodeMeasurementData::new(CLUSTER_NODE_ID.to_owned());
        for data in self.per_node.values() {
            merged.merge(data);
        }
        merged
    }

    pub fn total_attempts(&self) -> u64 {
        self.per_node.values().map(|data| data.total_attempts()).sum()
    }

    pub fn reset(&mut self) {
        self.per_node.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use cluster::{measurement::OperationMeasurement, operation::OperationType};

    fn node_data(node_id: &str, creates: u64, latency_ms: u64, failures: u64) -> NodeMeasurementData {
        let mut data = NodeMeasurementData::new(node_id.to_owned());
        let mut measurement = OperationMeasurement::default();
        for _ in 0..creates {
            measurement.record_latency(Duration::from_millis(latency_ms));
        }
        for _ in 0..failures {
            measurement.record_exception("AlreadyExists");
        }
        data.operations.insert(OperationType::Create, measurement);
        data
    }

    #[test]
    fn aggregate_merges_every_node() {
        let mut collection = MeasurementDataCollection::new();
        collection.add_replies(vec![
            ControlReply::Measurements(node_data("node-0", 3, 1, 1)),
            ControlReply::Measurements(node_data("node-1", 1, 5, 0)),
            ControlReply::MeasurementsReset {
                node_id: "node-2".to_owned(),
            },
        ]);
        assert_eq!(collection.node_count(), 2);
        assert_eq!(collection.total_attempts(), 5);

        let merged = collection.aggregate();
        let creates = &merged.operations[&OperationType::Create];
        assert_eq!(creates.attempts, 5);
        assert_eq!(creates.exceptions["AlreadyExists"], 1);
        // (3 * 1000 + 5000) / 4
        assert_eq!(creates.average_latency_us(), Some(2000.0));

        collection.reset();
        assert_eq!(collection.node_count(), 0);
        assert_eq!(collection.aggregate().total_attempts(), 0);
    }

    #[test]
    fn repeated_node_is_merged() {
        let mut collection = MeasurementDataCollection::new();
        collection.add_measurement_data(node_data("node-0", 2, 1, 0));
        collection.add_measurement_data(node_data("node-0", 1, 1, 1));
        assert_eq!(collection.node_count(), 1);
        assert_eq!(collection.total_attempts(), 4);
    }
}
