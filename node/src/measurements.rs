use cluster::{
    NodeId,
    measurement::{NodeMeasurementData, OperationMeasurement},
    operation::OperationType,
};
use std::{collections::BTreeMap, time::Duration};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct Measurements {
    node_id: NodeId,
    operations: Mutex<BTreeMap<OperationType, OperationMeasurement>>,
}

impl Measurements {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            operations: Mutex::default(),
        }
    }

    pub async fn measure(&self, operation_type: OperationType, latency: Duration) {
        self.operations
            .lock()
            .await
            .entry(operation_type)
            .or_default()
            .record_latency(latency);
    }

    pub async fn report_exception(&self, operation_type: OperationType, class_name: &str) {
        self.operations
            .lock()
            .await
            .entry(operation_type)
            .or_default()
            .record_exception(class_name);
    }

    pub async fn snapshot(&self) -> NodeMeasurementData {
        NodeMeasurementData {
            node_id: self.node_id.clone(),
            operations: self.operations.lock().await.clone(),
        }
    }

    pub async fn clean(&self) {
        self.operations.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_drops_every_counter() {
        let measurements = Measurements::new("node-0".to_owned());
        measurements
            .measure(OperationType::Create, Duration::from_micros(30))
            .await;
        measurements
            .report_exception(OperationType::Create, "AlreadyExists")
            .await;
        measurements
            .report_exception(OperationType::OpenFile, "NotFound")
            .await;

        let snapshot = measurements.snapshot().await;
        assert_eq!(snapshot.node_id, "node-0");
        assert_eq!(snapshot.total_attempts(), 3);
        assert_eq!(snapshot.operations[&OperationType::Create].measured, 1);

        measurements.clean().await;
        assert_eq!(measurements.snapshot().await.total_attempts(), 0);
    }
}
