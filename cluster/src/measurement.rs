use hdrhistogram::Histogram;
use std::{collections::BTreeMap, time::Duration};
use utilities::logger::warn;

use crate::{NodeId, operation::OperationType};

// `attempts` counts every executed unit of work, latency only covers successful calls.
#[derive(Clone, Debug)]
pub struct OperationMeasurement {
    pub attempts: u64,
    pub measured: u64,
    pub total_latency_us: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub histogram: Histogram<u64>,
    pub exceptions: BTreeMap<String, u64>,
}

impl Default for OperationMeasurement {
    fn default() -> Self {
        Self {
            attempts: 0,
            measured: 0,
            total_latency_us: 0,
            min_latency_us: u64::MAX,
            max_latency_us: 0,
            // auto-resizing histogram, 3 significant figures is always a valid precision
            histogram: Histogram::new(3).expect("histogram with 3 significant figures"),
            exceptions: BTreeMap::new(),
        }
    }
}

impl OperationMeasurement {
    pub fn record_latency(&mut self, latency: Duration) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.attempts += 1;
        self.measured += 1;
        self.total_latency_us = self.total_latency_us.saturating_add(micros);
        self.min_latency_us = self.min_latency_us.min(micros);
        self.max_latency_us = self.max_latency_us.max(micros);
        self.histogram.saturating_record(micros);
    }

    pub fn record_exception(&mut self, class_name: &str) {
        self.attempts += 1;
        *self.exceptions.entry(class_name.to_owned()).or_insert(0) += 1;
    }

    pub fn failures(&self) -> u64 {
        self.exceptions.values().sum()
    }

    pub fn average_latency_us(&self) -> Option<f64> {
        if self.measured == 0 {
            return None;
        }
        Some(self.total_latency_us as f64 / self.measured as f64)
    }

    pub fn percentile_us(&self, quantile: f64) -> Option<u64> {
        if self.measured == 0 {
            return None;
        }
        Some(self.histogram.value_at_quantile(quantile))
    }

    pub fn merge(&mut self, other: &OperationMeasurement) {
        self.attempts += other.attempts;
        self.measured += other.measured;
        self.total_latency_us = self.total_latency_us.saturating_add(other.total_latency_us);
        self.min_latency_us = self.min_latency_us.min(other.min_latency_us);
        self.max_latency_us = self.max_latency_us.max(other.max_latency_us);
        if let Err(e) = self.histogram.add(&other.histogram) {
            warn!(error = ?e, "Could not merge latency histograms, percentiles will be partial");
        }
        for (class_name, count) in &other.exceptions {
            *self.exceptions.entry(class_name.clone()).or_insert(0) += count;
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeMeasurementData {
    pub node_id: NodeId,
    pub operations: BTreeMap<OperationType, OperationMeasurement>,
}

impl NodeMeasurementData {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            operations: BTreeMap::new(),
        }
    }

    pub fn total_attempts(&self) -> u64 {
        self.operations.values().map(|m| m.attempts).sum()
    }

    pub fn merge(&mut self, other: &NodeMeasurementData) {
        for (operation_type, measurement) in &other.operations {
            self.operations
                .entry(*operation_type)
                .or_default()
                .merge(measurement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_counts_and_weights_latency() {
        let mut a = OperationMeasurement::default();
        a.record_latency(Duration::from_micros(100));
        a.record_exception("NotFound");

        let mut b = OperationMeasurement::default();
        for _ in 0..3 {
            b.record_latency(Duration::from_micros(500));
        }
        b.record_exception("NotFound");
        b.record_exception("AlreadyExists");

        a.merge(&b);
        assert_eq!(a.attempts, 7);
        assert_eq!(a.measured, 4);
        assert_eq!(a.failures(), 3);
        assert_eq!(a.exceptions.get("NotFound"), Some(&2));
        assert_eq!(a.exceptions.get("AlreadyExists"), Some(&1));
        // (100 + 3 * 500) / 4
        assert_eq!(a.average_latency_us(), Some(400.0));
        assert_eq!(a.min_latency_us, 100);
        assert_eq!(a.max_latency_us, 500);
    }

    #[test]
    fn empty_record_has_no_latency() {
        let mut m = OperationMeasurement::default();
        m.record_exception("Io");
        assert_eq!(m.average_latency_us(), None);
        assert_eq!(m.percentile_us(0.99), None);
        assert_eq!(m.attempts, 1);
    }
}
