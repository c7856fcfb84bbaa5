use std::io::{self, Write};

use super::report::{OperationSummary, PhaseReport};

pub trait MeasurementsExporter: Send + Sync {
    fn export(&mut self, report: &PhaseReport) -> io::Result<()>;
}

pub struct TextMeasurementsExporter<W: Write + Send + Sync> {
    sink: W,
}

impl<W: Write + Send + Sync> TextMeasurementsExporter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_operations(&mut self, prefix: &str, operations: &[OperationSummary]) -> io::Result<()> {
        for summary in operations {
            let section = format!("{prefix}{}", summary.operation);
            writeln!(self.sink, "[{section}], Operations, {}", summary.attempts)?;
            if let Some(average) = summary.average_latency_us {
                writeln!(self.sink, "[{section}], AverageLatency(us), {average:.2}")?;
            }
            let latencies = [
                ("MinLatency(us)", summary.min_latency_us),
                ("MaxLatency(us)", summary.max_latency_us),
                ("50thPercentileLatency(us)", summary.p50_latency_us),
                ("95thPercentileLatency(us)", summary.p95_latency_us),
                ("99thPercentileLatency(us)", summary.p99_latency_us),
            ];
            for (metric, value) in latencies {
                if let Some(value) = value {
                    writeln!(self.sink, "[{section}], {metric}, {value}")?;
                }
            }
            writeln!(self.sink, "[{section}], Failures, {}", summary.failures)?;
            for (class_name, count) in &summary.exceptions {
                writeln!(self.sink, "[{section}], {class_name}, {count}")?;
            }
        }
        Ok(())
    }
}

impl<W: Write + Send + Sync> MeasurementsExporter for TextMeasurementsExporter<W> {
    fn export(&mut self, report: &PhaseReport) -> io::Result<()> {
        writeln!(self.sink, "[PHASE], Name, {}", report.phase)?;
        writeln!(self.sink, "[PHASE], Completed, {}", report.completed)?;
        writeln!(self.sink, "[OVERALL], RunTime(ms), {}", report.elapsed_ms)?;
        writeln!(
            self.sink,
            "[OVERALL], Throughput(ops/sec), {:.2}",
            report.throughput_ops_per_sec
        )?;
        writeln!(self.sink, "[OVERALL], Dispatched, {}", report.dispatched)?;
        writeln!(self.sink, "[OVERALL], Operations, {}", report.attempted)?;
        writeln!(self.sink, "[OVERALL], Nodes, {}", report.nodes)?;
        if !report.missing_nodes.is_empty() {
            writeln!(
                self.sink,
                "[OVERALL], MissingNodes, {}",
                report.missing_nodes.join(" ")
            )?;
        }
        self.write_operations("", &report.operations)?;
        for node in &report.per_node {
            self.write_operations(&format!("{} ", node.node_id), &node.operations)?;
        }
        self.sink.flush()
    }
}
