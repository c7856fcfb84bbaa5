pub mod collection;
pub mod exporter;
pub mod report;

pub use collection::MeasurementDataCollection;
pub use exporter::{MeasurementsExporter, TextMeasurementsExporter};
pub use report::{Phase, PhaseReport};
