use opentelemetry::{KeyValue, runtime::Tokio};
use opentelemetry_otlp::{WithExportConfig, new_exporter, new_pipeline};
use opentelemetry_sdk::{Resource, trace::Tracer};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
// exporting the info! warn! etc tracing macro through this library
pub use tracing;
pub use tracing::*;

use crate::result::Result;

pub fn init_apm(service_name: &str, node_id: &str, endpoint: &str) -> Result<Tracer> {
    let otlp_exporter = new_exporter().http().with_endpoint(endpoint);
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.node.id", node_id.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);
    let tracer = new_pipeline()
        .tracing()
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(resource))
        .with_exporter(otlp_exporter)
        .install_batch(Tokio)?;
    Ok(tracer)
}

/// Installs the global subscriber: json lines into `<log_base>/<service>/<node_id>.log`,
/// human readable output on stdout and, when an endpoint is given, otlp export.
/// The returned guard must live as long as the process logs.
pub fn init_logger(
    service_name: &str,
    node_id: &str,
    level: String,
    apm_endpoint: Option<&str>,
    log_base: &str,
) -> WorkerGuard {
    let file_appender = RollingFileAppender::new(
        Rotation::NEVER,
        format!("{log_base}/{service_name}"),
        format!("{node_id}.log"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_line_number(true)
        .with_file(true)
        .with_thread_names(true)
        .with_current_span(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .flatten_event(true);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let filter = EnvFilter::builder()
        .with_default_directive(level.parse::<Level>().unwrap_or(Level::INFO).into())
        .from_env_lossy();

    let mut apm_error = None;
    let telemetry_layer = apm_endpoint.and_then(|endpoint| {
        match init_apm(service_name, node_id, endpoint) {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                apm_error = Some(format!("endpoint:{endpoint}, error:{e}"));
                None
            }
        }
    });
    tracing_subscriber::registry()
        .with(json_layer)
        .with(stdout_layer)
        .with(filter)
        .with(telemetry_layer)
        .init();
    info!(service = %service_name, node_id = %node_id, "Logging initialized");
    match (apm_endpoint, apm_error) {
        (_, Some(e)) => warn!(error = %e, "Could not create tracer, continuing without apm export"),
        (Some(endpoint), None) => info!(%endpoint, "Exporting traces to apm endpoint"),
        (None, None) => {}
    }
    guard
}
