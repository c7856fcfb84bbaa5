use std::path::Path;

use master::{
    config::CONFIG, local_cluster::LocalCluster, measurement::TextMeasurementsExporter,
};
use tokio_util::sync::CancellationToken;
use utilities::{
    logger::{error, info, init_logger, warn},
    report_logger::ReportLogger,
    result::Result,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let _gaurd = init_logger(
        "Master",
        &CONFIG.id,
        CONFIG.log_level.clone(),
        CONFIG.apm_endpoint.as_deref(),
        &CONFIG.log_base,
    );
    if let Err(e) = CONFIG.validate() {
        error!(error = %e, "Invalid configuration Hence shuting down");
        return Err(e.into());
    }
    let run_id = Uuid::new_v4().to_string();
    info!(
        %run_id,
        masters = CONFIG.masters,
        nodes = CONFIG.nodes,
        dirs = CONFIG.dirs,
        files = CONFIG.files,
        operations = CONFIG.operations,
        "Starting the benchmark"
    );

    let cancellation = CancellationToken::new();
    let interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, closing the current phase");
            interrupt.cancel();
        }
    });

    let (reports, report_writer) = match &CONFIG.report_file {
        Some(path) => match ReportLogger::start(Path::new(path)).await {
            Ok((sender, handle)) => (Some(sender), Some(handle)),
            Err(e) => {
                error!(error = %e, %path, "Error while opening the report file Hence shuting down");
                return Err(e);
            }
        },
        None => (None, None),
    };

    let cluster = LocalCluster::start(&CONFIG);
    let outcome = cluster
        .run_masters(
            &CONFIG,
            &run_id,
            Box::new(TextMeasurementsExporter::new(std::io::stdout())),
            reports,
            &cancellation,
        )
        .await;
    cluster.shutdown().await;
    if let Some(report_writer) = report_writer {
        report_writer.await?;
    }

    match outcome {
        Ok(reports) => {
            info!(%run_id, phases = reports.len(), "Benchmark finished");
            Ok(())
        }
        Err(e) => {
            error!(%run_id, error = %e, "Benchmark failed");
            Err(e.into())
        }
    }
}
