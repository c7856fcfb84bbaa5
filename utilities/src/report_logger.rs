use crate::logger::{error, trace};
use crate::result::Result;
use serde::Serialize;
use std::path::Path;
use tokio::{io::AsyncWriteExt, sync::mpsc, task::JoinHandle};

pub struct ReportLogger<T>
where
    T: PartialEq + Serialize + Send + Sync + 'static,
{
    last_record: Option<T>,
    file: tokio::fs::File,
    receiver: mpsc::Receiver<T>,
}

impl<T> ReportLogger<T>
where
    T: PartialEq + Serialize + Send + Sync + 'static,
{
    pub async fn start(target_file_path: &Path) -> Result<(mpsc::Sender<T>, JoinHandle<()>)> {
        if let Some(parent) = target_file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::options()
            .append(true)
            .create(true)
            .open(target_file_path)
            .await?;
        let (tx, rx) = mpsc::channel::<T>(10);
        let mut report_logger = Self {
            last_record: None,
            file,
            receiver: rx,
        };
        let handle = tokio::spawn(async move {
            while let Some(record) = report_logger.receiver.recv().await {
                if report_logger.last_record.as_ref() == Some(&record) {
                    trace!("Skipping record identical to the previous one");
                    continue;
                }
                match report_logger.append(record).await {
                    Ok(_) => trace!("report record written"),
                    Err(e) => error!(error = %e, "Error while appending report record"),
                }
            }
            if let Err(e) = report_logger.file.flush().await {
                error!(error = %e, "Error while flushing report file");
            }
        });
        Ok((tx, handle))
    }

    async fn append(&mut self, record: T) -> Result<()> {
        let json_line = serde_json::to_string(&record)?;
        self.file.write_all(json_line.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.last_record = Some(record);
        Ok(())
    }
}
