//! Persists finalized reports as JSON documents on disk.
//!
//! One file per job, named by job id, written with a plain overwrite: a
//! report redelivered after a publish-then-crash writes the same bytes to
//! the same path, keeping redelivery idempotent.

use crate::messages::FinalJobResult;
use crate::transport::{MessageConsumer, TransportError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode report for job '{job_id}': {source}")]
    EncodeReport {
        job_id: String,
        source: serde_json::Error,
    },

    #[error("failed to read report {path}: {source}")]
    ReadReport {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("report {path} is not valid JSON: {source}")]
    ParseReport {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Writes each consumed report to `<output_dir>/job-<jobId>.json`.
pub struct ReportSink {
    output_dir: PathBuf,
}

impl ReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn report_path(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(format!("job-{job_id}.json"))
    }

    /// Consume reports until the queue closes and drains. Returns how many
    /// reports were written.
    ///
    /// A malformed payload is dropped and acknowledged; a filesystem failure
    /// requeues the delivery so the write is retried.
    pub async fn run(&self, consumer: Arc<dyn MessageConsumer>) -> SinkResult<usize> {
        let mut written = 0usize;

        while let Some(delivery) = consumer.receive().await? {
            let report: FinalJobResult = match serde_json::from_slice(&delivery.payload) {
                Ok(report) => report,
                Err(err) => {
                    warn!(
                        tag = delivery.delivery_tag,
                        error = %err,
                        "dropping malformed final report"
                    );
                    consumer.ack(&delivery).await?;
                    continue;
                }
            };

            match self.write_report(&report).await {
                Ok(path) => {
                    info!(
                        job_id = %report.job_id,
                        sections = report.total_sections,
                        path = %path.display(),
                        redelivered = delivery.redelivered,
                        "final report written"
                    );
                    written += 1;
                    consumer.ack(&delivery).await?;
                }
                Err(err) => {
                    error!(
                        job_id = %report.job_id,
                        error = %err,
                        "failed to persist report; requeueing"
                    );
                    consumer.nack_requeue(&delivery).await?;
                }
            }
        }

        Ok(written)
    }

    async fn write_report(&self, report: &FinalJobResult) -> SinkResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| SinkError::CreateDir {
                path: self.output_dir.clone(),
                source,
            })?;

        let json =
            serde_json::to_vec_pretty(report).map_err(|source| SinkError::EncodeReport {
                job_id: report.job_id.clone(),
                source,
            })?;

        let path = self.report_path(&report.job_id);
        fs::write(&path, json)
            .await
            .map_err(|source| SinkError::WriteReport {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

/// Load a previously written report, for inspection and tests.
pub fn read_report(path: &Path) -> SinkResult<FinalJobResult> {
    let raw = std::fs::read_to_string(path).map_err(|source| SinkError::ReadReport {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SinkError::ParseReport {
        path: path.to_path_buf(),
        source,
    })
}
