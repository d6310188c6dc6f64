//! Document intake: splits a source document into sections and dispatches
//! one task per section under a fresh job id.

use crate::messages::TaskMessage;
use crate::transport::{MessagePublisher, TransportError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub type ProducerResult<T> = Result<T, ProducerError>;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to read document {path}: {source}")]
    ReadDocument {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document {path} contains no non-empty sections")]
    EmptyDocument { path: PathBuf },

    #[error("failed to encode task for job '{job_id}': {source}")]
    EncodeTask {
        job_id: String,
        source: serde_json::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// What the producer dispatched for one document.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub job_id: String,
    pub sections: usize,
}

/// Split a document into sections on blank lines.
///
/// Line endings are normalized first (`\r\n` and `\r` become `\n`), then any
/// run of one or more blank lines (empty or containing only whitespace)
/// separates sections. Sections are trimmed and empty ones are
/// dropped, so a document of nothing but blank lines yields no sections.
pub fn split_into_sections(document: &str) -> Vec<String> {
    let normalized = document.replace("\r\n", "\n").replace('\r', "\n");

    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.lines() {
        if line.trim().is_empty() {
            flush_section(&mut sections, &mut current);
        } else {
            current.push(line);
        }
    }
    flush_section(&mut sections, &mut current);

    sections
}

fn flush_section(sections: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    let section = current.join("\n").trim().to_string();
    if !section.is_empty() {
        sections.push(section);
    }
    current.clear();
}

/// Read a document, split it, and publish one task per section.
///
/// Every task carries the same freshly minted job id and the total section
/// count the aggregation engine will wait for.
pub async fn run_producer(
    input: &Path,
    publisher: Arc<dyn MessagePublisher>,
) -> ProducerResult<JobSubmission> {
    let document =
        tokio::fs::read_to_string(input)
            .await
            .map_err(|source| ProducerError::ReadDocument {
                path: input.to_path_buf(),
                source,
            })?;

    let sections = split_into_sections(&document);
    if sections.is_empty() {
        return Err(ProducerError::EmptyDocument {
            path: input.to_path_buf(),
        });
    }

    let job_id = Uuid::new_v4().to_string();
    let total_sections = sections.len() as u32;

    for (index, section_text) in sections.into_iter().enumerate() {
        let task = TaskMessage {
            job_id: job_id.clone(),
            section_index: index as u32,
            total_sections,
            section_text,
        };
        let payload = serde_json::to_vec(&task).map_err(|source| ProducerError::EncodeTask {
            job_id: job_id.clone(),
            source,
        })?;
        publisher.publish(payload).await?;
        debug!(job_id = %job_id, section = index, "task dispatched");
    }

    info!(
        job_id = %job_id,
        sections = total_sections,
        input = %input.display(),
        "document split and dispatched"
    );

    Ok(JobSubmission {
        job_id,
        sections: total_sections as usize,
    })
}
