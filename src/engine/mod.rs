//! The aggregation engine.
//!
//! Receives section results from the inbound queue, merges them per job,
//! detects completion, and publishes one final report per job to the
//! outbound queue. Tolerant of everything an at-least-once transport throws
//! at it: duplicates, reordering, and redelivery after a failed publish.
//!
//! Per-delivery state machine: Received → Validated | Rejected →
//! Merged | DuplicateIgnored → CompletedPublished | AwaitingMore. Every
//! non-transient outcome acknowledges the delivery; a publish failure or
//! unexpected fault leaves it unacknowledged so the transport redelivers it.

pub mod job;
pub mod registry;
pub mod report;

pub use job::{JobAggregation, MergeOutcome};
pub use registry::JobRegistry;

use crate::messages::SectionResult;
use crate::transport::{Delivery, MessageConsumer, MessagePublisher, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to encode final report for job '{job_id}': {source}")]
    EncodeReport {
        job_id: String,
        source: serde_json::Error,
    },
}

/// Terminal state the engine reached for one inbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Malformed or invalid payload, dropped.
    Rejected,
    /// Section index already merged and the job is still accumulating.
    DuplicateIgnored,
    /// Merged, more sections outstanding.
    AwaitingMore,
    /// This delivery completed the job and its report was published.
    CompletedPublished,
}

/// Dispatch core shared by however many loops consume the inbound queue.
pub struct AggregationEngine {
    registry: JobRegistry,
    publisher: Arc<dyn MessagePublisher>,
    top_words: usize,
}

impl AggregationEngine {
    pub fn new(publisher: Arc<dyn MessagePublisher>, top_words: usize) -> Self {
        Self {
            registry: JobRegistry::new(),
            publisher,
            top_words,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one dispatch loop until the inbound queue closes and drains.
    ///
    /// Several loops may run against the same engine; the per-job locks keep
    /// a single job's merges serialized while different jobs proceed in
    /// parallel. Each loop holds at most one unacknowledged delivery.
    pub async fn run(&self, consumer: Arc<dyn MessageConsumer>) -> EngineResult<()> {
        while let Some(delivery) = consumer.receive().await? {
            match self.process_delivery(&delivery).await {
                Ok(outcome) => {
                    debug!(tag = delivery.delivery_tag, ?outcome, "delivery settled");
                    consumer.ack(&delivery).await?;
                }
                Err(err) => {
                    error!(
                        tag = delivery.delivery_tag,
                        error = %err,
                        "processing failed; leaving delivery for redelivery"
                    );
                    consumer.nack_requeue(&delivery).await?;
                }
            }
        }

        let pending = self.registry.len().await;
        if pending > 0 {
            warn!(
                jobs = pending,
                "inbound queue drained with incomplete jobs still waiting for sections"
            );
        }
        Ok(())
    }

    /// Process one delivery through the dispatch state machine.
    ///
    /// `Ok` outcomes are terminal and must be acknowledged by the caller; an
    /// `Err` means the delivery should be requeued. Duplicate deliveries
    /// still get a completion check: after a failed publish the retry
    /// arrives as a duplicate, and that re-check is what retries the
    /// build-and-publish step.
    pub async fn process_delivery(&self, delivery: &Delivery) -> EngineResult<DispatchOutcome> {
        let raw: SectionResult = match serde_json::from_slice(&delivery.payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    tag = delivery.delivery_tag,
                    redelivered = delivery.redelivered,
                    error = %err,
                    "dropping malformed section result"
                );
                return Ok(DispatchOutcome::Rejected);
            }
        };

        let result = match raw.validate() {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "dropping invalid section result");
                return Ok(DispatchOutcome::Rejected);
            }
        };

        self.merge_and_maybe_publish(result).await
    }

    async fn merge_and_maybe_publish(
        &self,
        result: SectionResult,
    ) -> EngineResult<DispatchOutcome> {
        let handle = self
            .registry
            .get_or_create(&result.job_id, result.total_sections)
            .await;

        // Lock scope covers merge, completion check, build, and publish, so
        // the "last section" race cannot publish twice or tear down a job
        // mid-merge. Acknowledgement happens after release, in the caller.
        let mut job = handle.lock().await;

        if job.total_sections() != result.total_sections {
            warn!(
                job_id = %result.job_id,
                declared = result.total_sections,
                tracked = job.total_sections(),
                "totalSections mismatch; keeping first-seen value"
            );
        }

        let section_index = result.section_index;
        let outcome = job.merge(result);
        match outcome {
            MergeOutcome::Applied => debug!(
                job_id = %job.job_id(),
                section = section_index,
                received = job.received_sections(),
                total = job.total_sections(),
                "section merged"
            ),
            MergeOutcome::DuplicateIgnored => info!(
                job_id = %job.job_id(),
                section = section_index,
                "duplicate section ignored"
            ),
        }

        if job.is_complete() && !job.report_published {
            let report = report::build_final_report(&job, self.top_words);
            let payload =
                serde_json::to_vec(&report).map_err(|source| EngineError::EncodeReport {
                    job_id: job.job_id().to_string(),
                    source,
                })?;
            self.publisher.publish(payload).await?;
            job.report_published = true;

            let job_id = job.job_id().to_string();
            let elapsed_ms = job.age().num_milliseconds();
            let total = job.total_sections();
            drop(job);
            self.registry.remove(&job_id).await;

            info!(
                job_id = %job_id,
                sections = total,
                elapsed_ms,
                "job complete; final report published"
            );
            return Ok(DispatchOutcome::CompletedPublished);
        }

        Ok(match outcome {
            MergeOutcome::Applied => DispatchOutcome::AwaitingMore,
            MergeOutcome::DuplicateIgnored => DispatchOutcome::DuplicateIgnored,
        })
    }
}
