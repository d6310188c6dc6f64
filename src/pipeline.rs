//! End-to-end wiring of producer, workers, aggregation engine, and sink.
//!
//! All four roles run in-process over one in-memory broker. Shutdown is a
//! graceful drain in topological order: each queue is closed once everything
//! upstream of it has finished, and the stage consuming it exits after
//! handling what is already queued, so no message is abandoned mid-flight.

use crate::config::Config;
use crate::engine::AggregationEngine;
use crate::producer::{self, JobSubmission};
use crate::sink::ReportSink;
use crate::transport::{InMemoryBroker, MessageConsumer, MessagePublisher};
use crate::worker::{self, NameReplacer, SectionTransformer, SentimentLexicon};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Queue carrying tasks from the producer to the workers.
pub const TASK_QUEUE: &str = "text_tasks";
/// Queue carrying section results from the workers to the engine.
pub const RESULT_QUEUE: &str = "text_results";
/// Queue carrying final reports from the engine to the sink.
pub const FINAL_RESULT_QUEUE: &str = "text_final_results";

/// What one pipeline run did, for the CLI to print.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub job_id: String,
    pub sections: usize,
    pub reports_written: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Run the whole pipeline over one document and drain it to completion.
pub async fn run_pipeline(config: &Config, input: &Path) -> Result<RunSummary> {
    config.validate()?;
    let started_at = Utc::now();

    let broker = Arc::new(InMemoryBroker::new());
    let tasks = broker.declare(TASK_QUEUE).await;
    let results = broker.declare(RESULT_QUEUE).await;
    let finals = broker.declare(FINAL_RESULT_QUEUE).await;

    // Sink first: it outlives everything upstream.
    let sink = ReportSink::new(&config.output_dir);
    let finals_consumer: Arc<dyn MessageConsumer> = Arc::new(finals.clone());
    let sink_task = tokio::spawn(async move { sink.run(finals_consumer).await });

    // Worker pool.
    let lexicon = match &config.lexicon_file {
        Some(path) => SentimentLexicon::from_file(path)?,
        None => SentimentLexicon::builtin()?,
    };
    let replacer = match &config.replacements_file {
        Some(path) => NameReplacer::from_file(path)?,
        None => NameReplacer::empty(),
    };
    let transformer = Arc::new(SectionTransformer::new(lexicon, replacer, config.top_words));

    let mut worker_tasks = Vec::with_capacity(config.workers);
    for worker_id in 0..config.workers {
        let transformer = Arc::clone(&transformer);
        let consumer: Arc<dyn MessageConsumer> = Arc::new(tasks.clone());
        let publisher: Arc<dyn MessagePublisher> = Arc::new(results.clone());
        worker_tasks.push(tokio::spawn(worker::run_worker(
            worker_id,
            transformer,
            consumer,
            publisher,
        )));
    }

    // Aggregation engine dispatch loops.
    let finals_publisher: Arc<dyn MessagePublisher> = Arc::new(finals.clone());
    let engine = Arc::new(AggregationEngine::new(finals_publisher, config.top_words));
    let mut dispatch_tasks = Vec::with_capacity(config.dispatch_workers);
    for _ in 0..config.dispatch_workers {
        let engine = Arc::clone(&engine);
        let consumer: Arc<dyn MessageConsumer> = Arc::new(results.clone());
        dispatch_tasks.push(tokio::spawn(
            async move { engine.run(consumer).await },
        ));
    }

    info!(
        workers = config.workers,
        dispatch_workers = config.dispatch_workers,
        "pipeline started"
    );

    // Feed the pipeline, then drain stage by stage.
    let tasks_publisher: Arc<dyn MessagePublisher> = Arc::new(tasks.clone());
    let submission: JobSubmission = producer::run_producer(input, tasks_publisher)
        .await
        .context("producer failed")?;

    broker.close(TASK_QUEUE).await?;
    for (worker_id, task) in join_all(worker_tasks).await.into_iter().enumerate() {
        task.with_context(|| format!("worker {worker_id} panicked"))?
            .with_context(|| format!("worker {worker_id} failed"))?;
    }
    debug!("workers drained");

    broker.close(RESULT_QUEUE).await?;
    for (loop_id, task) in join_all(dispatch_tasks).await.into_iter().enumerate() {
        task.with_context(|| format!("dispatch loop {loop_id} panicked"))?
            .with_context(|| format!("dispatch loop {loop_id} failed"))?;
    }
    debug!("aggregation engine drained");

    broker.close(FINAL_RESULT_QUEUE).await?;
    let reports_written = sink_task
        .await
        .context("sink task panicked")?
        .context("sink failed")?;

    let summary = RunSummary {
        job_id: submission.job_id,
        sections: submission.sections,
        reports_written,
        started_at,
        finished_at: Utc::now(),
    };
    info!(
        job_id = %summary.job_id,
        sections = summary.sections,
        reports = summary.reports_written,
        elapsed_ms = summary.duration().num_milliseconds(),
        "pipeline drained"
    );
    Ok(summary)
}
