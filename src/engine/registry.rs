//! Concurrent registry of in-flight jobs.
//!
//! The registry map is the only state shared between dispatch tasks. Each
//! entry wraps its job in an `Arc<Mutex<_>>`, so exclusive access is scoped
//! per job: two tasks merging sections of different jobs never contend, while
//! two deliveries for the same job serialize on that job's mutex alone.

use super::job::JobAggregation;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

pub type SharedJob = Arc<Mutex<JobAggregation>>;

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, SharedJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the job for `job_id`, creating it with `total_sections` if this
    /// is the first time the id is seen.
    ///
    /// Atomic under concurrency: when several tasks race on an unseen id,
    /// exactly one insert wins and every caller gets the same job.
    /// `total_sections` from later calls is ignored once the entry exists.
    pub async fn get_or_create(&self, job_id: &str, total_sections: u32) -> SharedJob {
        {
            let jobs = self.jobs.read().await;
            if let Some(job) = jobs.get(job_id) {
                return Arc::clone(job);
            }
        }

        let mut jobs = self.jobs.write().await;
        let job = jobs.entry(job_id.to_string()).or_insert_with(|| {
            debug!(job_id, total_sections, "tracking new job");
            Arc::new(Mutex::new(JobAggregation::new(job_id, total_sections)))
        });
        Arc::clone(job)
    }

    /// Drop the entry for a completed job. Handles already held by other
    /// tasks stay valid; they just refer to state no longer in the registry.
    pub async fn remove(&self, job_id: &str) -> Option<SharedJob> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(job_id)
    }

    /// Number of jobs still accumulating sections.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
