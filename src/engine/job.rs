//! Per-job accumulation state.
//!
//! A `JobAggregation` collects the section results for one job until every
//! section has arrived. It is only ever mutated behind the per-job mutex the
//! registry hands out, so the merge itself is plain single-threaded code.

use crate::messages::SectionResult;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Outcome of merging one section result into a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The section was new and its statistics were folded in.
    Applied,
    /// The section index was already merged; nothing changed.
    DuplicateIgnored,
}

/// Accumulator for one job, keyed by job id in the registry.
///
/// `received_section_indexes` and `sections` grow in lockstep: the set is
/// the dedup check, the map keeps the full results for report assembly.
#[derive(Debug, Clone)]
pub struct JobAggregation {
    pub(crate) job_id: String,
    pub(crate) total_sections: u32,
    pub(crate) received_section_indexes: HashSet<u32>,
    pub(crate) sections: HashMap<u32, SectionResult>,
    pub(crate) global_word_frequencies: HashMap<String, u64>,
    pub(crate) total_word_count: u64,
    pub(crate) total_sentiment_score: i64,
    pub(crate) total_positive_word_count: u64,
    pub(crate) total_negative_word_count: u64,
    /// Set once the final report has been handed to the outbound queue, so a
    /// redelivered last section cannot publish the report twice.
    pub(crate) report_published: bool,
    created_at: DateTime<Utc>,
}

impl JobAggregation {
    pub fn new(job_id: impl Into<String>, total_sections: u32) -> Self {
        Self {
            job_id: job_id.into(),
            total_sections,
            received_section_indexes: HashSet::new(),
            sections: HashMap::new(),
            global_word_frequencies: HashMap::new(),
            total_word_count: 0,
            total_sentiment_score: 0,
            total_positive_word_count: 0,
            total_negative_word_count: 0,
            report_published: false,
            created_at: Utc::now(),
        }
    }

    /// Fold one section result into the running totals.
    ///
    /// Idempotent under redelivery: a section index that was already merged
    /// returns [`MergeOutcome::DuplicateIgnored`] without touching any
    /// accumulator.
    pub fn merge(&mut self, result: SectionResult) -> MergeOutcome {
        if self.received_section_indexes.contains(&result.section_index) {
            return MergeOutcome::DuplicateIgnored;
        }

        self.received_section_indexes.insert(result.section_index);
        self.total_word_count += result.word_count;
        self.total_sentiment_score += result.sentiment_score;
        self.total_positive_word_count += result.positive_word_count;
        self.total_negative_word_count += result.negative_word_count;
        for entry in &result.top_words {
            *self
                .global_word_frequencies
                .entry(entry.word.clone())
                .or_insert(0) += entry.count;
        }
        self.sections.insert(result.section_index, result);

        MergeOutcome::Applied
    }

    /// True once every declared section has been merged.
    ///
    /// Strict equality: dedup guarantees the count never overshoots, and a
    /// zero-section job can never report complete.
    pub fn is_complete(&self) -> bool {
        self.total_sections > 0 && self.sections.len() == self.total_sections as usize
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn total_sections(&self) -> u32 {
        self.total_sections
    }

    /// Number of unique sections merged so far.
    pub fn received_sections(&self) -> usize {
        self.sections.len()
    }

    /// How long this job has been accumulating, for completion logs.
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }
}
