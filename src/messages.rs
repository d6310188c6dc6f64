//! Wire contracts exchanged between pipeline components.
//!
//! Every message travels as camelCase JSON: tasks flow from the producer to
//! the workers, section results from the workers to the aggregation engine,
//! and one final report per job from the engine to the sink. Ingress
//! validation lives here so code downstream of it can assume well-formed
//! values.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One section of a source document, dispatched by the producer to workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    pub job_id: String,
    pub section_index: u32,
    pub total_sections: u32,
    pub section_text: String,
}

/// A single entry in a ranked word-frequency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub count: u64,
}

impl WordFrequency {
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }
}

/// One worker's output for one section: the unit the engine consumes.
///
/// Unsigned index and count fields make negative wire values a
/// deserialization failure rather than something merge logic has to
/// defend against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub job_id: String,
    pub section_index: u32,
    pub total_sections: u32,
    pub word_count: u64,
    pub top_words: Vec<WordFrequency>,
    pub sentiment_score: i64,
    pub positive_word_count: u64,
    pub negative_word_count: u64,
    pub transformed_section_text: String,
}

/// The finalized per-job report published to the sink. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalJobResult {
    pub job_id: String,
    pub total_sections: u32,
    pub total_word_count: u64,
    pub global_top_words: Vec<WordFrequency>,
    pub sections: Vec<SectionResult>,
    pub total_sentiment_score: i64,
    pub total_positive_word_count: u64,
    pub total_negative_word_count: u64,
    pub average_sentiment_per_section: f64,
    pub modified_text: String,
    pub sorted_sentences: Vec<String>,
}

/// Why an inbound section result was rejected at ingress.
///
/// Rejected messages are dropped and acknowledged: none of these conditions
/// can improve on redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("section result has an empty jobId")]
    EmptyJobId,
    #[error("job '{job_id}' declares zero total sections")]
    ZeroTotalSections { job_id: String },
    #[error(
        "job '{job_id}' section index {section_index} is out of range for {total_sections} sections"
    )]
    SectionIndexOutOfRange {
        job_id: String,
        section_index: u32,
        total_sections: u32,
    },
}

impl SectionResult {
    /// Validates field constraints and sanitizes the top-word list, turning
    /// a raw deserialized message into one merge logic can trust.
    ///
    /// The index bound matters for completion detection: an index at or past
    /// `total_sections` could never be part of a gap-free
    /// `0..total_sections` sequence, so it is rejected here instead of being
    /// left to stall the job forever.
    pub fn validate(mut self) -> Result<SectionResult, ValidationError> {
        if self.job_id.is_empty() {
            return Err(ValidationError::EmptyJobId);
        }
        if self.total_sections == 0 {
            return Err(ValidationError::ZeroTotalSections {
                job_id: self.job_id,
            });
        }
        if self.section_index >= self.total_sections {
            return Err(ValidationError::SectionIndexOutOfRange {
                job_id: self.job_id,
                section_index: self.section_index,
                total_sections: self.total_sections,
            });
        }

        let before = self.top_words.len();
        self.top_words.retain(|w| !w.word.is_empty() && w.count > 0);
        if self.top_words.len() < before {
            debug!(
                job_id = %self.job_id,
                section = self.section_index,
                dropped = before - self.top_words.len(),
                "dropped top-word entries with empty words or zero counts"
            );
        }

        Ok(self)
    }
}
