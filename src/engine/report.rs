//! Builds the immutable final report from a completed job.

use super::job::JobAggregation;
use crate::analysis;
use crate::messages::{FinalJobResult, SectionResult};

/// Assemble the final report for a job whose sections have all arrived.
///
/// Total by construction: ingress validation bounds every section index below
/// `total_sections` and dedup keeps indexes unique, so a complete job holds
/// exactly the indexes `0..total_sections` and nothing here can fail.
/// Reads the job without mutating it; the caller removes the registry entry
/// afterwards.
pub fn build_final_report(job: &JobAggregation, top_words: usize) -> FinalJobResult {
    let global_top_words = analysis::top_n_words(&job.global_word_frequencies, top_words);

    let mut sections: Vec<SectionResult> = job.sections.values().cloned().collect();
    sections.sort_by_key(|section| section.section_index);

    let modified_text = sections
        .iter()
        .map(|section| section.transformed_section_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut sorted_sentences = analysis::split_sentences(&modified_text);
    analysis::sort_sentences(&mut sorted_sentences);

    let average_sentiment_per_section = if job.total_sections > 0 {
        job.total_sentiment_score as f64 / f64::from(job.total_sections)
    } else {
        0.0
    };

    FinalJobResult {
        job_id: job.job_id.clone(),
        total_sections: job.total_sections,
        total_word_count: job.total_word_count,
        global_top_words,
        sections,
        total_sentiment_score: job.total_sentiment_score,
        total_positive_word_count: job.total_positive_word_count,
        total_negative_word_count: job.total_negative_word_count,
        average_sentiment_per_section,
        modified_text,
        sorted_sentences,
    }
}
