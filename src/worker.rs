//! Section transformation: name replacement, tokenization, sentiment scoring.
//!
//! Workers sit between the task queue and the result queue. Each task is one
//! document section; the worker rewrites configured names, tokenizes the
//! text, counts word frequencies, scores sentiment against a lexicon, and
//! publishes a [`SectionResult`] for the engine to aggregate. Transformation
//! is deterministic, so redelivered tasks reproduce byte-identical results.

use crate::analysis::{self, Tokenizer};
use crate::messages::{SectionResult, TaskMessage};
use crate::transport::{MessageConsumer, MessagePublisher, TransportError};
use regex::{NoExpand, Regex};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const BUILTIN_LEXICON: &str = include_str!("../resources/sentiment_lexicon.json");

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to read {kind} file {path}: {source}")]
    ResourceRead {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {kind} JSON: {source}")]
    ResourceParse {
        kind: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid name replacement pattern for '{name}': {source}")]
    ReplacementPattern { name: String, source: regex::Error },

    #[error("failed to encode section result for job '{job_id}': {source}")]
    EncodeResult {
        job_id: String,
        source: serde_json::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Token polarity under a sentiment lexicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Word lists for sentiment scoring. Lookup is by lowercase token; entries
/// are lowercased at load time so the lexicon file may use any case.
#[derive(Debug, Clone)]
pub struct SentimentLexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

#[derive(Deserialize)]
struct LexiconFile {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl SentimentLexicon {
    /// The lexicon embedded in the binary, used when no file is configured.
    pub fn builtin() -> WorkerResult<Self> {
        Self::from_json(BUILTIN_LEXICON)
    }

    pub fn from_file(path: &Path) -> WorkerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| WorkerError::ResourceRead {
            kind: "lexicon",
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_words(positive: &[&str], negative: &[&str]) -> Self {
        Self {
            positive: positive.iter().map(|w| w.to_lowercase()).collect(),
            negative: negative.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn from_json(raw: &str) -> WorkerResult<Self> {
        let file: LexiconFile =
            serde_json::from_str(raw).map_err(|source| WorkerError::ResourceParse {
                kind: "lexicon",
                source,
            })?;
        Ok(Self {
            positive: file.positive.iter().map(|w| w.to_lowercase()).collect(),
            negative: file.negative.iter().map(|w| w.to_lowercase()).collect(),
        })
    }

    pub fn polarity(&self, token: &str) -> Option<Polarity> {
        if self.positive.contains(token) {
            Some(Polarity::Positive)
        } else if self.negative.contains(token) {
            Some(Polarity::Negative)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }
}

/// Whole-word name substitution over section text.
///
/// Each rule becomes a `\b…\b` pattern with the name's metacharacters
/// escaped. Rules apply longest name first so an entry like "Anna Maria"
/// wins over a shorter "Anna"; replacement strings are taken literally.
#[derive(Debug, Clone, Default)]
pub struct NameReplacer {
    rules: Vec<(Regex, String)>,
}

impl NameReplacer {
    /// A replacer with no rules; `apply` returns the text unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> WorkerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| WorkerError::ResourceRead {
            kind: "name replacements",
            path: path.to_path_buf(),
            source,
        })?;
        let map: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| WorkerError::ResourceParse {
                kind: "name replacements",
                source,
            })?;
        Self::from_map(&map)
    }

    pub fn from_map(replacements: &HashMap<String, String>) -> WorkerResult<Self> {
        let mut entries: Vec<(&String, &String)> = replacements.iter().collect();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then(a.0.cmp(b.0)));

        let mut rules = Vec::with_capacity(entries.len());
        for (name, replacement) in entries {
            let pattern = format!(r"\b{}\b", regex::escape(name));
            let regex = Regex::new(&pattern).map_err(|source| WorkerError::ReplacementPattern {
                name: name.clone(),
                source,
            })?;
            rules.push((regex, replacement.clone()));
        }
        Ok(Self { rules })
    }

    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, replacement) in &self.rules {
            result = regex
                .replace_all(&result, NoExpand(replacement))
                .into_owned();
        }
        result
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Turns one task into one section result. Stateless across tasks; safe to
/// share between worker loops behind an `Arc`.
pub struct SectionTransformer {
    lexicon: SentimentLexicon,
    replacer: NameReplacer,
    tokenizer: Tokenizer,
    top_words: usize,
}

impl SectionTransformer {
    pub fn new(lexicon: SentimentLexicon, replacer: NameReplacer, top_words: usize) -> Self {
        info!(
            lexicon_words = lexicon.len(),
            replacement_rules = replacer.rule_count(),
            top_words,
            "section transformer ready"
        );
        Self {
            lexicon,
            replacer,
            tokenizer: Tokenizer::new(),
            top_words,
        }
    }

    pub fn transform(&self, task: &TaskMessage) -> SectionResult {
        let transformed = self.replacer.apply(&task.section_text);
        let tokens = self.tokenizer.tokenize(&transformed);

        let mut frequencies: HashMap<String, u64> = HashMap::new();
        let mut sentiment_score: i64 = 0;
        let mut positive_word_count: u64 = 0;
        let mut negative_word_count: u64 = 0;

        for token in &tokens {
            *frequencies.entry(token.clone()).or_insert(0) += 1;
            match self.lexicon.polarity(token) {
                Some(Polarity::Positive) => {
                    sentiment_score += 1;
                    positive_word_count += 1;
                }
                Some(Polarity::Negative) => {
                    sentiment_score -= 1;
                    negative_word_count += 1;
                }
                None => {}
            }
        }

        SectionResult {
            job_id: task.job_id.clone(),
            section_index: task.section_index,
            total_sections: task.total_sections,
            word_count: tokens.len() as u64,
            top_words: analysis::top_n_words(&frequencies, self.top_words),
            sentiment_score,
            positive_word_count,
            negative_word_count,
            transformed_section_text: transformed,
        }
    }
}

/// Consume tasks until the task queue closes and drains.
///
/// Malformed tasks are dropped and acknowledged; a publish failure requeues
/// the task, and since transformation is deterministic the retry publishes
/// the identical result (the engine dedups it if the first publish half
/// landed).
pub async fn run_worker(
    worker_id: usize,
    transformer: Arc<SectionTransformer>,
    consumer: Arc<dyn MessageConsumer>,
    publisher: Arc<dyn MessagePublisher>,
) -> WorkerResult<()> {
    debug!(worker = worker_id, "worker started");

    while let Some(delivery) = consumer.receive().await? {
        let task: TaskMessage = match serde_json::from_slice(&delivery.payload) {
            Ok(task) => task,
            Err(err) => {
                warn!(
                    worker = worker_id,
                    tag = delivery.delivery_tag,
                    error = %err,
                    "dropping malformed task"
                );
                consumer.ack(&delivery).await?;
                continue;
            }
        };

        let result = transformer.transform(&task);
        let payload =
            serde_json::to_vec(&result).map_err(|source| WorkerError::EncodeResult {
                job_id: result.job_id.clone(),
                source,
            })?;

        match publisher.publish(payload).await {
            Ok(()) => {
                debug!(
                    worker = worker_id,
                    job_id = %task.job_id,
                    section = task.section_index,
                    words = result.word_count,
                    sentiment = result.sentiment_score,
                    "section transformed"
                );
                consumer.ack(&delivery).await?;
            }
            Err(err) => {
                warn!(
                    worker = worker_id,
                    job_id = %task.job_id,
                    section = task.section_index,
                    error = %err,
                    "publish failed; requeueing task"
                );
                consumer.nack_requeue(&delivery).await?;
            }
        }
    }

    debug!(worker = worker_id, "task queue drained; worker exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_task(text: &str) -> TaskMessage {
        TaskMessage {
            job_id: "job-1".to_string(),
            section_index: 0,
            total_sections: 1,
            section_text: text.to_string(),
        }
    }

    fn create_test_transformer() -> SectionTransformer {
        let lexicon = SentimentLexicon::from_words(&["good", "happy"], &["bad", "gloomy"]);
        SectionTransformer::new(lexicon, NameReplacer::empty(), 10)
    }

    #[test]
    fn builtin_lexicon_parses_and_is_nonempty() {
        let lexicon = SentimentLexicon::builtin().unwrap();
        assert!(!lexicon.is_empty());
        assert_eq!(lexicon.polarity("wonderful"), Some(Polarity::Positive));
        assert_eq!(lexicon.polarity("dreadful"), Some(Polarity::Negative));
        assert_eq!(lexicon.polarity("table"), None);
    }

    #[test]
    fn transform_counts_words_and_scores_sentiment() {
        let transformer = create_test_transformer();
        let result = transformer.transform(&create_test_task("A good day, a bad day, a good dog"));

        assert_eq!(result.word_count, 9);
        assert_eq!(result.sentiment_score, 1); // +2 good, -1 bad
        assert_eq!(result.positive_word_count, 2);
        assert_eq!(result.negative_word_count, 1);
    }

    #[test]
    fn transform_ranks_top_words_deterministically() {
        let transformer = create_test_transformer();
        let result = transformer.transform(&create_test_task("b b a a c"));

        let ranked: Vec<(&str, u64)> = result
            .top_words
            .iter()
            .map(|w| (w.word.as_str(), w.count))
            .collect();
        assert_eq!(ranked, vec![("a", 2), ("b", 2), ("c", 1)]);
    }

    #[test]
    fn transform_limits_top_words() {
        let lexicon = SentimentLexicon::from_words(&[], &[]);
        let transformer = SectionTransformer::new(lexicon, NameReplacer::empty(), 2);
        let result = transformer.transform(&create_test_task("one two three four five"));
        assert_eq!(result.top_words.len(), 2);
    }

    #[test]
    fn transform_echoes_job_coordinates() {
        let transformer = create_test_transformer();
        let task = TaskMessage {
            job_id: "job-42".to_string(),
            section_index: 7,
            total_sections: 9,
            section_text: "text".to_string(),
        };

        let result = transformer.transform(&task);
        assert_eq!(result.job_id, "job-42");
        assert_eq!(result.section_index, 7);
        assert_eq!(result.total_sections, 9);
    }

    #[test]
    fn replacer_substitutes_whole_words_only() {
        let map = HashMap::from([("Ann".to_string(), "Beth".to_string())]);
        let replacer = NameReplacer::from_map(&map).unwrap();

        assert_eq!(replacer.apply("Ann met Anna and Ann."), "Beth met Anna and Beth.");
    }

    #[test]
    fn replacer_prefers_longest_name_on_overlap() {
        let map = HashMap::from([
            ("Anna".to_string(), "X".to_string()),
            ("Anna Maria".to_string(), "Y".to_string()),
        ]);
        let replacer = NameReplacer::from_map(&map).unwrap();

        assert_eq!(replacer.apply("Anna Maria and Anna"), "Y and X");
    }

    #[test]
    fn replacer_treats_replacement_text_literally() {
        let map = HashMap::from([("Bob".to_string(), "$name".to_string())]);
        let replacer = NameReplacer::from_map(&map).unwrap();

        assert_eq!(replacer.apply("Bob waved"), "$name waved");
    }

    #[test]
    fn replacer_escapes_metacharacters_in_names() {
        let map = HashMap::from([("Mr. Grey".to_string(), "Smith".to_string())]);
        let replacer = NameReplacer::from_map(&map).unwrap();

        assert_eq!(replacer.apply("Mr. Grey left; MrX Grey stayed"), "Smith left; MrX Grey stayed");
    }

    #[test]
    fn replaced_names_flow_into_frequencies_and_text() {
        let map = HashMap::from([("Alice".to_string(), "Heroine".to_string())]);
        let lexicon = SentimentLexicon::from_words(&[], &[]);
        let transformer =
            SectionTransformer::new(lexicon, NameReplacer::from_map(&map).unwrap(), 10);

        let result = transformer.transform(&create_test_task("Alice spoke. Alice left."));
        assert!(result.transformed_section_text.contains("Heroine"));
        assert!(result
            .top_words
            .iter()
            .any(|w| w.word == "heroine" && w.count == 2));
    }

    #[tokio::test]
    async fn worker_loop_transforms_acks_and_drains() {
        use crate::transport::InMemoryBroker;

        let broker = InMemoryBroker::new();
        let tasks = broker.declare("tasks").await;
        let results = broker.declare("results").await;

        let task = create_test_task("good good bad");
        tasks.publish(serde_json::to_vec(&task).unwrap()).await.unwrap();
        tasks.publish(b"garbage".to_vec()).await.unwrap();
        broker.close("tasks").await.unwrap();

        run_worker(
            0,
            Arc::new(create_test_transformer()),
            Arc::new(tasks.clone()),
            Arc::new(results.clone()),
        )
        .await
        .unwrap();

        assert_eq!(broker.depth("results").await.unwrap(), 1);
        assert_eq!(broker.unacked("tasks").await.unwrap(), 0);

        let delivery = results.receive().await.unwrap().unwrap();
        let result: SectionResult = serde_json::from_slice(&delivery.payload).unwrap();
        assert_eq!(result.sentiment_score, 1);
    }
}
