//! End-to-end pipeline tests: a document in, a report file out, with every
//! stage running concurrently over the in-memory broker.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use textmill::config::Config;
use textmill::pipeline::run_pipeline;
use textmill::sink::read_report;

fn test_config(output_dir: &Path) -> Config {
    Config {
        workers: 3,
        dispatch_workers: 2,
        top_words: 5,
        output_dir: output_dir.to_path_buf(),
        lexicon_file: None,
        replacements_file: None,
    }
}

#[tokio::test]
async fn end_to_end_writes_one_report_per_document() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("story.txt");
    fs::write(
        &input,
        "Alice had a good day. A great day!\n\
         \n\
         Bob had a bad day. Alice was happy about her good luck.\n\
         \n\
         The weather was terrible. Alice went home.\n",
    )
    .unwrap();

    let replacements = dir.path().join("replacements.json");
    fs::write(&replacements, r#"{"Alice": "Carol"}"#).unwrap();

    let output = dir.path().join("results");
    let mut config = test_config(&output);
    config.replacements_file = Some(replacements);

    let summary = run_pipeline(&config, &input).await.unwrap();
    assert_eq!(summary.sections, 3);
    assert_eq!(summary.reports_written, 1);

    let report = read_report(&output.join(format!("job-{}.json", summary.job_id))).unwrap();
    assert_eq!(report.job_id, summary.job_id);
    assert_eq!(report.total_sections, 3);

    // Sections reassembled in document order, names replaced throughout.
    assert_eq!(report.modified_text.matches("\n\n").count(), 2);
    assert!(report.modified_text.starts_with("Carol had a good day."));
    assert!(!report.modified_text.contains("Alice"));

    // good + great + happy + good = 4 positive, bad + terrible = 2 negative.
    assert_eq!(report.total_positive_word_count, 4);
    assert_eq!(report.total_negative_word_count, 2);
    assert_eq!(report.total_sentiment_score, 2);

    // Global ranking is capped at the configured size and sorted by count
    // descending with ties broken alphabetically.
    assert!(report.global_top_words.len() <= 5);
    for pair in report.global_top_words.windows(2) {
        assert!(
            pair[0].count > pair[1].count
                || (pair[0].count == pair[1].count && pair[0].word < pair[1].word)
        );
    }

    // Sentences come back shortest first, drawn from the replaced text.
    let lengths: Vec<usize> = report
        .sorted_sentences
        .iter()
        .map(|s| s.chars().count())
        .collect();
    let mut sorted = lengths.clone();
    sorted.sort_unstable();
    assert_eq!(lengths, sorted);
    assert!(report
        .sorted_sentences
        .contains(&"A great day!".to_string()));
}

#[tokio::test]
async fn single_paragraph_document_completes_on_one_section() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("note.txt");
    fs::write(&input, "Just one happy paragraph.").unwrap();

    let output = dir.path().join("results");
    let summary = run_pipeline(&test_config(&output), &input)
        .await
        .unwrap();

    assert_eq!(summary.sections, 1);
    let report = read_report(&output.join(format!("job-{}.json", summary.job_id))).unwrap();
    assert_eq!(report.total_sections, 1);
    assert_eq!(report.modified_text, "Just one happy paragraph.");
    assert_eq!(report.total_word_count, 4);
    assert!((report.average_sentiment_per_section - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn blank_document_fails_without_writing_reports() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("blank.txt");
    fs::write(&input, "   \n\n  \n").unwrap();

    let output = dir.path().join("results");
    let err = run_pipeline(&test_config(&output), &input)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("producer failed"));
    assert!(!output.exists(), "no report directory for a rejected run");
}

#[tokio::test]
async fn custom_lexicon_file_drives_sentiment_scores() {
    let dir = TempDir::new().unwrap();
    let lexicon = dir.path().join("lexicon.json");
    fs::write(
        &lexicon,
        r#"{"positive": ["zig"], "negative": ["zag"]}"#,
    )
    .unwrap();

    let input = dir.path().join("doc.txt");
    fs::write(&input, "Zig zig zag. Nothing else scores.").unwrap();

    let output = dir.path().join("results");
    let mut config = test_config(&output);
    config.lexicon_file = Some(lexicon);

    let summary = run_pipeline(&config, &input).await.unwrap();
    let report = read_report(&output.join(format!("job-{}.json", summary.job_id))).unwrap();

    assert_eq!(report.total_positive_word_count, 2);
    assert_eq!(report.total_negative_word_count, 1);
    assert_eq!(report.total_sentiment_score, 1);
}

#[tokio::test]
async fn invalid_worker_count_fails_validation() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("doc.txt");
    fs::write(&input, "Some text.").unwrap();

    let mut config = test_config(dir.path());
    config.workers = 0;

    let err = run_pipeline(&config, &input).await.unwrap_err();
    assert!(err.to_string().contains("workers"));
}
