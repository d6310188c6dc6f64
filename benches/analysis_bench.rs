//! Performance benchmarks for the text analysis primitives
//!
//! Measures tokenization, ranked word selection, and sentence extraction
//! over section-sized inputs, since every section a worker handles goes
//! through all three.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::hint::black_box;
use textmill::analysis::{sort_sentences, split_sentences, top_n_words, Tokenizer};

const WORD_POOL: &[&str] = &[
    "analysis", "pipeline", "section", "sentiment", "report", "queue", "worker", "merge",
    "document", "token", "ranking", "frequency", "paragraph", "sentence", "aggregate", "publish",
];

/// Build prose with sentence breaks every few words and varied terminators.
fn synthetic_text(words: usize) -> String {
    let mut text = String::with_capacity(words * 10);
    for i in 0..words {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(WORD_POOL[(i * 7) % WORD_POOL.len()]);
        if i % 9 == 8 {
            text.push(match (i / 9) % 3 {
                0 => '.',
                1 => '!',
                _ => '?',
            });
        }
    }
    text.push('.');
    text
}

fn synthetic_frequencies(distinct: usize) -> HashMap<String, u64> {
    (0..distinct)
        .map(|i| (format!("word{i:05}"), ((i * 37) % 500 + 1) as u64))
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    let tokenizer = Tokenizer::new();

    for size in &[100usize, 1_000, 10_000] {
        let text = synthetic_text(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| black_box(tokenizer.tokenize(black_box(text))));
        });
    }

    group.finish();
}

fn bench_top_words(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_words");

    for distinct in &[100usize, 1_000, 10_000] {
        let frequencies = synthetic_frequencies(*distinct);
        group.bench_with_input(
            BenchmarkId::from_parameter(distinct),
            &frequencies,
            |b, frequencies| {
                b.iter(|| black_box(top_n_words(black_box(frequencies), 10)));
            },
        );
    }

    group.finish();
}

fn bench_sentences(c: &mut Criterion) {
    let mut group = c.benchmark_group("sentences");

    for size in &[100usize, 1_000, 10_000] {
        let text = synthetic_text(*size);
        group.bench_with_input(
            BenchmarkId::new("split_and_sort", size),
            &text,
            |b, text| {
                b.iter(|| {
                    let mut sentences = split_sentences(black_box(text));
                    sort_sentences(&mut sentences);
                    black_box(sentences);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_top_words, bench_sentences);
criterion_main!(benches);
