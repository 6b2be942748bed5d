//! Fuzzy lookup throughput over a synthetic corpus.
//!
//! The resolver scores one fuzzy query per unresolved line; a 60-card
//! screenshot with heavy OCR noise can issue dozens of these, so the
//! per-query cost directly bounds scan latency.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use deckscan_carddb::{fuzzy, CardCorpus, CardEntry};

fn synthetic_corpus(size: usize) -> CardCorpus {
    let corpus = CardCorpus::new();
    let entries = (0..size)
        .map(|i| CardEntry {
            oracle_id: format!("oracle-{i:05}"),
            name: format!("Synthetic Card Number {i} of the Grand Design"),
            set_code: None,
            collector_number: None,
        })
        .collect();
    corpus.build_from_entries(entries);
    corpus
}

fn bench_score(c: &mut Criterion) {
    c.bench_function("fuzzy_score_close_pair", |b| {
        b.iter(|| fuzzy::score(black_box("snapcaster mage"), black_box("snapcastor mage")));
    });
}

fn bench_candidates(c: &mut Criterion) {
    let corpus = synthetic_corpus(20_000);
    c.bench_function("fuzzy_candidates_20k_corpus", |b| {
        b.iter(|| {
            corpus
                .fuzzy_candidates(black_box("synthetc card number 123"), 5)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_score, bench_candidates);
criterion_main!(benches);
