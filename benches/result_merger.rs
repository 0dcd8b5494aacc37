
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backplane::domain::models::mal::{AdapterResult, Intent, IntentClassification, MemoryItem};
use backplane::services::result_merger::{self, MergeStrategy, DEFAULT_DEDUP_THRESHOLD, DEFAULT_MAX_ITEMS};

const SOURCES: &[&str] = &["yaml", "vector", "jira", "gitlab", "github"];

fn make_outcomes(items_per_source: usize, duplicate_fraction: f32) -> Vec<(String, AdapterResult)> {
    let duplicate_every = if duplicate_fraction > 0.0 {
        (1.0 / duplicate_fraction).round().max(1.0) as usize
    } else {
        usize::MAX
    };

    SOURCES
        .iter()
        .map(|&source| {
            let items = (0..items_per_source)
                .map(|i| {
                    let relevance = 0.5 + (i % 5) as f32 * 0.1;
                    let content = if duplicate_every != usize::MAX && i % duplicate_every == 0 && i > 0 {
                        "The quick brown fox jumps over the lazy dog near the river bank".to_string()
                    } else {
                        format!("distinct content body describing finding number {i} in detail with enough words to avoid accidental collision")
                    };
                    MemoryItem::new(source.to_string(), "doc", relevance, format!("summary {i}"), content)
                })
                .collect();
            (source.to_string(), AdapterResult::ok(source.to_string(), items))
        })
        .collect()
}

fn bench_merge_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_merger_merge");
    let intent = IntentClassification::general(SOURCES.iter().map(|s| s.to_string()).collect());

    for &items_per_source in &[10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::new("no_duplicates", items_per_source), &items_per_source, |b, &n| {
            let outcomes = make_outcomes(n, 0.0);
            b.iter(|| {
                result_merger::merge(
                    black_box("find recent work"),
                    black_box(&intent),
                    black_box(outcomes.clone()),
                    MergeStrategy::Relevance,
                    DEFAULT_MAX_ITEMS,
                    DEFAULT_DEDUP_THRESHOLD,
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("with_duplicates", items_per_source), &items_per_source, |b, &n| {
            let outcomes = make_outcomes(n, 0.2);
            b.iter(|| {
                result_merger::merge(
                    black_box("find recent work"),
                    black_box(&intent),
                    black_box(outcomes.clone()),
                    MergeStrategy::Relevance,
                    DEFAULT_MAX_ITEMS,
                    DEFAULT_DEDUP_THRESHOLD,
                )
            });
        });
    }
    group.finish();
}

fn bench_merge_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("result_merger_strategy");
    let intent = IntentClassification {
        intent: Intent::StatusCheck,
        confidence: 0.9,
        sources_suggested: vec!["yaml".to_string()],
    };
    let outcomes = make_outcomes(200, 0.1);

    for strategy in [MergeStrategy::Relevance, MergeStrategy::Recency, MergeStrategy::SourcePriority] {
        group.bench_function(format!("{strategy:?}"), |b| {
            b.iter(|| {
                result_merger::merge(
                    black_box("status check"),
                    black_box(&intent),
                    black_box(outcomes.clone()),
                    strategy,
                    DEFAULT_MAX_ITEMS,
                    DEFAULT_DEDUP_THRESHOLD,
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge_sizes, bench_merge_strategies);
criterion_main!(benches);
