//! Deduplicates adapter results by Jaccard similarity over their content word-sets,
//! then ranks and truncates the merged pool.

use std::collections::{HashMap, HashSet};

use crate::domain::models::mal::{AdapterResult, IntentClassification, MemoryItem, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Relevance,
    Recency,
    SourcePriority,
}

pub const DEFAULT_MAX_ITEMS: usize = 20;
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.9;

pub fn merge(
    query: &str,
    intent: &IntentClassification,
    outcomes: Vec<(String, AdapterResult)>,
    strategy: MergeStrategy,
    max_items: usize,
    dedup_threshold: f32,
) -> QueryResult {
    let mut pool: Vec<MemoryItem> = Vec::new();
    let mut errors = HashMap::new();
    let mut latency_ms = 0.0;
    let mut sources_queried = Vec::new();

    for (name, outcome) in outcomes {
        sources_queried.push(name.clone());
        latency_ms += outcome.latency_ms;
        if let Some(err) = &outcome.error {
            errors.insert(name, err.clone());
        } else {
            pool.extend(outcome.items);
        }
    }

    let deduped = dedup(pool, dedup_threshold);
    let total_count = deduped.len();
    let mut sorted = sort_by_strategy(deduped, intent, strategy);
    sorted.truncate(max_items);

    QueryResult {
        query: query.to_string(),
        intent: intent.intent,
        sources_queried,
        items: sorted,
        total_count,
        latency_ms,
        errors,
    }
}

fn exact_dup_key(item: &MemoryItem) -> String {
    use std::hash::{Hash, Hasher};
    let content_prefix: String = item.content.chars().take(100).collect();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    format!("{}:{}:{}", item.source, item.summary, content_prefix).hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_string()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn dedup(pool: Vec<MemoryItem>, threshold: f32) -> Vec<MemoryItem> {
    let mut exact_seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<MemoryItem> = Vec::new();

    'outer: for item in pool {
        let key = exact_dup_key(&item);
        if !exact_seen.insert(key) {
            continue;
        }
        for existing in kept.iter_mut() {
            if existing.source == item.source && existing.item_type == item.item_type {
                let sim = jaccard(&word_set(&existing.content_prefix_lower()), &word_set(&item.content_prefix_lower()));
                if sim >= threshold {
                    if item.relevance > existing.relevance {
                        *existing = item;
                    }
                    continue 'outer;
                }
            }
        }
        kept.push(item);
    }
    kept
}

fn sort_by_strategy(mut items: Vec<MemoryItem>, intent: &IntentClassification, strategy: MergeStrategy) -> Vec<MemoryItem> {
    match strategy {
        MergeStrategy::Relevance => {
            items.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        }
        MergeStrategy::Recency => {
            items.sort_by(|a, b| {
                let a_ts = a.timestamp.map(|t| t.timestamp()).unwrap_or(i64::MIN);
                let b_ts = b.timestamp.map(|t| t.timestamp()).unwrap_or(i64::MIN);
                b_ts.cmp(&a_ts).then_with(|| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
        MergeStrategy::SourcePriority => {
            let suggested: HashSet<&String> = intent.sources_suggested.iter().collect();
            items.sort_by(|a, b| {
                let a_boost = suggested.contains(&a.source) as u8;
                let b_boost = suggested.contains(&b.source) as u8;
                b_boost.cmp(&a_boost).then_with(|| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal))
            });
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: &str, relevance: f32, content: &str) -> MemoryItem {
        MemoryItem::new(source, "state", relevance, "summary", content)
    }

    #[test]
    fn dedup_keeps_higher_relevance_on_similar_content() {
        let pool = vec![item("yaml", 0.5, "the quick brown fox jumps"), item("yaml", 0.9, "the quick brown fox leaps")];
        let deduped = dedup(pool, 0.5);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].relevance, 0.9);
    }

    #[test]
    fn dedup_is_idempotent() {
        let pool = vec![item("yaml", 0.5, "alpha beta gamma"), item("vector", 0.4, "delta epsilon zeta")];
        let once = dedup(pool.clone(), 0.9);
        let twice = dedup(once.clone(), 0.9);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn exact_duplicate_prehash_short_circuits() {
        let pool = vec![item("yaml", 0.5, "same content"), item("yaml", 0.5, "same content")];
        let deduped = dedup(pool, 0.9);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn relevance_strategy_sorts_descending() {
        let items = vec![item("yaml", 0.2, "a"), item("yaml", 0.9, "b")];
        let intent = IntentClassification::general(vec![]);
        let sorted = sort_by_strategy(items, &intent, MergeStrategy::Relevance);
        assert_eq!(sorted[0].relevance, 0.9);
    }

    #[test]
    fn source_priority_boosts_suggested_sources() {
        let items = vec![item("other", 0.9, "a"), item("yaml", 0.5, "b")];
        let intent = IntentClassification {
            intent: crate::domain::models::mal::Intent::General,
            confidence: 0.5,
            sources_suggested: vec!["yaml".to_string()],
        };
        let sorted = sort_by_strategy(items, &intent, MergeStrategy::SourcePriority);
        assert_eq!(sorted[0].source, "yaml");
    }

    #[test]
    fn merge_reports_errors_without_including_items() {
        let outcomes = vec![("jira".to_string(), AdapterResult::err("jira", "boom"))];
        let intent = IntentClassification::general(vec![]);
        let result = merge("q", &intent, outcomes, MergeStrategy::Relevance, DEFAULT_MAX_ITEMS, DEFAULT_DEDUP_THRESHOLD);
        assert_eq!(result.errors.get("jira"), Some(&"boom".to_string()));
        assert!(result.items.is_empty());
    }

    #[test]
    fn truncation_preserves_pre_truncation_total_count() {
        let outcomes = vec![(
            "yaml".to_string(),
            AdapterResult::ok("yaml", (0..30).map(|i| item("yaml", 0.5, &format!("item {i} unique"))).collect()),
        )];
        let intent = IntentClassification::general(vec![]);
        let result = merge("q", &intent, outcomes, MergeStrategy::Relevance, 5, DEFAULT_DEDUP_THRESHOLD);
        assert_eq!(result.items.len(), 5);
        assert_eq!(result.total_count, 30);
    }
}
