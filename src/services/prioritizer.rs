//! Pure weighted-factor scoring used to rank sprint issues for processing order.

use chrono::{DateTime, Utc};

use crate::domain::models::sprint::SprintIssue;

#[derive(Debug, Clone, Copy)]
pub struct PrioritizerWeights {
    pub priority: f32,
    pub points: f32,
    pub age: f32,
    pub type_: f32,
}

impl Default for PrioritizerWeights {
    fn default() -> Self {
        Self {
            priority: 0.4,
            points: 0.3,
            age: 0.2,
            type_: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedIssue {
    pub key: String,
    pub rank: usize,
    pub score: f32,
    pub reasoning: Vec<String>,
}

fn type_score(issue_type: &str) -> f32 {
    match issue_type.to_lowercase().as_str() {
        "bug" | "defect" => 30.0,
        "incident" => 25.0,
        "task" => 20.0,
        "story" => 15.0,
        "feature" | "improvement" => 10.0,
        "epic" => 5.0,
        _ => 15.0,
    }
}

fn points_score(points: Option<f32>) -> f32 {
    match points {
        None => 10.0,
        Some(p) if p <= 0.0 => 10.0,
        Some(p) if p <= 2.0 => 40.0,
        Some(p) if p <= 5.0 => 30.0,
        Some(p) if p <= 8.0 => 20.0,
        Some(_) => 10.0,
    }
}

fn age_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let days = (now - created_at).num_days();
    if days > 30 {
        30.0
    } else if days >= 15 {
        20.0
    } else if days >= 8 {
        10.0
    } else if days >= 0 {
        5.0
    } else {
        0.0
    }
}

pub fn score_issue(issue: &SprintIssue, weights: PrioritizerWeights, now: DateTime<Utc>, is_blocked: bool) -> f32 {
    let raw = issue.priority.score() * weights.priority
        + points_score(issue.story_points) * weights.points
        + age_score(issue.created_at, now) * weights.age
        + type_score(&issue.issue_type) * weights.type_;

    let mut score = raw;
    if is_blocked {
        score *= 0.3;
    }
    if issue.waiting_reason.is_some() {
        score *= 0.5;
    }
    score
}

fn reasoning_for(issue: &SprintIssue, weights: PrioritizerWeights, now: DateTime<Utc>, is_blocked: bool) -> Vec<String> {
    let mut lines = vec![
        format!("priority {:?}: {:.1} x {:.2}", issue.priority, issue.priority.score(), weights.priority),
        format!("type {:?}: {:.1} x {:.2}", issue.issue_type, type_score(&issue.issue_type), weights.type_),
        format!("points {:?}: {:.1} x {:.2}", issue.story_points, points_score(issue.story_points), weights.points),
        format!("age {}d: {:.1} x {:.2}", (now - issue.created_at).num_days().max(0), age_score(issue.created_at, now), weights.age),
    ];
    if is_blocked {
        lines.push("penalty: blocked (x0.3)".to_string());
    }
    if issue.waiting_reason.is_some() {
        lines.push("penalty: waiting_reason set (x0.5)".to_string());
    }
    lines
}

pub fn prioritize_issues(issues: &[SprintIssue], weights: PrioritizerWeights, now: DateTime<Utc>) -> Vec<RankedIssue> {
    let mut scored: Vec<(usize, &SprintIssue, f32, Vec<String>)> = issues
        .iter()
        .enumerate()
        .map(|(idx, issue)| {
            let blocked = issue.jira_status.eq_ignore_ascii_case("blocked");
            let score = score_issue(issue, weights, now, blocked);
            let reasoning = reasoning_for(issue, weights, now, blocked);
            (idx, issue, score, reasoning)
        })
        .collect();

    scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

    scored
        .into_iter()
        .enumerate()
        .map(|(rank_idx, (_, issue, score, reasoning))| RankedIssue {
            key: issue.key.clone(),
            rank: rank_idx + 1,
            score,
            reasoning,
        })
        .collect()
}
