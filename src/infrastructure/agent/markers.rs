//! Bracketed status-marker parsing out of headless-agent stdout, and extraction of commit hashes, merge-request ids, files and branches it mentions.

use once_cell_helpers::LazyRegex;
use regex::Regex;

use crate::domain::models::work_log::WorkLogArtifacts;

mod once_cell_helpers {
    use regex::Regex;
    use std::sync::OnceLock;

    /// Tiny lazily-initialized regex holder, avoiding a dependency on
    /// `once_cell`/`lazy_static` for a handful of constant patterns.
    pub struct LazyRegex {
        pattern: &'static str,
        cell: OnceLock<Regex>,
    }

    impl LazyRegex {
        pub const fn new(pattern: &'static str) -> Self {
            Self { pattern, cell: OnceLock::new() }
        }

        pub fn get(&self) -> &Regex {
            self.cell.get_or_init(|| Regex::new(self.pattern).expect("static marker regex must compile"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintBotStatus {
    Completed,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    ReadyToMerge,
    ApprovedWithHold,
    NeedsApproval,
    CiFailing,
    ChangesRequested,
    NoMr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    Success,
    MergeFailed,
    CloseFailed,
}

static SPRINT_BOT_STATUS: LazyRegex = LazyRegex::new(r"(?i)\[SPRINT_BOT_STATUS:\s*(COMPLETED|BLOCKED|FAILED)(?:\s*,?\s*(?:reason|error):\s*([^\]]+))?\]");
static MERGE_RESULT: LazyRegex = LazyRegex::new(r"(?i)\[MERGE_RESULT:\s*(SUCCESS|MERGE_FAILED|CLOSE_FAILED)\]");
static MR_ID: LazyRegex = LazyRegex::new(r"(?i)\[MR_ID:\s*(\d+)\]");
static REVIEW_STATUS: LazyRegex =
    LazyRegex::new(r"(?i)\[(READY_TO_MERGE|APPROVED_WITH_HOLD|NEEDS_APPROVAL|CI_FAILING|CHANGES_REQUESTED|NO_MR)\]");
static COMMIT_HASH: LazyRegex = LazyRegex::new(r"(?i)\bcommit[: ]+([0-9a-f]{7,40})\b");
static MERGE_REQUEST_ID: LazyRegex = LazyRegex::new(r"(?i)\b(?:merge request|MR|PR)\s*#?(\d+)\b");
static FILE_PATH: LazyRegex = LazyRegex::new(r"(?m)^\s*(?:modified|created|deleted):\s*([^\s]+\.[A-Za-z0-9]+)\s*$");
static BRANCH_NAME: LazyRegex = LazyRegex::new(r"(?i)\bbranch[: ]+([A-Za-z0-9_./-]+)\b");

const HOLD_PHRASES: &[&str] = &[
    "don't merge",
    "do not merge",
    "hold off",
    "hold merge",
    "wait until",
    "needs more work",
    "wip",
    "work in progress",
];

pub fn parse_sprint_bot_status(output: &str) -> Option<(SprintBotStatus, Option<String>)> {
    let captures = SPRINT_BOT_STATUS.get().captures(output)?;
    let status = match captures.get(1)?.as_str().to_uppercase().as_str() {
        "COMPLETED" => SprintBotStatus::Completed,
        "BLOCKED" => SprintBotStatus::Blocked,
        "FAILED" => SprintBotStatus::Failed,
        _ => return None,
    };
    let detail = captures.get(2).map(|m| m.as_str().trim().to_string());
    Some((status, detail))
}

pub fn parse_review_status(output: &str) -> Option<ReviewStatus> {
    let captures = REVIEW_STATUS.get().captures(output)?;
    Some(match captures.get(1)?.as_str().to_uppercase().as_str() {
        "READY_TO_MERGE" => ReviewStatus::ReadyToMerge,
        "APPROVED_WITH_HOLD" => ReviewStatus::ApprovedWithHold,
        "NEEDS_APPROVAL" => ReviewStatus::NeedsApproval,
        "CI_FAILING" => ReviewStatus::CiFailing,
        "CHANGES_REQUESTED" => ReviewStatus::ChangesRequested,
        "NO_MR" => ReviewStatus::NoMr,
        _ => return None,
    })
}

pub fn parse_mr_id(output: &str) -> Option<String> {
    MR_ID.get().captures(output).map(|c| c[1].to_string())
}

pub fn parse_merge_result(output: &str) -> Option<MergeResult> {
    let captures = MERGE_RESULT.get().captures(output)?;
    Some(match captures.get(1)?.as_str().to_uppercase().as_str() {
        "SUCCESS" => MergeResult::Success,
        "MERGE_FAILED" => MergeResult::MergeFailed,
        "CLOSE_FAILED" => MergeResult::CloseFailed,
        _ => return None,
    })
}

pub fn contains_hold_phrase(text: &str) -> bool {
    let lowered = text.to_lowercase();
    HOLD_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

pub fn extract_artifacts(output: &str) -> WorkLogArtifacts {
    WorkLogArtifacts {
        commits: dedup_captures(&COMMIT_HASH, output),
        merge_requests: dedup_captures(&MERGE_REQUEST_ID, output),
        files_changed: dedup_captures(&FILE_PATH, output),
        branches_created: dedup_captures(&BRANCH_NAME, output),
    }
}

fn dedup_captures(pattern: &LazyRegex, text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for captures in pattern.get().captures_iter(text) {
        let value = captures[1].to_string();
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

/// Exposed for adapters that need a ready-to-use `Regex` without going
/// through the whole-output helpers above (e.g. streaming line scans).
pub fn sprint_bot_status_pattern() -> &'static Regex {
    SPRINT_BOT_STATUS.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completed_status_without_reason() {
        let (status, detail) = parse_sprint_bot_status("done.\n[SPRINT_BOT_STATUS: COMPLETED]\n").unwrap();
        assert_eq!(status, SprintBotStatus::Completed);
        assert!(detail.is_none());
    }

    #[test]
    fn parses_blocked_status_with_reason() {
        let (status, detail) = parse_sprint_bot_status("[SPRINT_BOT_STATUS: BLOCKED, reason: waiting on CI]").unwrap();
        assert_eq!(status, SprintBotStatus::Blocked);
        assert_eq!(detail.as_deref(), Some("waiting on CI"));
    }

    #[test]
    fn parses_review_markers_and_mr_id() {
        let out = "Looked it up.\n[READY_TO_MERGE]\n[MR_ID: 42]";
        assert_eq!(parse_review_status(out), Some(ReviewStatus::ReadyToMerge));
        assert_eq!(parse_mr_id(out).as_deref(), Some("42"));
    }

    #[test]
    fn parses_merge_result() {
        assert_eq!(parse_merge_result("[MERGE_RESULT: SUCCESS]"), Some(MergeResult::Success));
        assert_eq!(parse_merge_result("[MERGE_RESULT: MERGE_FAILED]"), Some(MergeResult::MergeFailed));
    }

    #[test]
    fn detects_hold_phrases_case_insensitively() {
        assert!(contains_hold_phrase("Please HOLD OFF on merging this."));
        assert!(contains_hold_phrase("still WIP"));
        assert!(!contains_hold_phrase("looks good to merge"));
    }

    #[test]
    fn extracts_commits_and_files() {
        let output = "commit: abc1234 fixes it\nmodified: src/lib.rs\nmodified: src/main.rs\nbranch: feature/ISS-1-fix\n";
        let artifacts = extract_artifacts(output);
        assert_eq!(artifacts.commits, vec!["abc1234".to_string()]);
        assert_eq!(artifacts.files_changed, vec!["src/lib.rs".to_string(), "src/main.rs".to_string()]);
        assert_eq!(artifacts.branches_created, vec!["feature/ISS-1-fix".to_string()]);
    }
}
