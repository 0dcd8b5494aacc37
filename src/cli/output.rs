//! Table rendering for `backplane --list`.

use std::env;
use std::time::Duration;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::models::sprint::{ApprovalStatus, SprintIssue};

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// A spinner for one-shot commands (`memory query`/`search`) that may take a few
/// seconds while adapters are fanned out. Hidden when colors are disabled or the
/// terminal doesn't support them, so piped output stays clean.
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .expect("invalid spinner template")
            .tick_chars(SPINNER_CHARS),
    );
    if !supports_color() {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.into());
    spinner
}

/// Finish helpers matching the rest of the CLI's colored success/error markers.
pub trait ProgressBarExt {
    fn finish_success(&self, message: impl Into<String>);
    fn finish_error(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✓ {}", message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.finish_with_message(format!("✗ {}", message.into()));
    }
}

/// Renders a slice of [`SprintIssue`] as a human-readable table.
pub struct IssueTableFormatter {
    use_colors: bool,
}

impl IssueTableFormatter {
    pub fn new() -> Self {
        Self { use_colors: supports_color() }
    }

    pub fn format(&self, issues: &[(&SprintIssue, bool)]) -> String {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Key").add_attribute(Attribute::Bold),
            Cell::new("Summary").add_attribute(Attribute::Bold),
            Cell::new("Jira Status").add_attribute(Attribute::Bold),
            Cell::new("Approval").add_attribute(Attribute::Bold),
            Cell::new("Actionable").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
        ]);

        for (issue, actionable) in issues {
            let approval_cell = if self.use_colors {
                Cell::new(format!("{:?}", issue.approval_status)).fg(approval_color(issue.approval_status))
            } else {
                Cell::new(format!("{:?}", issue.approval_status))
            };
            let actionable_cell = if *actionable { Cell::new("yes") } else { Cell::new("no") };
            table.add_row(vec![
                Cell::new(&issue.key),
                Cell::new(truncate(&issue.title, 48)),
                Cell::new(&issue.jira_status),
                approval_cell,
                actionable_cell,
                Cell::new(format!("{:?}", issue.priority)),
            ]);
        }

        table.to_string()
    }
}

impl Default for IssueTableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn approval_color(status: ApprovalStatus) -> Color {
    match status {
        ApprovalStatus::Pending => Color::Grey,
        ApprovalStatus::Approved => Color::Cyan,
        ApprovalStatus::InProgress => Color::Yellow,
        ApprovalStatus::Blocked => Color::Red,
        ApprovalStatus::Completed => Color::Green,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    console::colors_enabled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_lists_each_issue_with_its_actionable_flag() {
        let issue = SprintIssue::new("AAP-1", "Fix the thing", "To Do");
        let formatter = IssueTableFormatter { use_colors: false };
        let rendered = formatter.format(&[(&issue, true)]);
        assert!(rendered.contains("AAP-1"));
        assert!(rendered.contains("Fix the thing"));
        assert!(rendered.contains("yes"));
    }

    #[test]
    fn truncate_keeps_short_text_untouched() {
        assert_eq!(truncate("short", 48), "short");
    }

    #[test]
    fn truncate_clips_long_text_with_ellipsis() {
        let long = "x".repeat(60);
        let truncated = truncate(&long, 48);
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 48);
    }

    #[test]
    fn spinner_carries_its_initial_message() {
        let spinner = create_spinner("querying: test");
        spinner.set_draw_target(ProgressDrawTarget::hidden());
        assert_eq!(spinner.message(), "querying: test");
        spinner.finish_success("1 result(s)");
        assert!(spinner.is_finished());
    }
}
