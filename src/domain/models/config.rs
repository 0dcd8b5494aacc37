//! Loaded and validated by `infrastructure::config::ConfigLoader`; every field has a
//! sensible default so a bare `Config::default()` is already a legal configuration.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::config::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_project")]
    pub project: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default = "default_local_user")]
    pub local_user: String,
    #[serde(default = "default_actionable_statuses")]
    pub actionable_statuses: Vec<String>,
    #[serde(default = "default_review_statuses")]
    pub review_statuses: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            project: default_tracker_project(),
            component: None,
            local_user: default_local_user(),
            actionable_statuses: default_actionable_statuses(),
            review_statuses: default_review_statuses(),
        }
    }
}

fn default_tracker_project() -> String {
    "AAP".to_string()
}

fn default_local_user() -> String {
    String::new()
}

pub fn default_actionable_statuses() -> Vec<String> {
    vec!["new", "refinement", "to do", "open", "backlog"].into_iter().map(String::from).collect()
}

pub fn default_review_statuses() -> Vec<String> {
    vec!["in review", "code review"].into_iter().map(String::from).collect()
}

/// For the default Mon-Fri 09:00-17:00 window this is equivalent to any fixed-offset
/// zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkingHoursConfig {
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    #[serde(default)]
    pub start_minute: u32,
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    #[serde(default)]
    pub end_minute: u32,
    #[serde(default = "default_true")]
    pub weekdays_only: bool,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for WorkingHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            start_minute: 0,
            end_hour: default_end_hour(),
            end_minute: 0,
            weekdays_only: true,
            utc_offset_minutes: 0,
        }
    }
}

fn default_start_hour() -> u32 {
    9
}

fn default_end_hour() -> u32 {
    17
}

fn default_true() -> bool {
    true
}

impl WorkingHoursConfig {
    /// True if `now` falls within the configured working hours and weekday set.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        let local = now.with_timezone(&offset);
        if self.weekdays_only {
            use chrono::Datelike;
            let weekday = local.weekday();
            if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
                return false;
            }
        }
        use chrono::Timelike;
        let minutes_of_day = local.hour() * 60 + local.minute();
        let start = self.start_hour * 60 + self.start_minute;
        let end = self.end_hour * 60 + self.end_minute;
        (start..end).contains(&minutes_of_day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_tracker_refresh_interval")]
    pub tracker_refresh_interval_seconds: u64,
    #[serde(default = "default_review_check_interval")]
    pub review_check_interval_seconds: u64,
    #[serde(default = "default_skip_blocked_after")]
    pub skip_blocked_after_minutes: u64,
    #[serde(default = "default_background_agent_timeout")]
    pub background_agent_timeout_seconds: u64,
    #[serde(default = "default_review_check_timeout")]
    pub review_check_timeout_seconds: u64,
    #[serde(default = "default_review_merge_timeout")]
    pub review_merge_timeout_seconds: u64,
    #[serde(default = "default_adapter_deadline")]
    pub adapter_deadline_seconds: u64,
    #[serde(default = "default_tracker_transition_timeout")]
    pub tracker_transition_timeout_seconds: u64,
    #[serde(default = "default_ipc_ping_timeout")]
    pub ipc_ping_timeout_seconds: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            tracker_refresh_interval_seconds: default_tracker_refresh_interval(),
            review_check_interval_seconds: default_review_check_interval(),
            skip_blocked_after_minutes: default_skip_blocked_after(),
            background_agent_timeout_seconds: default_background_agent_timeout(),
            review_check_timeout_seconds: default_review_check_timeout(),
            review_merge_timeout_seconds: default_review_merge_timeout(),
            adapter_deadline_seconds: default_adapter_deadline(),
            tracker_transition_timeout_seconds: default_tracker_transition_timeout(),
            ipc_ping_timeout_seconds: default_ipc_ping_timeout(),
        }
    }
}

fn default_check_interval() -> u64 {
    300
}
fn default_tracker_refresh_interval() -> u64 {
    1800
}
fn default_review_check_interval() -> u64 {
    28_800
}
fn default_skip_blocked_after() -> u64 {
    30
}
fn default_background_agent_timeout() -> u64 {
    1800
}
fn default_review_check_timeout() -> u64 {
    120
}
fn default_review_merge_timeout() -> u64 {
    180
}
fn default_adapter_deadline() -> u64 {
    30
}
fn default_tracker_transition_timeout() -> u64 {
    60
}
fn default_ipc_ping_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "default_ipc_bind")]
    pub bind_address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            bind_address: default_ipc_bind(),
            enabled: true,
        }
    }
}

fn default_ipc_bind() -> String {
    "127.0.0.1:8733".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub working_hours: WorkingHoursConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,
    #[serde(default)]
    pub inference_endpoint: Option<String>,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

fn default_state_root() -> PathBuf {
    PathBuf::from("state")
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("adapters")
}

impl Config {
    pub fn sprint_state_path(&self) -> PathBuf {
        self.state_root.join("sprint_state_v2.json")
    }

    pub fn trace_path(&self, issue_key: &str) -> PathBuf {
        self.state_root.join("sprint_traces").join(format!("{issue_key}.yaml"))
    }

    pub fn work_log_path(&self, issue_key: &str) -> PathBuf {
        self.state_root.join("sprint_work").join(format!("{issue_key}.yaml"))
    }

    pub fn intent_training_log_path(&self) -> PathBuf {
        self.state_root.join("classifiers").join("intent_training.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn working_hours_default_covers_weekday_business_hours() {
        let hours = WorkingHoursConfig::default();
        let tuesday_noon = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        assert!(hours.contains(tuesday_noon));
    }

    #[test]
    fn working_hours_excludes_weekend() {
        let hours = WorkingHoursConfig::default();
        let saturday = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        assert!(!hours.contains(saturday));
    }

    #[test]
    fn working_hours_excludes_before_and_after_window() {
        let hours = WorkingHoursConfig::default();
        let early = Utc.with_ymd_and_hms(2026, 7, 28, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 7, 28, 18, 0, 0).unwrap();
        assert!(!hours.contains(early));
        assert!(!hours.contains(late));
    }

    #[test]
    fn default_config_has_well_known_paths() {
        let config = Config::default();
        assert_eq!(config.sprint_state_path(), PathBuf::from("state/sprint_state_v2.json"));
        assert_eq!(config.trace_path("AAP-1"), PathBuf::from("state/sprint_traces/AAP-1.yaml"));
        assert_eq!(config.work_log_path("AAP-1"), PathBuf::from("state/sprint_work/AAP-1.yaml"));
    }
}
