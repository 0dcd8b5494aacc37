//! Issue tracker egress, shelled out to a configurable CLI binary.

pub mod cli_tracker;

pub use cli_tracker::{CliIssueTracker, CliTrackerConfig};
