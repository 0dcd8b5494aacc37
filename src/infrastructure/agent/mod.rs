//! Headless agent subprocess invocation and its output marker grammar.

pub mod headless_agent;
pub mod markers;

pub use headless_agent::{CliHeadlessAgent, HeadlessAgentConfig};
