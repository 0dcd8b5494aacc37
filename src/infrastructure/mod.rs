//! Concrete adapters for the domain's ports: persistence, process invocation, HTTP, logging, configuration.

pub mod agent;
pub mod config;
pub mod inference;
pub mod ipc;
pub mod logging;
pub mod persistence;
pub mod tracker;
pub mod ui_peer;
