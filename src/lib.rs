//! Developer-productivity backplane: a Memory Abstraction Layer (query
//! routing over heterogeneous memory adapters) and a Sprint Automation
//! Daemon (an unattended loop that drives sprint issues through an
//! execution workflow, handing work off to a foreground UI chat peer or a
//! background headless agent).
//!
//! Layout follows a hexagonal split: [`domain`] holds entities and port
//! traits with no I/O, [`services`] implements the routing, scheduling and
//! state-machine logic against those traits, and [`adapters`]/[`infrastructure`] provide the
//! concrete implementations (persistence, process invocation, HTTP,
//! logging, configuration) wired together in `main`.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
