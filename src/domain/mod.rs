//! Domain layer: entities, value objects, and port traits.
//!
//! Contains no I/O — only business logic and the contracts that
//! `services` implement against and `infrastructure`/`adapters` fulfil.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
