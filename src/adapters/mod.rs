//! Memory source adapters: local YAML state, local vector memory, and a
//! tracker-backed read-only source.

pub mod tracker_adapter;
pub mod vector_adapter;
pub mod yaml_adapter;

pub use tracker_adapter::TrackerAdapter;
pub use vector_adapter::VectorAdapter;
pub use yaml_adapter::YamlAdapter;
