//! Flat-file implementations of the domain's persistence ports (`state/sprint_state_v2.json`,
//! `state/sprint_traces/*.yaml`, `state/sprint_work/*.yaml`), all going through
//! [`atomic::write_atomic`] so a crash never leaves a torn file behind.

pub mod atomic;
pub mod sprint_state_store;
pub mod trace_store;
pub mod work_log_store;

pub use sprint_state_store::FileSprintStateStore;
pub use trace_store::FileTraceStore;
pub use work_log_store::FileWorkLogStore;
