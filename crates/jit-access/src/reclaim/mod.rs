//! Reclaiming expired grants.
//!
//! [`scan`] holds the per-pass logic and is driven directly in tests;
//! [`scheduler`] repeats it on a timer.

pub mod scan;
pub mod scheduler;

pub use scan::{GrantReclaimer, ScanReport};
pub use scheduler::ReclaimScheduler;
