//! Aggregation runtime: merge per-source results into one snapshot, hold the
//! latest snapshot, and drive the polling cycle.

pub mod merger;
pub mod scheduler;
pub mod store;
pub mod synthesizer;

pub use merger::Merger;
pub use scheduler::{CycleOutcome, PollScheduler, SchedulerConfig, SchedulerHandle, SchedulerStats};
pub use store::{SnapshotStore, StoreUpdate, Subscription};
pub use synthesizer::Synthesizer;

#[cfg(test)]
mod scheduler_test;
