//! runtree-snapshot — JSON snapshots of identified test trees.
//!
//! A coordinating process and its workers build the same tree from the same
//! sources, so ids assigned on each side agree. A worker captures a
//! [`TreeSnapshot`] after running its tests; the coordinator loads it and
//! merges the recorded attempts back into its own tree by id.

pub mod error;
pub mod merge;
pub mod snapshot;

pub use error::SnapshotError;
pub use merge::MergeSummary;
pub use snapshot::{SuiteSnapshot, TestSnapshot, TreeSnapshot};
