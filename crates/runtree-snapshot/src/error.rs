//! Snapshot error types.

use thiserror::Error;

use runtree_core::TreeError;

/// Errors that can occur when capturing or merging a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The tree's ids cannot be trusted.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The snapshot was taken from a different file or configuration.
    #[error("snapshot root {found} does not match tree root {expected}")]
    RootMismatch { expected: String, found: String },
}
