//! Tree error types.
//!
//! Building and querying the tree never fails. These errors only come from
//! looking nodes up by their stable id.

use thiserror::Error;

/// Errors returned by id-based lookups on a [`crate::tree::TestTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The tree changed after ids were last assigned.
    #[error("ids are stale: the tree changed since ids were last assigned")]
    StaleIds,

    /// No suite or test carries the requested id.
    #[error("unknown id: {0}")]
    UnknownId(String),
}

impl TreeError {
    /// Returns `true` if renumbering and reassigning ids would fix the lookup.
    pub fn is_stale(&self) -> bool {
        matches!(self, TreeError::StaleIds)
    }
}
