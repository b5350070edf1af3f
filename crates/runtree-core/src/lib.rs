//! runtree-core — Suite/test tree model, modifiers, verdicts and stable ids.
//!
//! This crate defines the in-memory hierarchy a test runner builds while
//! collecting tests, the conditional modifiers that compose across nested
//! scopes, the pass/fail verdict over retried attempts, and the ids used to
//! correlate nodes across processes.

pub mod condition;
pub mod config;
pub mod error;
pub mod runnable;
pub mod serialize;
pub mod suite;
pub mod tree;

pub use condition::Condition;
pub use config::{load_config, load_config_from, RuntreeConfig};
pub use error::TreeError;
pub use runnable::{Annotation, Runnable, RunnableData, TestStatus};
pub use serialize::{serialize_configuration, serialize_error, ErrorValue, SerializedError};
pub use suite::{compute_worker_hash, ConfigurationEntry, Hook, HookKind, Suite};
pub use test::{body, Body, OutputChunk, Test, TestResult};
pub use tree::{NodeId, SuiteId, TestId, TestOutcome, TestTree};
