//! Suites: composite nodes grouping tests, nested suites and hooks.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::runnable::{Runnable, RunnableData};
use crate::test::Body;
use crate::tree::{NodeId, SuiteId, TestId};

/// One `name=value` pair of a worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub name: String,
    pub value: String,
}

/// When a hook runs relative to the tests of its suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook registration.
#[derive(Clone)]
pub struct Hook {
    pub kind: HookKind,
    pub body: Body,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("body", &"<fn>")
            .finish()
    }
}

/// A group of tests and nested suites.
///
/// Children are kept twice: partitioned by type in `suites`/`tests`, and
/// interleaved in declaration order in `entries`.
#[derive(Debug)]
pub struct Suite {
    pub(crate) data: RunnableData,
    pub(crate) suites: Vec<SuiteId>,
    pub(crate) tests: Vec<TestId>,
    pub(crate) entries: Vec<NodeId>,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) configuration: Vec<ConfigurationEntry>,
    pub(crate) configuration_string: String,
    pub(crate) worker_hash: String,
}

impl Suite {
    pub(crate) fn new(data: RunnableData) -> Self {
        Self {
            data,
            suites: Vec::new(),
            tests: Vec::new(),
            entries: Vec::new(),
            hooks: Vec::new(),
            configuration: Vec::new(),
            configuration_string: String::new(),
            worker_hash: String::new(),
        }
    }

    pub fn suites(&self) -> &[SuiteId] {
        &self.suites
    }

    pub fn tests(&self) -> &[TestId] {
        &self.tests
    }

    /// Child suites and tests in declaration order.
    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    pub fn hooks_of(&self, kind: HookKind) -> impl Iterator<Item = &Hook> {
        self.hooks.iter().filter(move |h| h.kind == kind)
    }

    /// Desired worker configuration for this subtree.
    pub fn configuration(&self) -> &[ConfigurationEntry] {
        &self.configuration
    }

    /// Canonical form of [`Suite::configuration`].
    pub fn configuration_string(&self) -> &str {
        &self.configuration_string
    }

    /// Groups tests that must share a worker. Empty until assigned.
    pub fn worker_hash(&self) -> &str {
        &self.worker_hash
    }
}

impl Runnable for Suite {
    fn data(&self) -> &RunnableData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut RunnableData {
        &mut self.data
    }
}

/// Derive a worker hash from a configuration string and the sites where
/// fixtures or hooks were registered.
///
/// SHA-256 over the inputs, NUL-separated, as lowercase hex.
pub fn compute_worker_hash<S: AsRef<str>>(
    configuration_string: &str,
    registration_sites: &[S],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(configuration_string.as_bytes());
    for site in registration_sites {
        hasher.update([0u8]);
        hasher.update(site.as_ref().as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_kind_strings() {
        assert_eq!(HookKind::BeforeEach.to_string(), "beforeEach");
        assert_eq!(
            serde_json::to_string(&HookKind::AfterAll).unwrap(),
            "\"afterAll\""
        );
    }

    #[test]
    fn worker_hash_is_stable_hex() {
        let a = compute_worker_hash("browser=chromium", &["fixtures.rs:10"]);
        let b = compute_worker_hash("browser=chromium", &["fixtures.rs:10"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn worker_hash_depends_on_every_input() {
        let base = compute_worker_hash("browser=chromium", &["a.rs:1"]);
        assert_ne!(base, compute_worker_hash("browser=firefox", &["a.rs:1"]));
        assert_ne!(base, compute_worker_hash("browser=chromium", &["a.rs:2"]));
        assert_ne!(
            compute_worker_hash("x", &["ab", "c"]),
            compute_worker_hash("x", &["a", "bc"])
        );
        assert_ne!(
            compute_worker_hash::<&str>("x", &[]),
            compute_worker_hash("x", &[""])
        );
    }
}
