//! State shared by every node of the test tree.
//!
//! Suites and tests both carry a [`RunnableData`]: identity, a handle to the
//! parent suite, the locally set modifier flags and the local annotations.
//! Effective (inherited) values are resolved by [`crate::tree::TestTree`],
//! which can walk the parent chain.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::tree::{Stamp, SuiteId};

/// Status of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::TimedOut => write!(f, "timedOut"),
            TestStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "timedOut" => Ok(TestStatus::TimedOut),
            "skipped" => Ok(TestStatus::Skipped),
            other => Err(format!("unknown test status: {other}")),
        }
    }
}

/// A note attached to a suite or test by a modifier call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Modifier name (`skip`, `fixme`, `slow`, `flaky`, `fail`).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Identity and locally declared modifier state of a tree node.
#[derive(Debug, Clone)]
pub struct RunnableData {
    /// Title as declared. May be empty for the root and for file suites.
    pub title: String,
    /// Source file the node was declared in.
    pub file: PathBuf,
    /// Source position, e.g. `tests/login.rs:12:5`.
    pub location: String,
    parent: Option<SuiteId>,
    only: bool,
    skipped: bool,
    flaky: bool,
    slow: bool,
    expected_status: Option<TestStatus>,
    annotations: Vec<Annotation>,
    id: String,
    ordinal: usize,
    numbered: Option<Stamp>,
    identified: Option<Stamp>,
}

impl RunnableData {
    pub(crate) fn new(
        title: impl Into<String>,
        file: impl Into<PathBuf>,
        location: impl Into<String>,
        parent: Option<SuiteId>,
    ) -> Self {
        Self {
            title: title.into(),
            file: file.into(),
            location: location.into(),
            parent,
            only: false,
            skipped: false,
            flaky: false,
            slow: false,
            expected_status: None,
            annotations: Vec::new(),
            id: String::new(),
            ordinal: 0,
            numbered: None,
            identified: None,
        }
    }

    pub fn parent(&self) -> Option<SuiteId> {
        self.parent
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Stable id, empty until ids have been assigned.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn set_ordinal(&mut self, ordinal: usize, stamp: Stamp) {
        self.ordinal = ordinal;
        self.numbered = Some(stamp);
    }

    pub(crate) fn set_id(&mut self, id: String, stamp: Stamp) {
        self.id = id;
        self.identified = Some(stamp);
    }

    /// Pass that last numbered this node.
    pub(crate) fn numbered(&self) -> Option<Stamp> {
        self.numbered
    }

    /// Pass that last gave this node its id.
    pub(crate) fn identified(&self) -> Option<Stamp> {
        self.identified
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    pub fn is_marked_skipped(&self) -> bool {
        self.skipped
    }

    pub fn is_marked_flaky(&self) -> bool {
        self.flaky
    }

    pub fn is_marked_slow(&self) -> bool {
        self.slow
    }

    /// Locally declared expected status, `None` when inherited.
    pub fn local_expected_status(&self) -> Option<TestStatus> {
        self.expected_status
    }

    /// Annotations added on this node only, in call order.
    pub fn local_annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Focus this node.
    pub fn only(&mut self) {
        self.only = true;
    }

    /// Mark as slow. The execution engine extends the timeout.
    pub fn slow(&mut self, condition: impl Into<Condition>) {
        if let Some(reason) = self.apply(condition.into()) {
            self.slow = true;
            self.annotate("slow", reason);
        }
    }

    /// Mark as skipped.
    pub fn skip(&mut self, condition: impl Into<Condition>) {
        if let Some(reason) = self.apply(condition.into()) {
            self.skipped = true;
            self.annotate("skip", reason);
        }
    }

    /// Mark as skipped because it needs fixing. Same scheduling effect as
    /// [`RunnableData::skip`], reported under a different annotation.
    pub fn fixme(&mut self, condition: impl Into<Condition>) {
        if let Some(reason) = self.apply(condition.into()) {
            self.skipped = true;
            self.annotate("fixme", reason);
        }
    }

    /// Tolerate failed attempts as long as one attempt ends as expected.
    pub fn flaky(&mut self, condition: impl Into<Condition>) {
        if let Some(reason) = self.apply(condition.into()) {
            self.flaky = true;
            self.annotate("flaky", reason);
        }
    }

    /// Expect failure: a failing attempt counts as the good outcome.
    pub fn fail(&mut self, condition: impl Into<Condition>) {
        if let Some(reason) = self.apply(condition.into()) {
            self.expected_status = Some(TestStatus::Failed);
            self.annotate("fail", reason);
        }
    }

    /// Returns `Some(reason)` when the modifier applies.
    fn apply(&self, condition: Condition) -> Option<Option<String>> {
        let interpreted = condition.interpret();
        interpreted.applies.then_some(interpreted.reason)
    }

    fn annotate(&mut self, kind: &str, description: Option<String>) {
        self.annotations.push(Annotation {
            kind: kind.to_string(),
            description,
        });
    }
}

/// Capability shared by suites and tests.
pub trait Runnable {
    fn data(&self) -> &RunnableData;

    fn data_mut(&mut self) -> &mut RunnableData;

    fn title(&self) -> &str {
        &self.data().title
    }

    fn id(&self) -> &str {
        self.data().id()
    }

    fn ordinal(&self) -> usize {
        self.data().ordinal()
    }

    fn parent(&self) -> Option<SuiteId> {
        self.data().parent()
    }
}
