//! The test tree arena.
//!
//! A [`TestTree`] owns every [`Suite`] and [`Test`]; nodes refer to each
//! other through [`SuiteId`]/[`TestId`] handles. Parents are handles too, so
//! effective modifier state is resolved by walking handles up to the root.
//!
//! Ordinals and ids are assigned per subtree. The collector renumbers the
//! whole tree once, then calls [`TestTree::assign_ids`] on every file suite,
//! so ordinals stay unique across files. Every node remembers which pass
//! numbered it and which pass gave it its id. Adding a suite or test, or
//! changing a configuration, makes all of them stale until ids are assigned
//! again.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::RuntreeConfig;
use crate::error::TreeError;
use crate::runnable::{Annotation, RunnableData, TestStatus};
use crate::serialize::serialize_configuration;
use crate::suite::{compute_worker_hash, ConfigurationEntry, Hook, HookKind, Suite};
use crate::test::{Body, Test};

/// Handle of a suite in its [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuiteId(usize);

/// Handle of a test in its [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId(usize);

/// Any node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Suite(SuiteId),
    Test(TestId),
}

impl From<SuiteId> for NodeId {
    fn from(id: SuiteId) -> Self {
        NodeId::Suite(id)
    }
}

impl From<TestId> for NodeId {
    fn from(id: TestId) -> Self {
        NodeId::Test(id)
    }
}

/// Reporting classification of a test's attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestOutcome {
    Skipped,
    /// Every attempt ended with the expected status.
    Expected,
    /// Some attempts were bad and the test is not ok.
    Unexpected,
    /// Some attempts were bad but the flaky tolerance made it ok.
    Flaky,
}

/// Which renumber or id pass touched a node, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    /// Suite the pass started from.
    pub(crate) root: SuiteId,
    /// Tree generation at the time of the pass.
    pub(crate) generation: u64,
}

/// Arena owning a whole suite/test hierarchy.
#[derive(Debug)]
pub struct TestTree {
    suites: Vec<Suite>,
    tests: Vec<Test>,
    default_timeout_ms: u64,
    slow_timeout_multiplier: u64,
    default_configuration: Vec<ConfigurationEntry>,
    retries: u32,
    /// Bumped by every change that can invalidate ordinals or ids.
    generation: u64,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create a tree holding only an untitled root suite.
    pub fn new() -> Self {
        Self::with_config(&RuntreeConfig::default())
    }

    /// Create a tree whose new tests and file suites take their defaults
    /// from `config`.
    pub fn with_config(config: &RuntreeConfig) -> Self {
        let root = Suite::new(RunnableData::new("", PathBuf::new(), "", None));
        Self {
            suites: vec![root],
            tests: Vec::new(),
            default_timeout_ms: config.timeout_ms,
            slow_timeout_multiplier: config.slow_timeout_multiplier,
            default_configuration: config.configuration.clone(),
            retries: config.retries,
            generation: 0,
        }
    }

    pub fn root(&self) -> SuiteId {
        SuiteId(0)
    }

    /// Retry attempts the execution engine may make after a failed one.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// # Panics
    ///
    /// Panics if `id` was handed out by a bigger tree. A handle from another
    /// tree that happens to be in range addresses an unrelated suite; use
    /// [`TestTree::get_suite`] when the handle's origin is not known.
    pub fn suite(&self, id: SuiteId) -> &Suite {
        &self.suites[id.0]
    }

    /// # Panics
    ///
    /// Same as [`TestTree::suite`].
    pub fn suite_mut(&mut self, id: SuiteId) -> &mut Suite {
        &mut self.suites[id.0]
    }

    /// # Panics
    ///
    /// Panics if `id` was handed out by a bigger tree, see [`TestTree::suite`].
    pub fn test(&self, id: TestId) -> &Test {
        &self.tests[id.0]
    }

    /// # Panics
    ///
    /// Same as [`TestTree::test`].
    pub fn test_mut(&mut self, id: TestId) -> &mut Test {
        &mut self.tests[id.0]
    }

    /// The suite behind `id`, or `None` if this tree never handed it out.
    pub fn get_suite(&self, id: SuiteId) -> Option<&Suite> {
        self.suites.get(id.0)
    }

    pub fn get_test(&self, id: TestId) -> Option<&Test> {
        self.tests.get(id.0)
    }

    /// Shared state of any node.
    ///
    /// # Panics
    ///
    /// Panics on a handle from a bigger tree, like [`TestTree::suite`].
    pub fn runnable(&self, node: impl Into<NodeId>) -> &RunnableData {
        match node.into() {
            NodeId::Suite(id) => &self.suites[id.0].data,
            NodeId::Test(id) => &self.tests[id.0].data,
        }
    }

    /// Shared state of any node, for applying modifiers.
    pub fn runnable_mut(&mut self, node: impl Into<NodeId>) -> &mut RunnableData {
        match node.into() {
            NodeId::Suite(id) => &mut self.suites[id.0].data,
            NodeId::Test(id) => &mut self.tests[id.0].data,
        }
    }

    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Declare a suite under `parent`.
    pub fn add_suite(
        &mut self,
        parent: SuiteId,
        title: impl Into<String>,
        file: impl Into<PathBuf>,
        location: impl Into<String>,
    ) -> SuiteId {
        let id = SuiteId(self.suites.len());
        let data = RunnableData::new(title, file, location, Some(parent));
        self.suites.push(Suite::new(data));
        let parent = &mut self.suites[parent.0];
        parent.suites.push(id);
        parent.entries.push(NodeId::Suite(id));
        self.generation += 1;
        id
    }

    /// Declare the untitled suite for one source file directly under the
    /// root. It starts with the tree's default configuration.
    pub fn add_file_suite(&mut self, file: impl Into<PathBuf>) -> SuiteId {
        let file = file.into();
        let location = file.display().to_string();
        let id = self.add_suite(self.root(), "", file, location);
        let configuration = self.default_configuration.clone();
        self.set_configuration(id, configuration);
        id
    }

    /// Declare a test under `parent`, with the tree's default timeout.
    pub fn add_test(
        &mut self,
        parent: SuiteId,
        title: impl Into<String>,
        file: impl Into<PathBuf>,
        location: impl Into<String>,
        body: Body,
    ) -> TestId {
        let id = TestId(self.tests.len());
        let data = RunnableData::new(title, file, location, Some(parent));
        self.tests.push(Test::new(data, body, self.default_timeout_ms));
        let parent = &mut self.suites[parent.0];
        parent.tests.push(id);
        parent.entries.push(NodeId::Test(id));
        self.generation += 1;
        id
    }

    pub fn add_hook(&mut self, suite: SuiteId, kind: HookKind, body: Body) {
        self.suites[suite.0].hooks.push(Hook { kind, body });
    }

    /// Replace the worker configuration of `suite` and its canonical string.
    pub fn set_configuration(&mut self, suite: SuiteId, configuration: Vec<ConfigurationEntry>) {
        let s = &mut self.suites[suite.0];
        s.configuration_string = serialize_configuration(&configuration);
        s.configuration = configuration;
        self.generation += 1;
    }

    /// Derive and store the worker hash of `suite` from its configuration
    /// and the given registration sites.
    pub fn assign_worker_hash<S: AsRef<str>>(&mut self, suite: SuiteId, registration_sites: &[S]) {
        let s = &mut self.suites[suite.0];
        s.worker_hash = compute_worker_hash(&s.configuration_string, registration_sites);
    }

    // -----------------------------------------------------------------------
    // Effective state
    // -----------------------------------------------------------------------

    /// Nodes from `node` up to the root, `node` first.
    fn ancestry(&self, node: NodeId) -> impl Iterator<Item = &RunnableData> {
        let mut next = Some(self.runnable(node));
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent().map(|p| &self.suites[p.0].data);
            Some(current)
        })
    }

    pub fn is_skipped(&self, node: impl Into<NodeId>) -> bool {
        self.ancestry(node.into()).any(RunnableData::is_marked_skipped)
    }

    pub fn is_slow(&self, node: impl Into<NodeId>) -> bool {
        self.ancestry(node.into()).any(RunnableData::is_marked_slow)
    }

    pub fn is_flaky(&self, node: impl Into<NodeId>) -> bool {
        self.ancestry(node.into()).any(RunnableData::is_marked_flaky)
    }

    /// Closest explicitly set expected status, `Passed` if none.
    pub fn expected_status(&self, node: impl Into<NodeId>) -> TestStatus {
        self.ancestry(node.into())
            .find_map(RunnableData::local_expected_status)
            .unwrap_or(TestStatus::Passed)
    }

    /// Non-empty titles from the root down to `node`.
    pub fn title_path(&self, node: impl Into<NodeId>) -> Vec<String> {
        let mut path: Vec<String> = self
            .ancestry(node.into())
            .filter(|data| !data.title.is_empty())
            .map(|data| data.title.clone())
            .collect();
        path.reverse();
        path
    }

    pub fn full_title(&self, node: impl Into<NodeId>) -> String {
        self.title_path(node).join(" ")
    }

    /// Annotations of `node` followed by those of each ancestor, so the
    /// most specific come first.
    pub fn annotations(&self, node: impl Into<NodeId>) -> Vec<Annotation> {
        self.ancestry(node.into())
            .flat_map(|data| data.local_annotations().iter().cloned())
            .collect()
    }

    /// Timeout the execution engine should enforce, extended for slow
    /// tests. Zero stays zero.
    pub fn effective_timeout_ms(&self, test: TestId) -> u64 {
        let timeout = self.tests[test.0].timeout_ms;
        if timeout > 0 && self.is_slow(test) {
            timeout.saturating_mul(self.slow_timeout_multiplier)
        } else {
            timeout
        }
    }

    // -----------------------------------------------------------------------
    // Verdicts
    // -----------------------------------------------------------------------

    /// Whether the test counts as passing given all of its attempts.
    ///
    /// Skipped tests are always ok. Otherwise every attempt must end with the
    /// expected status, unless the test is flaky, in which case one matching
    /// attempt suffices. A test with no attempts is ok.
    pub fn ok(&self, test: TestId) -> bool {
        if self.is_skipped(test) {
            return true;
        }
        let expected = Some(self.expected_status(test));
        let results = &self.tests[test.0].results;
        if results.iter().all(|r| r.status == expected) {
            return true;
        }
        if !self.is_flaky(test) {
            return false;
        }
        results.iter().any(|r| r.status == expected)
    }

    pub fn outcome(&self, test: TestId) -> TestOutcome {
        if self.is_skipped(test) {
            return TestOutcome::Skipped;
        }
        let expected = Some(self.expected_status(test));
        if self.tests[test.0].results.iter().all(|r| r.status == expected) {
            TestOutcome::Expected
        } else if self.ok(test) {
            TestOutcome::Flaky
        } else {
            TestOutcome::Unexpected
        }
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Number of tests in the subtree of `suite`.
    pub fn count_tests(&self, suite: SuiteId) -> usize {
        let s = &self.suites[suite.0];
        s.tests.len()
            + s.suites
                .iter()
                .map(|&child| self.count_tests(child))
                .sum::<usize>()
    }

    /// Visit the tests under `root`, child suites before each level's own
    /// tests. Stops and returns `true` as soon as `visit` returns `true`.
    pub fn find_test(&self, root: SuiteId, mut visit: impl FnMut(TestId, &Test) -> bool) -> bool {
        self.find_test_in(root, &mut visit)
    }

    fn find_test_in(&self, suite: SuiteId, visit: &mut dyn FnMut(TestId, &Test) -> bool) -> bool {
        let s = &self.suites[suite.0];
        for &child in &s.suites {
            if self.find_test_in(child, visit) {
                return true;
            }
        }
        for &test in &s.tests {
            if visit(test, &self.tests[test.0]) {
                return true;
            }
        }
        false
    }

    /// Visit `root` and every suite below it in pre-order. Stops and
    /// returns `true` as soon as `visit` returns `true`.
    pub fn find_suite(&self, root: SuiteId, mut visit: impl FnMut(SuiteId, &Suite) -> bool) -> bool {
        self.find_suite_in(root, &mut visit)
    }

    fn find_suite_in(&self, suite: SuiteId, visit: &mut dyn FnMut(SuiteId, &Suite) -> bool) -> bool {
        if visit(suite, &self.suites[suite.0]) {
            return true;
        }
        for &child in &self.suites[suite.0].suites {
            if self.find_suite_in(child, visit) {
                return true;
            }
        }
        false
    }

    /// Visit every suite strictly below `root`, descendants of a child
    /// before the child itself. Stops and returns `true` as soon as `visit`
    /// returns `true`.
    pub fn each_suite(&self, root: SuiteId, mut visit: impl FnMut(SuiteId, &Suite) -> bool) -> bool {
        self.each_suite_in(root, &mut visit)
    }

    fn each_suite_in(&self, suite: SuiteId, visit: &mut dyn FnMut(SuiteId, &Suite) -> bool) -> bool {
        for &child in &self.suites[suite.0].suites {
            if self.each_suite_in(child, visit) || visit(child, &self.suites[child.0]) {
                return true;
            }
        }
        false
    }

    /// Whether any test under `root` would actually run.
    pub fn has_runnable_tests(&self, root: SuiteId) -> bool {
        self.find_test(root, |id, _| !self.is_skipped(id))
    }

    /// Whether `suite` or anything below it is focused with `only`.
    pub fn has_only(&self, suite: SuiteId) -> bool {
        let s = &self.suites[suite.0];
        s.data.is_only()
            || s.suites.iter().any(|&child| self.has_only(child))
            || s.tests.iter().any(|&test| self.tests[test.0].data.is_only())
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Every suite and every test under `root`, `root` included, in
    /// numbering order.
    fn subtree(&self, root: SuiteId) -> (Vec<SuiteId>, Vec<TestId>) {
        let mut suites = Vec::new();
        self.find_suite(root, |id, _| {
            suites.push(id);
            false
        });
        let mut tests = Vec::new();
        self.find_test(root, |id, _| {
            tests.push(id);
            false
        });
        (suites, tests)
    }

    fn stamp(&self, root: SuiteId) -> Stamp {
        Stamp {
            root,
            generation: self.generation,
        }
    }

    /// Assign dense zero-based ordinals under `root`: suites in pre-order,
    /// then tests in [`TestTree::find_test`] order. The two sequences are
    /// numbered independently.
    pub fn renumber(&mut self, root: SuiteId) {
        let (suites, tests) = self.subtree(root);
        let stamp = self.stamp(root);
        for (ordinal, id) in suites.iter().enumerate() {
            self.suites[id.0].data.set_ordinal(ordinal, stamp);
        }
        for (ordinal, id) in tests.iter().enumerate() {
            self.tests[id.0].data.set_ordinal(ordinal, stamp);
        }
        tracing::debug!(suites = suites.len(), tests = tests.len(), "renumbered tree");
    }

    /// Whether every node under `root` got its ordinal from one renumber
    /// pass made since the last change. That pass started at `root` or at
    /// one of its ancestors, so the ordinals are unique within `root`.
    fn numbered_together(&self, root: SuiteId, suites: &[SuiteId], tests: &[TestId]) -> bool {
        let Some(stamp) = self.suites[root.0].data.numbered() else {
            return false;
        };
        stamp.generation == self.generation
            && suites.iter().all(|s| self.suites[s.0].data.numbered() == Some(stamp))
            && tests.iter().all(|t| self.tests[t.0].data.numbered() == Some(stamp))
    }

    /// Give every suite and test under `root` the id
    /// `<ordinal>@<root file>::[<root configuration string>]`.
    ///
    /// Ordinals from an earlier [`TestTree::renumber`] of `root` or of an
    /// ancestor are kept if nothing changed since. Otherwise `root` is
    /// renumbered first.
    pub fn assign_ids(&mut self, root: SuiteId) {
        let (suites, tests) = self.subtree(root);
        if !self.numbered_together(root, &suites, &tests) {
            tracing::debug!("subtree changed since last renumber, renumbering first");
            self.renumber(root);
        }
        let r = &self.suites[root.0];
        let suffix = format!("@{}::[{}]", r.data.file.display(), r.configuration_string);
        tracing::debug!(suffix = %suffix, "assigning ids");

        let stamp = self.stamp(root);
        for id in suites {
            let data = &mut self.suites[id.0].data;
            data.set_id(format!("{}{suffix}", data.ordinal()), stamp);
        }
        for id in tests {
            let data = &mut self.tests[id.0].data;
            data.set_id(format!("{}{suffix}", data.ordinal()), stamp);
        }
    }

    /// Whether every suite and test under `root`, `root` included, got its
    /// id since the last change, and no two suites or two tests there share
    /// one.
    pub fn ids_valid(&self, root: SuiteId) -> bool {
        let (suites, tests) = self.subtree(root);
        let current = |data: &RunnableData| {
            data.identified()
                .is_some_and(|stamp| stamp.generation == self.generation)
        };
        if !suites.iter().all(|s| current(&self.suites[s.0].data))
            || !tests.iter().all(|t| current(&self.tests[t.0].data))
        {
            return false;
        }
        let mut seen = HashSet::new();
        if !suites.iter().all(|s| seen.insert(self.suites[s.0].data.id())) {
            return false;
        }
        seen.clear();
        tests.iter().all(|t| seen.insert(self.tests[t.0].data.id()))
    }

    pub fn find_test_by_id(&self, root: SuiteId, id: &str) -> Result<TestId, TreeError> {
        if !self.ids_valid(root) {
            return Err(TreeError::StaleIds);
        }
        let mut found = None;
        self.find_test(root, |test_id, test| {
            if test.data.id() == id {
                found = Some(test_id);
            }
            found.is_some()
        });
        found.ok_or_else(|| TreeError::UnknownId(id.to_string()))
    }

    pub fn find_suite_by_id(&self, root: SuiteId, id: &str) -> Result<SuiteId, TreeError> {
        if !self.ids_valid(root) {
            return Err(TreeError::StaleIds);
        }
        let mut found = None;
        self.find_suite(root, |suite_id, suite| {
            if suite.data.id() == id {
                found = Some(suite_id);
            }
            found.is_some()
        });
        found.ok_or_else(|| TreeError::UnknownId(id.to_string()))
    }
}
