//! Snapshot types with JSON persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use runtree_core::{
    Annotation, Runnable, SuiteId, TestId, TestOutcome, TestResult, TestStatus, TestTree,
    TreeError,
};

use crate::error::SnapshotError;

/// An identified subtree with everything recorded about its tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Unique snapshot identifier.
    pub run_id: Uuid,
    /// When the snapshot was captured.
    pub created_at: DateTime<Utc>,
    /// File of the suite the ids were assigned from.
    pub root_file: PathBuf,
    /// Configuration string of that suite.
    pub configuration_string: String,
    #[serde(default)]
    pub worker_hash: String,
    pub root: SuiteSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSnapshot {
    pub id: String,
    pub ordinal: usize,
    pub title: String,
    pub location: String,
    /// Annotations declared on this suite only.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub suites: Vec<SuiteSnapshot>,
    #[serde(default)]
    pub tests: Vec<TestSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSnapshot {
    pub id: String,
    pub ordinal: usize,
    pub title: String,
    pub full_title: String,
    pub location: String,
    /// Effective annotations, most specific first.
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    pub expected_status: TestStatus,
    /// Timeout after the slow multiplier.
    pub timeout_ms: u64,
    #[serde(default)]
    pub worker_id: Option<usize>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub ok: bool,
    pub outcome: TestOutcome,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

impl TreeSnapshot {
    /// Capture the subtree under `root`. Ids must be current.
    pub fn capture(tree: &TestTree, root: SuiteId) -> Result<Self, SnapshotError> {
        if !tree.ids_valid(root) {
            return Err(TreeError::StaleIds.into());
        }
        let suite = tree.suite(root);
        Ok(Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            root_file: suite.data().file().to_path_buf(),
            configuration_string: suite.configuration_string().to_string(),
            worker_hash: suite.worker_hash().to_string(),
            root: capture_suite(tree, root),
        })
    }

    /// Tests in the order ids were assigned: child suites before each
    /// level's own tests.
    pub fn tests(&self) -> Vec<&TestSnapshot> {
        let mut tests = Vec::new();
        collect_tests(&self.root, &mut tests);
        tests
    }

    pub fn test_count(&self) -> usize {
        self.tests().len()
    }

    /// `<file>::[<configuration>]`, the suffix shared by every id.
    pub fn root_key(&self) -> String {
        format!("{}::[{}]", self.root_file.display(), self.configuration_string)
    }

    /// Save the snapshot as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        Ok(())
    }

    /// Load a snapshot from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot from {}", path.display()))?;
        let snapshot: TreeSnapshot =
            serde_json::from_str(&content).context("failed to parse snapshot JSON")?;
        Ok(snapshot)
    }
}

fn capture_suite(tree: &TestTree, id: SuiteId) -> SuiteSnapshot {
    let suite = tree.suite(id);
    SuiteSnapshot {
        id: suite.id().to_string(),
        ordinal: suite.ordinal(),
        title: suite.title().to_string(),
        location: suite.data().location.clone(),
        annotations: suite.data().local_annotations().to_vec(),
        suites: suite
            .suites()
            .iter()
            .map(|&child| capture_suite(tree, child))
            .collect(),
        tests: suite
            .tests()
            .iter()
            .map(|&test| capture_test(tree, test))
            .collect(),
    }
}

fn capture_test(tree: &TestTree, id: TestId) -> TestSnapshot {
    let test = tree.test(id);
    TestSnapshot {
        id: test.id().to_string(),
        ordinal: test.ordinal(),
        title: test.title().to_string(),
        full_title: tree.full_title(id),
        location: test.data().location.clone(),
        annotations: tree.annotations(id),
        expected_status: tree.expected_status(id),
        timeout_ms: tree.effective_timeout_ms(id),
        worker_id: test.worker_id,
        start_time: test.start_time,
        end_time: test.end_time,
        ok: tree.ok(id),
        outcome: tree.outcome(id),
        results: test.results.clone(),
    }
}

fn collect_tests<'a>(suite: &'a SuiteSnapshot, out: &mut Vec<&'a TestSnapshot>) {
    for child in &suite.suites {
        collect_tests(child, out);
    }
    out.extend(suite.tests.iter());
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtree_core::{body, ConfigurationEntry};

    fn sample_tree() -> (TestTree, SuiteId) {
        let mut tree = TestTree::new();
        let file = tree.add_file_suite("checkout.spec");
        tree.set_configuration(
            file,
            vec![ConfigurationEntry {
                name: "browser".into(),
                value: "firefox".into(),
            }],
        );
        let cart = tree.add_suite(file, "cart", "checkout.spec", "checkout.spec:3");
        tree.runnable_mut(cart).slow("big fixtures");
        let add = tree.add_test(
            cart,
            "adds item",
            "checkout.spec",
            "checkout.spec:4",
            body(|| async { anyhow::Ok(()) }),
        );
        tree.add_test(
            file,
            "pays",
            "checkout.spec",
            "checkout.spec:9",
            body(|| async { anyhow::Ok(()) }),
        );
        tree.test_mut(add).append_result().status = Some(TestStatus::Passed);
        tree.renumber(file);
        tree.assign_ids(file);
        (tree, file)
    }

    #[test]
    fn capture_records_identity_and_effective_state() {
        let (tree, file) = sample_tree();
        let snapshot = TreeSnapshot::capture(&tree, file).unwrap();

        assert_eq!(snapshot.root_key(), "checkout.spec::[browser=firefox]");
        assert_eq!(snapshot.root.id, "0@checkout.spec::[browser=firefox]");
        assert_eq!(snapshot.test_count(), 2);

        let tests = snapshot.tests();
        assert_eq!(tests[0].full_title, "cart adds item");
        assert_eq!(tests[0].id, "0@checkout.spec::[browser=firefox]");
        assert_eq!(tests[0].timeout_ms, 90_000);
        assert_eq!(tests[0].annotations[0].kind, "slow");
        assert_eq!(tests[0].outcome, TestOutcome::Expected);
        assert_eq!(tests[1].title, "pays");
        assert_eq!(tests[1].ordinal, 1);
        assert!(tests[1].results.is_empty());
        assert!(tests[1].ok);
    }

    #[test]
    fn capture_rejects_stale_ids() {
        let (mut tree, file) = sample_tree();
        tree.add_suite(file, "late", "checkout.spec", "checkout.spec:20");
        let err = TreeSnapshot::capture(&tree, file).unwrap_err();
        assert!(matches!(err, SnapshotError::Tree(TreeError::StaleIds)));
    }

    #[test]
    fn json_roundtrip() {
        let (tree, file) = sample_tree();
        let snapshot = TreeSnapshot::capture(&tree, file).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workers").join("w0.json");

        snapshot.save_json(&path).unwrap();
        let loaded = TreeSnapshot::load_json(&path).unwrap();

        assert_eq!(loaded.run_id, snapshot.run_id);
        assert_eq!(loaded.root_key(), snapshot.root_key());
        assert_eq!(loaded.tests()[0].results, snapshot.tests()[0].results);
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let err = TreeSnapshot::load_json(Path::new("nowhere/snapshot.json")).unwrap_err();
        assert!(err.to_string().contains("nowhere/snapshot.json"));
    }
}
