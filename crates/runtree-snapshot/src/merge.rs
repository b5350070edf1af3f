//! Merging worker snapshots back into a coordinator's tree.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use runtree_core::{Runnable, SuiteId, TestId, TestTree, TreeError};

use crate::error::SnapshotError;
use crate::snapshot::TreeSnapshot;

/// Counts from a single merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Snapshot tests found in the tree.
    pub matched: usize,
    /// Snapshot tests whose id the tree does not know.
    pub unmatched: usize,
    pub results_appended: usize,
    /// Tree tests skipped while indexing because an earlier test already
    /// had their id.
    #[serde(default)]
    pub duplicate_ids: usize,
}

/// Map each id to the first entry carrying it. Returns the index and the
/// number of later entries dropped because their id was taken.
fn index_by_id<V>(entries: impl IntoIterator<Item = (String, V)>) -> (HashMap<String, V>, usize) {
    let mut index = HashMap::new();
    let mut duplicates = 0;
    for (id, value) in entries {
        match index.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => {
                tracing::warn!(id = %slot.key(), "id shared by several tests, keeping the first");
                duplicates += 1;
            }
        }
    }
    (index, duplicates)
}

impl TreeSnapshot {
    /// Append the recorded attempts of every snapshot test to the tree test
    /// with the same id under `root`.
    ///
    /// Worker id and timing are copied when the snapshot has them. Unknown
    /// ids are skipped and counted. If two tree tests share an id, the first
    /// in [`TestTree::find_test`] order receives the results. A snapshot taken from a different root
    /// file or configuration is rejected.
    pub fn merge_into(
        &self,
        tree: &mut TestTree,
        root: SuiteId,
    ) -> Result<MergeSummary, SnapshotError> {
        if !tree.ids_valid(root) {
            return Err(TreeError::StaleIds.into());
        }
        let suite = tree.suite(root);
        let expected = format!(
            "{}::[{}]",
            suite.data().file().display(),
            suite.configuration_string()
        );
        let found = self.root_key();
        if expected != found {
            return Err(SnapshotError::RootMismatch { expected, found });
        }

        let mut entries: Vec<(String, TestId)> = Vec::new();
        tree.find_test(root, |id, test| {
            entries.push((test.id().to_string(), id));
            false
        });
        let (by_id, duplicate_ids) = index_by_id(entries);

        let mut summary = MergeSummary {
            duplicate_ids,
            ..MergeSummary::default()
        };
        for recorded in self.tests() {
            let Some(&id) = by_id.get(&recorded.id) else {
                tracing::warn!(id = %recorded.id, title = %recorded.full_title, "no test with this id, skipping");
                summary.unmatched += 1;
                continue;
            };
            let test = tree.test_mut(id);
            test.results.extend(recorded.results.iter().cloned());
            if recorded.worker_id.is_some() {
                test.worker_id = recorded.worker_id;
            }
            if recorded.start_time.is_some() {
                test.start_time = recorded.start_time;
            }
            if recorded.end_time.is_some() {
                test.end_time = recorded.end_time;
            }
            summary.matched += 1;
            summary.results_appended += recorded.results.len();
        }

        tracing::debug!(
            run_id = %self.run_id,
            matched = summary.matched,
            unmatched = summary.unmatched,
            results = summary.results_appended,
            duplicates = summary.duplicate_ids,
            "merged snapshot"
        );
        Ok(summary)
    }
}
