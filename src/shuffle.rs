//! Shuffle stage: group entries by label and hand contiguous blocks of
//! labels to reduce workers.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::GroupEntry;

/// Label to its entries, in arrival order.
///
/// Labels iterate in ascending order, which fixes the worker assignment
/// for identical input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupPartition {
    groups: BTreeMap<String, Vec<GroupEntry>>,
}

impl GroupPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: GroupEntry) {
        #[allow(clippy::unwrap_or_default)]
        self.groups
            .entry(entry.label.clone())
            .or_insert(Vec::new())
            .push(entry);
    }

    /// Appends a run of entries sharing `label` after the ones already
    /// collected for it.
    pub fn extend_run(&mut self, label: String, run: impl IntoIterator<Item = GroupEntry>) {
        self.groups.entry(label).or_default().extend(run);
    }

    /// Groups a stream of entries by flushing on every key change.
    ///
    /// A run is never split: the pending run is only closed when the label
    /// changes or the stream ends. A label that shows up again in a later
    /// run is appended to its earlier entries.
    pub fn from_runs(entries: impl IntoIterator<Item = GroupEntry>) -> Self {
        let mut partition = Self::new();
        for (label, run) in &entries.into_iter().chunk_by(|entry| entry.label.clone()) {
            partition.extend_run(label, run);
        }
        partition
    }

    pub fn label_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn get(&self, label: &str) -> Option<&[GroupEntry]> {
        self.groups.get(label).map(Vec::as_slice)
    }

    /// Splits the labels into `workers` contiguous blocks of
    /// [`block_size`] labels. Trailing shards may be empty.
    ///
    /// No more shards than labels are built: a worker past the last label
    /// would only get an empty block.
    pub fn into_shards(self, workers: usize) -> Vec<Shard> {
        let workers = workers.clamp(1, self.groups.len().max(1));
        let size = block_size(self.groups.len(), workers);
        let mut groups = self.groups.into_iter();
        (0..workers)
            .map(|worker| Shard {
                worker,
                groups: groups.by_ref().take(size).collect(),
            })
            .collect()
    }
}

impl FromIterator<GroupEntry> for GroupPartition {
    fn from_iter<I: IntoIterator<Item = GroupEntry>>(iter: I) -> Self {
        let mut partition = Self::new();
        for entry in iter {
            partition.push(entry);
        }
        partition
    }
}

/// Labels per worker: `ceil(labels / workers)`.
pub fn block_size(labels: usize, workers: usize) -> usize {
    labels.div_ceil(workers.max(1))
}

/// The labels owned by one reduce worker, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub worker: usize,
    pub groups: Vec<(String, Vec<GroupEntry>)>,
}

impl Shard {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
