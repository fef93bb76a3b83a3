//! Reduce stage: admit, rank and truncate every label group.
//!
//! Admission runs over each label's entries against two counters: the
//! label's own count, capped at `top_n`, and a run-wide count capped at
//! `top_n * effective_label_count`. Only then are the survivors sorted by
//! `(score DESC, year DESC, name ASC)`. The [`AdmissionOrder`] decides in
//! which order entries are offered: best ranked first, or as they arrived
//! from the shuffle, in which case arrival order picks the survivors.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use dashmap::DashMap;
use log::{debug, info};
use rayon::prelude::*;

use crate::config::{AdmissionOrder, Filters};
use crate::shuffle::{GroupPartition, Shard};
use crate::{GroupEntry, ResultRow};

/// Outcome of offering one entry to the [`Admission`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admitted,
    /// The label already holds `top_n` entries.
    LabelFull,
    /// The run-wide budget is spent; nothing else is admitted.
    Exhausted,
}

/// Quota counters shared by all reduce workers of one run.
#[derive(Debug)]
pub struct Admission {
    order: AdmissionOrder,
    per_label: Option<usize>,
    budget: Option<usize>,
    admitted: AtomicUsize,
}

impl Admission {
    /// Sizes the budget for `observed_labels` distinct labels, or for the
    /// requested label set when the filters carry one.
    pub fn new(filters: &Filters, observed_labels: usize) -> Self {
        let per_label = filters.top_n;
        let budget =
            per_label.map(|n| n.saturating_mul(filters.effective_label_count(observed_labels)));
        Self {
            order: AdmissionOrder::default(),
            per_label,
            budget,
            admitted: AtomicUsize::new(0),
        }
    }

    /// Admits everything.
    pub fn unlimited() -> Self {
        Self {
            order: AdmissionOrder::default(),
            per_label: None,
            budget: None,
            admitted: AtomicUsize::new(0),
        }
    }

    pub fn with_order(mut self, order: AdmissionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> AdmissionOrder {
        self.order
    }

    pub fn budget(&self) -> Option<usize> {
        self.budget
    }

    pub fn admitted(&self) -> usize {
        self.admitted.load(AtomicOrdering::SeqCst)
    }

    pub fn is_exhausted(&self) -> bool {
        self.budget
            .map_or(false, |budget| self.admitted() >= budget)
    }

    /// Offers one entry of a label whose running count is `label_count`.
    pub fn offer(&self, label_count: &mut usize) -> Verdict {
        if let Some(cap) = self.per_label {
            if *label_count >= cap {
                return Verdict::LabelFull;
            }
        }
        let reserved = match self.budget {
            Some(budget) => self
                .admitted
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                    (n < budget).then_some(n + 1)
                })
                .is_ok(),
            None => {
                self.admitted.fetch_add(1, AtomicOrdering::SeqCst);
                true
            }
        };
        if !reserved {
            return Verdict::Exhausted;
        }
        *label_count += 1;
        Verdict::Admitted
    }
}

/// The ranking order: score descending, then year descending, then name
/// ascending.
pub fn rank_order(a: &GroupEntry, b: &GroupEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.year.cmp(&a.year))
        .then_with(|| a.name.cmp(&b.name))
}

/// Admits a label's entries in the configured order, then sorts the
/// survivors.
///
/// The second value is `true` when the run-wide budget ran out while this
/// group was being admitted.
pub fn reduce_group(mut entries: Vec<GroupEntry>, admission: &Admission) -> (Vec<ResultRow>, bool) {
    if admission.order() == AdmissionOrder::Ranked {
        entries.sort_by(rank_order);
    }
    let mut admitted = Vec::new();
    let mut count = 0;
    let mut exhausted = false;
    for entry in entries {
        match admission.offer(&mut count) {
            Verdict::Admitted => admitted.push(entry),
            Verdict::LabelFull => continue,
            Verdict::Exhausted => {
                exhausted = true;
                break;
            }
        }
    }
    admitted.sort_by(rank_order);
    (admitted.into_iter().map(GroupEntry::into_row).collect(), exhausted)
}

/// Runs one worker over its shard, label by label.
pub fn reduce_shard(shard: Shard, admission: &Admission) -> Vec<(String, Vec<ResultRow>)> {
    let mut output = Vec::with_capacity(shard.groups.len());
    for (label, entries) in shard.groups {
        if admission.is_exhausted() {
            debug!("worker {}: budget spent before `{}`", shard.worker, label);
            break;
        }
        let (rows, exhausted) = reduce_group(entries, admission);
        output.push((label, rows));
        if exhausted {
            break;
        }
    }
    output
}

/// Reduces a whole partition with `workers` parallel workers.
///
/// Worker results are collected by label, so the rows come out in
/// ascending label order whatever order the workers finish in.
pub fn reduce_partition(
    partition: GroupPartition,
    filters: &Filters,
    workers: usize,
    order: AdmissionOrder,
) -> Vec<ResultRow> {
    let admission = Admission::new(filters, partition.label_count()).with_order(order);
    info!(
        "reduce: {} labels, {} entries, {} workers, budget {:?}, {:?} admission",
        partition.label_count(),
        partition.entry_count(),
        workers,
        admission.budget(),
        order
    );

    // types related to this stage
    type WorkerIndex = usize;
    type Outputs = DashMap<WorkerIndex, Vec<(String, Vec<ResultRow>)>>;

    let outputs = Outputs::new();
    partition
        .into_shards(workers)
        .into_par_iter()
        .for_each(|shard| {
            let worker = shard.worker;
            let labels = shard.groups.len();
            let groups = reduce_shard(shard, &admission);
            debug!("worker {} reduced {} of {} labels", worker, groups.len(), labels);
            outputs.insert(worker, groups);
        });

    let mut by_label: BTreeMap<String, Vec<ResultRow>> = BTreeMap::new();
    for (_, groups) in outputs.into_iter() {
        by_label.extend(groups);
    }
    info!("reduce: {} rows admitted", admission.admitted());
    by_label.into_values().flatten().collect()
}
