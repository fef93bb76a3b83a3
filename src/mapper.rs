//! Map stage: fan every item out into one [`GroupEntry`] per label.

use std::collections::BTreeMap;

use log::{debug, info};
use rayon::prelude::*;

use crate::config::Filters;
use crate::error::RecordError;
use crate::extract::Extractor;
use crate::source::{split_fields, ColumnMap};
use crate::{GroupEntry, Item};

/// Emits one entry per label of `item` that passes `filters`.
///
/// The year range and the name pattern reject the whole item, the label
/// set rejects single labels.
pub fn fan_out(item: &Item, filters: &Filters) -> Vec<GroupEntry> {
    if !filters.accepts_year(item.year) || !filters.accepts_name(&item.name) {
        return Vec::new();
    }
    item.labels
        .iter()
        .filter(|label| filters.accepts_label(label))
        .map(|label| GroupEntry {
            label: label.clone(),
            name: item.name.clone(),
            year: item.year,
            score: item.score,
        })
        .collect()
}

/// Counters of one map run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapStats {
    pub records: usize,
    /// Items that were extracted but lost every label to the filters.
    pub filtered: usize,
    pub entries: usize,
    /// Skipped records by failure kind.
    pub skipped: BTreeMap<&'static str, usize>,
}

impl MapStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn merge(&mut self, other: MapStats) {
        self.records += other.records;
        self.filtered += other.filtered;
        self.entries += other.entries;
        for (kind, n) in other.skipped {
            *self.skipped.entry(kind).or_default() += n;
        }
    }

    pub fn log(&self) {
        info!(
            "map: {} records, {} entries emitted, {} items filtered out, {} skipped {:?}",
            self.records,
            self.entries,
            self.filtered,
            self.skipped_total(),
            self.skipped
        );
    }
}

/// Extracts and fans out raw item lines.
///
/// Holds only shared references, so one mapper serves every rayon worker.
#[derive(Debug, Clone, Copy)]
pub struct Mapper<'a> {
    extractor: Extractor<'a>,
    filters: &'a Filters,
    delimiter: u8,
}

impl<'a> Mapper<'a> {
    pub fn new(extractor: Extractor<'a>, filters: &'a Filters, delimiter: u8) -> Self {
        Self {
            extractor,
            filters,
            delimiter,
        }
    }

    /// Maps one raw line; `columns` picks the id, name and labels fields.
    pub fn map_line(&self, columns: &ColumnMap, line: &str) -> Result<Vec<GroupEntry>, RecordError> {
        let fields = split_fields(line, self.delimiter)?;
        let picked = columns.select(&fields)?;
        let item = self.extractor.extract(picked[0], picked[1], picked[2])?;
        Ok(fan_out(&item, self.filters))
    }

    /// Maps a batch of numbered lines in parallel. The entries come back
    /// in input order.
    pub fn map_lines(
        &self,
        origin: &str,
        columns: &ColumnMap,
        lines: &[(usize, &str)],
    ) -> (Vec<GroupEntry>, MapStats) {
        let mapped: Vec<(usize, Result<Vec<GroupEntry>, RecordError>)> = lines
            .par_iter()
            .map(|&(line_no, line)| (line_no, self.map_line(columns, line)))
            .collect();

        let mut stats = MapStats::default();
        let mut entries = Vec::new();
        for (line_no, outcome) in mapped {
            stats.records += 1;
            match outcome {
                Ok(fanned) if fanned.is_empty() => stats.filtered += 1,
                Ok(fanned) => {
                    stats.entries += fanned.len();
                    entries.extend(fanned);
                }
                Err(e) => {
                    debug!("{}:{}: skipped: {}", origin, line_no, e);
                    *stats.skipped.entry(e.kind()).or_default() += 1;
                }
            }
        }
        (entries, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterArgs;
    use crate::extract::Extraction;
    use crate::ratings::ScoreTable;

    fn item(labels: &[&str], year: i32) -> Item {
        Item {
            id: 1,
            name: "Heat".to_string(),
            year,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            score: 4.25,
        }
    }

    #[test]
    fn one_entry_per_label() {
        let entries = fan_out(&item(&["Action", "Crime", "Thriller"], 1995), &Filters::default());
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|e| e.name == "Heat" && e.year == 1995 && e.score == 4.25));
        let labels: Vec<&str> = entries.iter().map(GroupEntry::label).collect();
        assert_eq!(labels, vec!["Action", "Crime", "Thriller"]);
    }

    #[test]
    fn filters_apply_at_fan_out() {
        let filters = FilterArgs {
            labels: Some("Crime|Drama".to_string()),
            year_from: Some(1990),
            name_pattern: Some("ea".to_string()),
            ..Default::default()
        }
        .compile()
        .unwrap();
        let entries = fan_out(&item(&["Action", "Crime"], 1995), &filters);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "Crime");

        assert!(fan_out(&item(&["Crime"], 1989), &filters).is_empty());

        let no_match = FilterArgs {
            name_pattern: Some("^eat".to_string()),
            ..Default::default()
        }
        .compile()
        .unwrap();
        assert!(fan_out(&item(&["Crime"], 1995), &no_match).is_empty());
    }

    #[test]
    fn maps_lines_in_order_and_counts_skips() {
        let rules = Extraction::new(r"(.+) \((\d{4})\)", r"^\(no genres listed\)$").unwrap();
        let scores: ScoreTable = vec![(1, 4.0), (2, 5.0), (4, 1.0)].into_iter().collect();
        let filters = Filters::default();
        let mapper = Mapper::new(Extractor::new(&rules, &scores), &filters, b',');
        let lines = [
            (2, "1,A (2000),Drama|Comedy"),
            (3, "2,B (1999),Drama"),
            (4, "3,C (1998),Drama"),
            (5, "4,Untitled,Drama"),
            (6, "5,E (2001),(no genres listed)"),
            (7, "6"),
        ];
        let (entries, stats) = mapper.map_lines("items.csv", &ColumnMap::positional(3), &lines);
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.label.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Drama", "A"), ("Comedy", "A"), ("Drama", "B")]);
        assert_eq!(stats.records, 6);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.skipped_total(), 4);
        assert_eq!(stats.skipped.get("missing_score"), Some(&1));
        assert_eq!(stats.skipped.get("malformed_name"), Some(&1));
        assert_eq!(stats.skipped.get("no_labels"), Some(&1));
        assert_eq!(stats.skipped.get("malformed_record"), Some(&1));
    }
}
