//! Run settings and request-time filters.
//!
//! [`Settings`] is loaded once from a JSON file and then passed by
//! reference into every stage. [`FilterArgs`] is the serializable form of
//! the five request parameters; [`Filters`] is its validated, compiled
//! form used by the map stage and the reducer.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use encoding_rs::Encoding;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RankError;
use crate::extract::{split_labels, Extraction};

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_title_pattern() -> String {
    r"(.+) \((\d{4})\)".to_string()
}

fn default_no_labels_pattern() -> String {
    r"^\(no genres listed\)$".to_string()
}

fn default_worker_count() -> usize {
    1
}

/// Order in which a label's entries are offered to the quota counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionOrder {
    /// Best ranked first, as the in-process run has always done.
    #[default]
    Ranked,
    /// Arrival order from the shuffle; survivors are sorted afterwards.
    Arrival,
}

/// Rows per batch when `chunk_size` is not configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn column(name: &str) -> String {
    name.to_string()
}

fn default_items_id_column() -> String {
    column("movieId")
}

fn default_items_name_column() -> String {
    column("title")
}

fn default_items_labels_column() -> String {
    column("genres")
}

fn default_ratings_id_column() -> String {
    column("movieId")
}

fn default_ratings_value_column() -> String {
    column("rating")
}

/// Settings of a single pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Glob spec for the items source. Only required by the in-process run.
    #[serde(default)]
    pub source_items_path: String,
    /// Glob spec for the ratings source.
    pub source_ratings_path: String,
    #[serde(default = "default_delimiter")]
    pub source_delimiter: String,
    #[serde(default = "default_encoding")]
    pub source_encoding: String,
    #[serde(default = "default_delimiter")]
    pub output_delimiter: String,
    #[serde(default = "default_encoding")]
    pub output_encoding: String,
    #[serde(default = "default_true")]
    pub emit_header: bool,
    #[serde(default = "default_title_pattern")]
    pub title_extraction_pattern: String,
    #[serde(default = "default_no_labels_pattern")]
    pub no_labels_sentinel_pattern: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub admission_order: AdmissionOrder,
    /// Rows per batch for bulk conversion.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_items_id_column")]
    pub items_id_column: String,
    #[serde(default = "default_items_name_column")]
    pub items_name_column: String,
    #[serde(default = "default_items_labels_column")]
    pub items_labels_column: String,
    #[serde(default = "default_ratings_id_column")]
    pub ratings_id_column: String,
    #[serde(default = "default_ratings_value_column")]
    pub ratings_value_column: String,
}

impl Settings {
    /// Loads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RankError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            RankError::config(format!("cannot read `{}`: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parses and validates settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, RankError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| RankError::config(format!("corrupted settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), RankError> {
        if self.source_ratings_path.trim().is_empty() {
            return Err(RankError::config("`source_ratings_path` is empty"));
        }
        self.source_delimiter()?;
        self.output_delimiter()?;
        self.source_encoding()?;
        self.output_encoding()?;
        Extraction::from_settings(self)?;
        if self.worker_count == 0 {
            return Err(RankError::config("`worker_count` must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(RankError::config("`chunk_size` must be at least 1"));
        }
        for (option, value) in [
            ("items_id_column", &self.items_id_column),
            ("items_name_column", &self.items_name_column),
            ("items_labels_column", &self.items_labels_column),
            ("ratings_id_column", &self.ratings_id_column),
            ("ratings_value_column", &self.ratings_value_column),
        ] {
            if value.trim().is_empty() {
                return Err(RankError::config(format!("`{}` is empty", option)));
            }
        }
        Ok(())
    }

    /// The items glob, which the in-process run cannot do without.
    pub fn items_path(&self) -> Result<&str, RankError> {
        match self.source_items_path.trim() {
            "" => Err(RankError::config("`source_items_path` is empty")),
            path => Ok(path),
        }
    }

    pub fn source_delimiter(&self) -> Result<u8, RankError> {
        parse_delimiter("source_delimiter", &self.source_delimiter)
    }

    pub fn output_delimiter(&self) -> Result<u8, RankError> {
        parse_delimiter("output_delimiter", &self.output_delimiter)
    }

    pub fn source_encoding(&self) -> Result<&'static Encoding, RankError> {
        parse_encoding("source_encoding", &self.source_encoding)
    }

    /// The output encoding. It must have an encoder of its own, so UTF-16
    /// and `replacement` are refused.
    pub fn output_encoding(&self) -> Result<&'static Encoding, RankError> {
        let encoding = parse_encoding("output_encoding", &self.output_encoding)?;
        if encoding.output_encoding() != encoding {
            return Err(RankError::config(format!(
                "`output_encoding`: cannot write {}",
                encoding.name()
            )));
        }
        Ok(encoding)
    }
}

fn parse_delimiter(option: &str, value: &str) -> Result<u8, RankError> {
    match value.as_bytes() {
        [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
        _ => Err(RankError::config(format!(
            "`{}` must be a single ASCII character, got `{}`",
            option, value
        ))),
    }
}

fn parse_encoding(option: &str, label: &str) -> Result<&'static Encoding, RankError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        RankError::config(format!("`{}`: unknown encoding `{}`", option, label))
    })
}

/////////////////////////////////////////////////////////////////////////////
// Request-time filters
/////////////////////////////////////////////////////////////////////////////

/// The five optional request parameters, as passed between processes.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterArgs {
    /// Items kept for each label
    #[arg(long, value_name = "N")]
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Label filter, a list separated by '|'
    #[arg(long, value_name = "LIST")]
    #[serde(default)]
    pub labels: Option<String>,
    /// Earliest year, inclusive
    #[arg(long, value_name = "YEAR")]
    #[serde(default)]
    pub year_from: Option<i32>,
    /// Latest year, inclusive
    #[arg(long, value_name = "YEAR")]
    #[serde(default)]
    pub year_to: Option<i32>,
    /// Regular expression searched in the item name
    #[arg(long, value_name = "REGEX")]
    #[serde(default)]
    pub name_pattern: Option<String>,
}

impl FilterArgs {
    pub fn from_json(json: &str) -> Result<Self, RankError> {
        serde_json::from_str(json)
            .map_err(|e| RankError::config(format!("corrupted filter arguments: {}", e)))
    }

    pub fn to_json(&self) -> String {
        // A struct of options and strings always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Validates the arguments and compiles the name pattern.
    pub fn compile(&self) -> Result<Filters, RankError> {
        if self.top_n == Some(0) {
            return Err(RankError::config("`top_n` must be a positive integer"));
        }
        let labels = match &self.labels {
            Some(raw) => {
                let set: BTreeSet<String> = split_labels(raw).into_iter().collect();
                if set.is_empty() {
                    return Err(RankError::config(format!(
                        "`labels` filter `{}` names no label",
                        raw
                    )));
                }
                Some(set)
            }
            None => None,
        };
        if let (Some(from), Some(to)) = (self.year_from, self.year_to) {
            if from > to {
                return Err(RankError::config(format!(
                    "`year_from` {} is after `year_to` {}",
                    from, to
                )));
            }
        }
        let name_pattern = match &self.name_pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                RankError::config(format!("invalid `name_pattern`: {}", e))
            })?),
            None => None,
        };
        Ok(Filters {
            top_n: self.top_n,
            labels,
            year_from: self.year_from,
            year_to: self.year_to,
            name_pattern,
        })
    }
}

/// Compiled request filters. All of them are evaluated at map time.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub top_n: Option<usize>,
    pub labels: Option<BTreeSet<String>>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub name_pattern: Option<Regex>,
}

impl Filters {
    /// Inclusive year range check; a missing bound is open.
    pub fn accepts_year(&self, year: i32) -> bool {
        self.year_from.map_or(true, |from| year >= from)
            && self.year_to.map_or(true, |to| year <= to)
    }

    pub fn accepts_label(&self, label: &str) -> bool {
        self.labels
            .as_ref()
            .map_or(true, |labels| labels.contains(label))
    }

    /// Searches the name, it does not have to match as a whole.
    pub fn accepts_name(&self, name: &str) -> bool {
        self.name_pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(name))
    }

    /// Number of labels the global admission budget is sized for.
    pub fn effective_label_count(&self, observed_labels: usize) -> usize {
        match &self.labels {
            Some(labels) => labels.len(),
            None => observed_labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{ "source_ratings_path": "data/ratings.csv" }"#;

    #[test]
    fn defaults_fill_missing_options() {
        let settings = Settings::from_json(MINIMAL).unwrap();
        assert_eq!(settings.source_delimiter().unwrap(), b',');
        assert_eq!(settings.source_encoding().unwrap(), encoding_rs::UTF_8);
        assert!(settings.emit_header);
        assert_eq!(settings.worker_count, 1);
        assert_eq!(settings.admission_order, AdmissionOrder::Ranked);
        assert_eq!(settings.items_labels_column, "genres");
        assert!(settings.items_path().is_err());
    }

    #[test]
    fn rejects_bad_settings() {
        let cases = [
            r#"{ "source_ratings_path": "" }"#,
            r#"{ "source_ratings_path": "r.csv", "worker_count": 0 }"#,
            r#"{ "source_ratings_path": "r.csv", "source_delimiter": ";;" }"#,
            r#"{ "source_ratings_path": "r.csv", "output_encoding": "klingon" }"#,
            r#"{ "source_ratings_path": "r.csv", "output_encoding": "utf-16le" }"#,
            r#"{ "source_ratings_path": "r.csv", "output_encoding": "utf-16be" }"#,
            r#"{ "source_ratings_path": "r.csv", "title_extraction_pattern": "(.+" }"#,
            r#"{ "source_ratings_path": "r.csv", "title_extraction_pattern": "(.+) \\d{4}" }"#,
            r#"{ "source_ratings_path": "r.csv", "unknown_option": 1 }"#,
            r#"{ "source_ratings_path": "r.csv", "chunk_size": 0 }"#,
            r#"{ "source_ratings_path": "r.csv", "admission_order": "random" }"#,
        ];
        for case in cases {
            assert!(
                matches!(Settings::from_json(case), Err(RankError::Config(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn admission_order_is_lowercase() {
        let settings =
            Settings::from_json(r#"{ "source_ratings_path": "r", "admission_order": "arrival" }"#)
                .unwrap();
        assert_eq!(settings.admission_order, AdmissionOrder::Arrival);
    }

    #[test]
    fn tab_delimiter_and_latin1_encoding() {
        let settings = Settings::from_json(
            r#"{ "source_ratings_path": "r", "source_delimiter": "\t", "source_encoding": "latin1" }"#,
        )
        .unwrap();
        assert_eq!(settings.source_delimiter().unwrap(), b'\t');
        assert_eq!(settings.source_encoding().unwrap().name(), "windows-1252");
    }

    #[test]
    fn utf16_is_readable_but_not_writable() {
        let settings = Settings::from_json(
            r#"{ "source_ratings_path": "r", "source_encoding": "utf-16le", "output_encoding": "latin1" }"#,
        )
        .unwrap();
        assert_eq!(settings.source_encoding().unwrap(), encoding_rs::UTF_16LE);
        assert_eq!(settings.output_encoding().unwrap(), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn compiles_filters() {
        let args = FilterArgs {
            top_n: Some(3),
            labels: Some("Drama| Comedy |".to_string()),
            year_from: Some(1990),
            year_to: Some(2000),
            name_pattern: Some("^Toy".to_string()),
        };
        let filters = args.compile().unwrap();
        assert_eq!(filters.effective_label_count(17), 2);
        assert!(filters.accepts_label("Comedy"));
        assert!(!filters.accepts_label("Horror"));
        assert!(filters.accepts_year(1990) && filters.accepts_year(2000));
        assert!(!filters.accepts_year(1989) && !filters.accepts_year(2001));
        assert!(filters.accepts_name("Toy Story"));
        assert!(!filters.accepts_name("Story of Toy"));
    }

    #[test]
    fn name_pattern_searches() {
        let filters = FilterArgs {
            name_pattern: Some("Story".to_string()),
            ..Default::default()
        }
        .compile()
        .unwrap();
        assert!(filters.accepts_name("Toy Story 2"));
    }

    #[test]
    fn rejects_bad_filters() {
        let bad = [
            FilterArgs {
                top_n: Some(0),
                ..Default::default()
            },
            FilterArgs {
                labels: Some(" | ".to_string()),
                ..Default::default()
            },
            FilterArgs {
                year_from: Some(2001),
                year_to: Some(2000),
                ..Default::default()
            },
            FilterArgs {
                name_pattern: Some("[".to_string()),
                ..Default::default()
            },
        ];
        for args in bad {
            assert!(args.compile().is_err(), "accepted {:?}", args);
        }
    }

    #[test]
    fn filter_args_survive_json() {
        let args = FilterArgs {
            top_n: Some(5),
            labels: Some("Drama".to_string()),
            year_from: None,
            year_to: Some(1999),
            name_pattern: None,
        };
        assert_eq!(FilterArgs::from_json(&args.to_json()).unwrap(), args);
        assert_eq!(FilterArgs::from_json("{}").unwrap(), FilterArgs::default());
    }
}
