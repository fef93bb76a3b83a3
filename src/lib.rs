//! A grouped top-N ranking engine built as a MapReduce (lite) pipeline.
//!
//! Items tagged with several labels are extracted from delimited text,
//! scored with the mean of their ratings, fanned out into one entry per
//! label, shuffled across reduce workers and ranked per label by
//! `(score DESC, year DESC, name ASC)`. The same stages run either in a
//! single process ([`standalone`]) or as streaming mapper/reducer
//! executables talking through the line [`codec`].

pub mod cmd;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod mapper;
pub mod ratings;
pub mod reducer;
pub mod shuffle;
pub mod source;
pub mod standalone;
pub mod utils;

pub use config::{FilterArgs, Filters, Settings};
pub use error::{RankError, RecordError};

/////////////////////////////////////////////////////////////////////////////
// Pipeline record types
/////////////////////////////////////////////////////////////////////////////

/// Integer identifier shared by the items and ratings sources.
pub type ItemId = i64;

/// A normalized item, ready to be fanned out by label.
#[derive(Clone, PartialEq, Debug)]
pub struct Item {
    pub id: ItemId,
    /// Display name with the `(year)` suffix stripped.
    pub name: String,
    pub year: i32,
    /// Never empty; every label is non-blank.
    pub labels: Vec<String>,
    /// Mean rating taken from the [`ratings::ScoreTable`].
    pub score: f64,
}

/// The payload emitted once per label of an [`Item`].
#[derive(Clone, PartialEq, Debug)]
pub struct GroupEntry {
    pub label: String,
    pub name: String,
    pub year: i32,
    pub score: f64,
}

impl GroupEntry {
    /// Get the label of this entry.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Consumes the entry and turns it into an output row.
    #[inline]
    pub fn into_row(self) -> ResultRow {
        ResultRow {
            label: self.label,
            name: self.name,
            year: self.year,
            score: self.score,
        }
    }
}

/// A final ranked row: one surviving (item, label) pair.
#[derive(Clone, PartialEq, Debug)]
pub struct ResultRow {
    pub label: String,
    pub name: String,
    pub year: i32,
    pub score: f64,
}
