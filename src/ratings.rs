//! Mean score per item, aggregated from the ratings source in one scan.

use fnv::FnvHashMap;
use log::{debug, info};

use crate::config::Settings;
use crate::error::{RankError, RecordError};
use crate::source::{split_fields, DelimitedSource};
use crate::ItemId;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: f64,
    count: u64,
}

/// Running sums and counts per item id.
#[derive(Debug, Default)]
pub struct RatingAggregator {
    tallies: FnvHashMap<ItemId, Tally>,
    rows: usize,
    skipped: usize,
}

impl RatingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, id: ItemId, rating: f64) {
        let tally = self.tallies.entry(id).or_default();
        tally.total += rating;
        tally.count += 1;
        self.rows += 1;
    }

    /// Parses an `(id, rating)` pair and accumulates it.
    pub fn accumulate_raw(&mut self, raw_id: &str, raw_rating: &str) -> Result<(), RecordError> {
        let id = raw_id.trim().parse::<ItemId>().map_err(|_| {
            RecordError::MalformedRating(format!("item id `{}` is not an integer", raw_id))
        })?;
        let rating = raw_rating
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite())
            .ok_or_else(|| {
                RecordError::MalformedRating(format!("rating `{}` is not a number", raw_rating))
            })?;
        self.accumulate(id, rating);
        Ok(())
    }

    /// Counts a row that could not be used.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Collapses the tallies into mean scores.
    pub fn finish(self) -> ScoreTable {
        info!(
            "aggregated {} ratings for {} items ({} rows skipped)",
            self.rows,
            self.tallies.len(),
            self.skipped
        );
        // every tally was created by a successful accumulation, so count >= 1
        let scores = self
            .tallies
            .into_iter()
            .map(|(id, tally)| (id, tally.total / tally.count as f64))
            .collect();
        ScoreTable { scores }
    }
}

/// Item id to mean score. Read-only once built.
#[derive(Debug, Default, Clone)]
pub struct ScoreTable {
    scores: FnvHashMap<ItemId, f64>,
}

impl ScoreTable {
    #[inline]
    pub fn get(&self, id: ItemId) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(ItemId, f64)> for ScoreTable {
    fn from_iter<I: IntoIterator<Item = (ItemId, f64)>>(iter: I) -> Self {
        let mut aggregator = RatingAggregator::new();
        for (id, rating) in iter {
            aggregator.accumulate(id, rating);
        }
        aggregator.finish()
    }
}

/// Scans every ratings file named by the settings.
pub fn aggregate(settings: &Settings) -> Result<ScoreTable, RankError> {
    let source = DelimitedSource::open(
        &settings.source_ratings_path,
        settings.source_delimiter()?,
        settings.source_encoding()?,
    )?;
    aggregate_source(&source, settings)
}

pub fn aggregate_source(
    source: &DelimitedSource,
    settings: &Settings,
) -> Result<ScoreTable, RankError> {
    let names = [
        settings.ratings_id_column.as_str(),
        settings.ratings_value_column.as_str(),
    ];
    let mut aggregator = RatingAggregator::new();
    for file in source.files() {
        let columns = file.columns(source.delimiter(), &names)?;
        for (line_no, line) in file.records(source.delimiter()) {
            let outcome = split_fields(line, source.delimiter())
                .and_then(|fields| {
                    let picked = columns
                        .select(&fields)
                        .map_err(|e| RecordError::MalformedRating(e.to_string()))?;
                    aggregator.accumulate_raw(picked[0], picked[1])
                });
            if let Err(e) = outcome {
                debug!("{}:{}: skipped: {}", file.path.display(), line_no, e);
                aggregator.skip();
            }
        }
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceText;

    fn settings() -> Settings {
        Settings::from_json(r#"{ "source_ratings_path": "ratings.csv" }"#).unwrap()
    }

    #[test]
    fn mean_per_item() {
        let scores: ScoreTable = vec![(1, 4.0), (1, 5.0), (2, 3.5), (1, 3.0)]
            .into_iter()
            .collect();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get(1), Some(4.0));
        assert_eq!(scores.get(2), Some(3.5));
        assert_eq!(scores.get(3), None);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let mut aggregator = RatingAggregator::new();
        assert!(aggregator.accumulate_raw("7", " 4.5 ").is_ok());
        assert!(matches!(
            aggregator.accumulate_raw("seven", "4.5"),
            Err(RecordError::MalformedRating(_))
        ));
        assert!(aggregator.accumulate_raw("7", "high").is_err());
        assert!(aggregator.accumulate_raw("7", "NaN").is_err());
        let scores = aggregator.finish();
        assert_eq!(scores.get(7), Some(4.5));
    }

    #[test]
    fn aggregates_source_by_header_columns() {
        let text = "userId,movieId,rating,timestamp\n\
                    1,10,4.0,964982703\n\
                    2,10,5.0,964982224\n\
                    2,11,oops,964982224\n\
                    3,11\n\
                    3,12,2.0,964983815\n";
        let source = DelimitedSource::from_texts(
            vec![SourceText {
                path: "ratings.csv".into(),
                text: text.to_string(),
            }],
            b',',
        );
        let scores = aggregate_source(&source, &settings()).unwrap();
        assert_eq!(scores.get(10), Some(4.5));
        assert_eq!(scores.get(11), None);
        assert_eq!(scores.get(12), Some(2.0));
    }
}
