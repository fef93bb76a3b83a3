//! Normalizes raw item records into [`Item`]s.

use regex::{Regex, RegexBuilder};

use crate::config::Settings;
use crate::error::{RankError, RecordError};
use crate::ratings::ScoreTable;
use crate::{Item, ItemId};

/// Splits a pipe-delimited label list, dropping blank labels.
pub fn split_labels(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compiled extraction patterns.
#[derive(Debug, Clone)]
pub struct Extraction {
    title: Regex,
    no_labels: Regex,
}

impl Extraction {
    pub fn from_settings(settings: &Settings) -> Result<Self, RankError> {
        Self::new(
            &settings.title_extraction_pattern,
            &settings.no_labels_sentinel_pattern,
        )
    }

    /// `title_pattern` must capture the title in group 1 and the year in
    /// group 2.
    pub fn new(title_pattern: &str, no_labels_pattern: &str) -> Result<Self, RankError> {
        let title = RegexBuilder::new(title_pattern)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| {
                RankError::config(format!("invalid `title_extraction_pattern`: {}", e))
            })?;
        if title.captures_len() < 3 {
            return Err(RankError::config(
                "`title_extraction_pattern` must capture a title and a year",
            ));
        }
        let no_labels = Regex::new(no_labels_pattern).map_err(|e| {
            RankError::config(format!("invalid `no_labels_sentinel_pattern`: {}", e))
        })?;
        Ok(Self { title, no_labels })
    }

    /// Splits `"Toy Story (1995)"` into `("Toy Story", 1995)`.
    pub fn split_name(&self, raw_name: &str) -> Result<(String, i32), RecordError> {
        let raw_name = raw_name.trim();
        let malformed = || RecordError::MalformedName(raw_name.to_string());
        let captures = self.title.captures(raw_name).ok_or_else(malformed)?;
        let title = captures.get(1).ok_or_else(malformed)?.as_str();
        let year = captures
            .get(2)
            .ok_or_else(malformed)?
            .as_str()
            .parse::<i32>()
            .map_err(|_| malformed())?;
        Ok((title.to_string(), year))
    }

    pub fn split_labels(&self, raw_labels: &str) -> Result<Vec<String>, RecordError> {
        let raw_labels = raw_labels.trim();
        if self.no_labels.is_match(raw_labels) {
            return Err(RecordError::NoLabels(raw_labels.to_string()));
        }
        let labels = split_labels(raw_labels);
        if labels.is_empty() {
            return Err(RecordError::NoLabels(raw_labels.to_string()));
        }
        Ok(labels)
    }
}

/// Turns raw item fields into an [`Item`] scored from a finished
/// [`ScoreTable`].
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    rules: &'a Extraction,
    scores: &'a ScoreTable,
}

impl<'a> Extractor<'a> {
    pub fn new(rules: &'a Extraction, scores: &'a ScoreTable) -> Self {
        Self { rules, scores }
    }

    pub fn extract(
        &self,
        raw_id: &str,
        raw_name: &str,
        raw_labels: &str,
    ) -> Result<Item, RecordError> {
        let id = raw_id.trim().parse::<ItemId>().map_err(|_| {
            RecordError::MalformedRecord(format!("item id `{}` is not an integer", raw_id))
        })?;
        let (name, year) = self.rules.split_name(raw_name)?;
        let labels = self.rules.split_labels(raw_labels)?;
        let score = self.scores.get(id).ok_or(RecordError::MissingScore(id))?;
        Ok(Item {
            id,
            name,
            year,
            labels,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Extraction {
        Extraction::new(r"(.+) \((\d{4})\)", r"^\(no genres listed\)$").unwrap()
    }

    #[test]
    fn splits_title_and_year() {
        let rules = rules();
        assert_eq!(
            rules.split_name(" Toy Story (1995) ").unwrap(),
            ("Toy Story".to_string(), 1995)
        );
        assert_eq!(
            rules.split_name("Babylon 5 (1994) (1998)").unwrap(),
            ("Babylon 5 (1994)".to_string(), 1998)
        );
        assert_eq!(
            rules.split_name("Untitled"),
            Err(RecordError::MalformedName("Untitled".to_string()))
        );
        assert!(rules.split_name("Short (95)").is_err());
        assert_eq!(
            rules.split_name("Line\nBreak (2000)").unwrap(),
            ("Line\nBreak".to_string(), 2000)
        );
    }

    #[test]
    fn sentinel_drops_all_labels() {
        let rules = rules();
        assert_eq!(
            rules.split_labels("(no genres listed)"),
            Err(RecordError::NoLabels("(no genres listed)".to_string()))
        );
        assert!(rules.split_labels("  |  ").is_err());
        assert_eq!(
            rules.split_labels("Drama|Comedy").unwrap(),
            vec!["Drama", "Comedy"]
        );
    }

    #[test]
    fn extracts_scored_item() {
        let rules = rules();
        let scores: ScoreTable = vec![(1, 4.0), (1, 3.0)].into_iter().collect();
        let extractor = Extractor::new(&rules, &scores);

        let item = extractor
            .extract("1", "Toy Story (1995)", "Adventure|Animation")
            .unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.name, "Toy Story");
        assert_eq!(item.year, 1995);
        assert_eq!(item.labels, vec!["Adventure", "Animation"]);
        assert_eq!(item.score, 3.5);

        assert_eq!(
            extractor.extract("2", "Jumanji (1995)", "Fantasy"),
            Err(RecordError::MissingScore(2))
        );
        assert!(matches!(
            extractor.extract("x", "Jumanji (1995)", "Fantasy"),
            Err(RecordError::MalformedRecord(_))
        ));
    }

    #[test]
    fn rejects_title_pattern_without_year_group() {
        assert!(Extraction::new(r"(.+) \(\d{4}\)", "^$").is_err());
        assert!(Extraction::new(r"(.+", "^$").is_err());
    }
}
