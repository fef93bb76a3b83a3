//! Wire formats: the intermediate line format spoken between the
//! streaming mapper and reducer, and the delimited output rows.

use std::io::Write;

use bytes::{BufMut, Bytes, BytesMut};
use encoding_rs::Encoding;

use crate::error::{RankError, RecordError};
use crate::utils::string_from_bytes;
use crate::{GroupEntry, ResultRow};

/////////////////////////////////////////////////////////////////////////////
// Intermediate entries
/////////////////////////////////////////////////////////////////////////////

const FIELD_SEPARATOR: char = '\t';

fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// Encodes an entry as `label\tname\tyear\tscore\n`.
///
/// Tabs and line breaks inside the label or name become spaces; the score
/// is written in its shortest round-trip form.
pub fn encode_entry(entry: &GroupEntry) -> Bytes {
    let line = format!(
        "{}{sep}{}{sep}{}{sep}{}\n",
        sanitize(&entry.label),
        sanitize(&entry.name),
        entry.year,
        entry.score,
        sep = FIELD_SEPARATOR
    );
    let mut buf = BytesMut::with_capacity(line.len());
    buf.put_slice(line.as_bytes());
    buf.freeze()
}

/// Decodes one intermediate line, with or without its line terminator.
pub fn decode_entry(line: Bytes) -> Result<GroupEntry, RecordError> {
    let line = string_from_bytes(line).map_err(|e| RecordError::MalformedRecord(e.to_string()))?;
    let line = line.trim_end_matches(['\n', '\r']);
    let malformed = || RecordError::MalformedRecord(format!("bad intermediate line `{}`", line));

    let mut fields = line.split(FIELD_SEPARATOR);
    let (Some(label), Some(name), Some(year), Some(score), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(malformed());
    };
    if label.trim().is_empty() {
        return Err(malformed());
    }
    let year = year.trim().parse::<i32>().map_err(|_| malformed())?;
    let score = score
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite())
        .ok_or_else(malformed)?;
    Ok(GroupEntry {
        label: label.to_string(),
        name: name.to_string(),
        year,
        score,
    })
}

/////////////////////////////////////////////////////////////////////////////
// Output rows
/////////////////////////////////////////////////////////////////////////////

/// Column names of the optional header row.
pub const OUTPUT_HEADER: [&str; 4] = ["label", "name", "year", "score"];

/// Integral scores keep one decimal (`4.0`), others print in their
/// shortest round-trip form (`3.8333333333333335`).
pub fn format_score(score: f64) -> String {
    if score.is_finite() && score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        format!("{}", score)
    }
}

/// Quotes a field that holds the delimiter, a quote or a line break.
pub fn quote_field(field: &str, delimiter: u8) -> String {
    let delimiter = delimiter as char;
    if field.contains([delimiter, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Writes delimited result rows in the configured encoding.
pub struct RowWriter<W: Write> {
    sink: W,
    delimiter: u8,
    encoding: &'static Encoding,
    rows: usize,
}

impl<W: Write> RowWriter<W> {
    pub fn new(sink: W, delimiter: u8, encoding: &'static Encoding) -> Self {
        Self {
            sink,
            delimiter,
            encoding,
            rows: 0,
        }
    }

    fn write_fields(&mut self, fields: &[&str]) -> Result<(), RankError> {
        let separator = (self.delimiter as char).to_string();
        let mut line = fields
            .iter()
            .map(|field| quote_field(field, self.delimiter))
            .collect::<Vec<_>>()
            .join(&separator);
        line.push('\n');
        let (encoded, actual, had_errors) = self.encoding.encode(&line);
        if had_errors || actual != self.encoding {
            return Err(RankError::Unencodable {
                encoding: self.encoding.name(),
                text: line.trim_end().to_string(),
            });
        }
        self.sink.write_all(&encoded)?;
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<(), RankError> {
        self.write_fields(&OUTPUT_HEADER)
    }

    pub fn write_row(&mut self, row: &ResultRow) -> Result<(), RankError> {
        let year = row.year.to_string();
        let score = format_score(row.score);
        self.write_fields(&[row.label.as_str(), row.name.as_str(), year.as_str(), score.as_str()])?;
        self.rows += 1;
        Ok(())
    }

    /// Number of data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and hands back the sink.
    pub fn finish(mut self) -> Result<W, RankError> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, name: &str, score: f64) -> GroupEntry {
        GroupEntry {
            label: label.to_string(),
            name: name.to_string(),
            year: 1995,
            score,
        }
    }

    #[test]
    fn intermediate_line_layout() {
        let encoded = encode_entry(&entry("Drama", "Heat", 3.8333333333333335));
        assert_eq!(&encoded[..], b"Drama\tHeat\t1995\t3.8333333333333335\n");
        let decoded = decode_entry(encoded).unwrap();
        assert_eq!(decoded.score, 3.8333333333333335);
        assert_eq!(decoded.name, "Heat");
    }

    #[test]
    fn tabs_in_fields_do_not_break_the_line() {
        let encoded = encode_entry(&entry("Film\tNoir", "A\tB", 4.0));
        let decoded = decode_entry(encoded).unwrap();
        assert_eq!(decoded.label, "Film Noir");
        assert_eq!(decoded.name, "A B");
    }

    #[test]
    fn rejects_malformed_intermediate_lines() {
        for line in [
            "Drama\tHeat\t1995",
            "Drama\tHeat\t1995\t4.0\textra",
            "Drama\tHeat\tyear\t4.0",
            "Drama\tHeat\t1995\tNaN",
            "\tHeat\t1995\t4.0",
        ] {
            assert!(
                decode_entry(Bytes::from(line)).is_err(),
                "accepted {:?}",
                line
            );
        }
        assert!(decode_entry(Bytes::from_static(b"D\tN\t1\t\xff")).is_err());
    }

    #[test]
    fn formats_scores() {
        assert_eq!(format_score(4.0), "4.0");
        assert_eq!(format_score(3.5), "3.5");
        assert_eq!(format_score(3.8333333333333335), "3.8333333333333335");
    }

    #[test]
    fn writes_header_and_quoted_rows() {
        let mut writer = RowWriter::new(Vec::new(), b',', encoding_rs::UTF_8);
        writer.write_header().unwrap();
        writer
            .write_row(&ResultRow {
                label: "Comedy".to_string(),
                name: "American President, The".to_string(),
                year: 1995,
                score: 3.5,
            })
            .unwrap();
        assert_eq!(writer.rows(), 1);
        let out = writer.finish().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "label,name,year,score\nComedy,\"American President, The\",1995,3.5\n"
        );
    }

    #[test]
    fn writes_in_output_encoding() {
        let mut writer = RowWriter::new(Vec::new(), b';', encoding_rs::WINDOWS_1252);
        writer
            .write_row(&ResultRow {
                label: "Drama".to_string(),
                name: "Amélie".to_string(),
                year: 2001,
                score: 4.0,
            })
            .unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(out, b"Drama;Am\xe9lie;2001;4.0\n".to_vec());
    }

    fn tokyo_story() -> ResultRow {
        ResultRow {
            label: "Drama".to_string(),
            name: "東京物語".to_string(),
            year: 1953,
            score: 4.0,
        }
    }

    #[test]
    fn unmappable_characters_are_an_error() {
        let mut writer = RowWriter::new(Vec::new(), b',', encoding_rs::WINDOWS_1252);
        assert!(matches!(
            writer.write_row(&tokyo_story()),
            Err(RankError::Unencodable { encoding: "windows-1252", .. })
        ));
        assert_eq!(writer.rows(), 0);
        assert!(writer.finish().unwrap().is_empty());
    }

    #[test]
    fn encodings_without_an_encoder_are_refused() {
        let mut writer = RowWriter::new(Vec::new(), b',', encoding_rs::UTF_16LE);
        assert!(matches!(
            writer.write_row(&tokyo_story()),
            Err(RankError::Unencodable { .. })
        ));
        let mut writer = RowWriter::new(Vec::new(), b',', encoding_rs::UTF_8);
        writer.write_row(&tokyo_story()).unwrap();
        assert_eq!(
            String::from_utf8(writer.finish().unwrap()).unwrap(),
            "Drama,東京物語,1953,4.0\n"
        );
    }
}
