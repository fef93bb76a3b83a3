//! Delimited-text sources.
//!
//! A source is a glob spec; every matching file is read completely,
//! decoded with the configured encoding and split into lines. The first
//! line of every file is its header.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use glob::glob;
use log::{debug, warn};

use crate::error::{RankError, RecordError};

/// One decoded source file.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
}

impl SourceText {
    /// Decodes raw bytes read from `path`.
    ///
    /// Malformed sequences are replaced rather than rejected, a byte order
    /// mark takes precedence over `encoding`.
    pub fn decode(path: impl Into<PathBuf>, bytes: &[u8], encoding: &'static Encoding) -> Self {
        let path = path.into();
        let (text, actual, had_errors) = encoding.decode(bytes);
        if had_errors {
            warn!(
                "{}: malformed {} sequences were replaced",
                path.display(),
                actual.name()
            );
        }
        Self {
            path,
            text: text.into_owned(),
        }
    }

    /// The header record, if the file has any content.
    pub fn header(&self, delimiter: u8) -> Option<&str> {
        self.numbered_records(delimiter).next().map(|(_, record)| record)
    }

    /// Non-blank records with the 1-based line number they start on.
    pub fn numbered_records(&self, delimiter: u8) -> Records<'_> {
        Records::new(&self.text, delimiter)
    }

    /// Data records with their line numbers. The header and blank lines
    /// are left out.
    pub fn records(&self, delimiter: u8) -> Vec<(usize, &str)> {
        self.numbered_records(delimiter).skip(1).collect()
    }

    /// Resolves the named columns against this file's header.
    pub fn columns(&self, delimiter: u8, names: &[&str]) -> Result<ColumnMap, RankError> {
        let Some(header) = self.header(delimiter) else {
            return Ok(ColumnMap::positional(names.len()));
        };
        let fields = split_fields(header, delimiter).map_err(|e| {
            RankError::config(format!("{}: unreadable header: {}", self.path.display(), e))
        })?;
        ColumnMap::resolve(&fields, names).map_err(|missing| {
            RankError::config(format!(
                "{}: header has no `{}` column",
                self.path.display(),
                missing
            ))
        })
    }
}

/// All files matching one source glob, in path order.
#[derive(Debug, Clone)]
pub struct DelimitedSource {
    files: Vec<SourceText>,
    delimiter: u8,
}

impl DelimitedSource {
    pub fn open(spec: &str, delimiter: u8, encoding: &'static Encoding) -> Result<Self, RankError> {
        let entries = glob(spec)
            .map_err(|e| RankError::config(format!("invalid source glob `{}`: {}", spec, e)))?;
        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        paths.push(path);
                    }
                }
                Err(e) => {
                    let path = e.path().to_path_buf();
                    return Err(RankError::source_io(path, e.into()));
                }
            }
        }
        if paths.is_empty() {
            return Err(RankError::source_io(
                spec,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no file matches"),
            ));
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = read_file(&path)?;
            debug!("read {} bytes from {}", bytes.len(), path.display());
            files.push(SourceText::decode(path, &bytes, encoding));
        }
        Ok(Self { files, delimiter })
    }

    /// Wraps already decoded text, e.g. a stream read from stdin.
    pub fn from_texts(files: Vec<SourceText>, delimiter: u8) -> Self {
        Self { files, delimiter }
    }

    pub fn files(&self) -> &[SourceText] {
        &self.files
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, RankError> {
    let mut buf = Vec::new();
    // a scope so that the file is closed right after reading
    {
        let mut file = File::open(path).map_err(|e| RankError::source_io(path, e))?;
        file.read_to_end(&mut buf)
            .map_err(|e| RankError::source_io(path, e))?;
    }
    Ok(buf)
}

/// Records of a decoded text.
///
/// Records end at a line break outside quotes. A quoted field may hold
/// line breaks, which stay part of the field. A quote only opens a field
/// at the start of that field, the same rule [`split_fields`] follows.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    text: &'a str,
    delimiter: char,
    pos: usize,
    line: usize,
}

impl<'a> Records<'a> {
    pub fn new(text: &'a str, delimiter: u8) -> Self {
        Self {
            text,
            delimiter: delimiter as char,
            pos: 0,
            line: 1,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let first_line = self.line;
            let mut end = rest.len();
            let mut consumed = rest.len();
            let mut quoted = false;
            let mut at_field_start = true;
            let mut chars = rest.char_indices().peekable();

            while let Some((i, c)) = chars.next() {
                match c {
                    '"' if quoted => {
                        if chars.next_if(|&(_, next)| next == '"').is_none() {
                            quoted = false;
                        }
                    }
                    '"' if at_field_start => {
                        quoted = true;
                        at_field_start = false;
                    }
                    '\n' => {
                        self.line += 1;
                        if !quoted {
                            end = i;
                            consumed = i + 1;
                            break;
                        }
                    }
                    c if c == self.delimiter && !quoted => at_field_start = true,
                    _ if !quoted => at_field_start = false,
                    _ => {}
                }
            }

            self.pos += consumed;
            let record = &rest[..end];
            let record = record.strip_suffix('\r').unwrap_or(record);
            if !record.trim().is_empty() {
                return Some((first_line, record));
            }
        }
        None
    }
}

/// Indices of the fields a stage reads out of each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: Vec<usize>,
}

impl ColumnMap {
    /// The first `n` fields, in order.
    pub fn positional(n: usize) -> Self {
        Self {
            indices: (0..n).collect(),
        }
    }

    /// Looks every name up in `header`. Returns the first missing name on
    /// failure.
    pub fn resolve<'n>(header: &[String], names: &[&'n str]) -> Result<Self, &'n str> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let index = header
                .iter()
                .position(|field| field.trim() == *name)
                .ok_or(*name)?;
            indices.push(index);
        }
        Ok(Self { indices })
    }

    /// Picks the mapped fields out of a split record.
    pub fn select<'a>(&self, fields: &'a [String]) -> Result<Vec<&'a str>, RecordError> {
        self.indices
            .iter()
            .map(|&i| {
                fields.get(i).map(String::as_str).ok_or_else(|| {
                    RecordError::MalformedRecord(format!(
                        "expected at least {} fields, got {}",
                        i + 1,
                        fields.len()
                    ))
                })
            })
            .collect()
    }
}

/// Splits one line on `delimiter`.
///
/// A field that starts with `"` runs to the matching closing quote and may
/// contain the delimiter; `""` inside it stands for a single quote.
pub fn split_fields(line: &str, delimiter: u8) -> Result<Vec<String>, RecordError> {
    let delimiter = delimiter as char;
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut at_field_start = true;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && at_field_start {
            quoted = true;
            at_field_start = false;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
            at_field_start = true;
        } else {
            field.push(c);
            at_field_start = false;
        }
    }

    if quoted {
        return Err(RecordError::MalformedRecord(format!(
            "unterminated quote in `{}`",
            line
        )));
    }
    fields.push(field);
    Ok(fields)
}
