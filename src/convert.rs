//! Conversion of source files between csv and parquet, and schema display.
//!
//! Files are streamed batch by batch; a batch holds `chunk_size` rows.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::Schema;
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// File formats told apart by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("parquet") | Some("parq") => Ok(FileFormat::Parquet),
            _ => bail!("Unknown file format: {}", path.display()),
        }
    }
}

fn csv_format(delimiter: u8) -> Format {
    Format::default().with_header(true).with_delimiter(delimiter)
}

fn infer_csv_schema(file: &mut File, delimiter: u8) -> Result<Schema> {
    let (schema, _) = csv_format(delimiter).infer_schema(&mut *file, None)?;
    file.rewind()?;
    Ok(schema)
}

/// Converts a csv file to a SNAPPY-compressed parquet file. Returns the
/// number of rows written.
pub fn csv_to_parquet(src: &Path, dst: &Path, delimiter: u8, chunk_size: usize) -> Result<usize> {
    let mut file = File::open(src).with_context(|| format!("opening {}", src.display()))?;
    let schema = Arc::new(infer_csv_schema(&mut file, delimiter)?);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(csv_format(delimiter))
        .with_batch_size(chunk_size)
        .build(file)?;

    let out = File::create(dst).with_context(|| format!("creating {}", dst.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(out, schema, Some(props))?;
    let mut rows = 0;
    for batch in reader {
        let batch = batch?;
        rows += batch.num_rows();
        writer.write(&batch)?;
        info!("{} records converted", rows);
    }
    // writer must be closed to write footer
    writer.close()?;
    Ok(rows)
}

/// Converts a parquet file to a csv file with a header row. Returns the
/// number of rows written.
pub fn parquet_to_csv(src: &Path, dst: &Path, delimiter: u8, chunk_size: usize) -> Result<usize> {
    let file = File::open(src).with_context(|| format!("opening {}", src.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(chunk_size)
        .build()?;

    let out = File::create(dst).with_context(|| format!("creating {}", dst.display()))?;
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .with_delimiter(delimiter)
        .build(BufWriter::new(out));
    let mut rows = 0;
    for batch in reader {
        let batch = batch?;
        rows += batch.num_rows();
        writer.write(&batch)?;
        info!("{} records converted", rows);
    }
    writer.into_inner().flush()?;
    Ok(rows)
}

/// One line per column: `name: type`, with `not null` for required
/// columns.
pub fn describe_schema(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| {
            let nullability = if field.is_nullable() { "" } else { " not null" };
            format!("{}: {}{}", field.name(), field.data_type(), nullability)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The schema of a csv or parquet file, as printed by [`describe_schema`].
pub fn schema_of(path: &Path, delimiter: u8) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let schema = match FileFormat::detect(path)? {
        FileFormat::Csv => infer_csv_schema(&mut file, delimiter)?,
        FileFormat::Parquet => ParquetRecordBatchReaderBuilder::try_new(file)?
            .schema()
            .as_ref()
            .clone(),
    };
    Ok(describe_schema(&schema))
}
