use std::io::Write;

use log::info;

use crate::codec::RowWriter;
use crate::config::{Filters, Settings};
use crate::error::RankError;
use crate::extract::{Extraction, Extractor};
use crate::mapper::{MapStats, Mapper};
use crate::ratings::{self, ScoreTable};
use crate::reducer::reduce_partition;
use crate::shuffle::GroupPartition;
use crate::source::DelimitedSource;
use crate::standalone::Job;
use crate::{GroupEntry, ResultRow};

/// Reads every items file of the job and fans the items out.
pub fn perform_map(job: &Job, scores: &ScoreTable) -> Result<(Vec<GroupEntry>, MapStats), RankError> {
    let settings = &job.settings;
    let source = DelimitedSource::open(
        settings.items_path()?,
        settings.source_delimiter()?,
        settings.source_encoding()?,
    )?;
    map_source(&source, settings, &job.filters, scores)
}

/// Maps an already opened items source. Files are processed in path order
/// and the lines of a file in parallel, so entries keep input order.
pub fn map_source(
    source: &DelimitedSource,
    settings: &Settings,
    filters: &Filters,
    scores: &ScoreTable,
) -> Result<(Vec<GroupEntry>, MapStats), RankError> {
    let rules = Extraction::from_settings(settings)?;
    let mapper = Mapper::new(Extractor::new(&rules, scores), filters, source.delimiter());
    let names = [
        settings.items_id_column.as_str(),
        settings.items_name_column.as_str(),
        settings.items_labels_column.as_str(),
    ];

    let mut entries = Vec::new();
    let mut stats = MapStats::default();
    for file in source.files() {
        let columns = file.columns(source.delimiter(), &names)?;
        let origin = file.path.display().to_string();
        let (mapped, file_stats) = mapper.map_lines(&origin, &columns, &file.records(source.delimiter()));
        entries.extend(mapped);
        stats.merge(file_stats);
    }
    stats.log();
    Ok((entries, stats))
}

/// The shuffle of a standalone run. It has to see every entry before the
/// worker blocks can be sized.
pub fn perform_shuffle(entries: Vec<GroupEntry>) -> GroupPartition {
    let partition: GroupPartition = entries.into_iter().collect();
    info!(
        "shuffle: {} entries under {} labels",
        partition.entry_count(),
        partition.label_count()
    );
    partition
}

pub fn perform_reduce(job: &Job, partition: GroupPartition) -> Vec<ResultRow> {
    reduce_partition(
        partition,
        &job.filters,
        job.settings.worker_count,
        job.settings.admission_order,
    )
}

/// Runs aggregation, map, shuffle and reduce, and returns the ranked rows.
pub fn rank(job: &Job) -> Result<Vec<ResultRow>, RankError> {
    let scores = ratings::aggregate(&job.settings)?;
    let (entries, _) = perform_map(job, &scores)?;
    let partition = perform_shuffle(entries);
    Ok(perform_reduce(job, partition))
}

/// Writes rows with the output options of `settings`.
pub fn write_rows<W: Write>(settings: &Settings, rows: &[ResultRow], sink: W) -> Result<W, RankError> {
    let mut writer = RowWriter::new(sink, settings.output_delimiter()?, settings.output_encoding()?);
    if settings.emit_header {
        writer.write_header()?;
    }
    for row in rows {
        writer.write_row(row)?;
    }
    writer.finish()
}

/// Ranks and writes in one go. Returns the number of rows written.
pub fn run_job<W: Write>(job: &Job, sink: W) -> Result<usize, RankError> {
    let rows = rank(job)?;
    write_rows(&job.settings, &rows, sink)?;
    info!("wrote {} rows", rows.len());
    Ok(rows.len())
}
