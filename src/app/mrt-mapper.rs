use std::io::{self, BufWriter, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use mrtopn::cmd::mapper::Args;
use mrtopn::codec::encode_entry;
use mrtopn::extract::{Extraction, Extractor};
use mrtopn::mapper::Mapper;
use mrtopn::ratings;
use mrtopn::source::{ColumnMap, SourceText};
use mrtopn::utils::init_logger;
use mrtopn::{FilterArgs, Settings};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let settings = Settings::load(&args.config)?;
    let filters = FilterArgs::from_json(&args.filters)?.compile()?;
    let scores = ratings::aggregate(&settings)?;

    let mut input = Vec::new();
    io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("reading stdin")?;
    let text = SourceText::decode("<stdin>", &input, settings.source_encoding()?);

    let delimiter = settings.source_delimiter()?;
    let rules = Extraction::from_settings(&settings)?;
    let mapper = Mapper::new(Extractor::new(&rules, &scores), &filters, delimiter);
    // an input split has no header of its own, so columns are positional:
    // id, name, labels. A header line that does reach us fails extraction.
    let records: Vec<(usize, &str)> = text.numbered_records(delimiter).collect();
    let (entries, stats) = mapper.map_lines("<stdin>", &ColumnMap::positional(3), &records);
    stats.log();

    let mut out = BufWriter::new(io::stdout().lock());
    for entry in &entries {
        out.write_all(&encode_entry(entry))?;
    }
    out.flush()?;
    Ok(())
}
