use std::io::{self, BufRead, BufWriter};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use log::{info, warn};
use mrtopn::cmd::reducer::Args;
use mrtopn::codec::decode_entry;
use mrtopn::shuffle::GroupPartition;
use mrtopn::standalone::engine::{perform_reduce, write_rows};
use mrtopn::standalone::Job;
use mrtopn::utils::init_logger;
use mrtopn::{FilterArgs, Settings};

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let mut settings = Settings::load(&args.config)?;
    if let Some(workers) = args.workers {
        settings.worker_count = workers;
    }
    let job = Job::new(settings, &FilterArgs::from_json(&args.filters)?)?;

    let mut entries = Vec::new();
    let mut skipped = 0;
    for (i, line) in io::stdin().lock().split(b'\n').enumerate() {
        let line = line.context("reading stdin")?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match decode_entry(Bytes::from(line)) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!("line {}: skipped: {}", i + 1, e);
                skipped += 1;
            }
        }
    }
    info!("read {} entries, skipped {} lines", entries.len(), skipped);

    // the input arrives grouped by key; runs are flushed on key change
    let partition = GroupPartition::from_runs(entries);
    let rows = perform_reduce(&job, partition);
    write_rows(&job.settings, &rows, BufWriter::new(io::stdout().lock()))?;
    Ok(())
}
