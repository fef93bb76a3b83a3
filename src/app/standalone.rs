use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};
use clap::Parser;
use mrtopn::standalone::{engine::run_job, Args, Job};
use mrtopn::utils::init_logger;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let job = Job::from_args(&args)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            run_job(&job, BufWriter::new(file))?;
        }
        None => {
            run_job(&job, BufWriter::new(io::stdout().lock()))?;
        }
    }
    Ok(())
}
