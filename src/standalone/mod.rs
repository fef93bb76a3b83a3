use std::path::PathBuf;

use clap::Parser;

use crate::config::{FilterArgs, Filters, Settings};
use crate::error::RankError;

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about = "Top N items of every label, ranked in a single process", long_about = None)]
pub struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Reduce workers, overrides `worker_count` from the settings
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Output file, stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Everything one run needs, validated up front.
#[derive(Debug, Clone)]
pub struct Job {
    pub settings: Settings,
    pub filters: Filters,
}

impl Job {
    pub fn new(settings: Settings, filters: &FilterArgs) -> Result<Self, RankError> {
        settings.validate()?;
        Ok(Self {
            settings,
            filters: filters.compile()?,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, RankError> {
        let mut settings = Settings::load(&args.config)?;
        if let Some(workers) = args.workers {
            settings.worker_count = workers;
        }
        Self::new(settings, &args.filters)
    }
}
