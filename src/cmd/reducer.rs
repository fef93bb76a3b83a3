use std::path::PathBuf;

use clap::Parser;

/// Streaming reduce stage: intermediate lines on stdin, ranked rows on
/// stdout.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Settings file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,
    /// Request filters as a JSON object, e.g. '{"top_n": 10}'
    #[arg(short, long, default_value = "{}")]
    pub filters: String,
    /// Reduce workers, overrides `worker_count` from the settings
    #[arg(short, long)]
    pub workers: Option<usize>,
}
