use std::path::PathBuf;

use clap::Parser;

/// Streaming map stage: raw item lines on stdin, intermediate
/// `label\tname\tyear\tscore` lines on stdout.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Settings file (JSON); its ratings source feeds the scores
    #[arg(short, long)]
    pub config: PathBuf,
    /// Request filters as a JSON object, e.g. '{"year_from": 1990}'
    #[arg(short, long, default_value = "{}")]
    pub filters: String,
}
