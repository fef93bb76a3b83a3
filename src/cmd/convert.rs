use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Converts csv files to parquet files or back, and shows file schemas.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
    /// Settings file (JSON) supplying `chunk_size` and `source_delimiter`
    #[clap(short, long, default_value = None)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a csv src-file to a parquet dst-file
    Csv2parquet { src: PathBuf, dst: PathBuf },
    /// Convert a parquet src-file to a csv dst-file
    Parquet2csv { src: PathBuf, dst: PathBuf },
    /// Print the schema of a .csv or .parquet file
    Schema { file: PathBuf },
}
