use anyhow::Result;
use clap::Parser;
use mrtopn::cmd::convert::{Args, Commands};
use mrtopn::config::DEFAULT_CHUNK_SIZE;
use mrtopn::convert::{csv_to_parquet, parquet_to_csv, schema_of};
use mrtopn::utils::init_logger;
use mrtopn::Settings;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let (delimiter, chunk_size) = match &args.config {
        Some(path) => {
            let settings = Settings::load(path)?;
            (settings.source_delimiter()?, settings.chunk_size)
        }
        None => (b',', DEFAULT_CHUNK_SIZE),
    };

    match args.command {
        Commands::Csv2parquet { src, dst } => {
            let rows = csv_to_parquet(&src, &dst, delimiter, chunk_size)?;
            println!("{} records written to {}", rows, dst.display());
        }
        Commands::Parquet2csv { src, dst } => {
            let rows = parquet_to_csv(&src, &dst, delimiter, chunk_size)?;
            println!("{} records written to {}", rows, dst.display());
        }
        Commands::Schema { file } => {
            println!("{}", schema_of(&file, delimiter)?);
        }
    }
    Ok(())
}
