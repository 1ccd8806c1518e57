use clap::Parser;
use std::path::PathBuf;

/// Stream NDJSON records into a single CSV object on object storage.
#[derive(Parser, Debug)]
#[command(name = "sleet", version, about)]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// NDJSON input file; reads stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}
