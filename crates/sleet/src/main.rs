//! sleet CLI: write NDJSON records to a single CSV object.

use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

use sleet::ingest::storage_for;
use sleet::{CliArgs, Config, init_tracing, run};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    info!("Loading config from {}", args.config.display());
    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (input, input_name): (Box<dyn AsyncBufRead + Unpin + Send>, String) = match &args.input {
        Some(path) => match tokio::fs::File::open(path).await {
            Ok(file) => (Box::new(BufReader::new(file)), path.display().to_string()),
            Err(e) => {
                eprintln!("Failed to open input {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => (Box::new(BufReader::new(tokio::io::stdin())), "<stdin>".to_string()),
    };

    info!(
        "Writing stream {} to {}",
        config.stream.name, config.destination.url
    );

    let storage = match storage_for(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("Failed to open destination: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config, storage, input, &input_name).await {
        Ok(summary) => {
            info!("Committed {} record(s)", summary.records);
            println!("{}", summary.object_key);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Write failed: {e}");
            ExitCode::FAILURE
        }
    }
}
