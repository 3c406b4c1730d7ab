mod api;
mod cataas;
mod cli;
mod disk;
mod http;
mod ledger;
mod pipeline;
mod retry;
#[cfg(test)]
mod testutil;
mod token;

use clap::Parser;
use cli::Cli;
use log::error;
use std::{fs, io::Write};

fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let cli = Cli::parse();

    // Build the logger: plain lines on stderr, or timestamped lines appended
    // to --log-file.
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(cli.verbose.log_level_filter())
        .format_file(false)
        .format_target(false)
        .format_timestamp(None);

    if let Some(path) = &cli.log_file {
        let file = match fs::OpenOptions::new().create(true).append(true).open(path)
        {
            Ok(file) => file,
            Err(err) => {
                eprintln!("Failed to open log file {}: {err}", path.display());
                std::process::exit(1);
            }
        };
        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {}",
                    buf.timestamp_seconds(),
                    record.level(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(file)));
    }
    let env_logger = builder.build();

    // Wrap the logger so log messages and progress bars don't interfere with
    // each other.
    let progress = indicatif::MultiProgress::new();
    indicatif_log_bridge::LogWrapper::new(progress.clone(), env_logger)
        .try_init()
        .unwrap();

    // Run the CLI application
    let logs_to_file = cli.log_file.is_some();
    let result = cli.run(&progress);
    if let Err(err) = &result {
        error!("{:#}", err);
        if logs_to_file {
            eprintln!("error: {err:#}");
        }
    }

    // Make sure everything reached the log file before exiting
    log::logger().flush();
    if result.is_err() {
        std::process::exit(1);
    }
}
