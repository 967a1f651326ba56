mod commands;
mod config;

use blockport_logger::{log, LogSeverity::{Error, Info}};
use clap::Parser;
use config::{Cli, CliCommand};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    log("Blockport init".to_owned(), Info);
    let outcome = match &cli.command {
        CliCommand::Import(config) => commands::run_import(config).await,
        CliCommand::Inspect(config) => commands::run_inspect(config).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log(format!("{}", e), Error);
            ExitCode::FAILURE
        }
    }
}
