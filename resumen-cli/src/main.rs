mod cli;
mod config;
mod engine;
mod filename;
mod logging;
mod pipeline;
mod resumen;
mod sheet;

use anyhow::Result;
use clap::Parser;
use colored::*;

use cli::commands::{catalog, parse, process};
use cli::{Cli, Commands};
use config::Config;

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but did not succeed
fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging)?;
    log::debug!("Configuration: {:?}", config);

    match cli.command {
        Commands::Process(args) => process::handle_process_command(args, &config),
        Commands::Parse(args) => parse::handle_parse_command(args, &config),
        Commands::RefreshCatalog(args) => {
            catalog::handle_catalog_command(args, &config)?;
            Ok(true)
        }
    }
}
