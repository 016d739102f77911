//! Command line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::catalog::CatalogCommands;
use commands::parse::ParseCommands;
use commands::process::ProcessCommands;

#[derive(Parser, Debug)]
#[command(
    name = "resumen-cli",
    version,
    about = "Adds a Resumen sheet of tariff tiers to liquidation spreadsheets"
)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every spreadsheet in a directory
    Process(ProcessCommands),
    /// Show the key extracted from one or more filenames
    Parse(ParseCommands),
    /// Regenerate the rating component list from the database
    RefreshCatalog(CatalogCommands),
}
