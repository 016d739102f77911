use anyhow::{Context, Result};
use colored::*;

use super::CatalogCommands;
use crate::cli::commands::build_pipeline;
use crate::config::Config;

pub fn handle_catalog_command(args: CatalogCommands, config: &Config) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let catalog = pipeline
        .refresh_catalog()
        .context("Failed to update rating component list")?;

    println!(
        "{} {} rating components written to {}",
        "✓".green(),
        catalog.len().to_string().bold(),
        config.catalog_path().display()
    );
    if args.verbose {
        for entry in catalog.entries() {
            println!("  {}", entry);
        }
    }
    Ok(())
}
