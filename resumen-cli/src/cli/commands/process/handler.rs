//! Process command handler

use anyhow::{Context, Result};
use colored::*;

use super::ProcessCommands;
use crate::cli::commands::build_pipeline;
use crate::config::Config;
use crate::pipeline::discover_inputs;

/// Returns whether at least one file was processed
pub fn handle_process_command(args: ProcessCommands, config: &Config) -> Result<bool> {
    println!(
        "Processing directory: {}",
        args.directory.display().to_string().cyan()
    );

    let pipeline = build_pipeline(config)?;

    if args.skip_catalog_refresh {
        let catalog = pipeline
            .load_catalog()
            .context("Rating component list is required")?;
        println!("Using existing rating component list ({} entries)", catalog.len());
    } else {
        let catalog = pipeline
            .refresh_catalog()
            .context("Failed to update rating component list")?;
        println!(
            "{} Rating component list updated ({} entries)",
            "✓".green(),
            catalog.len()
        );
    }

    let files = discover_inputs(&args.directory)?;
    if files.is_empty() {
        anyhow::bail!(
            "No .xls or .xlsx files found in directory: {}",
            args.directory.display()
        );
    }

    println!("Found {} files:", files.len().to_string().bold());
    for file in &files {
        if let Some(name) = file.file_name() {
            println!("  - {}", name.to_string_lossy());
        }
    }
    println!();

    let report = pipeline.run_batch(files);

    for (file, file_report) in &report.processed {
        println!(
            "{} {} ({} rows, backup: {})",
            "✓".green(),
            file.display(),
            file_report.replacement.rows,
            file_report.replacement.backup.display().to_string().dimmed()
        );
        if file_report.skipped_lines > 0 {
            println!(
                "    {} {} of {} rates lines produced no rows",
                "!".yellow(),
                file_report.skipped_lines,
                file_report.rates_lines
            );
        }
    }
    for (file, err) in &report.failed {
        println!("{} {}: {}", "✗".red(), file.display(), err);
    }

    println!();
    println!(
        "Started {}, took {:.1}s",
        report.started.format("%Y-%m-%d %H:%M:%S"),
        report.elapsed.as_secs_f64()
    );

    let (success, message) = report.summary();
    if success {
        println!("{}", message.green().bold());
    } else {
        println!("{}", message.red().bold());
    }
    Ok(success)
}
