//! Parse command handler

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use super::ParseCommands;
use crate::config::Config;
use crate::filename::{FilenameKey, RatingComponentCatalog, parse_with_catalog};

/// Returns whether every filename could be parsed
pub fn handle_parse_command(args: ParseCommands, config: &Config) -> Result<bool> {
    let catalog_path = args.catalog.clone().unwrap_or_else(|| config.catalog_path());
    let catalog = RatingComponentCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load {}", catalog_path.display()))?;

    let mut all_parsed = true;
    let mut keys = Vec::new();

    for input in &args.filenames {
        let filename = file_name_of(input);
        match parse_with_catalog(filename, &catalog) {
            Ok(key) => {
                if !args.json {
                    print_key(filename, &key);
                }
                keys.push(key);
            }
            Err(e) => {
                all_parsed = false;
                if args.json {
                    log::error!("{}", e);
                } else {
                    println!("{} {}", "✗".red(), e);
                }
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&keys).context("Failed to serialize keys")?;
        println!("{}", json);
    }
    Ok(all_parsed)
}

fn file_name_of(input: &str) -> &str {
    Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(input)
}

fn print_key(filename: &str, key: &FilenameKey) {
    println!("{}", filename.bold());
    println!("  franchise:        {}", key.franchise);
    println!("  operator:         {}", key.operator);
    println!("  period:           {}", key.period);
    let source = if key.from_catalog { "catalog" } else { "position" };
    println!(
        "  rating component: {} {}",
        key.rating_component.cyan(),
        format!("({})", source).dimmed()
    );
    println!("  direction:        {}", key.direction);
    if let Some(marker) = key.omv {
        println!("  omv:              {}", marker.component().yellow());
    }
}
