pub mod catalog;
pub mod parse;
pub mod process;

use anyhow::{Context, Result};

use crate::config::{Config, Credentials};
use crate::engine::SqlPlusEngine;
use crate::pipeline::Pipeline;

/// Pipeline backed by SQL*Plus, with credentials from the configured env file
pub(crate) fn build_pipeline(config: &Config) -> Result<Pipeline<SqlPlusEngine>> {
    let credentials =
        Credentials::load(&config.paths.env_file).context("Cannot connect to the database")?;
    log::debug!("Using connection {}", credentials.masked());

    let engine = SqlPlusEngine::new(&config.engine, &config.paths.sql_dir, credentials)?;
    Ok(Pipeline::new(engine, config))
}
