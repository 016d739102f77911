//! SQL*Plus backed query engine

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tokio::process::Command;
use tokio::runtime::Runtime;

use super::output::clean_blank_lines;
use super::{EngineError, EngineOutput, QueryEngine, QueryScript};
use crate::config::{Credentials, EngineConfig};

/// Runs `<program> -s user/password@db @script args...` inside the SQL directory
pub struct SqlPlusEngine {
    program: String,
    sql_dir: PathBuf,
    credentials: Credentials,
    timeout: Duration,
    diagnostics: Regex,
    runtime: Runtime,
}

impl SqlPlusEngine {
    pub fn new(config: &EngineConfig, sql_dir: &Path, credentials: Credentials) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build runtime for query engine")?;
        let diagnostics =
            Regex::new(r"\b(?:ORA-\d{5}|SP2-\d{4})\b").context("Invalid diagnostics pattern")?;

        Ok(Self {
            program: config.program.clone(),
            sql_dir: sql_dir.to_path_buf(),
            credentials,
            timeout: Duration::from_secs(config.timeout_secs),
            diagnostics,
            runtime,
        })
    }

    async fn execute(&self, script: QueryScript, args: &[String]) -> Result<std::process::Output, EngineError> {
        let child = Command::new(&self.program)
            .current_dir(&self.sql_dir)
            .arg("-s")
            .arg(self.credentials.connection_string())
            .arg(format!("@{}", script.script_file()))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(EngineError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(EngineError::Timeout {
                script,
                secs: self.timeout.as_secs(),
            }),
        }
    }

    fn remove_stale_output(&self, script: QueryScript) -> Result<(), EngineError> {
        let path = self.output_path(script);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed stale output {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::Io {
                path,
                message: e.to_string(),
            }),
        }
    }

    fn clean_output(&self, script: QueryScript) {
        let path = self.output_path(script);
        match clean_blank_lines(&path) {
            Ok(true) => log::debug!("Cleaned output file {}", path.display()),
            Ok(false) => log::debug!("{} produced no {}", script, path.display()),
            Err(e) => log::warn!("Could not clean output file {}: {}", path.display(), e),
        }
    }
}

impl QueryEngine for SqlPlusEngine {
    fn sql_dir(&self) -> &Path {
        &self.sql_dir
    }

    fn run(&self, script: QueryScript, args: &[String]) -> Result<EngineOutput, EngineError> {
        if args.len() != script.arg_count() {
            return Err(EngineError::WrongArgCount {
                script,
                expected: script.arg_count(),
                got: args.len(),
            });
        }

        let script_path = self.sql_dir.join(script.script_file());
        if !script_path.is_file() {
            return Err(EngineError::MissingScript { path: script_path });
        }

        self.remove_stale_output(script)?;

        log::info!(
            "Executing: {} -s {} @{} {}",
            self.program,
            self.credentials.masked(),
            script.script_file(),
            args.join(" ")
        );

        let result = self.runtime.block_on(self.execute(script, args));
        // Partial output is cleaned even when the run failed or timed out
        self.clean_output(script);
        let output = result?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let exit_code = output.status.code();

        log::info!("{} exit status: {:?}", script, exit_code);
        if !stdout.is_empty() {
            log::debug!("{} stdout:\n{}", script, stdout);
        }
        if !stderr.is_empty() {
            log::warn!("{} stderr:\n{}", script, stderr);
        }
        for diagnostic in self.diagnostics.find_iter(&stdout) {
            log::warn!("{} reported {}", script, diagnostic.as_str());
        }

        if !output.status.success() {
            return Err(EngineError::Failed {
                script,
                exit_code,
                stderr,
            });
        }

        Ok(EngineOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
