//! External query engine
//!
//! The engine runs a named SQL script with positional arguments and, as a
//! side effect, spools its result set to a CSV file next to the script.

pub mod output;
pub mod sqlplus;

pub use output::{enrichment_args, read_output_content, read_rates_lines};
pub use sqlplus::SqlPlusEngine;

use std::path::{Path, PathBuf};

/// Scripts the pipeline knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScript {
    RatingComponentList,
    RatesInfoSearch,
    ResumenInfo,
}

impl QueryScript {
    pub fn script_file(&self) -> &'static str {
        match self {
            QueryScript::RatingComponentList => "rating_component_list.sql",
            QueryScript::RatesInfoSearch => "rates_info_search.sql",
            QueryScript::ResumenInfo => "generate_resumen_infos.sql",
        }
    }

    /// CSV the script spools into the SQL directory
    pub fn output_file(&self) -> &'static str {
        match self {
            QueryScript::RatingComponentList => "rating_component_list.csv",
            QueryScript::RatesInfoSearch => "rates_info_search.csv",
            QueryScript::ResumenInfo => "generate_resumen_infos.csv",
        }
    }

    pub fn arg_count(&self) -> usize {
        match self {
            QueryScript::RatingComponentList => 0,
            QueryScript::RatesInfoSearch => 5,
            QueryScript::ResumenInfo => 10,
        }
    }
}

impl std::fmt::Display for QueryScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.script_file())
    }
}

/// Captured result of one successful engine invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    MissingScript { path: PathBuf },
    WrongArgCount { script: QueryScript, expected: usize, got: usize },
    Spawn { program: String, message: String },
    Timeout { script: QueryScript, secs: u64 },
    Failed { script: QueryScript, exit_code: Option<i32>, stderr: String },
    OutputMissing { path: PathBuf },
    MalformedRatesLine { line: usize, columns: usize },
    Io { path: PathBuf, message: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingScript { path } => {
                write!(f, "SQL script not found: {}", path.display())
            }
            EngineError::WrongArgCount { script, expected, got } => {
                write!(f, "{} takes {} arguments, got {}", script, expected, got)
            }
            EngineError::Spawn { program, message } => {
                write!(f, "failed to start {}: {}", program, message)
            }
            EngineError::Timeout { script, secs } => {
                write!(f, "{} timed out after {}s", script, secs)
            }
            EngineError::Failed { script, exit_code, stderr } => {
                let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                if stderr.is_empty() {
                    write!(f, "{} exited with {}", script, code)
                } else {
                    write!(f, "{} exited with {}: {}", script, code, stderr)
                }
            }
            EngineError::OutputMissing { path } => {
                write!(f, "query output not found: {}", path.display())
            }
            EngineError::MalformedRatesLine { line, columns } => write!(
                f,
                "rates line {} has {} columns, expected at least {}",
                line,
                columns,
                output::RATES_MIN_COLUMNS
            ),
            EngineError::Io { path, message } => write!(f, "{}: {}", path.display(), message),
        }
    }
}

impl std::error::Error for EngineError {}

/// Blocking access to the query engine
pub trait QueryEngine {
    /// Directory holding the scripts and their CSV outputs
    fn sql_dir(&self) -> &Path;

    fn run(&self, script: QueryScript, args: &[String]) -> Result<EngineOutput, EngineError>;

    fn output_path(&self, script: QueryScript) -> PathBuf {
        self.sql_dir().join(script.output_file())
    }
}
