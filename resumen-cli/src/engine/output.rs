//! Reading the CSV files produced by the query engine

use std::fs;
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use super::EngineError;

/// Columns a rates line needs before enrichment arguments can be taken from it
pub const RATES_MIN_COLUMNS: usize = 11;

/// Rates columns (0-based) feeding the resumen script, in argument order
const ENRICHMENT_COLUMNS: [usize; 10] = [7, 8, 0, 1, 2, 4, 3, 5, 9, 10];

/// Drop blank lines from a spooled CSV in place. Returns false when the file
/// does not exist.
pub fn clean_blank_lines(path: &Path) -> io::Result<bool> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let cleaned: String = content
        .split_inclusive('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();
    if cleaned.len() != content.len() {
        fs::write(path, cleaned)?;
    }
    Ok(true)
}

/// Non-blank lines of the rates search output
pub fn read_rates_lines(path: &Path) -> Result<Vec<String>, EngineError> {
    let content = read_existing(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Whole trimmed content of a per-line output, `None` when it is empty
pub fn read_output_content(path: &Path) -> Result<Option<String>, EngineError> {
    let content = read_existing(path)?;
    let trimmed = content.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Arguments for the resumen script taken from one rates line.
/// `line_number` is 1-based and only used for error reporting.
pub fn enrichment_args(line: &str, line_number: usize) -> Result<Vec<String>, EngineError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(line.trim().as_bytes());

    let record = match reader.records().next() {
        Some(Ok(record)) => record,
        Some(Err(_)) | None => {
            return Err(EngineError::MalformedRatesLine {
                line: line_number,
                columns: 0,
            });
        }
    };

    if record.len() < RATES_MIN_COLUMNS {
        return Err(EngineError::MalformedRatesLine {
            line: line_number,
            columns: record.len(),
        });
    }

    Ok(ENRICHMENT_COLUMNS
        .iter()
        .map(|&col| record.get(col).unwrap_or_default().to_string())
        .collect())
}

fn read_existing(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::OutputMissing {
                path: path.to_path_buf(),
            }
        } else {
            EngineError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    })
}
