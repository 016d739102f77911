//! Canonical intermediate store (`resumen.txt`)
//!
//! Plain text, one comma-joined record per line. Always rewritten wholesale.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};

use super::ResumenDataset;

#[derive(Debug, Clone)]
pub struct ResumenStore {
    path: PathBuf,
}

impl ResumenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the store with the raw query outputs of one file, joined by newlines
    pub fn write_raw(&self, contents: &[String]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents.join("\n"))
    }

    pub fn read_lines(&self) -> io::Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Replace the store with the canonical content of `dataset`
    pub fn overwrite(&self, dataset: &ResumenDataset) -> io::Result<()> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quote_style(QuoteStyle::Never)
            .from_path(&self.path)?;

        for record in dataset.iter() {
            writer.write_record(record.fields())?;
        }
        writer.flush()
    }
}
