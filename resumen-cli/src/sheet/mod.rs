//! Resumen sheet replacement
//!
//! Replacing the summary sheet of a document runs through
//! `Inspect -> Backup -> [Strip] -> Rebuild -> Commit`. Each transition is a
//! separate method returning a result; [`ReplacementEngine::replace`] drives
//! them and, on any failure after the backup, restores the document from the
//! [`BackupArtifact`] it was handed.
//!
//! The document path itself is only written by Strip and Commit, each time
//! as a whole-file atomic replacement.

pub mod formatting;
pub mod workbook;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rust_xlsxwriter::Workbook;

use crate::config::{PathsConfig, SheetConfig};
use crate::resumen::{RESUMEN_HEADERS, ResumenDataset};
use formatting::{COLUMN_WIDTHS, column_width_chars, create_data_format, create_header_format};
use workbook::SheetValues;

/// Position in the replacement state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementState {
    Inspect,
    Backup,
    Strip,
    Rebuild,
    Commit,
    Committed,
    RolledBack,
}

impl std::fmt::Display for ReplacementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReplacementState::Inspect => "inspect",
            ReplacementState::Backup => "backup",
            ReplacementState::Strip => "strip",
            ReplacementState::Rebuild => "rebuild",
            ReplacementState::Commit => "commit",
            ReplacementState::Committed => "committed",
            ReplacementState::RolledBack => "rolled back",
        };
        write!(f, "{}", name)
    }
}

/// Failure of a single transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: ReplacementState,
    pub message: String,
}

impl StageError {
    fn new(stage: ReplacementState, err: anyhow::Error) -> Self {
        Self {
            stage,
            message: format!("{:#}", err),
        }
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for StageError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementError {
    /// Inspect or Backup failed; the document was never modified
    Unmodified { path: PathBuf, cause: StageError },
    /// A later stage failed and the document was restored from its backup
    RolledBack { path: PathBuf, cause: StageError },
    /// A later stage failed and restoring the backup failed as well
    RollbackFailed {
        path: PathBuf,
        cause: StageError,
        restore: String,
    },
}

impl ReplacementError {
    pub fn cause(&self) -> &StageError {
        match self {
            ReplacementError::Unmodified { cause, .. }
            | ReplacementError::RolledBack { cause, .. }
            | ReplacementError::RollbackFailed { cause, .. } => cause,
        }
    }
}

impl std::fmt::Display for ReplacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplacementError::Unmodified { path, cause } => {
                write!(f, "{}: {} (file untouched)", path.display(), cause)
            }
            ReplacementError::RolledBack { path, cause } => {
                write!(f, "{}: {} (restored from backup)", path.display(), cause)
            }
            ReplacementError::RollbackFailed {
                path,
                cause,
                restore,
            } => write!(
                f,
                "{}: {}; restoring the backup also failed: {}",
                path.display(),
                cause,
                restore
            ),
        }
    }
}

impl std::error::Error for ReplacementError {}

/// Result of the Inspect state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub path: PathBuf,
    pub sheet_names: Vec<String>,
    pub has_summary: bool,
    /// Source is a BIFF (`.xls`) workbook; it is committed as OOXML content
    pub legacy_format: bool,
}

/// Copy of the original document taken before any mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub original: PathBuf,
    pub backup: PathBuf,
}

/// Serialized document produced by Rebuild, not yet on disk
#[derive(Debug, Clone)]
pub struct RebuiltDocument {
    bytes: Vec<u8>,
    pub sheet_names: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementReport {
    pub path: PathBuf,
    pub backup: PathBuf,
    /// Whether a previous summary sheet had to be stripped first
    pub replaced_existing: bool,
    pub rows: usize,
    pub sheet_names: Vec<String>,
}

pub struct ReplacementEngine {
    sheet_name: String,
    backup_dir: PathBuf,
}

impl ReplacementEngine {
    pub fn new(sheet: &SheetConfig, paths: &PathsConfig) -> Self {
        Self {
            sheet_name: sheet.name.clone(),
            backup_dir: paths.backup_dir.clone(),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Run the whole state machine for one document
    pub fn replace(
        &self,
        path: &Path,
        dataset: &ResumenDataset,
    ) -> Result<ReplacementReport, ReplacementError> {
        let unmodified = |cause| ReplacementError::Unmodified {
            path: path.to_path_buf(),
            cause,
        };

        let inspection = self.inspect(path).map_err(unmodified)?;
        let backup = self.backup(&inspection).map_err(unmodified)?;

        match self.mutate(&inspection, dataset) {
            Ok((rows, sheet_names)) => {
                log::debug!("{}: {}", path.display(), ReplacementState::Committed);
                Ok(ReplacementReport {
                    path: path.to_path_buf(),
                    backup: backup.backup.clone(),
                    replaced_existing: inspection.has_summary,
                    rows,
                    sheet_names,
                })
            }
            Err(cause) => {
                log::error!("{}: {}", path.display(), cause);
                match self.rollback(&backup) {
                    Ok(()) => {
                        log::warn!(
                            "{}: {}, original file restored",
                            path.display(),
                            ReplacementState::RolledBack
                        );
                        Err(ReplacementError::RolledBack {
                            path: path.to_path_buf(),
                            cause,
                        })
                    }
                    Err(restore) => Err(ReplacementError::RollbackFailed {
                        path: path.to_path_buf(),
                        cause,
                        restore: restore.message,
                    }),
                }
            }
        }
    }

    fn mutate(
        &self,
        inspection: &Inspection,
        dataset: &ResumenDataset,
    ) -> Result<(usize, Vec<String>), StageError> {
        if inspection.has_summary {
            log::warn!(
                "Sheet '{}' already exists in {}, removing it first",
                self.sheet_name,
                inspection.path.display()
            );
            self.strip(inspection)?;
        }

        let rebuilt = self.rebuild(&inspection.path, dataset)?;
        let outcome = (rebuilt.rows, rebuilt.sheet_names.clone());
        self.commit(&inspection.path, rebuilt)?;
        Ok(outcome)
    }

    /// Inspect: open read-only and list the sheets
    pub fn inspect(&self, path: &Path) -> Result<Inspection, StageError> {
        let info = workbook::inspect_document(path)
            .map_err(|e| StageError::new(ReplacementState::Inspect, e))?;
        let sheet_names = info.sheet_names;
        let has_summary = sheet_names.iter().any(|name| self.is_summary(name));

        if info.legacy_biff {
            log::warn!(
                "{} is a legacy BIFF workbook; it will be saved as OOXML content under the same name",
                path.display()
            );
        }

        log::debug!(
            "{} has sheets {:?} (summary present: {})",
            path.display(),
            sheet_names,
            has_summary
        );

        Ok(Inspection {
            path: path.to_path_buf(),
            sheet_names,
            has_summary,
            legacy_format: info.legacy_biff,
        })
    }

    /// Backup: copy the untouched original under its own file name
    pub fn backup(&self, inspection: &Inspection) -> Result<BackupArtifact, StageError> {
        let stage_err = |e| StageError::new(ReplacementState::Backup, e);
        let original = &inspection.path;

        let file_name = original
            .file_name()
            .with_context(|| format!("No file name in {}", original.display()))
            .map_err(stage_err)?;

        fs::create_dir_all(&self.backup_dir)
            .with_context(|| format!("Failed to create {}", self.backup_dir.display()))
            .map_err(stage_err)?;

        let backup = self.backup_dir.join(file_name);
        if same_file(original, &backup) {
            return Err(StageError {
                stage: ReplacementState::Backup,
                message: format!(
                    "backup directory {} contains the original file",
                    self.backup_dir.display()
                ),
            });
        }

        fs::copy(original, &backup)
            .with_context(|| format!("Failed to copy {} to {}", original.display(), backup.display()))
            .map_err(stage_err)?;

        log::info!("Backup created: {}", backup.display());
        Ok(BackupArtifact {
            original: original.clone(),
            backup,
        })
    }

    /// Strip: persist the document without its summary sheet, other sheets values only
    pub fn strip(&self, inspection: &Inspection) -> Result<(), StageError> {
        let stage_err = |e| StageError::new(ReplacementState::Strip, e);
        let path = &inspection.path;

        let remaining = self.sheets_without_summary(path).map_err(stage_err)?;
        if remaining.is_empty() {
            // An OOXML workbook needs at least one sheet; Rebuild drops the old summary anyway
            log::debug!("{} holds only the summary sheet, nothing to strip", path.display());
            return Ok(());
        }

        let bytes = workbook::build_document(&remaining).map_err(stage_err)?;
        workbook::write_atomically(path, &bytes).map_err(stage_err)?;

        log::info!(
            "Removed sheet '{}' from {} ({} sheets kept)",
            self.sheet_name,
            path.display(),
            remaining.len()
        );
        Ok(())
    }

    /// Rebuild: existing sheets plus a fresh summary sheet, serialized in memory
    pub fn rebuild(&self, path: &Path, dataset: &ResumenDataset) -> Result<RebuiltDocument, StageError> {
        let stage_err = |e| StageError::new(ReplacementState::Rebuild, e);
        if dataset.is_empty() {
            log::warn!(
                "Writing sheet '{}' without data rows to {}",
                self.sheet_name,
                path.display()
            );
        }

        let existing = self.sheets_without_summary(path).map_err(stage_err)?;
        let mut book = Workbook::new();
        for sheet in &existing {
            workbook::copy_sheet(&mut book, sheet).map_err(stage_err)?;
        }
        self.write_summary_sheet(&mut book, dataset).map_err(stage_err)?;

        let bytes = book
            .save_to_buffer()
            .context("Failed to serialize workbook")
            .map_err(stage_err)?;

        let mut sheet_names: Vec<String> = existing.into_iter().map(|s| s.name).collect();
        sheet_names.push(self.sheet_name.clone());

        Ok(RebuiltDocument {
            bytes,
            sheet_names,
            rows: dataset.len(),
        })
    }

    fn write_summary_sheet(&self, book: &mut Workbook, dataset: &ResumenDataset) -> anyhow::Result<()> {
        let header_format = create_header_format();
        let data_format = create_data_format();

        let sheet = book.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        for (col, header) in RESUMEN_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (idx, record) in dataset.iter().enumerate() {
            let row = u32::try_from(idx + 1).context("Too many resumen rows")?;
            for (col, value) in record.fields().iter().take(RESUMEN_HEADERS.len()).enumerate() {
                sheet
                    .write_string_with_format(row, col as u16, value, &data_format)
                    .with_context(|| format!("Failed to write resumen row {}", row))?;
            }
        }

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, column_width_chars(*width))?;
        }
        Ok(())
    }

    /// Commit: atomically write the rebuilt document, then check it has one summary sheet
    pub fn commit(&self, path: &Path, rebuilt: RebuiltDocument) -> Result<(), StageError> {
        let stage_err = |e| StageError::new(ReplacementState::Commit, e);

        workbook::write_atomically(path, &rebuilt.bytes).map_err(stage_err)?;

        let names = workbook::sheet_names(path).map_err(stage_err)?;
        let summaries = names.iter().filter(|n| self.is_summary(n)).count();
        if summaries != 1 {
            return Err(StageError {
                stage: ReplacementState::Commit,
                message: format!(
                    "committed document has {} '{}' sheets, expected 1",
                    summaries, self.sheet_name
                ),
            });
        }

        log::info!(
            "Added sheet '{}' with {} rows to {}",
            self.sheet_name,
            rebuilt.rows,
            path.display()
        );
        Ok(())
    }

    /// RolledBack: put the original back from its backup copy
    pub fn rollback(&self, backup: &BackupArtifact) -> Result<(), StageError> {
        fs::copy(&backup.backup, &backup.original)
            .with_context(|| {
                format!(
                    "Failed to restore {} from {}",
                    backup.original.display(),
                    backup.backup.display()
                )
            })
            .map_err(|e| StageError::new(ReplacementState::RolledBack, e))?;
        Ok(())
    }

    fn sheets_without_summary(&self, path: &Path) -> anyhow::Result<Vec<SheetValues>> {
        Ok(workbook::read_document(path)?
            .into_iter()
            .filter(|sheet| !self.is_summary(&sheet.name))
            .collect())
    }

    /// Sheet names compare case-insensitively, as in Excel
    fn is_summary(&self, name: &str) -> bool {
        name.to_lowercase() == self.sheet_name.to_lowercase()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
