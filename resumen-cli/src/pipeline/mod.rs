//! Batch orchestration
//!
//! For every input document: parse its filename, search its rates, run the
//! resumen script once per rates line, aggregate the outputs and replace the
//! document's summary sheet. Files are processed one after another; each one
//! yields a [`FileOutcome`] and a failure never stops the batch.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Local};

use crate::config::Config;
use crate::engine::{
    EngineError, QueryEngine, QueryScript, enrichment_args, read_output_content, read_rates_lines,
};
use crate::filename::{FilenameError, FilenameKey, FilenameParser, RatingComponentCatalog};
use crate::resumen::{AggregateError, ResumenAggregator, ResumenStore};
use crate::sheet::{ReplacementEngine, ReplacementError, ReplacementReport};

const INPUT_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];
const LOCK_FILE_PREFIX: &str = "~$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Filename(FilenameError),
    Engine(EngineError),
    Aggregate(AggregateError),
    Replacement(ReplacementError),
    ReferenceFileMissing { path: PathBuf },
    InvalidPath { path: PathBuf },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Filename(e) => write!(f, "{}", e),
            PipelineError::Engine(e) => write!(f, "query engine: {}", e),
            PipelineError::Aggregate(e) => write!(f, "{}", e),
            PipelineError::Replacement(e) => write!(f, "sheet replacement: {}", e),
            PipelineError::ReferenceFileMissing { path } => {
                write!(f, "reference file not found: {}", path.display())
            }
            PipelineError::InvalidPath { path } => {
                write!(f, "not a usable file name: {}", path.display())
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<FilenameError> for PipelineError {
    fn from(err: FilenameError) -> Self {
        PipelineError::Filename(err)
    }
}

impl From<EngineError> for PipelineError {
    fn from(err: EngineError) -> Self {
        PipelineError::Engine(err)
    }
}

impl From<AggregateError> for PipelineError {
    fn from(err: AggregateError) -> Self {
        PipelineError::Aggregate(err)
    }
}

impl From<ReplacementError> for PipelineError {
    fn from(err: ReplacementError) -> Self {
        PipelineError::Replacement(err)
    }
}

/// What happened to one successfully processed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub key: FilenameKey,
    pub rates_lines: usize,
    /// Rates lines that produced no resumen content
    pub skipped_lines: usize,
    pub replacement: ReplacementReport,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub result: Result<FileReport, PipelineError>,
}

pub struct Pipeline<E: QueryEngine> {
    engine: E,
    parser: FilenameParser,
    store: ResumenStore,
    replacement: ReplacementEngine,
}

impl<E: QueryEngine> Pipeline<E> {
    pub fn new(engine: E, config: &Config) -> Self {
        let parser = FilenameParser::new(engine.output_path(QueryScript::RatingComponentList));
        Self {
            engine,
            parser,
            store: ResumenStore::new(config.paths.resumen_store.clone()),
            replacement: ReplacementEngine::new(&config.sheet, &config.paths),
        }
    }

    /// Regenerate the rating component catalog from the database
    pub fn refresh_catalog(&self) -> Result<RatingComponentCatalog, PipelineError> {
        log::info!("Updating rating component list");
        self.engine.run(QueryScript::RatingComponentList, &[])?;
        let catalog = self.load_catalog()?;
        if catalog.is_empty() {
            log::warn!(
                "Rating component list is empty: {}",
                self.parser.catalog_path().display()
            );
        }
        log::info!("Rating component list updated ({} entries)", catalog.len());
        Ok(catalog)
    }

    /// Catalog currently on disk
    pub fn load_catalog(&self) -> Result<RatingComponentCatalog, PipelineError> {
        RatingComponentCatalog::load(self.parser.catalog_path()).map_err(|e| match e {
            FilenameError::CatalogUnavailable { path, .. } => {
                PipelineError::ReferenceFileMissing { path }
            }
            other => PipelineError::Filename(other),
        })
    }

    /// Lazily process `files`, one outcome per file
    pub fn batch(&self, files: Vec<PathBuf>) -> BatchRun<'_, E> {
        BatchRun {
            pipeline: self,
            files: files.into_iter(),
        }
    }

    /// Process every file and collect the outcomes
    pub fn run_batch(&self, files: Vec<PathBuf>) -> BatchReport {
        let started = Local::now();
        let clock = Instant::now();

        let mut report = BatchReport {
            sheet_name: self.replacement.sheet_name().to_string(),
            started,
            elapsed: Duration::ZERO,
            processed: Vec::new(),
            failed: Vec::new(),
        };
        for outcome in self.batch(files) {
            match outcome.result {
                Ok(file_report) => report.processed.push((outcome.file, file_report)),
                Err(err) => report.failed.push((outcome.file, err)),
            }
        }
        report.elapsed = clock.elapsed();
        report
    }

    pub fn process_file(&self, path: &Path) -> Result<FileReport, PipelineError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PipelineError::InvalidPath {
                path: path.to_path_buf(),
            })?;
        log::info!("Processing file: {}", file_name);

        let key = self.parser.parse(file_name)?;
        log::info!(
            "{}: franchise={} operator={} period={} rating_component={} direction={}",
            file_name,
            key.franchise,
            key.operator,
            key.period,
            key.rating_component,
            key.direction
        );

        self.engine.run(QueryScript::RatesInfoSearch, &key.query_args())?;
        let rates = read_rates_lines(&self.engine.output_path(QueryScript::RatesInfoSearch))?;
        if rates.is_empty() {
            log::warn!("{}: rates search returned no lines", file_name);
            return Err(AggregateError::EmptyInput.into());
        }
        log::info!("{}: {} rates lines", file_name, rates.len());

        let contents = self.collect_resumen_contents(file_name, &rates);
        if contents.is_empty() {
            return Err(AggregateError::EmptyInput.into());
        }
        let skipped_lines = rates.len() - contents.len();

        self.store
            .write_raw(&contents)
            .map_err(|e| AggregateError::Store {
                path: self.store.path().display().to_string(),
                message: e.to_string(),
            })?;
        let dataset = ResumenAggregator::load(self.store.clone())?.finalize()?;

        let replacement = self.replacement.replace(path, &dataset)?;
        log::info!(
            "{}: sheet '{}' written with {} rows",
            file_name,
            self.replacement.sheet_name(),
            replacement.rows
        );

        Ok(FileReport {
            key,
            rates_lines: rates.len(),
            skipped_lines,
            replacement,
        })
    }

    /// Run the resumen script per rates line. Lines that fail or produce
    /// nothing are logged and left out.
    fn collect_resumen_contents(&self, file_name: &str, rates: &[String]) -> Vec<String> {
        let output = self.engine.output_path(QueryScript::ResumenInfo);
        let mut contents = Vec::with_capacity(rates.len());

        for (idx, line) in rates.iter().enumerate() {
            let line_number = idx + 1;
            let args = match enrichment_args(line, line_number) {
                Ok(args) => args,
                Err(e) => {
                    log::warn!("{}: skipping {}", file_name, e);
                    continue;
                }
            };

            if let Err(e) = self.engine.run(QueryScript::ResumenInfo, &args) {
                log::error!("{}: rates line {}: {}", file_name, line_number, e);
                continue;
            }

            match read_output_content(&output) {
                Ok(Some(content)) => {
                    log::debug!("{}: rates line {} processed", file_name, line_number);
                    contents.push(content);
                }
                Ok(None) => log::warn!(
                    "{}: rates line {} generated empty content",
                    file_name,
                    line_number
                ),
                Err(e) => log::warn!("{}: rates line {}: {}", file_name, line_number, e),
            }
        }

        contents
    }
}

pub struct BatchRun<'p, E: QueryEngine> {
    pipeline: &'p Pipeline<E>,
    files: std::vec::IntoIter<PathBuf>,
}

impl<E: QueryEngine> Iterator for BatchRun<'_, E> {
    type Item = FileOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        let result = self.pipeline.process_file(&file);
        match &result {
            Err(PipelineError::Replacement(e)) => {
                log::error!(
                    "Error processing file {} at stage {}: {}",
                    file.display(),
                    e.cause().stage,
                    e
                );
            }
            Err(e) => log::error!("Error processing file {}: {}", file.display(), e),
            Ok(_) => {}
        }
        Some(FileOutcome { file, result })
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub sheet_name: String,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
    pub processed: Vec<(PathBuf, FileReport)>,
    pub failed: Vec<(PathBuf, PipelineError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    /// `(success, message)`; a batch succeeds when at least one file was processed
    pub fn summary(&self) -> (bool, String) {
        if self.processed.is_empty() {
            (false, "No files were processed successfully".to_string())
        } else {
            (
                true,
                format!(
                    "Successfully processed {} of {} files with {} sheets",
                    self.processed.len(),
                    self.total(),
                    self.sheet_name
                ),
            )
        }
    }
}

/// Spreadsheet documents directly inside `dir`, sorted by name
pub fn discover_inputs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.exists() {
        anyhow::bail!("Directory does not exist: {}", dir.display());
    }
    if !dir.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && is_input_document(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_input_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::engine::EngineOutput;
    use crate::sheet::workbook::{CellValue, read_document, sheet_names};
    use rust_xlsxwriter::Workbook;
    use std::cell::RefCell;
    use tempfile::{TempDir, tempdir};

    const AIRTIME: &str = "317_114_AIRTIME_TECHNOLOGIES_CHILE_SPA_202509_TALT_R_I_20251008_182417.xls";
    const JAN_RATES: &str = "SMS,TALT,R,01-JAN-24,X,31-JAN-24,Y,317,114,12.5,100,Z";
    const FEB_RATES: &str = "SMS,TALT,R,01-FEB-24,X,28-FEB-24,Y,317,114,10.0,80,Z";

    struct FakeEngine {
        sql_dir: PathBuf,
        catalog: Option<String>,
        rates: String,
        /// Resumen runs whose service argument equals this fail
        failing_service: Option<String>,
        calls: RefCell<Vec<(QueryScript, Vec<String>)>>,
    }

    impl FakeEngine {
        fn calls_of(&self, script: QueryScript) -> Vec<Vec<String>> {
            self.calls
                .borrow()
                .iter()
                .filter(|(s, _)| *s == script)
                .map(|(_, args)| args.clone())
                .collect()
        }
    }

    impl QueryEngine for FakeEngine {
        fn sql_dir(&self) -> &Path {
            &self.sql_dir
        }

        fn run(&self, script: QueryScript, args: &[String]) -> Result<EngineOutput, EngineError> {
            self.calls.borrow_mut().push((script, args.to_vec()));
            let failed = EngineError::Failed {
                script,
                exit_code: Some(1),
                stderr: "ORA-12154: TNS:could not resolve".to_string(),
            };

            let content = match script {
                QueryScript::RatingComponentList => self.catalog.clone().ok_or(failed)?,
                QueryScript::RatesInfoSearch => self.rates.clone(),
                QueryScript::ResumenInfo => {
                    if self.failing_service.as_deref() == args.get(2).map(String::as_str) {
                        return Err(failed);
                    }
                    format!("{}\n", args.join(","))
                }
            };
            fs::write(self.output_path(script), content).map_err(|e| EngineError::Io {
                path: self.output_path(script),
                message: e.to_string(),
            })?;
            Ok(EngineOutput::default())
        }
    }

    fn make_pipeline(dir: &TempDir, rates: &[&str]) -> Pipeline<FakeEngine> {
        let sql_dir = dir.path().join("SQL_files");
        fs::create_dir_all(&sql_dir).unwrap();
        fs::write(sql_dir.join("rating_component_list.csv"), "TALT\n").unwrap();

        let config = Config {
            paths: PathsConfig {
                sql_dir: sql_dir.clone(),
                backup_dir: dir.path().join("Backup_files"),
                resumen_store: dir.path().join("resumen.txt"),
                ..PathsConfig::default()
            },
            ..Config::default()
        };
        let engine = FakeEngine {
            sql_dir,
            catalog: Some("TARIFA_BASICA\nTALT\n".to_string()),
            rates: rates.join("\n"),
            failing_service: None,
            calls: RefCell::new(Vec::new()),
        };
        Pipeline::new(engine, &config)
    }

    fn make_document(dir: &TempDir, name: &str) -> PathBuf {
        let input = dir.path().join("input");
        fs::create_dir_all(&input).unwrap();
        let path = input.join(name);
        let mut book = Workbook::new();
        let ws = book.add_worksheet();
        ws.set_name("Detalle").unwrap();
        ws.write_string(0, 0, "SUBTOTAL").unwrap();
        book.save(&path).unwrap();
        path
    }

    fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::Text(value.to_string()))
    }

    #[test]
    fn test_process_file_end_to_end() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[JAN_RATES, FEB_RATES, JAN_RATES, "too,short"]);
        let path = make_document(&dir, AIRTIME);

        let report = pipeline.process_file(&path).unwrap();
        assert_eq!(report.rates_lines, 4);
        assert_eq!(report.skipped_lines, 1);
        assert_eq!(report.replacement.rows, 2);

        let rates_calls = pipeline.engine.calls_of(QueryScript::RatesInfoSearch);
        assert_eq!(rates_calls, vec![vec!["317", "114", "202509", "TALT", "I"]]);

        let resumen_calls = pipeline.engine.calls_of(QueryScript::ResumenInfo);
        assert_eq!(resumen_calls.len(), 3);
        assert_eq!(
            resumen_calls[0],
            vec!["317", "114", "SMS", "TALT", "R", "X", "01-JAN-24", "31-JAN-24", "12.5", "100"]
        );

        assert_eq!(sheet_names(&path).unwrap(), vec!["Detalle", "Resumen"]);
        let sheets = read_document(&path).unwrap();
        assert_eq!(sheets[1].get(1, 6).cloned(), text("01-FEB-24"));
        assert_eq!(sheets[1].get(2, 6).cloned(), text("01-JAN-24"));
        assert_eq!(sheets[1].get(3, 0), None);

        // duplicates were removed, so the store holds the canonical rows
        let store = fs::read_to_string(dir.path().join("resumen.txt")).unwrap();
        assert_eq!(store.lines().count(), 2);
    }

    #[test]
    fn test_batch_continues_after_failed_file() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[JAN_RATES]);
        let bad = make_document(&dir, "bad.xls");
        let good = make_document(&dir, AIRTIME);

        let outcomes: Vec<FileOutcome> = pipeline.batch(vec![bad.clone(), good.clone()]).collect();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].result,
            Err(PipelineError::Filename(FilenameError::MalformedFilename { .. }))
        ));
        assert!(outcomes[1].result.is_ok());

        // the failed document was never touched
        assert_eq!(sheet_names(&bad).unwrap(), vec!["Detalle"]);
    }

    #[test]
    fn test_run_batch_summary() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[JAN_RATES]);
        let bad = make_document(&dir, "bad.xls");
        let good = make_document(&dir, AIRTIME);

        let report = pipeline.run_batch(vec![bad, good]);
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.failed.len(), 1);

        let (success, message) = report.summary();
        assert!(success);
        assert_eq!(message, "Successfully processed 1 of 2 files with Resumen sheets");
    }

    #[test]
    fn test_summary_fails_without_processed_files() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[JAN_RATES]);
        let report = pipeline.run_batch(vec![make_document(&dir, "bad.xls")]);

        let (success, message) = report.summary();
        assert!(!success);
        assert_eq!(message, "No files were processed successfully");
    }

    #[test]
    fn test_no_rates_lines_is_empty_input() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &["", "   "]);
        let path = make_document(&dir, AIRTIME);

        let err = pipeline.process_file(&path).unwrap_err();
        assert_eq!(err, PipelineError::Aggregate(AggregateError::EmptyInput));
        assert!(pipeline.engine.calls_of(QueryScript::ResumenInfo).is_empty());
    }

    #[test]
    fn test_every_resumen_line_failing_is_empty_input() {
        let dir = tempdir().unwrap();
        let mut pipeline = make_pipeline(&dir, &[JAN_RATES, FEB_RATES]);
        pipeline.engine.failing_service = Some("SMS".to_string());
        let path = make_document(&dir, AIRTIME);

        let err = pipeline.process_file(&path).unwrap_err();
        assert_eq!(err, PipelineError::Aggregate(AggregateError::EmptyInput));
        assert_eq!(sheet_names(&path).unwrap(), vec!["Detalle"]);
    }

    #[test]
    fn test_missing_catalog_fails_the_file() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[JAN_RATES]);
        fs::remove_file(dir.path().join("SQL_files").join("rating_component_list.csv")).unwrap();
        let path = make_document(&dir, AIRTIME);

        assert!(matches!(
            pipeline.process_file(&path),
            Err(PipelineError::Filename(FilenameError::CatalogUnavailable { .. }))
        ));
        assert!(matches!(
            pipeline.load_catalog(),
            Err(PipelineError::ReferenceFileMissing { .. })
        ));
    }

    #[test]
    fn test_refresh_catalog() {
        let dir = tempdir().unwrap();
        let pipeline = make_pipeline(&dir, &[]);

        let catalog = pipeline.refresh_catalog().unwrap();
        assert_eq!(catalog.entries(), &["TARIFA_BASICA", "TALT"]);
    }

    #[test]
    fn test_refresh_catalog_engine_failure() {
        let dir = tempdir().unwrap();
        let mut pipeline = make_pipeline(&dir, &[]);
        pipeline.engine.catalog = None;

        assert!(matches!(
            pipeline.refresh_catalog(),
            Err(PipelineError::Engine(EngineError::Failed { .. }))
        ));
    }

    #[test]
    fn test_discover_inputs_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["b.xls", "a.XLSX", "~$a.xlsx", "notes.txt", "c.xlsm"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.xls")).unwrap();

        let names: Vec<String> = discover_inputs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.XLSX", "b.xls"]);
    }

    #[test]
    fn test_discover_inputs_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(discover_inputs(&dir.path().join("missing")).is_err());
    }
}
