//! Folds per-line query outputs into a resumen dataset

use super::{ResumenDataset, ResumenRecord, ResumenStore, canonicalize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// No non-blank line was ever appended
    EmptyInput,
    Store { path: String, message: String },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::EmptyInput => write!(f, "no resumen rows to aggregate"),
            AggregateError::Store { path, message } => {
                write!(f, "resumen store {}: {}", path, message)
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Accumulates records, then produces the canonical dataset
#[derive(Debug, Default)]
pub struct ResumenAggregator {
    records: Vec<ResumenRecord>,
    store: Option<ResumenStore>,
}

impl ResumenAggregator {
    /// Aggregator that keeps `store` in sync when duplicates are removed
    pub fn new(store: ResumenStore) -> Self {
        Self {
            records: Vec::new(),
            store: Some(store),
        }
    }

    /// Aggregator with no backing store
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Seed an aggregator with every line currently in `store`
    pub fn load(store: ResumenStore) -> Result<Self, AggregateError> {
        let lines = store.read_lines().map_err(|e| store_error(&store, e))?;
        let mut aggregator = Self::new(store);
        for line in &lines {
            aggregator.append_line(line);
        }
        log::debug!(
            "Loaded {} resumen rows from {}",
            aggregator.len(),
            aggregator.store_path()
        );
        Ok(aggregator)
    }

    pub fn append_line(&mut self, raw: &str) {
        if let Some(record) = ResumenRecord::from_line(raw) {
            self.records.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn store_path(&self) -> String {
        self.store
            .as_ref()
            .map_or_else(|| "memory".to_string(), |s| s.path().display().to_string())
    }

    /// Deduplicate, sort and persist. Calling this again without new lines
    /// yields the same dataset and leaves the store untouched.
    pub fn finalize(&mut self) -> Result<ResumenDataset, AggregateError> {
        if self.is_empty() {
            return Err(AggregateError::EmptyInput);
        }

        let original = self.records.len();
        let (dataset, removed) = canonicalize(std::mem::take(&mut self.records));
        self.records = dataset.records().to_vec();

        log::info!("Resumen rows: {} read, {} unique", original, dataset.len());

        if removed > 0 {
            log::info!("Removed {} duplicate resumen rows", removed);
            if let Some(store) = &self.store {
                store
                    .overwrite(&dataset)
                    .map_err(|e| store_error(store, e))?;
                log::debug!("Rewrote {} without duplicates", store.path().display());
            }
        }

        Ok(dataset)
    }
}

fn store_error(store: &ResumenStore, err: std::io::Error) -> AggregateError {
    AggregateError::Store {
        path: store.path().display().to_string(),
        message: err.to_string(),
    }
}
