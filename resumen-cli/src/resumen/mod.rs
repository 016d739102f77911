//! Resumen dataset: deduplicated, date-sorted tariff tier rows

pub mod aggregator;
pub mod store;

pub use aggregator::{AggregateError, ResumenAggregator};
pub use store::ResumenStore;

use serde::Serialize;
use std::collections::HashSet;

pub const FIELD_DELIMITER: char = ',';

/// Column names of a resumen row, in field order
pub const RESUMEN_HEADERS: [&str; 10] = [
    "IDD_CONCESION",
    "IDD_OPERADOR",
    "SERVICIO",
    "PERIODO",
    "TIPO_TARIFA",
    "FECHA_INICIO",
    "FECHA_FIN",
    "TARIFA",
    "VALOR",
    "CANTIDAD",
];

/// Positions of the two sort columns
const SORT_KEY_COLUMNS: (usize, usize) = (6, 7);

/// One tariff tier row, fields kept as the query engine printed them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResumenRecord {
    fields: Vec<String>,
}

impl ResumenRecord {
    /// Split a raw CSV line. Returns `None` for a blank line.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(Self::from_fields(line.split(FIELD_DELIMITER).map(str::trim)))
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Sort key: the 7th and 8th fields compared as plain strings.
    /// Rows too short to carry both sort as `("", "")`.
    pub fn sort_key(&self) -> (&str, &str) {
        let (first, second) = SORT_KEY_COLUMNS;
        if self.fields.len() > second {
            (self.fields[first].as_str(), self.fields[second].as_str())
        } else {
            ("", "")
        }
    }
}

/// Unique records ordered by [`ResumenRecord::sort_key`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResumenDataset {
    records: Vec<ResumenRecord>,
}

impl ResumenDataset {
    /// Deduplicate and sort `records`
    #[cfg(test)]
    pub fn from_records(records: Vec<ResumenRecord>) -> Self {
        canonicalize(records).0
    }

    pub fn records(&self) -> &[ResumenRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResumenRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Drop exact duplicates (first occurrence kept) and stable-sort by date key.
/// Returns the dataset and how many duplicates were removed.
pub(crate) fn canonicalize(records: Vec<ResumenRecord>) -> (ResumenDataset, usize) {
    let original = records.len();
    let mut seen = HashSet::new();
    let mut unique: Vec<ResumenRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect();
    let removed = original - unique.len();

    unique.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    (ResumenDataset { records: unique }, removed)
}
