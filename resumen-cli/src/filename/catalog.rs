//! Rating component catalog
//!
//! One token per line, order-significant. Tokens may contain the segment
//! delimiter (e.g. `TARIFA_BASICA`), which is why matching is done against
//! the whole filename rather than against individual segments.

use std::fs;
use std::path::{Path, PathBuf};

use super::FilenameError;

/// Ordered list of known rating component tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingComponentCatalog {
    entries: Vec<String>,
}

impl RatingComponentCatalog {
    /// Load the catalog from a plain text file. Blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self, FilenameError> {
        let content = fs::read_to_string(path).map_err(|e| FilenameError::CatalogUnavailable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let catalog = Self::parse(&content);
        log::debug!(
            "Loaded {} rating components from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn parse(content: &str) -> Self {
        Self::from_entries(content.lines())
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// First catalog entry (in catalog order) contained anywhere in `filename`.
    ///
    /// This is first-match-wins, not longest-match: when two entries are both
    /// substrings of the filename the one listed first is returned.
    pub fn find_in(&self, filename: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| filename.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Default catalog location inside the SQL working directory
pub fn catalog_path(sql_dir: &Path) -> PathBuf {
    sql_dir.join(crate::engine::QueryScript::RatingComponentList.output_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_skips_blank_lines_and_trims() {
        let catalog = RatingComponentCatalog::parse("TALT\n\n  TBAJ  \r\n\nTARIFA_BASICA\n");
        assert_eq!(catalog.entries(), &["TALT", "TBAJ", "TARIFA_BASICA"]);
    }

    #[test]
    fn test_find_in_is_first_match_in_catalog_order() {
        let catalog = RatingComponentCatalog::from_entries(["TARIFA_BASICA", "TARIFA"]);
        let filename = "317_114_OPER_202509_TARIFA_BASICA_R_I_20251008_182417.xls";
        assert_eq!(catalog.find_in(filename), Some("TARIFA_BASICA"));

        let reversed = RatingComponentCatalog::from_entries(["TARIFA", "TARIFA_BASICA"]);
        assert_eq!(reversed.find_in(filename), Some("TARIFA"));
    }

    #[test]
    fn test_find_in_is_not_segment_aligned() {
        let catalog = RatingComponentCatalog::from_entries(["ALT"]);
        assert_eq!(catalog.find_in("317_114_OPER_202509_TALT_R_I"), Some("ALT"));
    }

    #[test]
    fn test_find_in_no_match() {
        let catalog = RatingComponentCatalog::from_entries(["TALT"]);
        assert_eq!(catalog.find_in("317_114_OPER_202509_TBAJ_R_I"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = RatingComponentCatalog::load(&dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, FilenameError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rating_component_list.csv");
        fs::write(&path, "TALT\nTBAJ\n").unwrap();

        let catalog = RatingComponentCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
