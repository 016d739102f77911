//! Filename token parser
//!
//! Recovers the business key (franchise, operator, period, rating component,
//! direction) from a liquidation filename such as
//! `317_114_AIRTIME_TECHNOLOGIES_CHILE_SPA_202509_TALT_R_I_20251008_182417.xls`.
//!
//! Operator names contribute a variable number of segments, and so do rating
//! components containing the delimiter. Both are absorbed by shifting the
//! positional offsets; the shift arithmetic lives in [`locate_fields`].

pub mod catalog;
pub mod omv;

pub use catalog::RatingComponentCatalog;
pub use omv::OmvMarker;

use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SEGMENT_DELIMITER: char = '_';

/// Fewest segments a filename may have before any offset is computed
pub const MIN_SEGMENTS: usize = 5;

/// Segment count of a filename with a single-token operator name
const BASE_SEGMENTS: usize = 8;
/// Same, for filenames carrying an OMV marker segment
const BASE_SEGMENTS_OMV: usize = 9;

/// Business key derived from a filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilenameKey {
    pub franchise: String,
    pub operator: String,
    pub period: String,
    pub rating_component: String,
    pub direction: String,
    pub omv: Option<OmvMarker>,
    /// Whether `rating_component` came from the catalog rather than its position
    pub from_catalog: bool,
}

impl FilenameKey {
    /// Positional arguments for the rates search script
    pub fn query_args(&self) -> Vec<String> {
        vec![
            self.franchise.clone(),
            self.operator.clone(),
            self.period.clone(),
            self.rating_component.clone(),
            self.direction.clone(),
        ]
    }
}

/// Which field a computed index was meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Franchise,
    Operator,
    Period,
    RatingComponent,
    Direction,
}

impl std::fmt::Display for KeyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyField::Franchise => "franchise",
            KeyField::Operator => "operator",
            KeyField::Period => "period",
            KeyField::RatingComponent => "rating component",
            KeyField::Direction => "direction",
        };
        write!(f, "{}", name)
    }
}

/// Why a filename could not be decomposed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    TooFewSegments { count: usize },
    IndexOutOfRange { field: KeyField, index: isize, count: usize },
    EmptyField { field: KeyField },
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::TooFewSegments { count } => write!(
                f,
                "expected at least {} segments separated by '{}', got {}",
                MIN_SEGMENTS, SEGMENT_DELIMITER, count
            ),
            MalformedReason::IndexOutOfRange { field, index, count } => write!(
                f,
                "{} would be segment {} but the filename has {} segments",
                field, index, count
            ),
            MalformedReason::EmptyField { field } => write!(f, "{} segment is empty", field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    MalformedFilename {
        filename: String,
        reason: MalformedReason,
    },
    CatalogUnavailable {
        path: PathBuf,
        message: String,
    },
}

impl std::fmt::Display for FilenameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilenameError::MalformedFilename { filename, reason } => {
                write!(f, "malformed filename '{}': {}", filename, reason)
            }
            FilenameError::CatalogUnavailable { path, message } => write!(
                f,
                "rating component catalog unavailable at {}: {}",
                path.display(),
                message
            ),
        }
    }
}

impl std::error::Error for FilenameError {}

/// Parses filenames against the catalog file, re-reading it on every call
#[derive(Debug, Clone)]
pub struct FilenameParser {
    catalog_path: PathBuf,
}

impl FilenameParser {
    pub fn new(catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
        }
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn parse(&self, filename: &str) -> Result<FilenameKey, FilenameError> {
        let catalog = RatingComponentCatalog::load(&self.catalog_path)?;
        parse_with_catalog(filename, &catalog)
    }
}

/// Decompose `filename` using an already loaded catalog
pub fn parse_with_catalog(
    filename: &str,
    catalog: &RatingComponentCatalog,
) -> Result<FilenameKey, FilenameError> {
    let segments: Vec<&str> = filename.split(SEGMENT_DELIMITER).collect();

    let omv = OmvMarker::detect(&segments);
    let found_component = catalog.find_in(filename);

    match found_component {
        Some(component) => log::debug!(
            "Found rating component '{}' in '{}' ({} extra segments)",
            component,
            filename,
            component.matches(SEGMENT_DELIMITER).count()
        ),
        None => log::debug!(
            "No catalog rating component in '{}', falling back to its position",
            filename
        ),
    }
    if let Some(marker) = omv {
        log::debug!("'{}' carries OMV marker {}", filename, marker.component());
    }

    locate_fields(&segments, omv, found_component).map_err(|reason| {
        FilenameError::MalformedFilename {
            filename: filename.to_string(),
            reason,
        }
    })
}

/// Pure offset arithmetic: pick the five key fields out of `segments`.
///
/// `extra = len - base - delimiters(found_component)` where `base` is 8, or 9
/// with an OMV marker. Period sits at `2 + extra`, the positional component at
/// `3 + extra` and direction at `5 + extra`, plus the component's own extra
/// segments when it came from the catalog.
pub fn locate_fields(
    segments: &[&str],
    omv: Option<OmvMarker>,
    found_component: Option<&str>,
) -> Result<FilenameKey, MalformedReason> {
    let count = segments.len();
    if count < MIN_SEGMENTS {
        return Err(MalformedReason::TooFewSegments { count });
    }

    let component_extra = found_component
        .map(|c| c.matches(SEGMENT_DELIMITER).count())
        .unwrap_or(0) as isize;
    let base = if omv.is_some() {
        BASE_SEGMENTS_OMV
    } else {
        BASE_SEGMENTS
    };
    let extra = count as isize - base as isize - component_extra;

    let franchise = segment_at(segments, KeyField::Franchise, 0)?;
    let operator = segment_at(segments, KeyField::Operator, 1)?;
    let period = segment_at(segments, KeyField::Period, 2 + extra)?;
    let (rating_component, direction) = match found_component {
        Some(component) => (
            non_empty(KeyField::RatingComponent, component)?,
            segment_at(segments, KeyField::Direction, 5 + extra + component_extra)?,
        ),
        None => (
            segment_at(segments, KeyField::RatingComponent, 3 + extra)?,
            segment_at(segments, KeyField::Direction, 5 + extra)?,
        ),
    };

    Ok(FilenameKey {
        franchise,
        operator,
        period,
        rating_component,
        direction,
        omv,
        from_catalog: found_component.is_some(),
    })
}

fn segment_at(segments: &[&str], field: KeyField, index: isize) -> Result<String, MalformedReason> {
    let segment = usize::try_from(index)
        .ok()
        .and_then(|i| segments.get(i))
        .ok_or(MalformedReason::IndexOutOfRange {
            field,
            index,
            count: segments.len(),
        })?;
    non_empty(field, segment)
}

fn non_empty(field: KeyField, value: &str) -> Result<String, MalformedReason> {
    if value.is_empty() {
        return Err(MalformedReason::EmptyField { field });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_catalog(entries: &[&str]) -> RatingComponentCatalog {
        RatingComponentCatalog::from_entries(entries.iter().copied())
    }

    #[test]
    fn test_parse_multi_word_operator_name() {
        let catalog = make_catalog(&["TBAJ", "TALT"]);
        let key = parse_with_catalog(
            "317_114_AIRTIME_TECHNOLOGIES_CHILE_SPA_202509_TALT_R_I_20251008_182417.xls",
            &catalog,
        )
        .unwrap();

        assert_eq!(key.franchise, "317");
        assert_eq!(key.operator, "114");
        assert_eq!(key.period, "202509");
        assert_eq!(key.rating_component, "TALT");
        assert_eq!(key.direction, "I");
        assert_eq!(key.omv, None);
        assert!(key.from_catalog);
    }

    #[test]
    fn test_parse_single_word_operator_without_catalog_match() {
        let catalog = make_catalog(&["TALT"]);
        let key =
            parse_with_catalog("317_225_WOM_202505_TBAJ_R_I_20250607_232028.xls", &catalog).unwrap();

        assert_eq!(key.period, "202505");
        assert_eq!(key.rating_component, "TBAJ");
        assert_eq!(key.direction, "I");
        assert!(!key.from_catalog);
    }

    #[test]
    fn test_franchise_and_operator_are_fixed_without_catalog_match() {
        let catalog = RatingComponentCatalog::default();
        for filename in [
            "317_114_A_202509_TALT_R_I_20251008_182417.xls",
            "318_115_A_B_202509_TALT_R_I_20251008_182417.xls",
            "319_116_A_B_C_D_E_202509_TALT_R_I_20251008_182417.xlsx",
        ] {
            let key = parse_with_catalog(filename, &catalog).unwrap();
            let segments: Vec<&str> = filename.split('_').collect();
            assert_eq!(key.franchise, segments[0]);
            assert_eq!(key.operator, segments[1]);
            assert_eq!(key.period, "202509");
        }
    }

    #[test]
    fn test_multi_segment_component_shifts_direction() {
        let catalog = make_catalog(&["TARIFA_BASICA", "TARIFA"]);
        let key = parse_with_catalog(
            "317_114_OPER_202509_TARIFA_BASICA_R_I_20251008_182417.xls",
            &catalog,
        )
        .unwrap();

        assert_eq!(key.period, "202509");
        assert_eq!(key.rating_component, "TARIFA_BASICA");
        assert_eq!(key.direction, "I");
    }

    #[test]
    fn test_catalog_order_decides_between_overlapping_components() {
        // The shorter token listed first wins even though the longer one is present
        let catalog = make_catalog(&["TARIFA", "TARIFA_BASICA"]);
        let key = parse_with_catalog(
            "317_114_OPER_202509_TARIFA_BASICA_R_I_20251008_182417.xls",
            &catalog,
        )
        .unwrap();

        assert_eq!(key.rating_component, "TARIFA");
    }

    #[test]
    fn test_omv_marker_uses_wider_base() {
        let catalog = make_catalog(&["TALT"]);
        let key = parse_with_catalog(
            "317_114_OPER_202509_TALT_R_I_236_20251008_120252.xls",
            &catalog,
        )
        .unwrap();

        assert_eq!(key.omv, Some(OmvMarker::Omv236));
        assert_eq!(key.omv.map(|m| m.component()).as_deref(), Some("OMV_236"));
        assert_eq!(key.period, "202509");
        assert_eq!(key.rating_component, "TALT");
        assert_eq!(key.direction, "I");
    }

    #[test]
    fn test_unknown_code_is_not_omv() {
        let catalog = make_catalog(&["TALT"]);
        let key = parse_with_catalog(
            "317_114_OPER_202509_TALT_R_I_999_20251008_120252.xls",
            &catalog,
        )
        .unwrap();

        assert_eq!(key.omv, None);
    }

    #[test]
    fn test_too_few_segments() {
        let err = parse_with_catalog("317_114_X.xls", &RatingComponentCatalog::default()).unwrap_err();
        assert_eq!(
            err,
            FilenameError::MalformedFilename {
                filename: "317_114_X.xls".to_string(),
                reason: MalformedReason::TooFewSegments { count: 3 },
            }
        );
    }

    #[test]
    fn test_short_filename_index_out_of_range() {
        let err = parse_with_catalog("317_114_202509_TALT_R.xls", &RatingComponentCatalog::default())
            .unwrap_err();
        match err {
            FilenameError::MalformedFilename { reason, .. } => assert!(matches!(
                reason,
                MalformedReason::IndexOutOfRange {
                    field: KeyField::Period,
                    index: -1,
                    count: 5
                }
            )),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_operator_segment() {
        let err = parse_with_catalog(
            "317__OPER_202509_TALT_R_I_20251008_182417.xls",
            &RatingComponentCatalog::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FilenameError::MalformedFilename {
                reason: MalformedReason::EmptyField {
                    field: KeyField::Operator
                },
                ..
            }
        ));
    }

    #[test]
    fn test_locate_fields_directly() {
        let segments = ["317", "114", "OP", "202509", "TX", "R", "I", "20251008", "1.xls"];
        let key = locate_fields(&segments, None, None).unwrap();
        assert_eq!(key.rating_component, "TX");
        assert_eq!(key.direction, "I");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let catalog = make_catalog(&["TALT"]);
        let filename = "317_114_AIRTIME_TECHNOLOGIES_CHILE_SPA_202509_TALT_R_I_20251008_182417.xls";
        assert_eq!(
            parse_with_catalog(filename, &catalog),
            parse_with_catalog(filename, &catalog)
        );
    }

    #[test]
    fn test_parser_reads_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rating_component_list.csv");
        std::fs::write(&path, "TALT\n").unwrap();

        let parser = FilenameParser::new(&path);
        let key = parser
            .parse("317_114_OPER_202509_TALT_R_I_20251008_182417.xls")
            .unwrap();
        assert!(key.from_catalog);

        std::fs::remove_file(&path).unwrap();
        let err = parser
            .parse("317_114_OPER_202509_TALT_R_I_20251008_182417.xls")
            .unwrap_err();
        assert!(matches!(err, FilenameError::CatalogUnavailable { .. }));
    }

    #[test]
    fn test_query_args_order() {
        let key = locate_fields(
            &["317", "114", "OP", "202509", "TX", "R", "I", "20251008", "1.xls"],
            None,
            None,
        )
        .unwrap();
        assert_eq!(key.query_args(), vec!["317", "114", "202509", "TX", "I"]);
    }
}
