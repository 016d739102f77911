//! Whole-document workbook I/O
//!
//! Documents are read with calamine, which sniffs the content so both BIFF
//! (`.xls`) and OOXML files are accepted whatever their extension. They are
//! written with rust_xlsxwriter, which produces OOXML only. Copies are
//! value-only: formatting of the source cells is not carried over.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};
use rust_xlsxwriter::{Workbook, Worksheet};
use tempfile::NamedTempFile;

use super::formatting::create_date_format;

/// A single cell value as read from the source document
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date
    DateTime(f64),
    /// Error literal such as `#DIV/0!`
    Error(String),
}

/// Non-empty cells of one sheet at absolute positions
#[derive(Debug, Clone, PartialEq)]
pub struct SheetValues {
    pub name: String,
    pub cells: Vec<(u32, u16, CellValue)>,
}

impl SheetValues {
    #[cfg(test)]
    pub fn get(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(r, c, _)| *r == row && *c == col)
            .map(|(_, _, value)| value)
    }
}

/// What a read-only open of a document reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub sheet_names: Vec<String>,
    /// Content is BIFF, whatever the extension says
    pub legacy_biff: bool,
}

pub fn inspect_document(path: &Path) -> Result<DocumentInfo> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
    Ok(DocumentInfo {
        sheet_names: workbook.sheet_names(),
        legacy_biff: matches!(workbook, Sheets::Xls(_)),
    })
}

/// Sheet names in document order
pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    Ok(inspect_document(path)?.sheet_names)
}

/// Every sheet with its cell values
pub fn read_document(path: &Path) -> Result<Vec<SheetValues>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet: {}", name))?;
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        let mut cells = Vec::new();
        for (row, col, data) in range.used_cells() {
            let Some(value) = cell_value(data) else {
                continue;
            };
            let row = u32::try_from(row)
                .ok()
                .and_then(|r| r.checked_add(start_row))
                .with_context(|| format!("Row out of range in sheet {}", name))?;
            let col = u32::try_from(col)
                .ok()
                .and_then(|c| c.checked_add(start_col))
                .and_then(|c| u16::try_from(c).ok())
                .with_context(|| format!("Column out of range in sheet {}", name))?;
            cells.push((row, col, value));
        }

        sheets.push(SheetValues { name, cells });
    }

    Ok(sheets)
}

fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::DateTime(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Error(e.to_string())),
    }
}

/// Append `sheet` to `workbook`, values only
pub fn copy_sheet(workbook: &mut Workbook, sheet: &SheetValues) -> Result<()> {
    let date_format = create_date_format();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&sheet.name)
        .with_context(|| format!("Invalid sheet name: {}", sheet.name))?;

    for (row, col, value) in &sheet.cells {
        write_cell(worksheet, *row, *col, value, &date_format)
            .with_context(|| format!("Failed to copy cell ({}, {}) of {}", row, col, sheet.name))?;
    }
    Ok(())
}

fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    date_format: &rust_xlsxwriter::Format,
) -> Result<()> {
    match value {
        CellValue::Text(s) | CellValue::Error(s) => {
            ws.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            ws.write_number(row, col, *n)?;
        }
        CellValue::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        CellValue::DateTime(serial) => {
            ws.write_number_with_format(row, col, *serial, date_format)?;
        }
    }
    Ok(())
}

/// Serialize a document containing exactly `sheets`
pub fn build_document(sheets: &[SheetValues]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    for sheet in sheets {
        copy_sheet(&mut workbook, sheet)?;
    }
    Ok(workbook.save_to_buffer()?)
}

/// Replace `path` with `bytes` through a temporary file in the same directory,
/// so readers never see a partially written document.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .with_context(|| format!("Failed to write temporary file for {}", path.display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_sheet(name: &str, cells: Vec<(u32, u16, CellValue)>) -> SheetValues {
        SheetValues {
            name: name.to_string(),
            cells,
        }
    }

    #[test]
    fn test_build_then_read_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let sheets = vec![
            make_sheet(
                "Detalle",
                vec![
                    (0, 0, CellValue::Text("SUBTOTAL".to_string())),
                    (0, 4, CellValue::Number(1250.0)),
                    (3, 1, CellValue::Bool(true)),
                ],
            ),
            make_sheet("Vacia", vec![]),
        ];

        let bytes = build_document(&sheets).unwrap();
        write_atomically(&path, &bytes).unwrap();

        let read = read_document(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].name, "Detalle");
        assert_eq!(read[0].get(0, 4), Some(&CellValue::Number(1250.0)));
        assert_eq!(read[0].get(3, 1), Some(&CellValue::Bool(true)));
        assert_eq!(read[1].name, "Vacia");
        assert!(read[1].cells.is_empty());
    }

    #[test]
    fn test_content_is_sniffed_regardless_of_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy_name.xls");
        let bytes = build_document(&[make_sheet(
            "Hoja1",
            vec![(1, 1, CellValue::Text("x".to_string()))],
        )])
        .unwrap();
        write_atomically(&path, &bytes).unwrap();

        let info = inspect_document(&path).unwrap();
        assert_eq!(info.sheet_names, vec!["Hoja1"]);
        assert!(!info.legacy_biff);
        let read = read_document(&path).unwrap();
        assert_eq!(read[0].get(1, 1), Some(&CellValue::Text("x".to_string())));
    }

    #[test]
    fn test_unreadable_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xls");
        fs::write(&path, b"not a workbook").unwrap();
        assert!(sheet_names(&path).is_err());
    }

    #[test]
    fn test_write_atomically_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.bin");
        fs::write(&path, b"old").unwrap();

        write_atomically(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
