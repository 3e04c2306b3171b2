//! Delimited text and spreadsheet workbooks.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{Error, Result};

/// One chunk per record, each field rendered as `header: value`.
pub fn delimited_records(path: &Path, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::extraction(path, e))?;
    let headers = reader.headers().map_err(|e| Error::extraction(path, e))?.clone();

    let mut chunks = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::extraction(path, e))?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(i, value)| match headers.get(i).map(str::trim).filter(|h| !h.is_empty()) {
                Some(header) => format!("{header}: {}", value.trim()),
                None => value.trim().to_string(),
            })
            .collect();
        if !lines.is_empty() {
            chunks.push(lines.join("\n"));
        }
    }
    Ok(chunks)
}

/// Every sheet in workbook order, `rows_per_chunk` non-empty rows at a time.
pub fn workbook_rows(path: &Path, rows_per_chunk: usize) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::extraction(path, e))?;
    let rows_per_chunk = rows_per_chunk.max(1);
    let mut chunks = Vec::new();

    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => return Err(Error::extraction(path, format!("sheet '{name}': {e}"))),
        };
        let rows: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .filter(|cell| !matches!(cell, Data::Empty))
                    .map(|cell| cell.to_string().trim().to_string())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|line| !line.is_empty())
            .collect();

        for group in rows.chunks(rows_per_chunk) {
            chunks.push(format!("Sheet: {name}\n{}", group.join("\n")));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_rows_become_labelled_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("staff.csv");
        fs::write(&path, "name,role\nAda,engineer\nGrace,admiral\n,\n").unwrap();

        let chunks = delimited_records(&path, b',').unwrap();
        assert_eq!(chunks, vec!["name: Ada\nrole: engineer", "name: Grace\nrole: admiral"]);
    }

    #[test]
    fn unreadable_workbook_is_an_extraction_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();

        let err = workbook_rows(&path, 10).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
