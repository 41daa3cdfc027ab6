use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::info;

use crate::ingest::schema::{Cell, Frame};
use crate::ingest::{FileParser, IngestError};

/// Reads the first worksheet of an XLSX/XLS workbook; row one is the header.
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse(&self, bytes: &[u8]) -> Result<Frame, IngestError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| IngestError::ParsingError(format!("Failed to parse Excel file: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| IngestError::ParsingError("Excel file contains no worksheets".to_string()))?
            .map_err(|e| IngestError::ParsingError(format!("Failed to parse Excel file: {}", e)))?;

        let mut sheet_rows = range.rows();
        let columns: Vec<String> = match sheet_rows.next() {
            Some(header) => header.iter().map(|cell| to_cell(cell).to_string()).collect(),
            None => return Err(IngestError::ParsingError("Excel worksheet is empty".to_string())),
        };

        let rows: Vec<Vec<Cell>> = sheet_rows.map(|row| row.iter().map(to_cell).collect()).collect();

        info!("Parsed Excel: {} rows, {} columns", rows.len(), columns.len());
        Ok(Frame::new(columns, rows))
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::String(s) if s.trim().is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Integer(*i),
        // Workbooks store every number as a float
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Cell::Integer(*f as i64),
        Data::Float(f) => Cell::Real(*f),
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Cell::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Real(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_without_fraction_become_integers() {
        assert_eq!(to_cell(&Data::Float(3.0)), Cell::Integer(3));
        assert_eq!(to_cell(&Data::Float(3.25)), Cell::Real(3.25));
        assert_eq!(to_cell(&Data::String("  ".to_string())), Cell::Null);
        assert_eq!(to_cell(&Data::Bool(false)), Cell::Boolean(false));
    }

    #[test]
    fn garbage_bytes_are_a_parsing_error() {
        let err = ExcelParser.parse(b"not a workbook").unwrap_err();
        assert!(matches!(err, IngestError::ParsingError(_)));
    }
}
