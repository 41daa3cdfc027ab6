// Upload parsing: raw file bytes in, a cleaned and typed frame out.
pub mod csv;
pub mod excel;
pub mod json;
pub mod schema;

use std::error::Error;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::ingest::schema::{Frame, SqlType};

#[derive(Debug)]
pub enum IngestError {
    ParsingError(String),
    UnsupportedFileType(String),
    TooLarge { size: usize, limit: usize },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::ParsingError(msg) => write!(f, "{}", msg),
            IngestError::UnsupportedFileType(name) => write!(
                f,
                "Unsupported file format: {}. Please upload CSV, Excel, or JSON files",
                name
            ),
            IngestError::TooLarge { limit, .. } => write!(
                f,
                "File too large. Maximum size is {}MB",
                limit / (1024 * 1024)
            ),
        }
    }
}

impl Error for IngestError {}

pub trait FileParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Frame, IngestError>;
}

/// Parsed upload ready to be materialized.
#[derive(Debug)]
pub struct ProcessedUpload {
    pub frame: Frame,
    pub column_types: Vec<SqlType>,
}

pub struct IngestManager {
    csv_parser: csv::CsvParser,
    excel_parser: excel::ExcelParser,
    json_parser: json::JsonParser,
    max_bytes: usize,
}

impl IngestManager {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            csv_parser: csv::CsvParser,
            excel_parser: excel::ExcelParser,
            json_parser: json::JsonParser,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn parser_for(&self, filename: &str) -> Result<&dyn FileParser, IngestError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| IngestError::UnsupportedFileType(filename.to_string()))?;

        match extension.as_str() {
            "csv" => Ok(&self.csv_parser),
            "xlsx" | "xls" => Ok(&self.excel_parser),
            "json" => Ok(&self.json_parser),
            _ => Err(IngestError::UnsupportedFileType(filename.to_string())),
        }
    }

    /// Size check, format dispatch, cleaning and type inference.
    pub fn process(&self, bytes: &[u8], filename: &str) -> Result<ProcessedUpload, IngestError> {
        if bytes.len() > self.max_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        info!("Processing file: {}", filename);
        let frame = self.parser_for(filename)?.parse(bytes)?.clean();
        let column_types = frame.column_types();

        info!(
            "Processed {}: {} rows, {} columns",
            filename,
            frame.rows.len(),
            frame.columns.len()
        );
        Ok(ProcessedUpload { frame, column_types })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::schema::Cell;

    #[test]
    fn oversized_files_are_rejected_before_parsing() {
        let manager = IngestManager::new(4);
        let err = manager.process(b"a,b\n1,2\n", "data.csv").unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { size: 8, limit: 4 }));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let manager = IngestManager::new(1024);
        for name in ["notes.txt", "dump.sql", "noextension"] {
            let err = manager.process(b"x", name).unwrap_err();
            assert!(matches!(err, IngestError::UnsupportedFileType(_)), "{}", name);
        }
    }

    #[test]
    fn extension_match_ignores_case() {
        let manager = IngestManager::new(1024);
        let upload = manager.process(b"Total Sales,Region\n10,north\n2.5,\n", "Q1.CSV").unwrap();
        assert_eq!(upload.frame.columns, vec!["total_sales", "region"]);
        assert_eq!(upload.column_types, vec![SqlType::Real, SqlType::Text]);
        assert_eq!(upload.frame.rows[1][1], Cell::Null);
    }
}
