use crate::ingest::schema::{Cell, Frame};
use crate::ingest::{FileParser, IngestError};
use tracing::info;

pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<Frame, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| IngestError::ParsingError(format!("Failed to parse CSV file: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        if columns.is_empty() {
            return Err(IngestError::ParsingError("CSV file has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IngestError::ParsingError(format!("Failed to parse CSV file: {}", e)))?;
            rows.push(record.iter().take(columns.len()).map(Cell::from_text).collect());
        }

        info!("Parsed CSV: {} rows, {} columns", rows.len(), columns.len());
        Ok(Frame::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_typed_rows() {
        let frame = CsvParser
            .parse(b"Name,Price,Qty\nWidget,2.5,3\nGadget,,7\n")
            .unwrap();
        assert_eq!(frame.columns, vec!["Name", "Price", "Qty"]);
        assert_eq!(
            frame.rows[1],
            vec![Cell::Text("Gadget".to_string()), Cell::Null, Cell::Integer(7)]
        );
    }

    #[test]
    fn short_records_are_padded() {
        let frame = CsvParser.parse(b"a,b,c\n1\n").unwrap();
        assert_eq!(frame.rows[0], vec![Cell::Integer(1), Cell::Null, Cell::Null]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(CsvParser.parse(b"").is_err());
    }
}
