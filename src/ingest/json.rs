use serde_json::{Map, Value};
use tracing::info;

use crate::ingest::schema::{Cell, Frame};
use crate::ingest::{FileParser, IngestError};

/// Accepts record arrays (`[{"a": 1}, ...]`) and column objects
/// (`{"a": [1, 2]}` or `{"a": {"0": 1, "1": 2}}`).
pub struct JsonParser;

impl FileParser for JsonParser {
    fn parse(&self, bytes: &[u8]) -> Result<Frame, IngestError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| IngestError::ParsingError(format!("Failed to parse JSON file: {}", e)))?;

        let frame = match document {
            Value::Array(records) => from_records(records)?,
            Value::Object(columns) => from_columns(columns)?,
            _ => {
                return Err(IngestError::ParsingError(
                    "JSON file must contain an array of records or an object of columns".to_string(),
                ))
            }
        };

        info!("Parsed JSON: {} rows, {} columns", frame.rows.len(), frame.columns.len());
        Ok(frame)
    }
}

fn from_records(records: Vec<Value>) -> Result<Frame, IngestError> {
    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());

    for record in records {
        match record {
            Value::Object(object) => {
                for key in object.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
                objects.push(object);
            }
            other => {
                return Err(IngestError::ParsingError(format!(
                    "Expected a JSON object per record, found: {}",
                    other
                )))
            }
        }
    }

    let rows = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|column| object.get(column).map(to_cell).unwrap_or(Cell::Null))
                .collect()
        })
        .collect();

    Ok(Frame::new(columns, rows))
}

fn from_columns(object: Map<String, Value>) -> Result<Frame, IngestError> {
    let columns: Vec<String> = object.keys().cloned().collect();
    let mut values: Vec<Vec<Cell>> = Vec::with_capacity(columns.len());

    for (name, column) in object {
        let cells = match column {
            Value::Array(items) => items.iter().map(to_cell).collect(),
            // pandas-style {"col": {"0": v0, "1": v1}}; keys are row positions
            Value::Object(by_index) => {
                let mut indexed: Vec<(usize, Cell)> = by_index
                    .iter()
                    .map(|(k, v)| (k.parse::<usize>().unwrap_or(usize::MAX), to_cell(v)))
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);
                indexed.into_iter().map(|(_, cell)| cell).collect()
            }
            other => {
                return Err(IngestError::ParsingError(format!(
                    "Column '{}' must be an array or object, found: {}",
                    name, other
                )))
            }
        };
        values.push(cells);
    }

    let height = values.iter().map(Vec::len).max().unwrap_or(0);
    let rows = (0..height)
        .map(|r| {
            values
                .iter()
                .map(|column| column.get(r).cloned().unwrap_or(Cell::Null))
                .collect()
        })
        .collect();

    Ok(Frame::new(columns, rows))
}

fn to_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Integer(i),
            None => n.as_f64().map(Cell::Real).unwrap_or(Cell::Null),
        },
        Value::String(s) if s.is_empty() => Cell::Null,
        Value::String(s) => Cell::Text(s.clone()),
        nested => Cell::Text(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_union_keys_in_first_seen_order() {
        let frame = JsonParser
            .parse(br#"[{"city": "Oslo", "pop": 700000}, {"pop": 1.5, "mayor": "X"}]"#)
            .unwrap();
        assert_eq!(frame.columns, vec!["city", "pop", "mayor"]);
        assert_eq!(
            frame.rows[1],
            vec![Cell::Null, Cell::Real(1.5), Cell::Text("X".to_string())]
        );
    }

    #[test]
    fn column_objects_are_transposed() {
        let frame = JsonParser
            .parse(br#"{"a": {"1": "y", "0": "x"}, "b": [true]}"#)
            .unwrap();
        assert_eq!(frame.columns, vec!["a", "b"]);
        assert_eq!(frame.rows[0], vec![Cell::Text("x".to_string()), Cell::Boolean(true)]);
        assert_eq!(frame.rows[1], vec![Cell::Text("y".to_string()), Cell::Null]);
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(JsonParser.parse(b"42").is_err());
        assert!(JsonParser.parse(b"[1, 2]").is_err());
    }
}
