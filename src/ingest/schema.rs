use duckdb::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Column affinity inferred for uploaded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn label(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }

    /// DuckDB column type used when the table is created.
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            SqlType::Integer => "BIGINT",
            SqlType::Real => "DOUBLE",
            SqlType::Text => "VARCHAR",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

const NULL_MARKERS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

impl Cell {
    /// Interprets a raw text field the way a spreadsheet reader would.
    pub fn from_text(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if NULL_MARKERS.contains(&trimmed) {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Integer(i);
        }
        // f64 parsing also accepts "inf" and friends
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Cell::Real(f);
            }
        }
        match trimmed {
            "true" | "True" | "TRUE" => Cell::Boolean(true),
            "false" | "False" | "FALSE" => Cell::Boolean(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Converts to the value stored in a column of type `ty`.
    pub fn to_sql_value(&self, ty: SqlType) -> SqlValue {
        match (self, ty) {
            (Cell::Null, _) => SqlValue::Null,
            (Cell::Integer(i), SqlType::Integer) => SqlValue::BigInt(*i),
            (Cell::Boolean(b), SqlType::Integer) => SqlValue::BigInt(*b as i64),
            (Cell::Integer(i), SqlType::Real) => SqlValue::Double(*i as f64),
            (Cell::Real(f), SqlType::Real) => SqlValue::Double(*f),
            (Cell::Boolean(b), SqlType::Real) => SqlValue::Double(if *b { 1.0 } else { 0.0 }),
            (other, _) => SqlValue::Text(other.to_string()),
        }
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Boolean(b) => write!(f, "{}", b),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Rectangular data parsed from an upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Drops all-null rows and normalizes column names.
    pub fn clean(mut self) -> Self {
        self.rows.retain(|row| !row.iter().all(Cell::is_null));

        let mut seen = HashSet::new();
        self.columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut cleaned = clean_column_name(name);
                if cleaned.is_empty() {
                    cleaned = format!("column_{}", i + 1);
                }
                let mut candidate = cleaned.clone();
                let mut suffix = 1;
                while !seen.insert(candidate.clone()) {
                    candidate = format!("{}_{}", cleaned, suffix);
                    suffix += 1;
                }
                candidate
            })
            .collect();
        self
    }

    pub fn column_types(&self) -> Vec<SqlType> {
        (0..self.columns.len())
            .map(|i| detect_column_type(self.rows.iter().map(|row| &row[i])))
            .collect()
    }

    /// Column name to type label, in column order.
    pub fn schema_json(&self) -> Map<String, Value> {
        self.columns
            .iter()
            .zip(self.column_types())
            .map(|(name, ty)| (name.clone(), Value::String(ty.label().to_string())))
            .collect()
    }

    pub fn preview(&self, rows: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(rows)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Cell::to_json))
                    .collect()
            })
            .collect()
    }
}

pub fn clean_column_name(name: &str) -> String {
    name.trim()
        .replace([' ', '-', '/'], "_")
        .replace(['(', ')', '[', ']'], "")
        .to_lowercase()
}

/// Integers and booleans stay INTEGER, any real widens to REAL, any text wins.
pub fn detect_column_type<'a>(cells: impl Iterator<Item = &'a Cell>) -> SqlType {
    let mut seen_value = false;
    let mut seen_real = false;

    for cell in cells {
        match cell {
            Cell::Null => continue,
            Cell::Text(_) => return SqlType::Text,
            Cell::Real(_) => seen_real = true,
            Cell::Integer(_) | Cell::Boolean(_) => {}
        }
        seen_value = true;
    }

    match (seen_value, seen_real) {
        (false, _) => SqlType::Text,
        (true, true) => SqlType::Real,
        (true, false) => SqlType::Integer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_fields_become_typed_cells() {
        assert_eq!(Cell::from_text(""), Cell::Null);
        assert_eq!(Cell::from_text("N/A"), Cell::Null);
        assert_eq!(Cell::from_text("42"), Cell::Integer(42));
        assert_eq!(Cell::from_text(" 1.5 "), Cell::Real(1.5));
        assert_eq!(Cell::from_text("True"), Cell::Boolean(true));
        assert_eq!(Cell::from_text("inf"), Cell::Text("inf".to_string()));
        assert_eq!(Cell::from_text("Berlin"), Cell::Text("Berlin".to_string()));
    }

    #[test]
    fn column_names_are_normalized_and_unique() {
        let frame = Frame::new(
            vec!["Order Date".into(), "Unit-Price ($)".into(), "a/b [x]".into(), "".into(), "order date".into()],
            vec![],
        )
        .clean();
        assert_eq!(
            frame.columns,
            vec!["order_date", "unit_price_$", "a_b_x", "column_4", "order_date_1"]
        );
    }

    #[test]
    fn empty_rows_are_dropped() {
        let frame = Frame::new(
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Null, Cell::Null], vec![Cell::Integer(1)]],
        )
        .clean();
        assert_eq!(frame.rows, vec![vec![Cell::Integer(1), Cell::Null]]);
    }

    #[test]
    fn type_detection() {
        let ints = [Cell::Integer(1), Cell::Null, Cell::Boolean(true)];
        assert_eq!(detect_column_type(ints.iter()), SqlType::Integer);
        let reals = [Cell::Integer(1), Cell::Real(2.5)];
        assert_eq!(detect_column_type(reals.iter()), SqlType::Real);
        let text = [Cell::Integer(1), Cell::Text("x".into())];
        assert_eq!(detect_column_type(text.iter()), SqlType::Text);
        let empty = [Cell::Null];
        assert_eq!(detect_column_type(empty.iter()), SqlType::Text);
    }

    #[test]
    fn preview_keeps_column_order() {
        let frame = Frame::new(
            vec!["name".into(), "qty".into()],
            (0..8).map(|i| vec![Cell::Text(format!("item{}", i)), Cell::Integer(i)]).collect(),
        );
        let preview = frame.preview(5);
        assert_eq!(preview.len(), 5);
        let keys: Vec<_> = preview[0].keys().cloned().collect();
        assert_eq!(keys, vec!["name", "qty"]);
        assert_eq!(preview[4]["qty"], 4);
    }

    #[test]
    fn values_follow_column_type() {
        assert_eq!(Cell::Integer(3).to_sql_value(SqlType::Real), SqlValue::Double(3.0));
        assert_eq!(Cell::Boolean(true).to_sql_value(SqlType::Integer), SqlValue::BigInt(1));
        assert_eq!(Cell::Integer(3).to_sql_value(SqlType::Text), SqlValue::Text("3".to_string()));
        assert_eq!(Cell::Null.to_sql_value(SqlType::Text), SqlValue::Null);
    }
}
