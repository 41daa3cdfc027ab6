use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine-native type label, e.g. INTEGER, DOUBLE, VARCHAR
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(rename = "isPrimaryKey")]
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Ordered description of every table visible in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableInfo>,
}

impl SchemaDescription {
    /// `{table: [column, ...]}` as served by the schema endpoints.
    pub fn tables_json(&self) -> Map<String, Value> {
        self.tables
            .iter()
            .map(|table| {
                let columns = serde_json::to_value(&table.columns).unwrap_or(Value::Array(Vec::new()));
                (table.name.clone(), columns)
            })
            .collect()
    }
}

/// Which data store questions and queries are answered against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveScope {
    #[default]
    Default,
    Uploaded(String),
}

impl ActiveScope {
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn name(&self) -> &str {
        match self {
            ActiveScope::Default => Self::DEFAULT_NAME,
            ActiveScope::Uploaded(table) => table,
        }
    }

    pub fn is_uploaded(&self, table: &str) -> bool {
        matches!(self, ActiveScope::Uploaded(t) if t == table)
    }
}
