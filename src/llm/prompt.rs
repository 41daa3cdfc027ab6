use std::fmt::Write;

use crate::db::schema::{ActiveScope, SchemaDescription, TableInfo};

const PREAMBLE: &str = "You are an expert SQL query generator.

Your task is to convert natural language questions into valid DuckDB SELECT queries.";

const GENERAL_RULES: &str = "GENERAL RULES:
1. ONLY generate SELECT queries - no INSERT, UPDATE, DELETE, DROP, etc.
2. Use ONLY the EXACT column names from the schema above
3. Return ONLY valid SQL code without markdown formatting or code blocks
4. Use proper SQL syntax for DuckDB
5. Add ORDER BY, LIMIT when appropriate

Return your response in this exact JSON format:
{
  \"sql\": \"YOUR SQL QUERY HERE\",
  \"explanation\": \"Brief explanation of what the query does\"
}
";

/// Builds the system prompt for one generation request.
pub fn build_prompt(schema: &SchemaDescription, scope: &ActiveScope) -> String {
    let rules = match scope {
        ActiveScope::Default => default_rules(schema),
        ActiveScope::Uploaded(table) => uploaded_rules(schema, table),
    };

    format!(
        "{}\n\n{}\n{}\n{}",
        PREAMBLE,
        describe_tables(schema),
        rules,
        GENERAL_RULES
    )
}

fn describe_tables(schema: &SchemaDescription) -> String {
    let mut out = String::from("Database Schema:\n\n");
    for table in &schema.tables {
        let _ = writeln!(out, "Table: {}", table.name);
        out.push_str("Columns:\n");
        for column in &table.columns {
            let _ = write!(out, "  - {} ({})", column.name, column.declared_type);
            if column.is_primary_key {
                out.push_str(" [PRIMARY KEY]");
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn column_names(table: &TableInfo) -> String {
    table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_rules(schema: &SchemaDescription) -> String {
    let mut out = String::from("SCHEMA:\n");
    for table in &schema.tables {
        let _ = writeln!(out, "- {} table: {}", table.name, column_names(table));
    }

    // products -> product_id
    let wrong_keys: Vec<String> = schema
        .tables
        .iter()
        .map(|t| format!("not {}_id", t.name.strip_suffix('s').unwrap_or(&t.name)))
        .collect();

    let mut joins = Vec::new();
    for table in &schema.tables {
        let foreign: Vec<&str> = table
            .columns
            .iter()
            .filter(|c| !c.is_primary_key && c.name.ends_with("_id"))
            .map(|c| c.name.as_str())
            .collect();
        if !foreign.is_empty() {
            joins.push(format!("{} in the {} table", foreign.join(" and "), table.name));
        }
    }

    out.push_str("\nCRITICAL RULES:\n");
    let _ = writeln!(
        out,
        "- The primary key column in ALL tables is called \"id\" ({})",
        wrong_keys.join(", ")
    );
    if !joins.is_empty() {
        let _ = writeln!(
            out,
            "- When joining tables, use the foreign key columns: {}",
            joins.join("; ")
        );
    }
    out
}

fn uploaded_rules(schema: &SchemaDescription, table: &str) -> String {
    let columns = schema
        .tables
        .iter()
        .find(|t| t.name == table)
        .map(|t| {
            t.columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.declared_type))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    format!(
        "SCHEMA:\n- {table} table with columns: {columns}\n\n\
         CRITICAL RULES:\n\
         - Use ONLY the column names listed above\n\
         - All column names are lowercase with underscores\n\
         - Query ONLY the {table} table\n"
    )
}
