use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::models::GenerationResult;

pub const GENERIC_EXPLANATION: &str = "SQL query generated from natural language";

// Small models sometimes select `product_id` from the table it keys.
const COLUMN_REPAIRS: [(&str, &str); 3] = [
    ("product_id,", "id as product_id,"),
    ("customer_id,", "id as customer_id,"),
    ("order_id,", "id as order_id,"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCompletion {
    /// The completion carried a JSON object.
    Parsed(Map<String, Value>),
    /// Plain text, taken as SQL.
    Unstructured(String),
}

impl ParsedCompletion {
    pub fn into_result(self) -> GenerationResult {
        match self {
            ParsedCompletion::Parsed(object) => {
                let sql = object.get("sql").and_then(Value::as_str).unwrap_or_default();
                let explanation = object
                    .get("explanation")
                    .and_then(Value::as_str)
                    .unwrap_or(GENERIC_EXPLANATION);
                GenerationResult {
                    sql: repair_columns(sql),
                    explanation: explanation.to_string(),
                }
            }
            ParsedCompletion::Unstructured(sql) => GenerationResult {
                sql,
                explanation: GENERIC_EXPLANATION.to_string(),
            },
        }
    }
}

/// Classifies raw completion text.
pub fn parse_completion(raw: &str) -> ParsedCompletion {
    let trimmed = raw.trim();

    if let Some(span) = extract_json_object(trimmed) {
        match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(object)) => return ParsedCompletion::Parsed(object),
            Ok(_) => {}
            Err(e) => debug!("Embedded JSON did not parse: {}", e),
        }
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => ParsedCompletion::Parsed(object),
        _ => {
            warn!("Completion was not JSON, using it as SQL");
            ParsedCompletion::Unstructured(trimmed.to_string())
        }
    }
}

/// `parse_completion` followed by the column repair pass.
pub fn parse(raw: &str) -> GenerationResult {
    parse_completion(raw).into_result()
}

pub fn repair_columns(sql: &str) -> String {
    COLUMN_REPAIRS
        .iter()
        .fold(sql.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// First balanced `{...}` span, skipping braces inside string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        // Unbalanced from here, try the next opening brace
        search_from = start + 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_envelope() {
        let result = parse(r#"{"sql": "SELECT * FROM products", "explanation": "All products"}"#);
        assert_eq!(result.sql, "SELECT * FROM products");
        assert_eq!(result.explanation, "All products");
    }

    #[test]
    fn finds_envelope_inside_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"sql\": \"SELECT name FROM customers WHERE city = 'Paris'\", \
                   \"explanation\": \"Customers in {Paris}\"}\n```\nHope that helps.";
        let result = parse(raw);
        assert_eq!(result.sql, "SELECT name FROM customers WHERE city = 'Paris'");
        assert_eq!(result.explanation, "Customers in {Paris}");
    }

    #[test]
    fn braces_in_strings_do_not_end_the_span() {
        let raw = r#"{"sql": "SELECT '}' AS brace", "explanation": "escaped \" quote }"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
        assert_eq!(parse(raw).sql, "SELECT '}' AS brace");
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let raw = r#"note {"sql": "SELECT 1", "meta": {"tokens": 3}} trailing"#;
        assert_eq!(
            extract_json_object(raw),
            Some(r#"{"sql": "SELECT 1", "meta": {"tokens": 3}}"#)
        );
    }

    #[test]
    fn plain_text_becomes_sql() {
        let raw = "  SELECT COUNT(*) FROM orders  \n";
        assert_eq!(
            parse_completion(raw),
            ParsedCompletion::Unstructured("SELECT COUNT(*) FROM orders".into())
        );
        let result = parse(raw);
        assert_eq!(result.sql, "SELECT COUNT(*) FROM orders");
        assert_eq!(result.explanation, GENERIC_EXPLANATION);
    }

    #[test]
    fn unbalanced_braces_fall_back_to_text() {
        let raw = "SELECT 1 -- {not json";
        assert_eq!(extract_json_object(raw), None);
        assert_eq!(parse(raw).sql, raw);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let result = parse(r#"{"query": "SELECT 1"}"#);
        assert_eq!(result.sql, "");
        assert_eq!(result.explanation, GENERIC_EXPLANATION);
    }

    #[test]
    fn repairs_misnamed_key_columns() {
        let result = parse(r#"{"sql": "SELECT customer_id, total_price FROM orders", "explanation": "x"}"#);
        assert_eq!(result.sql, "SELECT id as customer_id, total_price FROM orders");
    }

    #[test]
    fn repair_is_case_sensitive_and_needs_comma() {
        assert_eq!(repair_columns("SELECT Product_id, name"), "SELECT Product_id, name");
        assert_eq!(repair_columns("SELECT name, product_id FROM t"), "SELECT name, product_id FROM t");
    }

    #[test]
    fn unstructured_output_is_not_repaired() {
        let result = parse("SELECT customer_id, total_price FROM orders");
        assert_eq!(result.sql, "SELECT customer_id, total_price FROM orders");
    }
}
