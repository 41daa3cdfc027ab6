use std::error::Error;
use std::fmt;
use tracing::warn;

/// Checked in this order; the first hit is reported.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeQuery {
    NotASelect,
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for UnsafeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeQuery::NotASelect => write!(f, "Only SELECT queries are allowed"),
            UnsafeQuery::ForbiddenKeyword(keyword) => {
                write!(f, "Dangerous SQL keyword detected: {}", keyword)
            }
        }
    }
}

impl Error for UnsafeQuery {}

/// Returns the normalized statement when it is a read-only SELECT.
///
/// Keywords are matched as plain substrings, so a column such as
/// `created_at` is rejected along with a real `CREATE`.
pub fn validate(sql: &str) -> Result<String, UnsafeQuery> {
    let normalized = strip_fence(sql.trim());
    let upper = normalized.to_uppercase();

    if !upper.starts_with("SELECT") {
        warn!("Rejected non-SELECT statement");
        return Err(UnsafeQuery::NotASelect);
    }

    if let Some(keyword) = FORBIDDEN_KEYWORDS.iter().copied().find(|kw| upper.contains(kw)) {
        warn!("Rejected statement containing {}", keyword);
        return Err(UnsafeQuery::ForbiddenKeyword(keyword));
    }

    Ok(normalized)
}

fn strip_fence(sql: &str) -> String {
    if !sql.starts_with("```") {
        return sql.to_string();
    }

    let lines: Vec<&str> = sql.split('\n').collect();
    let inner = match lines.len() {
        0 | 1 => sql.to_string(),
        2 => lines[1].to_string(),
        n => lines[1..n - 1].join("\n"),
    };
    inner.trim().to_string()
}
