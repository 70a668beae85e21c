//! Read-only gate in front of the executor.
//!
//! Validation is a pure function over the statement text. Keyword checks
//! are substring matches on the uppercased statement, so a column literally
//! named `updated_at` is rejected; that is the accepted cost of keeping the
//! gate trivially auditable.

use crate::domain::outcome::ValidationResult;

const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE",
];

/// Validate a candidate statement. All violations are collected, not just
/// the first one.
pub fn validate(statement: &str) -> ValidationResult {
    let mut errors = Vec::new();
    let trimmed = statement.trim();
    let upper = trimmed.to_uppercase();

    if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
        errors.push("Query must start with SELECT".to_string());
    }

    for keyword in FORBIDDEN_KEYWORDS {
        if upper.contains(keyword) {
            errors.push(format!("Forbidden keyword: {}", keyword));
        }
    }

    let open = trimmed.matches('(').count();
    let close = trimmed.matches(')').count();
    if open != close {
        errors.push("Unbalanced parentheses in query".to_string());
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_passes() {
        let result = validate("SELECT id, amount FROM orders LIMIT 10");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_with_clause_passes() {
        let result = validate("WITH t AS (SELECT 1 AS n) SELECT n FROM t");
        assert!(result.valid);
    }

    #[test]
    fn test_leading_whitespace_and_case_are_ignored() {
        assert!(validate("   select 1").valid);
    }

    #[test]
    fn test_non_select_rejected() {
        let result = validate("PRAGMA table_info(orders)");
        assert!(!result.valid);
        assert!(result.errors.contains(&"Query must start with SELECT".to_string()));
    }

    #[test]
    fn test_each_forbidden_keyword_rejected() {
        for keyword in FORBIDDEN_KEYWORDS {
            let statement = format!("{} something", keyword);
            let result = validate(&statement);
            assert!(!result.valid, "{} should be rejected", keyword);
            assert!(result
                .errors
                .contains(&format!("Forbidden keyword: {}", keyword)));
        }
    }

    #[test]
    fn test_keyword_embedded_in_select_still_rejected() {
        // Substring matching: DELETE inside an otherwise valid SELECT fails.
        let result = validate("SELECT 'DELETE' AS word FROM orders");
        assert!(!result.valid);
        assert!(result.errors.contains(&"Forbidden keyword: DELETE".to_string()));
    }

    #[test]
    fn test_balanced_parentheses_pass() {
        let result = validate("SELECT * FROM t WHERE (a=1)");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let result = validate("SELECT COUNT(* FROM orders");
        assert!(!result.valid);
        assert!(result
            .errors
            .contains(&"Unbalanced parentheses in query".to_string()));
    }

    #[test]
    fn test_all_errors_collected() {
        let result = validate("DELETE FROM orders WHERE (id = 1");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let statement = "SELECT updated_at FROM orders";
        assert_eq!(validate(statement), validate(statement));
    }
}
