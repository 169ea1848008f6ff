//! SQL identifier quoting.
//!
//! Identifiers (relation names, column names, aliases) are always emitted
//! double-quoted; values never travel through this path, so quoting is the
//! single identifier-injection boundary.

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`), which
/// makes the result safe for any input string.
///
/// # Examples
///
/// ```
/// use squill_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// assert_eq!(quote_ident("select"), "\"select\""); // SQL keyword
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_simple() {
        assert_eq!(quote_ident("users"), "\"users\"");
    }

    #[test]
    fn test_quote_ident_embedded_double_quote() {
        assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
    }

    #[test]
    fn test_quote_ident_sql_keyword() {
        assert_eq!(quote_ident("select"), "\"select\"");
        assert_eq!(quote_ident("where"), "\"where\"");
    }

    #[test]
    fn test_quote_ident_spaces() {
        assert_eq!(quote_ident("first name"), "\"first name\"");
    }

    #[test]
    fn test_quote_ident_injection_attempt() {
        let malicious = "users\"; DROP TABLE secrets; --";
        assert_eq!(
            quote_ident(malicious),
            "\"users\"\"; DROP TABLE secrets; --\""
        );
    }
}
