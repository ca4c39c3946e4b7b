//! Canonical identifier form used for every catalog lookup key.
//!
//! Names coming back from metadata queries are inconsistent across vendors:
//! some are padded and some are already quoted. Every
//! name is passed through [`IdentifierRules::normalize`] exactly once, both
//! when the base pass registers an entity and when an enrichment row is
//! resolved, so two spellings of the same real entity meet at the same key.
//!
//! The canonical form is the bare name when it is a plain identifier and the
//! quoted name otherwise. Case is preserved, so names differing only in case
//! stay distinct. The transform is idempotent.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// The case a database stores unquoted identifiers in.
///
/// Metadata views report stored names, which the database has already
/// folded. A reported name that differs from the folded form was created
/// quoted, so it is kept verbatim and quoted rather than folded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCase {
    /// Keep names exactly as reported
    #[default]
    Preserve,
    /// Unquoted names are stored upper case (SQL standard, Oracle, DB2)
    Upper,
    /// Unquoted names are stored lower case (PostgreSQL)
    Lower,
}

impl IdentifierCase {
    fn apply(self, name: &str) -> String {
        match self {
            Self::Preserve => name.to_string(),
            Self::Upper => name.to_uppercase(),
            Self::Lower => name.to_lowercase(),
        }
    }
}

/// Words that always force quoting, on top of any configured extras.
const RESERVED_WORDS: &[&str] = &[
    "ALL", "ALTER", "AND", "AS", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "CURRENT", "DEFAULT", "DELETE", "DISTINCT", "DROP", "ELSE", "END",
    "EXISTS", "FALSE", "FOR", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP", "HAVING", "IN",
    "INDEX", "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "NOT", "NULL",
    "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE",
    "THEN", "TO", "TRIGGER", "TRUE", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES",
    "VIEW", "WHEN", "WHERE", "WITH",
];

#[allow(clippy::expect_used)] // literal pattern
fn plain_identifier() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("Invalid identifier pattern")
    })
}

/// Rules for turning a reported name into its canonical lookup form.
///
/// # Example
/// ```rust
/// use dbcrawler_core::identifiers::IdentifierRules;
///
/// let rules = IdentifierRules::default();
/// assert_eq!(rules.normalize("  ORDERS ").as_deref(), Some("ORDERS"));
/// assert_eq!(rules.normalize("order items").as_deref(), Some("\"order items\""));
/// assert_eq!(rules.normalize("\"ORDERS\"").as_deref(), Some("ORDERS"));
/// assert_eq!(rules.normalize("   "), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierRules {
    /// Identifier quote string reported by the driver; blank disables quoting
    pub quote: String,
    /// Stored case of unquoted names
    pub case: IdentifierCase,
    /// Additional vendor reserved words (compared upper-cased)
    pub reserved_words: BTreeSet<String>,
}

impl Default for IdentifierRules {
    fn default() -> Self {
        Self {
            quote: "\"".to_string(),
            case: IdentifierCase::Preserve,
            reserved_words: BTreeSet::new(),
        }
    }
}

impl IdentifierRules {
    /// Creates rules with the given quote string and default case handling.
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            ..Self::default()
        }
    }

    /// Sets the stored case of unquoted names.
    pub fn with_case(mut self, case: IdentifierCase) -> Self {
        self.case = case;
        self
    }

    /// Adds a vendor reserved word.
    pub fn with_reserved_word(mut self, word: impl Into<String>) -> Self {
        self.reserved_words.insert(word.into().to_uppercase());
        self
    }

    /// Normalizes a raw name into canonical form.
    ///
    /// Returns `None` for blank names. Case is never changed: a name that
    /// differs from its [`IdentifierCase`] form is quoted instead.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let body = self
            .strip_quotes(trimmed)
            .unwrap_or_else(|| trimmed.to_string());
        if body.is_empty() {
            return None;
        }

        if self.needs_quoting(&body) {
            Some(self.wrap(&body))
        } else {
            Some(body)
        }
    }

    /// Normalizes an optional name, treating absence like a blank name.
    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<String> {
        raw.and_then(|name| self.normalize(name))
    }

    /// Checks whether a canonical name is wrapped in quotes.
    pub fn is_quoted(&self, name: &str) -> bool {
        self.strip_quotes(name).is_some()
    }

    fn strip_quotes(&self, name: &str) -> Option<String> {
        let quote = self.quote.as_str();
        if quote.is_empty() || name.len() < quote.len().saturating_mul(2) {
            return None;
        }
        let inner = name.strip_prefix(quote)?.strip_suffix(quote)?;
        let doubled = quote.repeat(2);
        Some(inner.replace(&doubled, quote))
    }

    fn wrap(&self, body: &str) -> String {
        let quote = self.quote.as_str();
        let doubled = quote.repeat(2);
        format!("{quote}{}{quote}", body.replace(quote, &doubled))
    }

    fn needs_quoting(&self, body: &str) -> bool {
        if self.quote.is_empty() {
            return false;
        }
        if !plain_identifier().is_match(body) {
            return true;
        }
        let upper = body.to_uppercase();
        if RESERVED_WORDS.contains(&upper.as_str()) || self.reserved_words.contains(&upper) {
            return true;
        }
        // Case-sensitive name; quoting keeps it apart from the folded spelling.
        self.case.apply(body) != body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_names_are_kept_bare() {
        let rules = IdentifierRules::default();
        assert_eq!(rules.normalize("ORDERS").as_deref(), Some("ORDERS"));
        assert_eq!(rules.normalize("\tid\n").as_deref(), Some("id"));
        assert_eq!(rules.normalize("_x$1").as_deref(), Some("_x$1"));
    }

    #[test]
    fn test_special_names_are_quoted() {
        let rules = IdentifierRules::default();
        assert_eq!(rules.normalize("my table").as_deref(), Some("\"my table\""));
        assert_eq!(rules.normalize("1abc").as_deref(), Some("\"1abc\""));
        assert_eq!(rules.normalize("select").as_deref(), Some("\"select\""));
        assert_eq!(rules.normalize("a\"b").as_deref(), Some("\"a\"\"b\""));
    }

    #[test]
    fn test_already_quoted_input_converges() {
        let rules = IdentifierRules::default();
        assert_eq!(rules.normalize("\"T\"").as_deref(), Some("T"));
        assert_eq!(
            rules.normalize("\"my table\""),
            rules.normalize("my table")
        );
    }

    #[test]
    fn test_blank_names() {
        let rules = IdentifierRules::default();
        assert_eq!(rules.normalize(""), None);
        assert_eq!(rules.normalize("  "), None);
        assert_eq!(rules.normalize("\"\""), None);
        assert_eq!(rules.normalize_opt(None), None);
    }

    #[test]
    fn test_stored_case_quotes_case_sensitive_names() {
        let rules = IdentifierRules::default().with_case(IdentifierCase::Upper);
        assert_eq!(rules.normalize("ORDERS").as_deref(), Some("ORDERS"));
        assert_eq!(rules.normalize("\"ORDERS\"").as_deref(), Some("ORDERS"));
        assert_eq!(rules.normalize("Orders").as_deref(), Some("\"Orders\""));
        assert_eq!(rules.normalize("\"Orders\"").as_deref(), Some("\"Orders\""));
        assert_ne!(rules.normalize("orders"), rules.normalize("ORDERS"));

        let rules = IdentifierRules::default().with_case(IdentifierCase::Lower);
        assert_eq!(rules.normalize("orders").as_deref(), Some("orders"));
        assert_eq!(rules.normalize("Orders").as_deref(), Some("\"Orders\""));
    }

    #[test]
    fn test_vendor_reserved_words() {
        let rules = IdentifierRules::default().with_reserved_word("rowid");
        assert_eq!(rules.normalize("ROWID").as_deref(), Some("\"ROWID\""));
    }

    #[test]
    fn test_blank_quote_disables_quoting() {
        let rules = IdentifierRules::new("");
        assert_eq!(rules.normalize("my table").as_deref(), Some("my table"));
        assert!(!rules.is_quoted("my table"));
    }

    #[test]
    fn test_bracket_style_quote_string() {
        let rules = IdentifierRules::new("`");
        assert_eq!(rules.normalize("my table").as_deref(), Some("`my table`"));
        assert_eq!(rules.normalize("`T`").as_deref(), Some("T"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "[ -~]{0,16}") {
            for case in [IdentifierCase::Preserve, IdentifierCase::Upper, IdentifierCase::Lower] {
                let rules = IdentifierRules::default().with_case(case);
                if let Some(once) = rules.normalize(&raw) {
                    prop_assert_eq!(rules.normalize(&once), Some(once.clone()));
                }
            }
        }
    }
}
