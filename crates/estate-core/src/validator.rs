//! # Field Validator
//!
//! Accumulates one message per field. The first failed check for a field
//! wins; later checks on the same field are ignored so clients see the most
//! basic problem first ("must be provided" before "must be at least ...").

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Field name to message map returned to clients on validation failure.
pub type FieldErrors = BTreeMap<String, String>;

/// Email address pattern (WHATWG-style local part, RFC 1034 labels).
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap_or_else(|e| unreachable!("static email pattern is valid: {e}"))
});

/// Phone number pattern: `501-123-4567`, `+(501) - 123 - 4567` and similar.
pub static PHONE_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?\(?[0-9]{3}\)?\s?-\s?[0-9]{3}\s?-\s?[0-9]{4}$")
        .unwrap_or_else(|e| unreachable!("static phone pattern is valid: {e}"))
});

/// Collects field-level validation errors.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Create an empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no errors have been recorded.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless the field already has an error.
    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_insert_with(|| message.into());
    }

    /// Record `message` for `key` when `ok` is false.
    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// Borrow the recorded errors.
    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Consume the validator, returning `Ok(())` if nothing failed.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Whether `value` is one of `list`.
pub fn permitted_value(value: &str, list: &[&str]) -> bool {
    list.iter().any(|candidate| *candidate == value)
}

/// Whether `value` matches `rx`.
pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

/// Whether every entry in `values` is distinct.
pub fn unique<T: Ord>(values: &[T]) -> bool {
    let set: std::collections::BTreeSet<&T> = values.iter().collect();
    set.len() == values.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_for_a_field_wins() {
        let mut v = Validator::new();
        v.check(false, "email", "must be provided");
        v.check(false, "email", "must be a valid email address");
        assert_eq!(v.errors()["email"], "must be provided");
        assert!(!v.valid());
    }

    #[test]
    fn passing_checks_leave_validator_valid() {
        let mut v = Validator::new();
        v.check(true, "page", "must be greater than zero");
        assert!(v.valid());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn finish_returns_errors() {
        let mut v = Validator::new();
        v.add_error("sort", "invalid sort value");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["sort"], "invalid sort value");
    }

    #[test]
    fn email_pattern() {
        assert!(matches("agent@realty.bz", &EMAIL_RX));
        assert!(!matches("agent.realty.bz", &EMAIL_RX));
        assert!(!matches("", &EMAIL_RX));
    }

    #[test]
    fn phone_pattern() {
        assert!(matches("501-123-4567", &PHONE_RX));
        assert!(matches("+(501) - 123 - 4567", &PHONE_RX));
        assert!(!matches("5011234567", &PHONE_RX));
    }

    #[test]
    fn permitted_and_unique() {
        assert!(permitted_value("-id", &["id", "-id"]));
        assert!(!permitted_value("price", &["id", "-id"]));
        assert!(unique(&["a", "b"]));
        assert!(!unique(&["a", "a"]));
    }
}
