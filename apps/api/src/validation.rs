use serde::Serialize;

use crate::errors::AppError;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Collects every failing field of a request before rejecting it, so callers
/// see all problems at once.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    /// Records `message` against `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

/// Character count (not bytes) within `min..=max`.
pub fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

/// Pragmatic address check: one `@`, a non-empty local part, and a dotted
/// domain whose last label is at least two letters.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Trims and drops empty strings; `None` stays `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("ana.lopez+jobs@mail.unam.mx"));
        assert!(is_valid_email("  padded@example.org  "));
    }

    #[test]
    fn test_invalid_emails() {
        for bad in ["", "ana", "ana@", "@example.com", "ana@example", "ana@@x.com", "a b@x.com", "ana@x.c", "ana@x..com"] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert!(char_len_between("añoño", 5, 5));
        assert!(!char_len_between("abc", 5, 100));
    }

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        errors.check(true, "a", "fine");
        errors.check(false, "b", "bad b");
        errors.push("c", "bad c");
        let fields = errors.into_vec();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], FieldError::new("b", "bad b"));
    }

    #[test]
    fn test_empty_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_clean_drops_blank() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" x ".into())), Some("x".into()));
        assert_eq!(clean(None), None);
    }
}
