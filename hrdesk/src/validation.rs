//! Request validation primitives.
//!
//! Request models validate themselves into a [`FieldErrors`] map so that every failing field is
//! reported at once, e.g. `{"name": ["Name is required"], "slug": ["Slug must be at most 100 characters"]}`.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, sync::LazyLock};

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@(?:[A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$").expect("email pattern compiles")
});

/// Validation failures keyed by request field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Check a required string's length in characters
    pub fn check_required(&mut self, field: &str, value: &str, max: usize, required_msg: &str, too_long_msg: &str) {
        let len = value.chars().count();
        if len == 0 {
            self.add(field, required_msg);
        } else if len > max {
            self.add(field, too_long_msg);
        }
    }

    /// Check a nullable string's length in characters. `min` applies only when the value is present.
    pub fn check_optional(&mut self, field: &str, value: Option<&str>, min: usize, max: usize, too_short_msg: &str, too_long_msg: &str) {
        if let Some(value) = value {
            let len = value.chars().count();
            if len < min {
                self.add(field, too_short_msg);
            } else if len > max {
                self.add(field, too_long_msg);
            }
        }
    }

    /// Check an email address: valid format and at most `max` characters
    pub fn check_email(&mut self, field: &str, value: &str, max: usize) {
        if !is_valid_email(value) {
            self.add(field, "Invalid email format");
        }
        if value.chars().count() > max {
            self.add(field, "Email too long");
        }
    }
}

/// Lowercase letters and digits in dash-separated groups, e.g. `acme-corp-2`
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Canonical form of an email address. Accounts and members are matched on this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `deserialize_with` adapter storing email fields in canonical form
pub fn deserialize_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|email| normalize_email(&email))
}

pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs() {
        for slug in ["acme", "acme-corp", "a1-b2-c3", "2024"] {
            assert!(is_valid_slug(slug), "{slug} should be valid");
        }
        for slug in ["", "Acme", "acme corp", "-acme", "acme-", "acme--corp", "acme_corp"] {
            assert!(!is_valid_slug(slug), "{slug} should be invalid");
        }
    }

    #[test]
    fn test_emails() {
        for email in ["john.doe@example.com", "a+tag@sub.example.co.uk", "o'neil@example.ie"] {
            assert!(is_valid_email(email), "{email} should be valid");
        }
        for email in ["not an email", "@example.com", "john@", "john@example", ".john@example.com", "jo..hn@example.com"] {
            assert!(!is_valid_email(email), "{email} should be invalid");
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada.Lovelace@Example.COM "), "ada.lovelace@example.com");
        assert_eq!(normalize_email("ada@example.com"), "ada@example.com");
    }

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::default();
        errors.check_required("name", "", 255, "Name is required", "Name too long");
        errors.check_email("email", &format!("{}@example.com", "a".repeat(320)), 320);
        errors.check_optional("country", Some(""), 1, 100, "Country cannot be empty", "Country name too long");
        errors.check_optional("address", None, 0, 500, "", "Address too long");

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["country", "email", "name"]);
        assert_eq!(errors.messages("name"), ["Name is required"]);
        assert_eq!(errors.messages("email"), ["Email too long"]);
        assert!(errors.messages("address").is_empty());
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let mut errors = FieldErrors::default();
        errors.check_required("name", &"é".repeat(255), 255, "Name is required", "Name too long");
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_serializes_as_map() {
        let mut errors = FieldErrors::default();
        errors.add("slug", "Slug is required");
        assert_eq!(serde_json::to_value(&errors).unwrap(), serde_json::json!({"slug": ["Slug is required"]}));
    }
}
