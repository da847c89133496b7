//! Normalized, validated email addresses.

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

/// Lower-cased, trimmed email that passed syntax validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = normalize_email(raw);
        if normalized.is_empty() || !normalized.validate_email() {
            return Err(format!("Invalid email address: \"{}\"", raw));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = EmailAddress::parse("  John.Doe@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "john.doe@example.com");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(EmailAddress::parse("   ").is_err());
        assert!(EmailAddress::parse("not-an-email").is_err());
        assert!(EmailAddress::parse("a@").is_err());
    }

    #[test]
    fn error_mentions_the_raw_input() {
        let err = EmailAddress::parse("Foo Bar").unwrap_err();
        assert_eq!(err, "Invalid email address: \"Foo Bar\"");
    }
}
