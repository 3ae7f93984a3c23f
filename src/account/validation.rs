//! Input validation for account numbers and free-text fields
//!
//! This module provides validated types that enforce canonical forms.
//! All fields are private to force validation through the public API.

use std::fmt;

use rand::Rng;

/// Length of an external account number
pub const ACCOUNT_NUMBER_LEN: usize = 16;

/// Maximum transaction description length (characters)
pub const DESCRIPTION_MAX_LEN: usize = 200;

/// Maximum length of provider codes and service numbers
pub const EXTERNAL_ID_MAX_LEN: usize = 64;

// ============================================================================
// Validation Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Strip everything but ASCII digits.
///
/// The single canonicalization used at ingress and persistence, so that
/// `"1234 5678-9012 3456"` and `"1234567890123456"` address the same account.
pub fn canonicalize_account_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// AccountNumber - 16-digit canonical number (Private Fields)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Canonicalize and validate an account number
    ///
    /// # Examples
    /// ```
    /// use retail_ledger::account::validation::AccountNumber;
    ///
    /// let n = AccountNumber::new("1234 5678 9012 3456").unwrap();
    /// assert_eq!(n.as_str(), "1234567890123456");
    /// assert!(AccountNumber::new("12345").is_err());
    /// ```
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let digits = canonicalize_account_number(raw);
        if digits.len() != ACCOUNT_NUMBER_LEN {
            return Err(ValidationError::InvalidLength {
                field: "account_number",
                min: ACCOUNT_NUMBER_LEN,
                max: ACCOUNT_NUMBER_LEN,
                actual: digits.len(),
            });
        }
        Ok(Self(digits))
    }

    /// Random 16-digit number with a non-zero leading digit
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut digits = String::with_capacity(ACCOUNT_NUMBER_LEN);
        digits.push(char::from(b'0' + rng.gen_range(1..=9u8)));
        for _ in 1..ACCOUNT_NUMBER_LEN {
            digits.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form that only reveals the last four digits: `**** **** **** 3456`
    pub fn masked(&self) -> String {
        format!("**** **** **** {}", &self.0[ACCOUNT_NUMBER_LEN - 4..])
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AccountNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Description
// ============================================================================

/// Trimmed description of at most 200 characters; empty input falls back to
/// `default`.
pub fn validate_description(
    raw: Option<&str>,
    default: &str,
) -> Result<String, ValidationError> {
    let text = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
    let len = text.chars().count();
    if len > DESCRIPTION_MAX_LEN {
        return Err(ValidationError::InvalidLength {
            field: "description",
            min: 0,
            max: DESCRIPTION_MAX_LEN,
            actual: len,
        });
    }
    Ok(text.to_string())
}

/// Provider codes and service numbers: 1-64 of `[A-Za-z0-9_-]`
pub fn validate_external_id(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() || value.len() > EXTERNAL_ID_MAX_LEN {
        return Err(ValidationError::InvalidLength {
            field,
            min: 1,
            max: EXTERNAL_ID_MAX_LEN,
            actual: value.len(),
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field,
            value: value.to_string(),
            expected: "letters, digits, '-' or '_'",
        });
    }
    Ok(value.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_separators() {
        assert_eq!(
            canonicalize_account_number(" 1234-5678 9012\t3456 "),
            "1234567890123456"
        );
        assert_eq!(canonicalize_account_number("abc"), "");
    }

    #[test]
    fn test_account_number_valid() {
        let n = AccountNumber::new("1234 5678 9012 3456").unwrap();
        assert_eq!(n.as_str(), "1234567890123456");
        assert_eq!(n, AccountNumber::new("1234567890123456").unwrap());
    }

    #[test]
    fn test_account_number_invalid_length() {
        let err = AccountNumber::new("12345").unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidLength { actual: 5, .. }
        ));
        assert!(AccountNumber::new("12345678901234567").is_err());
    }

    #[test]
    fn test_account_number_masked() {
        let n = AccountNumber::new("1234567890123456").unwrap();
        assert_eq!(n.masked(), "**** **** **** 3456");
    }

    #[test]
    fn test_generated_account_number_is_valid() {
        for _ in 0..32 {
            let n = AccountNumber::generate();
            assert_eq!(n.as_str().len(), ACCOUNT_NUMBER_LEN);
            assert!(!n.as_str().starts_with('0'));
            assert_eq!(AccountNumber::new(n.as_str()).unwrap(), n);
        }
    }

    #[test]
    fn test_description_default_and_limit() {
        assert_eq!(validate_description(None, "Transfer").unwrap(), "Transfer");
        assert_eq!(validate_description(Some("   "), "Transfer").unwrap(), "Transfer");
        assert_eq!(validate_description(Some(" rent "), "Transfer").unwrap(), "rent");

        let long = "x".repeat(DESCRIPTION_MAX_LEN + 1);
        assert!(validate_description(Some(&long), "Transfer").is_err());
        let exact = "é".repeat(DESCRIPTION_MAX_LEN);
        assert!(validate_description(Some(&exact), "Transfer").is_ok());
    }

    #[test]
    fn test_external_id() {
        assert_eq!(validate_external_id("provider", " EVN_HN ").unwrap(), "EVN_HN");
        assert!(validate_external_id("provider", "").is_err());
        assert!(matches!(
            validate_external_id("service_number", "PE 0123").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
    }
}
