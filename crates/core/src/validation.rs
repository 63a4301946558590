//! Field-level validation helpers.
//!
//! Request bodies validate themselves with these helpers before anything
//! touches the database. Every failure names the offending field so the API
//! can return a precise 400.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

/// Indian mobile number: 10 digits starting with 6-9.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[6-9]\d{9}$").expect("static regex is valid")
});

/// Indian postal PIN code: 6 digits, no leading zero.
static PINCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9]\d{5}$").expect("static regex is valid")
});

/// A single failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the field as it appears in the request body.
    pub field: &'static str,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for a field.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check that a trimmed string has between `min` and `max` characters.
///
/// Returns the trimmed value on success.
///
/// # Errors
///
/// Returns `ValidationError` if the length is out of range.
pub fn require_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        let message = if min == 1 {
            "is required".to_owned()
        } else {
            format!("must be at least {min} characters")
        };
        return Err(ValidationError::new(field, message));
    }
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_owned())
}

/// Check that an optional string, if present and non-blank, is within bounds.
///
/// Blank strings are normalized to `None`.
///
/// # Errors
///
/// Returns `ValidationError` if a present value is too long.
pub fn optional_length(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => require_length(field, v, 1, max).map(Some),
    }
}

/// Check that an integer lies in `min..=max`.
///
/// # Errors
///
/// Returns `ValidationError` if out of range.
pub fn require_range(
    field: &'static str,
    value: i32,
    min: i32,
    max: i32,
) -> Result<i32, ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::new(
            field,
            format!("must be between {min} and {max}"),
        ));
    }
    Ok(value)
}

/// Check that a money amount is strictly positive with at most two decimals.
///
/// # Errors
///
/// Returns `ValidationError` if the amount is zero, negative or too precise.
pub fn require_positive_amount(
    field: &'static str,
    value: Decimal,
) -> Result<Decimal, ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }
    if value.normalize().scale() > 2 {
        return Err(ValidationError::new(
            field,
            "must have at most two decimal places",
        ));
    }
    Ok(value)
}

/// Check an Indian mobile number (10 digits, starting 6-9).
///
/// Spaces, dashes and a leading `+91` are stripped before matching.
///
/// # Errors
///
/// Returns `ValidationError` if the number does not match.
pub fn require_phone(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let digits: String = value
        .trim()
        .trim_start_matches("+91")
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if PHONE_RE.is_match(&digits) {
        Ok(digits)
    } else {
        Err(ValidationError::new(
            field,
            "must be a valid 10-digit mobile number",
        ))
    }
}

/// Check a 6-digit Indian PIN code.
///
/// # Errors
///
/// Returns `ValidationError` if the code does not match.
pub fn require_pincode(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if PINCODE_RE.is_match(value) {
        Ok(value.to_owned())
    } else {
        Err(ValidationError::new(field, "must be a valid 6-digit PIN code"))
    }
}

/// Check that a string is an absolute http(s) URL without whitespace.
///
/// # Errors
///
/// Returns `ValidationError` if the URL is not http(s).
pub fn require_http_url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
            Ok(value.to_owned())
        }
        _ => Err(ValidationError::new(field, "must be an http(s) URL")),
    }
}
