//! Request validation utilities

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Client input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid metric id: {0:?}")]
    InvalidId(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date for {param}: {value:?}")]
    InvalidDate { param: &'static str, value: String },
}

impl ValidationError {
    /// Stable machine-readable code for the error body
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidId(_) => "invalid_id",
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::InvalidDate { .. } => "invalid_date",
        }
    }
}

/// Require a non-blank string field, returning it trimmed
pub fn required_field(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Parse a calendar date or datetime into a UTC instant
///
/// Accepted forms, tried in order:
/// - RFC 3339 with offset (`2024-05-01T10:00:00+02:00`, `...Z`)
/// - naive datetime, read as UTC (`2024-05-01T10:00:00`, optional fraction)
/// - calendar date, read as midnight UTC (`2024-05-01`)
///
/// Years outside `MIN_YEAR..=MAX_YEAR` are rejected so every accepted bound
/// is representable by the store.
pub fn parse_date(param: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        param,
        value: value.to_string(),
    };

    let parsed = parse_any(value.trim()).ok_or_else(invalid)?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&parsed.year()) {
        return Err(invalid());
    }
    Ok(parsed)
}

/// Earliest year accepted in a date filter
pub const MIN_YEAR: i32 = 1;
/// Latest year accepted in a date filter
pub const MAX_YEAR: i32 = 9999;

fn parse_any(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
