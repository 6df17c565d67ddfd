use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// Hardcoded regex patterns - guaranteed to be valid at compile time
// Using unwrap here is safe because the patterns are compile-time constants
#[allow(clippy::unwrap_used)]
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\pL[\pL\s-]*$").unwrap());

#[allow(clippy::unwrap_used)]
static DATE_SHAPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{3}-[0-9]{2}-[0-9]{2}$").unwrap());

#[allow(clippy::unwrap_used)]
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9()\pL\s+#-]+$").unwrap());

#[allow(clippy::unwrap_used)]
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Za-z]+$").unwrap());

pub const MAX_FIELD_LENGTH: usize = 255;
pub const MAX_TOKEN_LENGTH: usize = 128;

pub const MSG_REQUIRED: &str = "cannot be blank";
pub const MSG_INVALID_FORMAT: &str = "must be in a valid format";
pub const MSG_INVALID_EMAIL: &str = "must be a valid email address";
pub const MSG_TOO_LONG: &str = "is too long";

/// Field-level validation messages keyed by form field name.
///
/// Serializes as a flat JSON object, e.g. `{"email": "cannot be blank"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Records an error for `field`. The first message for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(&field, message);
        }
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

/// Validates a required free-form name (person or country).
pub fn check_name(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, MSG_REQUIRED);
    } else if value.chars().count() > MAX_FIELD_LENGTH {
        errors.add(field, MSG_TOO_LONG);
    } else if !NAME_PATTERN.is_match(value) {
        errors.add(field, MSG_INVALID_FORMAT);
    }
}

pub fn check_email(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, MSG_REQUIRED);
    } else if value.len() > MAX_FIELD_LENGTH {
        errors.add(field, MSG_TOO_LONG);
    } else if !is_valid_email(value) {
        errors.add(field, MSG_INVALID_EMAIL);
    }
}

/// Phone numbers are optional; when present they must look like one.
pub fn check_phone(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        errors.add(field, MSG_TOO_LONG);
    } else if !PHONE_PATTERN.is_match(value) {
        errors.add(field, MSG_INVALID_FORMAT);
    }
}

pub fn check_date(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, MSG_REQUIRED);
    } else if !is_valid_date(value) {
        errors.add(field, MSG_INVALID_FORMAT);
    }
}

pub fn is_valid_email(value: &str) -> bool {
    lettre::Address::from_str(value).is_ok()
}

/// Calendar date in `YYYY-MM-DD` form with a four digit year of at least 1000.
pub fn is_valid_date(value: &str) -> bool {
    DATE_SHAPE_PATTERN.is_match(value)
        && NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|date| date.year() >= 1000)
            .unwrap_or(false)
}

/// Cheap shape check for confirmation tokens, run before touching storage.
pub fn is_valid_token_shape(token: &str) -> bool {
    !token.is_empty() && token.len() <= MAX_TOKEN_LENGTH && TOKEN_PATTERN.is_match(token)
}

/// Builds `YYYY-MM-DD` from separate form fields, zero-padding single digit
/// months and days.
pub fn combine_date(year: &str, month: &str, day: &str) -> String {
    format!("{}-{:0>2}-{:0>2}", year, month, day)
}
