//! Input validation utilities.
//!
//! These checks belong to the calling layer: [`Patient`](crate::Patient) and
//! [`PatientRegistry`](crate::PatientRegistry) accept whatever they are given. The service
//! runs them before touching any store so a rejected request never mutates state, and each
//! failure names the field it applies to.

use crate::vitals::VitalSigns;
use crate::{TriageError, TriageResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;

/// Rejects empty or whitespace-only values, returning the trimmed value.
pub fn require_non_empty<'a>(field: &'static str, value: &'a str) -> TriageResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TriageError::invalid(field, "is required"));
    }
    Ok(trimmed)
}

pub fn require_not_in_future(
    field: &'static str,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TriageResult<()> {
    if timestamp > now {
        return Err(TriageError::invalid(field, "cannot be in the future"));
    }
    Ok(())
}

pub fn require_date_not_in_future(
    field: &'static str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> TriageResult<()> {
    if date > now.date_naive() {
        return Err(TriageError::invalid(field, "cannot be in the future"));
    }
    Ok(())
}

/// Parses a numeric form field.
pub fn parse_number<T>(field: &'static str, raw: &str) -> TriageResult<T>
where
    T: FromStr,
{
    let raw = require_non_empty(field, raw)?;
    raw.parse::<T>()
        .map_err(|_| TriageError::invalid(field, format!("'{raw}' is not a number")))
}

pub fn require_finite(field: &'static str, value: f64) -> TriageResult<f64> {
    if !value.is_finite() {
        return Err(TriageError::invalid(field, "must be a finite number"));
    }
    Ok(value)
}

/// Builds a [`VitalSigns`] from raw form input.
pub fn parse_vital_signs(
    temperature: &str,
    systolic_bp: &str,
    diastolic_bp: &str,
    heart_rate: &str,
) -> TriageResult<VitalSigns> {
    let temperature = require_finite("temperature", parse_number("temperature", temperature)?)?;

    Ok(VitalSigns::new(
        temperature,
        parse_number("systolic_bp", systolic_bp)?,
        parse_number("diastolic_bp", diastolic_bp)?,
        parse_number("heart_rate", heart_rate)?,
    ))
}

/// Usernames and passwords are stored in a `:`-delimited, line-oriented file.
pub fn validate_credential_field<'a>(field: &'static str, value: &'a str) -> TriageResult<&'a str> {
    if value.trim().is_empty() {
        return Err(TriageError::invalid(field, "is required"));
    }
    if value.contains(['\n', '\r']) {
        return Err(TriageError::invalid(field, "cannot contain line breaks"));
    }
    if field == "username" && value.contains(':') {
        return Err(TriageError::invalid(field, "cannot contain ':'"));
    }
    Ok(value)
}
