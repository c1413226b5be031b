//! Constants used throughout the iTriage core crate.
//!
//! File names and thresholds live here so the CLI, the service and the tests agree on them.

/// Default directory for the registry and credentials files when none is configured.
pub const DEFAULT_DATA_DIR: &str = "itriage_data";

/// Filename for the saved patient registry.
pub const REGISTRY_FILENAME: &str = "er.json";

/// Filename for the line-oriented credentials file.
pub const CREDENTIALS_FILENAME: &str = "passwords.txt";

/// Credential lines written when no credentials file exists yet.
pub const DEFAULT_CREDENTIALS: &[&str] = &["nurse:nurse:nurse", "physician:physician:physician"];

/// Patients younger than this many years gain one urgency point.
pub const INFANT_AGE_YEARS: i64 = 2;

/// Temperature (°C) at or above which a patient gains one urgency point.
pub const FEVER_TEMPERATURE: f64 = 39.0;

/// Systolic pressure at or above which blood pressure counts as high.
pub const HIGH_SYSTOLIC_BP: i32 = 140;

/// Diastolic pressure at or above which blood pressure counts as high.
pub const HIGH_DIASTOLIC_BP: i32 = 90;

/// Heart rate at or above which a patient is tachycardic.
pub const HIGH_HEART_RATE: i32 = 100;

/// Heart rate at or below which a patient is bradycardic.
pub const LOW_HEART_RATE: i32 = 50;
