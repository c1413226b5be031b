//! # iTriage Core
//!
//! Core business logic for the iTriage emergency room triage system.
//!
//! This crate contains the patient model and the operations nurses and physicians perform on it:
//! - Patient admission, editing and removal, keyed by health card number
//! - Timestamped histories of vital signs, symptoms and prescriptions
//! - Urgency scoring and the waiting-list views built on it
//! - Whole-registry JSON persistence and the line-oriented credentials file
//! - Login, registration and role checks
//!
//! **No interface concerns**: argument parsing, environment lookup and terminal output belong
//! in the `itriage` binary.

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod patient;
pub mod record;
pub mod registry;
pub mod service;
pub mod validation;
pub mod vitals;

pub use config::CoreConfig;
pub use credentials::{Credential, CredentialStore, Role};
pub use error::{TriageError, TriageResult};
pub use patient::{Patient, PatientIdentity, Prescription, Trend};
pub use record::TimeSeriesRecord;
pub use registry::PatientRegistry;
pub use service::{PatientFilter, TriageService};
pub use vitals::VitalSigns;
