//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into [`TriageService`](crate::TriageService). Core never reads environment variables;
//! the binary resolves them and hands the result in.

use crate::constants::{CREDENTIALS_FILENAME, DEFAULT_CREDENTIALS, REGISTRY_FILENAME};
use crate::{TriageError, TriageResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    registry_filename: String,
    credentials_filename: String,
    admin_password: Option<String>,
    default_credentials: Vec<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `admin_password` gates registration of new users; `None` disables registration.
    pub fn new(
        data_dir: PathBuf,
        registry_filename: String,
        credentials_filename: String,
        admin_password: Option<String>,
    ) -> TriageResult<Self> {
        if registry_filename.trim().is_empty() {
            return Err(TriageError::invalid(
                "registry_filename",
                "cannot be empty",
            ));
        }
        if credentials_filename.trim().is_empty() {
            return Err(TriageError::invalid(
                "credentials_filename",
                "cannot be empty",
            ));
        }
        if matches!(&admin_password, Some(p) if p.trim().is_empty()) {
            return Err(TriageError::invalid(
                "admin_password",
                "cannot be blank when set",
            ));
        }

        Ok(Self {
            data_dir,
            registry_filename,
            credentials_filename,
            admin_password,
            default_credentials: DEFAULT_CREDENTIALS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Configuration rooted at `data_dir` with the standard file names.
    pub fn with_data_dir(data_dir: PathBuf, admin_password: Option<String>) -> TriageResult<Self> {
        Self::new(
            data_dir,
            REGISTRY_FILENAME.into(),
            CREDENTIALS_FILENAME.into(),
            admin_password,
        )
    }

    /// Replace the lines written when the credentials file has to be bootstrapped.
    pub fn with_default_credentials(mut self, lines: Vec<String>) -> Self {
        self.default_credentials = lines;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(&self.registry_filename)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_filename)
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password.as_deref()
    }

    pub fn default_credentials(&self) -> &[String] {
        &self.default_credentials
    }
}
