//! Collaborator-facing triage operations.
//!
//! [`TriageService`] is what a user interface (or the CLI) talks to. It owns the patient
//! registry and the credential store for the lifetime of the process, each behind its own
//! [`RwLock`]: mutations take the write lock, queries take the read lock and return owned
//! snapshots so no caller ever observes a half-applied change.
//!
//! Every patient operation requires a logged-in session, and some are limited to one role:
//!
//! | Operation                                   | Nurse | Physician |
//! |---------------------------------------------|:-----:|:---------:|
//! | view, list, remove patients                  |   ✓   |     ✓     |
//! | admit and edit patients                      |   ✓   |           |
//! | record vital signs and symptoms              |   ✓   |           |
//! | record a doctor visit                        |   ✓   |           |
//! | add a prescription                           |       |     ✓     |
//!
//! Inputs are validated (see [`crate::validation`]) before any lock is taken for writing.

use crate::config::CoreConfig;
use crate::credentials::{
    append_credential, create_default_credentials_file, Credential, CredentialStore, Role,
};
use crate::patient::{Patient, PatientIdentity, Trend};
use crate::registry::PatientRegistry;
use crate::validation::{
    require_date_not_in_future, require_finite, require_non_empty, require_not_in_future,
    validate_credential_field,
};
use crate::vitals::VitalSigns;
use crate::{TriageError, TriageResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const ANY_ROLE: &[Role] = &[Role::Nurse, Role::Physician];
const NURSE_ONLY: &[Role] = &[Role::Nurse];
const PHYSICIAN_ONLY: &[Role] = &[Role::Physician];

/// Which patients to list and in what order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PatientFilter {
    /// Waiting patients, most urgent first.
    #[default]
    ByUrgency,
    /// Waiting patients, latest arrival first.
    ByArrivalTime,
    /// Everyone, by name.
    All,
}

impl FromStr for PatientFilter {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgency" => Ok(PatientFilter::ByUrgency),
            "arrival" => Ok(PatientFilter::ByArrivalTime),
            "all" => Ok(PatientFilter::All),
            other => Err(TriageError::invalid(
                "filter",
                format!("expected urgency, arrival or all, got '{other}'"),
            )),
        }
    }
}

impl std::fmt::Display for PatientFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PatientFilter::ByUrgency => "urgency",
            PatientFilter::ByArrivalTime => "arrival",
            PatientFilter::All => "all",
        })
    }
}

#[derive(Clone, Debug)]
pub struct TriageService {
    cfg: Arc<CoreConfig>,
    registry: Arc<RwLock<PatientRegistry>>,
    credentials: Arc<RwLock<CredentialStore>>,
}

impl TriageService {
    /// Creates a service with empty stores.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self::with_stores(cfg, PatientRegistry::new(), CredentialStore::new())
    }

    pub fn with_stores(
        cfg: Arc<CoreConfig>,
        registry: PatientRegistry,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            cfg,
            registry: Arc::new(RwLock::new(registry)),
            credentials: Arc::new(RwLock::new(credentials)),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Loads the registry file, replacing the in-memory registry.
    ///
    /// Returns `false` without touching the registry if the file does not exist yet.
    pub fn load_registry(&self) -> TriageResult<bool> {
        let path = self.cfg.registry_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no saved registry found");
                return Ok(false);
            }
            Err(e) => return Err(TriageError::FileRead(e)),
        };

        let mut registry = self.write_registry()?;
        registry.load_from_reader(BufReader::new(file))?;
        tracing::info!(path = %path.display(), patients = registry.len(), "loaded registry");
        Ok(true)
    }

    /// Saves the registry to its file.
    ///
    /// The document is written to a sibling temporary file and renamed into place, so an
    /// interrupted save leaves the previous file intact.
    pub fn save_registry(&self) -> TriageResult<()> {
        let mut buffer = Vec::new();
        let patients = {
            let registry = self.read_registry()?;
            registry.save_to_writer(&mut buffer)?;
            registry.len()
        };

        fs::create_dir_all(self.cfg.data_dir()).map_err(TriageError::StorageDirCreation)?;

        let path = self.cfg.registry_path();
        let temp_path = sibling_temp_path(&path);
        if let Err(e) = fs::write(&temp_path, &buffer) {
            let _ = fs::remove_file(&temp_path);
            return Err(TriageError::FileWrite(e));
        }
        fs::rename(&temp_path, &path).map_err(TriageError::FileWrite)?;

        tracing::info!(path = %path.display(), patients, "saved registry");
        Ok(())
    }

    /// Loads the credentials file, first writing the default credentials if it is absent.
    ///
    /// Returns the number of credentials accepted.
    pub fn load_credentials(&self) -> TriageResult<usize> {
        let path = self.cfg.credentials_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.bootstrap_credentials_file(&path)?;
                File::open(&path).map_err(TriageError::FileRead)?
            }
            Err(e) => return Err(TriageError::FileRead(e)),
        };

        let accepted = self
            .write_credentials()?
            .load_credentials(BufReader::new(file))?;
        tracing::info!(path = %path.display(), accepted, "loaded credentials");
        Ok(accepted)
    }

    fn bootstrap_credentials_file(&self, path: &Path) -> TriageResult<()> {
        fs::create_dir_all(self.cfg.data_dir()).map_err(TriageError::StorageDirCreation)?;
        let file = File::create(path).map_err(TriageError::FileWrite)?;
        create_default_credentials_file(BufWriter::new(file), self.cfg.default_credentials())?;
        tracing::info!(path = %path.display(), "created default credentials file");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Checks the credentials and starts a session.
    ///
    /// # Errors
    ///
    /// - [`TriageError::InvalidInput`] for an empty username or password.
    /// - [`TriageError::UnknownUser`] if the username is not registered.
    /// - [`TriageError::IncorrectPassword`] if the password does not match.
    pub fn login(&self, username: &str, password: &str) -> TriageResult<Role> {
        require_non_empty("username", username)?;

        let mut credentials = self.write_credentials()?;
        if !credentials.is_username_valid(username) {
            return Err(TriageError::UnknownUser(username.to_string()));
        }
        if password.is_empty() {
            return Err(TriageError::invalid("password", "is required"));
        }
        if !credentials.is_password_valid(username, password) {
            return Err(TriageError::IncorrectPassword);
        }

        let role = credentials.set_current_user(username)?;
        tracing::info!(%role, "user logged in");
        Ok(role)
    }

    /// Registers a new user, appending them to the credentials file.
    ///
    /// A username that already exists is replaced, matching how the file is read back.
    pub fn register(
        &self,
        admin_password: &str,
        role: Role,
        username: &str,
        password: &str,
    ) -> TriageResult<()> {
        let expected = self
            .cfg
            .admin_password()
            .ok_or(TriageError::RegistrationDisabled)?;
        if admin_password != expected {
            return Err(TriageError::IncorrectAdminPassword);
        }

        let username = validate_credential_field("username", username)?;
        let password = validate_credential_field("password", password)?;

        let mut credentials = self.write_credentials()?;

        fs::create_dir_all(self.cfg.data_dir()).map_err(TriageError::StorageDirCreation)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.cfg.credentials_path())
            .map_err(TriageError::FileWrite)?;
        append_credential(BufWriter::new(file), role, username, password)?;

        if credentials.is_username_valid(username) {
            tracing::info!(username, "replacing existing credentials");
        }
        credentials.add(Credential::new(role, username, password));
        tracing::info!(username, %role, "registered user");
        Ok(())
    }

    pub fn current_role(&self) -> TriageResult<Option<Role>> {
        Ok(self.read_credentials()?.current_role())
    }

    // ------------------------------------------------------------------------
    // Patients
    // ------------------------------------------------------------------------

    /// Admits a new patient. An existing patient with the same health card number is
    /// replaced.
    pub fn admit_patient(
        &self,
        name: &str,
        birth_date: NaiveDate,
        health_card_number: &str,
        arrival_time: DateTime<Utc>,
    ) -> TriageResult<Patient> {
        self.require_role(NURSE_ONLY, "admit patients")?;
        let identity = validate_identity(name, birth_date, health_card_number, arrival_time)?;

        let patient = Patient::from_identity(identity);
        let mut registry = self.write_registry()?;
        if registry.contains(patient.health_card_number()) {
            tracing::info!(
                health_card_number = patient.health_card_number(),
                "replacing patient with the same health card number"
            );
        }
        registry.add_patient(patient.clone());
        Ok(patient)
    }

    /// Edits the identity fields of an existing patient.
    pub fn update_patient(
        &self,
        health_card_number: &str,
        identity: PatientIdentity,
    ) -> TriageResult<Patient> {
        self.require_role(NURSE_ONLY, "edit patients")?;
        let identity = validate_identity(
            &identity.name,
            identity.birth_date,
            &identity.health_card_number,
            identity.arrival_time,
        )?;
        let new_key = identity.health_card_number.clone();

        let mut registry = self.write_registry()?;
        registry.update_identity(health_card_number, identity)?;
        registry.get_patient(&new_key).cloned()
    }

    pub fn get_patient(&self, health_card_number: &str) -> TriageResult<Patient> {
        self.require_role(ANY_ROLE, "view patients")?;
        self.read_registry()?
            .get_patient(health_card_number)
            .cloned()
    }

    /// Removes a patient; returns whether one was present.
    pub fn remove_patient(&self, health_card_number: &str) -> TriageResult<bool> {
        self.require_role(ANY_ROLE, "remove patients")?;
        let removed = self.write_registry()?.remove_patient(health_card_number);
        if removed.is_some() {
            tracing::info!(health_card_number, "removed patient");
        }
        Ok(removed.is_some())
    }

    pub fn list_patients(&self, filter: PatientFilter) -> TriageResult<Vec<Patient>> {
        self.require_role(ANY_ROLE, "list patients")?;
        let registry = self.read_registry()?;
        let patients = match filter {
            PatientFilter::ByUrgency => registry.waiting_patients_by_urgency(),
            PatientFilter::ByArrivalTime => registry.waiting_patients_by_arrival_time(),
            PatientFilter::All => registry.all_patients_by_name(),
        };
        Ok(patients.into_iter().cloned().collect())
    }

    // ------------------------------------------------------------------------
    // Clinical records
    // ------------------------------------------------------------------------

    /// Records vital signs and returns the resulting urgency trend.
    pub fn record_vital_signs(
        &self,
        health_card_number: &str,
        vitals: VitalSigns,
    ) -> TriageResult<Trend> {
        self.require_role(NURSE_ONLY, "record vital signs")?;
        require_finite("temperature", vitals.temperature())?;
        let mut registry = self.write_registry()?;
        let patient = registry.get_patient_mut(health_card_number)?;
        Ok(patient.record_vital_signs(
            vitals.temperature(),
            vitals.systolic_bp(),
            vitals.diastolic_bp(),
            vitals.heart_rate(),
        ))
    }

    pub fn record_symptoms(
        &self,
        health_card_number: &str,
        symptoms: &str,
    ) -> TriageResult<DateTime<Utc>> {
        self.require_role(NURSE_ONLY, "record symptoms")?;
        let symptoms = require_non_empty("symptoms", symptoms)?;
        let mut registry = self.write_registry()?;
        Ok(registry
            .get_patient_mut(health_card_number)?
            .record_symptoms(symptoms))
    }

    pub fn add_prescription(
        &self,
        health_card_number: &str,
        medication: &str,
        instructions: &str,
    ) -> TriageResult<DateTime<Utc>> {
        self.require_role(PHYSICIAN_ONLY, "add prescriptions")?;
        let medication = require_non_empty("medication", medication)?;
        let instructions = require_non_empty("instructions", instructions)?;
        let mut registry = self.write_registry()?;
        Ok(registry
            .get_patient_mut(health_card_number)?
            .add_prescription(medication, instructions))
    }

    pub fn mark_seen_by_doctor(&self, health_card_number: &str) -> TriageResult<DateTime<Utc>> {
        self.require_role(NURSE_ONLY, "record doctor visits")?;
        let mut registry = self.write_registry()?;
        Ok(registry
            .get_patient_mut(health_card_number)?
            .add_seen_by_doctor())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn require_role(&self, allowed: &[Role], action: &'static str) -> TriageResult<Role> {
        let role = self
            .read_credentials()?
            .current_role()
            .ok_or(TriageError::NotLoggedIn)?;
        if allowed.contains(&role) {
            Ok(role)
        } else {
            Err(TriageError::NotPermitted { role, action })
        }
    }

    fn read_registry(&self) -> TriageResult<RwLockReadGuard<'_, PatientRegistry>> {
        self.registry.read().map_err(|_| TriageError::LockPoisoned)
    }

    fn write_registry(&self) -> TriageResult<RwLockWriteGuard<'_, PatientRegistry>> {
        self.registry.write().map_err(|_| TriageError::LockPoisoned)
    }

    fn read_credentials(&self) -> TriageResult<RwLockReadGuard<'_, CredentialStore>> {
        self.credentials.read().map_err(|_| TriageError::LockPoisoned)
    }

    fn write_credentials(&self) -> TriageResult<RwLockWriteGuard<'_, CredentialStore>> {
        self.credentials
            .write()
            .map_err(|_| TriageError::LockPoisoned)
    }
}

fn validate_identity(
    name: &str,
    birth_date: NaiveDate,
    health_card_number: &str,
    arrival_time: DateTime<Utc>,
) -> TriageResult<PatientIdentity> {
    let now = Utc::now();
    let name = require_non_empty("name", name)?;
    let health_card_number = require_non_empty("health_card_number", health_card_number)?;
    require_date_not_in_future("birth_date", birth_date, now)?;
    require_not_in_future("arrival_time", arrival_time, now)?;

    Ok(PatientIdentity {
        name: name.to_string(),
        birth_date,
        health_card_number: health_card_number.to_string(),
        arrival_time,
    })
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
