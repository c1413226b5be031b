//! The emergency-room patient registry.
//!
//! [`PatientRegistry`] maps health card numbers to [`Patient`]s. Inserting under an existing
//! number replaces the earlier patient (last write wins). The registry exposes three ordered
//! views used to drive the waiting-room list, and a JSON round trip for persistence.
//!
//! ## Orderings
//!
//! Every view has a total order so results are reproducible:
//!
//! | View                                   | Filter  | Order                                            |
//! |----------------------------------------|---------|--------------------------------------------------|
//! | [`all_patients_by_name`]               | none    | name asc, health card number asc                 |
//! | [`waiting_patients_by_urgency`]        | waiting | urgency desc, arrival desc, health card number asc |
//! | [`waiting_patients_by_arrival_time`]   | waiting | arrival desc, health card number desc            |
//!
//! "Waiting" means not yet seen by a doctor.
//!
//! ## Persistence format
//!
//! A JSON object keyed by health card number. Each patient carries its identity fields, its
//! three histories as objects keyed by RFC 3339 timestamps, the doctor-visit instants and the
//! last urgency trend (-1, 0 or 1):
//!
//! ```text
//! {
//!   "QAZ": {
//!     "name": "Bob",
//!     "birthDate": "1994-07-08",
//!     "healthCardNumber": "QAZ",
//!     "arrivalTime": "2014-03-01T09:30:15Z",
//!     "vitalSigns": { "2014-03-01T09:41:02.118Z": { "temperature": 40.0, ... } },
//!     "symptoms": {},
//!     "prescriptions": {},
//!     "timesSeenByDoctor": [],
//!     "status": 1
//!   }
//! }
//! ```
//!
//! [`all_patients_by_name`]: PatientRegistry::all_patients_by_name
//! [`waiting_patients_by_urgency`]: PatientRegistry::waiting_patients_by_urgency
//! [`waiting_patients_by_arrival_time`]: PatientRegistry::waiting_patients_by_arrival_time

use crate::patient::{Patient, PatientIdentity, Prescription, Trend};
use crate::record::TimeSeriesRecord;
use crate::vitals::VitalSigns;
use crate::{TriageError, TriageResult};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

#[derive(Clone, Debug, Default)]
pub struct PatientRegistry {
    patients: BTreeMap<String, Patient>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `patient` keyed by its health card number, replacing any earlier entry.
    pub fn add_patient(&mut self, patient: Patient) {
        let key = patient.health_card_number().to_string();
        if self.patients.insert(key, patient).is_some() {
            tracing::debug!("replaced existing patient with the same health card number");
        }
    }

    pub fn add_patient_from_fields(
        &mut self,
        name: impl Into<String>,
        birth_date: NaiveDate,
        health_card_number: impl Into<String>,
        arrival_time: DateTime<Utc>,
    ) {
        self.add_patient(Patient::new(
            name,
            birth_date,
            health_card_number,
            arrival_time,
        ));
    }

    pub fn get_patient(&self, health_card_number: &str) -> TriageResult<&Patient> {
        self.patients
            .get(health_card_number)
            .ok_or_else(|| TriageError::PatientNotFound(health_card_number.to_string()))
    }

    pub fn get_patient_mut(&mut self, health_card_number: &str) -> TriageResult<&mut Patient> {
        self.patients
            .get_mut(health_card_number)
            .ok_or_else(|| TriageError::PatientNotFound(health_card_number.to_string()))
    }

    /// Removes the patient if present; absent keys are ignored.
    pub fn remove_patient(&mut self, health_card_number: &str) -> Option<Patient> {
        self.patients.remove(health_card_number)
    }

    /// Replaces the identity fields of a patient, re-keying the entry when the health card
    /// number changes. Histories and status are kept.
    pub fn update_identity(
        &mut self,
        health_card_number: &str,
        identity: PatientIdentity,
    ) -> TriageResult<()> {
        let mut patient = self
            .patients
            .remove(health_card_number)
            .ok_or_else(|| TriageError::PatientNotFound(health_card_number.to_string()))?;

        patient.set_name(identity.name);
        patient.set_birth_date(identity.birth_date);
        patient.set_health_card_number(identity.health_card_number);
        patient.set_arrival_time(identity.arrival_time);

        self.add_patient(patient);
        Ok(())
    }

    pub fn contains(&self, health_card_number: &str) -> bool {
        self.patients.contains_key(health_card_number)
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn clear(&mut self) {
        self.patients.clear();
    }

    pub fn all_patients_by_name(&self) -> Vec<&Patient> {
        let mut patients: Vec<&Patient> = self.patients.values().collect();
        patients.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.health_card_number().cmp(b.health_card_number()))
        });
        patients
    }

    pub fn waiting_patients_by_urgency(&self) -> Vec<&Patient> {
        self.waiting_patients_by_urgency_at(Utc::now())
    }

    /// Waiting patients, most urgent first; among equal urgency the latest arrival leads.
    pub fn waiting_patients_by_urgency_at(&self, now: DateTime<Utc>) -> Vec<&Patient> {
        let mut scored: Vec<(i32, &Patient)> = self
            .waiting_patients()
            .map(|p| (p.urgency_at(now), p))
            .collect();

        scored.sort_by(|(urgency_a, a), (urgency_b, b)| {
            urgency_b
                .cmp(urgency_a)
                .then_with(|| b.arrival_time().cmp(&a.arrival_time()))
                .then_with(|| a.health_card_number().cmp(b.health_card_number()))
        });

        scored.into_iter().map(|(_, p)| p).collect()
    }

    /// Waiting patients, latest arrival first.
    pub fn waiting_patients_by_arrival_time(&self) -> Vec<&Patient> {
        let mut patients: Vec<&Patient> = self.waiting_patients().collect();
        patients.sort_by(|a, b| {
            b.arrival_time()
                .cmp(&a.arrival_time())
                .then_with(|| b.health_card_number().cmp(a.health_card_number()))
        });
        patients
    }

    fn waiting_patients(&self) -> impl Iterator<Item = &Patient> + '_ {
        self.patients
            .values()
            .filter(|p| !p.has_been_seen_by_doctor())
    }

    /// Writes the whole registry as pretty-printed JSON.
    ///
    /// The document is built in full before anything is written, so a patient that cannot be
    /// represented (a non-finite temperature) fails with [`TriageError::Serialization`] and
    /// leaves `writer` untouched.
    pub fn save_to_writer<W: Write>(&self, mut writer: W) -> TriageResult<()> {
        let wire: BTreeMap<&str, PatientWire> = self
            .patients
            .iter()
            .map(|(key, patient)| (key.as_str(), PatientWire::from(patient)))
            .collect();

        let document = serde_json::to_vec_pretty(&wire).map_err(TriageError::Serialization)?;
        writer.write_all(&document).map_err(TriageError::FileWrite)?;
        writer.flush().map_err(TriageError::FileWrite)?;

        tracing::debug!(patients = self.patients.len(), "serialized registry");
        Ok(())
    }

    /// Replaces the registry contents with the document read from `reader`.
    ///
    /// The registry is left untouched if the document cannot be read or parsed.
    ///
    /// # Errors
    ///
    /// - [`TriageError::FileRead`] if reading fails.
    /// - [`TriageError::MalformedRegistry`] if the JSON does not match the schema. The
    ///   message names the failing path (for example `QAZ.vitalSigns`). An entry whose key
    ///   differs from its `healthCardNumber` is also rejected.
    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> TriageResult<()> {
        let mut deserializer = serde_json::Deserializer::from_reader(reader);

        let wire: BTreeMap<String, PatientWire> =
            match serde_path_to_error::deserialize(&mut deserializer) {
                Ok(parsed) => parsed,
                Err(err) => {
                    let path = err.path().to_string();
                    let source = err.into_inner();
                    if source.is_io() {
                        return Err(TriageError::FileRead(source.into()));
                    }
                    let path = if path.is_empty() || path == "." {
                        "<root>"
                    } else {
                        path.as_str()
                    };
                    return Err(TriageError::MalformedRegistry(format!(
                        "schema mismatch at {path}: {source}"
                    )));
                }
            };

        deserializer
            .end()
            .map_err(|e| TriageError::MalformedRegistry(format!("trailing data: {e}")))?;

        let patients = wire
            .into_iter()
            .map(|(key, patient)| {
                if key != patient.health_card_number {
                    return Err(TriageError::MalformedRegistry(format!(
                        "entry {key} holds healthCardNumber {}",
                        patient.health_card_number
                    )));
                }
                Ok((key, patient.into_patient()?))
            })
            .collect::<TriageResult<BTreeMap<_, _>>>()?;

        tracing::debug!(patients = patients.len(), "loaded registry");
        self.patients = patients;
        Ok(())
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PatientWire {
    name: String,
    birth_date: NaiveDate,
    health_card_number: String,
    arrival_time: DateTime<Utc>,
    #[serde(default)]
    vital_signs: TimeSeriesRecord<VitalSigns>,
    #[serde(default)]
    symptoms: TimeSeriesRecord<String>,
    #[serde(default)]
    prescriptions: TimeSeriesRecord<Prescription>,
    #[serde(default)]
    times_seen_by_doctor: BTreeSet<DateTime<Utc>>,
    #[serde(default)]
    status: i8,
}

impl From<&Patient> for PatientWire {
    fn from(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            birth_date: patient.birth_date,
            health_card_number: patient.health_card_number.clone(),
            arrival_time: patient.arrival_time,
            vital_signs: patient.vital_signs.clone(),
            symptoms: patient.symptoms.clone(),
            prescriptions: patient.prescriptions.clone(),
            times_seen_by_doctor: patient.times_seen_by_doctor.clone(),
            status: patient.status.value(),
        }
    }
}

impl PatientWire {
    fn into_patient(self) -> TriageResult<Patient> {
        let status = Trend::from_value(self.status).ok_or_else(|| {
            TriageError::MalformedRegistry(format!(
                "status of patient {} must be -1, 0 or 1, got {}",
                self.health_card_number, self.status
            ))
        })?;

        Ok(Patient {
            name: self.name,
            birth_date: self.birth_date,
            health_card_number: self.health_card_number,
            arrival_time: self.arrival_time.trunc_subsecs(0),
            vital_signs: self.vital_signs,
            symptoms: self.symptoms,
            prescriptions: self.prescriptions,
            times_seen_by_doctor: self.times_seen_by_doctor,
            status,
        })
    }
}
