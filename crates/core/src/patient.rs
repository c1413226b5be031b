//! Emergency-room patient and derived urgency.
//!
//! A [`Patient`] carries four identity fields and three append-only histories (vital signs,
//! symptoms, prescriptions) plus the instants at which a doctor saw them.
//!
//! ## Urgency
//!
//! Urgency is always computed fresh from the patient's age and latest vital signs:
//!
//! - +1 if the patient is younger than two years (counted even with no vitals recorded)
//! - +1 for a temperature of 39.0 °C or more
//! - +1 for systolic ≥ 140 or diastolic ≥ 90
//! - +1 for a heart rate ≥ 100 or ≤ 50
//!
//! The only memo kept is [`Patient::status`], the direction urgency moved at the last
//! [`Patient::record_vital_signs`] call. It is not refreshed by anything else.
//!
//! ## Equality
//!
//! Two patients are equal when name, birth date, health card number and arrival time all
//! match. Histories and status are ignored.

use crate::constants::INFANT_AGE_YEARS;
use crate::record::{next_instant, TimeSeriesRecord};
use crate::vitals::VitalSigns;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// Direction of the last urgency change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Trend {
    Decreasing,
    #[default]
    Steady,
    Increasing,
}

impl Trend {
    /// -1, 0 or +1.
    pub fn value(self) -> i8 {
        match self {
            Trend::Decreasing => -1,
            Trend::Steady => 0,
            Trend::Increasing => 1,
        }
    }

    pub fn from_value(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Trend::Decreasing),
            0 => Some(Trend::Steady),
            1 => Some(Trend::Increasing),
            _ => None,
        }
    }
}

impl From<Ordering> for Trend {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Trend::Decreasing,
            Ordering::Equal => Trend::Steady,
            Ordering::Greater => Trend::Increasing,
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Trend::Decreasing => "improving",
            Trend::Steady => "steady",
            Trend::Increasing => "worsening",
        };
        f.write_str(label)
    }
}

/// A medication and how to take it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Prescription {
    pub medication: String,
    pub instructions: String,
}

/// The identity fields of a patient, used when admitting or editing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientIdentity {
    pub name: String,
    pub birth_date: NaiveDate,
    pub health_card_number: String,
    pub arrival_time: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Patient {
    pub(crate) name: String,
    pub(crate) birth_date: NaiveDate,
    pub(crate) health_card_number: String,
    pub(crate) arrival_time: DateTime<Utc>,
    pub(crate) vital_signs: TimeSeriesRecord<VitalSigns>,
    pub(crate) symptoms: TimeSeriesRecord<String>,
    pub(crate) prescriptions: TimeSeriesRecord<Prescription>,
    pub(crate) times_seen_by_doctor: BTreeSet<DateTime<Utc>>,
    pub(crate) status: Trend,
}

impl Patient {
    /// Creates a patient with empty histories. Sub-second precision of `arrival_time` is
    /// dropped.
    pub fn new(
        name: impl Into<String>,
        birth_date: NaiveDate,
        health_card_number: impl Into<String>,
        arrival_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            birth_date,
            health_card_number: health_card_number.into(),
            arrival_time: arrival_time.trunc_subsecs(0),
            vital_signs: TimeSeriesRecord::new(),
            symptoms: TimeSeriesRecord::new(),
            prescriptions: TimeSeriesRecord::new(),
            times_seen_by_doctor: BTreeSet::new(),
            status: Trend::Steady,
        }
    }

    pub fn from_identity(identity: PatientIdentity) -> Self {
        Self::new(
            identity.name,
            identity.birth_date,
            identity.health_card_number,
            identity.arrival_time,
        )
    }

    pub fn identity(&self) -> PatientIdentity {
        PatientIdentity {
            name: self.name.clone(),
            birth_date: self.birth_date,
            health_card_number: self.health_card_number.clone(),
            arrival_time: self.arrival_time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn set_birth_date(&mut self, birth_date: NaiveDate) {
        self.birth_date = birth_date;
    }

    pub fn health_card_number(&self) -> &str {
        &self.health_card_number
    }

    /// Changing the key of a patient held in a registry goes through
    /// [`PatientRegistry::update_identity`](crate::PatientRegistry::update_identity).
    pub fn set_health_card_number(&mut self, health_card_number: impl Into<String>) {
        self.health_card_number = health_card_number.into();
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.arrival_time
    }

    pub fn set_arrival_time(&mut self, arrival_time: DateTime<Utc>) {
        self.arrival_time = arrival_time.trunc_subsecs(0);
    }

    /// Whole years since birth, counting every year as 365 days.
    pub fn age(&self) -> i64 {
        self.age_at(Utc::now())
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.birth_date).num_days() / 365
    }

    /// Urgency from 0 to 4; higher is more urgent.
    pub fn urgency(&self) -> i32 {
        self.urgency_at(Utc::now())
    }

    pub fn urgency_at(&self, now: DateTime<Utc>) -> i32 {
        let mut urgency = 0;

        if self.age_at(now) < INFANT_AGE_YEARS {
            urgency += 1;
        }

        if let Some(vitals) = self.vital_signs.latest() {
            urgency += vitals.urgency_points();
        }

        urgency
    }

    /// Direction urgency moved at the last vital-signs recording.
    pub fn status(&self) -> Trend {
        self.status
    }

    /// Appends a vital-signs snapshot and updates [`status`](Self::status) with the
    /// direction urgency moved. Returns the new status.
    pub fn record_vital_signs(
        &mut self,
        temperature: f64,
        systolic_bp: i32,
        diastolic_bp: i32,
        heart_rate: i32,
    ) -> Trend {
        let now = Utc::now();
        let previous = self.urgency_at(now);

        let vitals = VitalSigns::new(temperature, systolic_bp, diastolic_bp, heart_rate);
        self.vital_signs.record_at(now, vitals);

        let current = self.urgency_at(now);
        self.status = Trend::from(current.cmp(&previous));

        tracing::debug!(
            health_card_number = %self.health_card_number,
            previous,
            current,
            "recorded vital signs"
        );
        self.status
    }

    pub fn record_symptoms(&mut self, symptoms: impl Into<String>) -> DateTime<Utc> {
        let at = self.symptoms.record(symptoms.into());
        tracing::debug!(health_card_number = %self.health_card_number, %at, "recorded symptoms");
        at
    }

    pub fn add_prescription(
        &mut self,
        medication: impl Into<String>,
        instructions: impl Into<String>,
    ) -> DateTime<Utc> {
        let at = self.prescriptions.record(Prescription {
            medication: medication.into(),
            instructions: instructions.into(),
        });
        tracing::debug!(health_card_number = %self.health_card_number, %at, "added prescription");
        at
    }

    /// Records that a doctor saw the patient now.
    pub fn add_seen_by_doctor(&mut self) -> DateTime<Utc> {
        let seen_at = next_instant(self.last_seen_by_doctor(), Utc::now());
        self.times_seen_by_doctor.insert(seen_at);
        tracing::debug!(health_card_number = %self.health_card_number, %seen_at, "seen by doctor");
        seen_at
    }

    pub fn has_been_seen_by_doctor(&self) -> bool {
        !self.times_seen_by_doctor.is_empty()
    }

    pub fn last_seen_by_doctor(&self) -> Option<DateTime<Utc>> {
        self.times_seen_by_doctor.last().copied()
    }

    /// Doctor visits, oldest first.
    pub fn times_seen_by_doctor(&self) -> Vec<DateTime<Utc>> {
        self.times_seen_by_doctor.iter().copied().collect()
    }

    pub fn vital_signs(&self) -> &TimeSeriesRecord<VitalSigns> {
        &self.vital_signs
    }

    pub fn symptoms(&self) -> &TimeSeriesRecord<String> {
        &self.symptoms
    }

    pub fn prescriptions(&self) -> &TimeSeriesRecord<Prescription> {
        &self.prescriptions
    }

    pub fn latest_vital_signs(&self) -> Option<&VitalSigns> {
        self.vital_signs.latest()
    }

    pub fn latest_symptoms(&self) -> Option<&str> {
        self.symptoms.latest().map(String::as_str)
    }

    pub fn latest_prescription(&self) -> Option<&Prescription> {
        self.prescriptions.latest()
    }
}

impl PartialEq for Patient {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.birth_date == other.birth_date
            && self.health_card_number == other.health_card_number
            && self.arrival_time == other.arrival_time
    }
}

impl Eq for Patient {}

impl Hash for Patient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.birth_date.hash(state);
        self.health_card_number.hash(state);
        self.arrival_time.hash(state);
    }
}

impl std::fmt::Display for Patient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Patient{{name={}, birthDate={}, healthCardNumber={}, arrivalTime={}}}",
            self.name,
            self.birth_date.format("%Y-%m-%d"),
            self.health_card_number,
            self.arrival_time.format("%Y-%m-%dT%H:%M")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn years_ago(years: i64) -> NaiveDate {
        Utc::now().date_naive() - Duration::days(365 * years + 30)
    }

    fn patient(name: &str, birth_date: NaiveDate, hcn: &str) -> Patient {
        Patient::new(name, birth_date, hcn, Utc::now())
    }

    #[test]
    fn new_strips_sub_second_precision() {
        let arrival = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let p = Patient::new("Bob", years_ago(30), "QAZ", arrival);
        assert_eq!(p.arrival_time(), Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    }

    #[test]
    fn set_arrival_time_strips_sub_second_precision() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        p.set_arrival_time(Utc.timestamp_opt(1_700_000_100, 999_000_000).unwrap());
        assert_eq!(p.arrival_time(), Utc.timestamp_opt(1_700_000_100, 0).unwrap());
    }

    #[test]
    fn age_truncates_with_365_day_years() {
        let birth = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let p = Patient::new("Kim", birth, "WSX", Utc::now());

        // 2000-01-01 to 2001-01-01 is 366 days: one year.
        let now = Utc.with_ymd_and_hms(2001, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(p.age_at(now), 1);

        // 729 days: still one year.
        let now = Utc.with_ymd_and_hms(2001, 12, 30, 0, 0, 0).unwrap();
        assert_eq!(p.age_at(now), 1);

        // 730 days: two years, although the calendar birthday is a day away.
        let now = Utc.with_ymd_and_hms(2001, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(p.age_at(now), 2);
    }

    #[test]
    fn urgency_without_vitals_depends_only_on_age() {
        let infant = patient("Eli", years_ago(1), "EDC");
        let adult = patient("Bob", years_ago(30), "QAZ");
        assert_eq!(infant.urgency(), 1);
        assert_eq!(adult.urgency(), 0);
    }

    #[test]
    fn urgency_counts_each_abnormal_vital() {
        let mut bob = patient("Bob", years_ago(30), "QAZ");
        bob.record_vital_signs(40.0, 100, 50, 70);
        assert_eq!(bob.urgency(), 1);

        let mut eli = patient("Eli", years_ago(1), "EDC");
        eli.record_vital_signs(40.0, 100, 100, 70);
        assert_eq!(eli.urgency(), 3);

        let mut joe = patient("Joe", years_ago(52), "TGB");
        joe.record_vital_signs(35.0, 150, 50, 40);
        assert_eq!(joe.urgency(), 2);

        let mut pat = patient("Pat", years_ago(1), "RFV");
        pat.record_vital_signs(41.0, 180, 60, 120);
        assert_eq!(pat.urgency(), 4);
    }

    #[test]
    fn urgency_uses_latest_vitals_only() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        p.record_vital_signs(40.0, 150, 95, 120);
        p.record_vital_signs(37.0, 120, 80, 70);
        assert_eq!(p.urgency(), 0);
    }

    #[test]
    fn status_tracks_direction_of_last_change() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        assert_eq!(p.status(), Trend::Steady);

        assert_eq!(p.record_vital_signs(40.0, 120, 80, 70), Trend::Increasing);
        assert_eq!(p.record_vital_signs(41.0, 150, 80, 70), Trend::Increasing);
        assert_eq!(p.record_vital_signs(41.0, 150, 80, 70), Trend::Steady);
        assert_eq!(p.record_vital_signs(37.0, 120, 80, 70), Trend::Decreasing);
        assert_eq!(p.status(), Trend::Decreasing);
        assert!((-1..=1).contains(&p.status().value()));
    }

    #[test]
    fn status_is_not_refreshed_by_other_writes() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        p.record_vital_signs(40.0, 120, 80, 70);
        p.record_symptoms("chills");
        p.add_prescription("Acetaminophen", "500mg every 6 hours");
        p.add_seen_by_doctor();
        assert_eq!(p.status(), Trend::Increasing);
    }

    #[test]
    fn trend_values_round_trip() {
        for trend in [Trend::Decreasing, Trend::Steady, Trend::Increasing] {
            assert_eq!(Trend::from_value(trend.value()), Some(trend));
        }
        assert_eq!(Trend::from_value(2), None);
    }

    #[test]
    fn doctor_visits_are_optional_until_recorded() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        assert!(!p.has_been_seen_by_doctor());
        assert!(p.last_seen_by_doctor().is_none());

        let first = p.add_seen_by_doctor();
        let second = p.add_seen_by_doctor();
        assert!(second > first);
        assert!(p.has_been_seen_by_doctor());
        assert_eq!(p.last_seen_by_doctor(), Some(second));
        assert_eq!(p.times_seen_by_doctor(), vec![first, second]);
    }

    #[test]
    fn symptoms_and_prescriptions_are_appended() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        p.record_symptoms("headache");
        p.record_symptoms("nausea");
        p.add_prescription("Ibuprofen", "with food");

        assert_eq!(p.symptoms().len(), 2);
        assert_eq!(p.latest_symptoms(), Some("nausea"));
        assert_eq!(
            p.latest_prescription(),
            Some(&Prescription {
                medication: "Ibuprofen".into(),
                instructions: "with food".into(),
            })
        );
    }

    #[test]
    fn equality_ignores_history() {
        let arrival = Utc::now();
        let a = Patient::new("Bob", years_ago(30), "QAZ", arrival);
        let mut b = a.clone();
        b.record_vital_signs(40.0, 150, 95, 120);
        b.add_seen_by_doctor();
        assert_eq!(a, b);

        b.set_name("Robert");
        assert_ne!(a, b);
    }

    #[test]
    fn setters_accept_any_value() {
        let mut p = patient("Bob", years_ago(30), "QAZ");
        p.set_name("");
        p.set_health_card_number("");
        p.set_birth_date(NaiveDate::from_ymd_opt(2999, 1, 1).unwrap());
        assert_eq!(p.name(), "");
        assert_eq!(p.health_card_number(), "");
        assert!(p.age() <= 0);
    }

    #[test]
    fn display_matches_summary_format() {
        let p = Patient::new(
            "Bob",
            NaiveDate::from_ymd_opt(1994, 7, 8).unwrap(),
            "QAZ",
            Utc.with_ymd_and_hms(2014, 3, 1, 9, 30, 15).unwrap(),
        );
        assert_eq!(
            p.to_string(),
            "Patient{name=Bob, birthDate=1994-07-08, healthCardNumber=QAZ, arrivalTime=2014-03-01T09:30}"
        );
    }
}
