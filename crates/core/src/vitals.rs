//! Vital-signs snapshot.

use crate::constants::{
    FEVER_TEMPERATURE, HIGH_DIASTOLIC_BP, HIGH_HEART_RATE, HIGH_SYSTOLIC_BP, LOW_HEART_RATE,
};
use serde::{Deserialize, Serialize, Serializer};

/// One set of measurements taken together. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VitalSigns {
    #[serde(serialize_with = "serialize_finite")]
    temperature: f64,
    systolic_bp: i32,
    diastolic_bp: i32,
    heart_rate: i32,
}

/// JSON has no NaN or infinity; serde_json would write `null` and the document could not be
/// read back.
fn serialize_finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "temperature must be a finite number, got {value}"
        )));
    }
    serializer.serialize_f64(*value)
}

impl VitalSigns {
    pub fn new(temperature: f64, systolic_bp: i32, diastolic_bp: i32, heart_rate: i32) -> Self {
        Self {
            temperature,
            systolic_bp,
            diastolic_bp,
            heart_rate,
        }
    }

    /// Body temperature in °C.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn systolic_bp(&self) -> i32 {
        self.systolic_bp
    }

    pub fn diastolic_bp(&self) -> i32 {
        self.diastolic_bp
    }

    /// Beats per minute.
    pub fn heart_rate(&self) -> i32 {
        self.heart_rate
    }

    pub fn has_fever(&self) -> bool {
        self.temperature >= FEVER_TEMPERATURE
    }

    pub fn has_high_blood_pressure(&self) -> bool {
        self.systolic_bp >= HIGH_SYSTOLIC_BP || self.diastolic_bp >= HIGH_DIASTOLIC_BP
    }

    /// Heart rate outside the 51..=99 bpm band.
    pub fn has_abnormal_heart_rate(&self) -> bool {
        self.heart_rate >= HIGH_HEART_RATE || self.heart_rate <= LOW_HEART_RATE
    }

    /// Urgency points contributed by these measurements (0 to 3).
    pub fn urgency_points(&self) -> i32 {
        [
            self.has_fever(),
            self.has_high_blood_pressure(),
            self.has_abnormal_heart_rate(),
        ]
        .into_iter()
        .filter(|flag| *flag)
        .count() as i32
    }
}

impl std::fmt::Display for VitalSigns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}°C, BP {}/{}, HR {}",
            self.temperature, self.systolic_bp, self.diastolic_bp, self.heart_rate
        )
    }
}
