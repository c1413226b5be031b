//! Append-only, time-keyed clinical history.
//!
//! A [`TimeSeriesRecord`] holds every value ever recorded for one attribute of a patient
//! (vital signs, symptoms, prescriptions), keyed by the instant it was recorded and ordered
//! oldest first. Entries are never removed or replaced.
//!
//! ## Key allocation
//!
//! Keys are allocated monotonically: if the wall clock has not moved past the newest key
//! (two writes within the clock's resolution, or a clock step backwards), the new key is
//! the newest key plus one millisecond. Two writes therefore never share a key and no value
//! is silently overwritten.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Returns an instant strictly after `last`, preferring `now` when it already is.
pub(crate) fn next_instant(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}

/// Chronologically keyed history of values of one type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeriesRecord<T> {
    entries: BTreeMap<DateTime<Utc>, T>,
}

impl<T> Default for TimeSeriesRecord<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> TimeSeriesRecord<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` keyed by the current time and returns the key used.
    pub fn record(&mut self, value: T) -> DateTime<Utc> {
        self.record_at(Utc::now(), value)
    }

    /// Appends `value` keyed by `now`, bumped forward if an entry at or after `now` exists.
    pub fn record_at(&mut self, now: DateTime<Utc>, value: T) -> DateTime<Utc> {
        let key = next_instant(self.latest_key(), now);
        self.entries.insert(key, value);
        key
    }

    /// The most recently recorded value.
    pub fn latest(&self) -> Option<&T> {
        self.entries.last_key_value().map(|(_, v)| v)
    }

    /// The key of the most recently recorded value.
    pub fn latest_key(&self) -> Option<DateTime<Utc>> {
        self.entries.last_key_value().map(|(k, _)| *k)
    }

    /// Exact-key lookup; there is no nearest-neighbour matching.
    pub fn value_at(&self, timestamp: &DateTime<Utc>) -> Option<&T> {
        self.entries.get(timestamp)
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&DateTime<Utc>, &T)> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> TimeSeriesRecord<T> {
    /// An owned copy of the full history, oldest first.
    pub fn history(&self) -> BTreeMap<DateTime<Utc>, T> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn empty_record_has_no_latest() {
        let record: TimeSeriesRecord<String> = TimeSeriesRecord::new();
        assert!(record.latest().is_none());
        assert!(record.latest_key().is_none());
        assert!(record.is_empty());
        assert!(record.history().is_empty());
    }

    #[test]
    fn latest_is_greatest_key() {
        let mut record = TimeSeriesRecord::new();
        record.record_at(at(0), "cough");
        record.record_at(at(10), "fever");
        assert_eq!(record.latest(), Some(&"fever"));
        assert_eq!(record.latest_key(), Some(at(10)));
    }

    #[test]
    fn same_instant_writes_are_both_kept() {
        let mut record = TimeSeriesRecord::new();
        let first = record.record_at(at(0), 1);
        let second = record.record_at(at(0), 2);

        assert!(second > first);
        assert_eq!(second - first, Duration::milliseconds(1));
        assert_eq!(record.len(), 2);
        assert_eq!(record.value_at(&first), Some(&1));
        assert_eq!(record.latest(), Some(&2));
    }

    #[test]
    fn clock_stepping_back_still_appends_after_latest() {
        let mut record = TimeSeriesRecord::new();
        record.record_at(at(100), "later");
        let key = record.record_at(at(50), "earlier clock");

        assert!(key > at(100));
        assert_eq!(record.latest(), Some(&"earlier clock"));
    }

    #[test]
    fn value_at_is_exact_match_only() {
        let mut record = TimeSeriesRecord::new();
        let key = record.record_at(at(0), 37.5);
        assert_eq!(record.value_at(&key), Some(&37.5));
        assert_eq!(record.value_at(&at(1)), None);
    }

    #[test]
    fn history_is_ascending_copy() {
        let mut record = TimeSeriesRecord::new();
        record.record_at(at(0), "a");
        record.record_at(at(5), "b");
        record.record_at(at(5), "c");

        let mut history = record.history();
        let values: Vec<_> = history.values().copied().collect();
        assert_eq!(values, vec!["a", "b", "c"]);

        history.clear();
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn record_uses_wall_clock() {
        let before = Utc::now();
        let mut record = TimeSeriesRecord::new();
        let key = record.record("now");
        assert!(key >= before);
        assert_eq!(record.value_at(&key), Some(&"now"));
    }

    #[test]
    fn serializes_as_timestamp_keyed_object() {
        let mut record = TimeSeriesRecord::new();
        record.record_at(at(0), "cough".to_string());

        let json = serde_json::to_value(&record).unwrap();
        let object = json.as_object().expect("object keyed by timestamp");
        assert_eq!(object.len(), 1);
        let (key, value) = object.iter().next().unwrap();
        assert_eq!(key.parse::<DateTime<Utc>>().unwrap(), at(0));
        assert_eq!(value, "cough");

        let back: TimeSeriesRecord<String> = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
