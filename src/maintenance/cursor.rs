//! The resumable position of a job.
//!
//! A cursor is everything a job needs to pick up where it left off: the
//! stage index, the offset inside that stage, and whatever running
//! totals or selection sets the stages have accumulated so far. It is
//! serialized as JSON and parked server-side between requests, so every
//! field must round-trip through serde.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named running state carried across requests.
///
/// Counts and id sets live in separate maps so a key can never silently
/// change shape between runs. File selections (which have no row ids)
/// go in `names`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulators {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    counts: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    ids: BTreeMap<String, Vec<i64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    names: BTreeMap<String, Vec<String>>,
}

impl Accumulators {
    pub fn add(&mut self, key: &str, n: i64) -> i64 {
        let entry = self.counts.entry(key.to_string()).or_insert(0);
        *entry += n;
        *entry
    }

    pub fn set_count(&mut self, key: &str, value: i64) {
        self.counts.insert(key.to_string(), value);
    }

    pub fn count(&self, key: &str) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn has_count(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    pub fn push_id(&mut self, key: &str, id: i64) {
        self.ids.entry(key.to_string()).or_default().push(id);
    }

    pub fn ids(&self, key: &str) -> &[i64] {
        self.ids.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn take_ids(&mut self, key: &str) -> Vec<i64> {
        self.ids.remove(key).unwrap_or_default()
    }

    pub fn push_name(&mut self, key: &str, name: impl Into<String>) {
        self.names.entry(key.to_string()).or_default().push(name.into());
    }

    pub fn names(&self, key: &str) -> &[String] {
        self.names.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn take_names(&mut self, key: &str) -> Vec<String> {
        self.names.remove(key).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty() && self.ids.is_empty() && self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub step: usize,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Accumulators::is_empty")]
    pub accumulators: Accumulators,
}

impl Cursor {
    pub fn fresh() -> Self {
        Self {
            step: 0,
            offset: 0,
            accumulators: Accumulators::default(),
        }
    }

    /// Move to the next stage. The offset always restarts at zero;
    /// accumulators survive so later stages and the final summary can
    /// read what earlier ones collected.
    pub fn advance_step(&mut self) {
        self.step += 1;
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cursor_starts_at_origin() {
        let cursor = Cursor::fresh();
        assert_eq!(cursor.step, 0);
        assert_eq!(cursor.offset, 0);
        assert!(cursor.accumulators.is_empty());
    }

    #[test]
    fn test_advance_step_resets_offset_and_keeps_accumulators() {
        let mut cursor = Cursor::fresh();
        cursor.offset = 731;
        cursor.accumulators.add("moved", 12);
        cursor.advance_step();
        assert_eq!(cursor.step, 1);
        assert_eq!(cursor.offset, 0);
        assert_eq!(cursor.accumulators.count("moved"), 12);
    }

    #[test]
    fn test_accumulator_counts() {
        let mut acc = Accumulators::default();
        assert_eq!(acc.count("missing"), 0);
        assert!(!acc.has_count("missing"));
        assert_eq!(acc.add("fixed", 3), 3);
        assert_eq!(acc.add("fixed", 2), 5);
        acc.set_count("total", 0);
        assert!(acc.has_count("total"));
        assert_eq!(acc.count("total"), 0);
    }

    #[test]
    fn test_accumulator_ids_and_names() {
        let mut acc = Accumulators::default();
        acc.push_id("orphans", 4);
        acc.push_id("orphans", 9);
        assert_eq!(acc.ids("orphans"), &[4, 9]);
        assert!(acc.ids("other").is_empty());
        acc.push_name("files", "3/19_ab.dat");
        assert_eq!(acc.names("files"), &["3/19_ab.dat".to_string()]);
        assert_eq!(acc.take_ids("orphans"), vec![4, 9]);
        assert!(acc.ids("orphans").is_empty());
    }

    #[test]
    fn test_cursor_round_trips_through_json() {
        let mut cursor = Cursor::fresh();
        cursor.step = 2;
        cursor.offset = 1500;
        cursor.accumulators.add("moved", 42);
        cursor.accumulators.push_id("failed", 77);
        cursor.accumulators.push_name("untracked", "1/stray.bin");

        let json = serde_json::to_string(&cursor).unwrap();
        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cursor);
    }

    #[test]
    fn test_minimal_cursor_json_omits_empty_accumulators() {
        let cursor = Cursor::fresh();
        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, r#"{"step":0,"offset":0}"#);
        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cursor);
    }
}
