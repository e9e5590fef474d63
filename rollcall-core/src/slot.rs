//! Slot descriptors and canonical slot keys.
//!
//! A "slot" is one schedulable occurrence of a subject on a date. The key
//! derived here is the sole identifier the store indexes records by, so it
//! must be deterministic and collision-free across descriptor kinds (except
//! the intentional legacy fallback for records created before descriptors
//! existed).

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Which kind of occurrence a mark applies to. Exactly one case describes a
/// given occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotDescriptor {
    /// A fixed daily period, numbered within the timetable.
    Standard { index: u32 },
    /// An ad hoc scheduled time range.
    CustomRange { start: NaiveTime, end: NaiveTime },
    /// A class added outside the regular timetable, numbered per
    /// date+subject.
    ExtraClass { index: u32 },
    /// No descriptor: records that predate slot descriptors.
    Legacy,
}

/// Canonical identifier for a lecture occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey(String);

impl SlotKey {
    /// Derive the canonical key for `(date, subject, descriptor)`.
    ///
    /// Deterministic and total: the same inputs always produce the same key,
    /// and distinct descriptor kinds/values at the same date+subject never
    /// produce the same key.
    pub fn canonical(date: NaiveDate, subject_id: &str, descriptor: &SlotDescriptor) -> SlotKey {
        let day = date.format("%Y-%m-%d");
        let key = match descriptor {
            SlotDescriptor::ExtraClass { index } => {
                format!("{day}_{subject_id}_extra{index}")
            }
            SlotDescriptor::Standard { index } => {
                format!("{day}_{subject_id}_slot{index}")
            }
            SlotDescriptor::CustomRange { start, end } => {
                format!(
                    "{day}_{subject_id}_{}-{}",
                    start.format("%H:%M"),
                    end.format("%H:%M")
                )
            }
            SlotDescriptor::Legacy => format!("{day}_{subject_id}"),
        };
        SlotKey(key)
    }

    /// The bare `date-subject` key used by records created before slot
    /// descriptors existed.
    pub fn legacy(date: NaiveDate, subject_id: &str) -> SlotKey {
        SlotKey::canonical(date, subject_id, &SlotDescriptor::Legacy)
    }

    /// Keys to try, in order, when looking up an *existing* record for this
    /// occurrence: the descriptor-specific key first, then the legacy
    /// fallback. This lets newly-introduced descriptor kinds find older,
    /// descriptor-less records without a migration step.
    pub fn lookup_order(
        date: NaiveDate,
        subject_id: &str,
        descriptor: &SlotDescriptor,
    ) -> Vec<SlotKey> {
        let canonical = SlotKey::canonical(date, subject_id, descriptor);
        let legacy = SlotKey::legacy(date, subject_id);
        if canonical == legacy {
            vec![canonical]
        } else {
            vec![canonical, legacy]
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()
    }

    #[test]
    fn test_canonical_is_deterministic() {
        let a = SlotKey::canonical(day(), "MATH101", &SlotDescriptor::Standard { index: 3 });
        let b = SlotKey::canonical(day(), "MATH101", &SlotDescriptor::Standard { index: 3 });
        assert_eq!(a, b);
    }

    #[test]
    fn test_descriptor_kinds_never_collide() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        let keys = [
            SlotKey::canonical(day(), "MATH101", &SlotDescriptor::Standard { index: 1 }),
            SlotKey::canonical(day(), "MATH101", &SlotDescriptor::Standard { index: 2 }),
            SlotKey::canonical(day(), "MATH101", &SlotDescriptor::ExtraClass { index: 1 }),
            SlotKey::canonical(day(), "MATH101", &SlotDescriptor::CustomRange { start, end }),
            SlotKey::canonical(day(), "MATH101", &SlotDescriptor::Legacy),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_different_subjects_and_dates_differ() {
        let other_day = NaiveDate::from_ymd_opt(2025, 3, 21).unwrap();
        let desc = SlotDescriptor::Standard { index: 1 };
        assert_ne!(
            SlotKey::canonical(day(), "MATH101", &desc),
            SlotKey::canonical(day(), "PHYS201", &desc)
        );
        assert_ne!(
            SlotKey::canonical(day(), "MATH101", &desc),
            SlotKey::canonical(other_day, "MATH101", &desc)
        );
    }

    #[test]
    fn test_lookup_order_falls_back_to_legacy() {
        let order = SlotKey::lookup_order(day(), "MATH101", &SlotDescriptor::ExtraClass { index: 2 });
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].as_str(), "2025-03-20_MATH101_extra2");
        assert_eq!(order[1].as_str(), "2025-03-20_MATH101");
    }

    #[test]
    fn test_legacy_lookup_has_single_candidate() {
        let order = SlotKey::lookup_order(day(), "MATH101", &SlotDescriptor::Legacy);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].as_str(), "2025-03-20_MATH101");
    }
}
