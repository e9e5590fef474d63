//! Per-subject statistics and the pure projection applied on status
//! transitions.
//!
//! `total` is authoritative: it is set only from backend responses and is
//! never touched by the projection. `classes_needed` / `bunkable_classes`
//! are likewise backend-computed and stay stale between refetches; only
//! `present`, `absent` and `percentage` are projected locally.

use serde::{Deserialize, Serialize};

use crate::record::AttendanceStatus;

/// Aggregate attendance figures for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject_id: String,
    pub present: u32,
    pub absent: u32,
    pub total: u32,
    pub percentage: f64,
    pub classes_needed: u32,
    pub bunkable_classes: u32,
}

impl SubjectStats {
    /// Zeroed stats for a subject that has no authoritative figures yet.
    pub fn empty(subject_id: &str) -> SubjectStats {
        SubjectStats {
            subject_id: subject_id.to_string(),
            present: 0,
            absent: 0,
            total: 0,
            percentage: 0.0,
            classes_needed: 0,
            bunkable_classes: 0,
        }
    }
}

/// Apply one status transition to a subject's stats.
///
/// Pure and total. `cancelled` transitions are neutral in both directions,
/// decrements floor at zero, and a no-op transition (`previous == new`)
/// changes nothing (in practice the engine intercepts that case as a
/// toggle-delete before projecting).
pub fn project(
    stats: &SubjectStats,
    previous: Option<AttendanceStatus>,
    new: Option<AttendanceStatus>,
) -> SubjectStats {
    use AttendanceStatus::{Absent, Cancelled, Present};

    let mut next = stats.clone();

    let (present_delta, absent_delta): (i64, i64) = match (previous, new) {
        (None, Some(Present)) => (1, 0),
        (None, Some(Absent)) => (0, 1),
        (Some(Present), None) => (-1, 0),
        (Some(Absent), None) => (0, -1),
        (Some(Present), Some(Absent)) => (-1, 1),
        (Some(Absent), Some(Present)) => (1, -1),
        // Cancelled is neutral in both directions.
        (_, Some(Cancelled)) | (Some(Cancelled), _) => (0, 0),
        (None, None) => (0, 0),
        (Some(Present), Some(Present)) | (Some(Absent), Some(Absent)) => (0, 0),
    };

    next.present = apply_delta(next.present, present_delta);
    next.absent = apply_delta(next.absent, absent_delta);
    next.percentage = if next.total > 0 {
        f64::from(next.present) / f64::from(next.total) * 100.0
    } else {
        0.0
    };

    next
}

fn apply_delta(count: u32, delta: i64) -> u32 {
    // Floor at 0; counts can only be off-by-one transiently and the next
    // authoritative refetch corrects them.
    u32::try_from(i64::from(count) + delta).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> SubjectStats {
        SubjectStats {
            subject_id: "MATH101".to_string(),
            present: 10,
            absent: 2,
            total: 15,
            percentage: 66.67,
            classes_needed: 3,
            bunkable_classes: 1,
        }
    }

    #[test]
    fn test_transition_table() {
        use AttendanceStatus::{Absent, Present};

        let cases: &[(Option<AttendanceStatus>, Option<AttendanceStatus>, u32, u32)] = &[
            (None, Some(Present), 11, 2),
            (None, Some(Absent), 10, 3),
            (Some(Present), None, 9, 2),
            (Some(Absent), None, 10, 1),
            (Some(Present), Some(Absent), 9, 3),
            (Some(Absent), Some(Present), 11, 1),
        ];
        for (previous, new, present, absent) in cases {
            let projected = project(&baseline(), *previous, *new);
            assert_eq!(projected.present, *present, "{previous:?} -> {new:?}");
            assert_eq!(projected.absent, *absent, "{previous:?} -> {new:?}");
        }
    }

    #[test]
    fn test_total_is_never_mutated() {
        use AttendanceStatus::{Absent, Cancelled, Present};

        let all = [None, Some(Present), Some(Absent), Some(Cancelled)];
        for previous in all {
            for new in all {
                assert_eq!(project(&baseline(), previous, new).total, 15);
            }
        }
    }

    #[test]
    fn test_cancelled_is_neutral() {
        use AttendanceStatus::{Absent, Cancelled, Present};

        for other in [None, Some(Present), Some(Absent)] {
            let to_cancelled = project(&baseline(), other, Some(Cancelled));
            assert_eq!((to_cancelled.present, to_cancelled.absent), (10, 2));
            let from_cancelled = project(&baseline(), Some(Cancelled), other);
            assert_eq!((from_cancelled.present, from_cancelled.absent), (10, 2));
        }
    }

    #[test]
    fn test_decrements_floor_at_zero() {
        let empty = SubjectStats::empty("MATH101");
        let projected = project(&empty, Some(AttendanceStatus::Present), None);
        assert_eq!(projected.present, 0);
        assert_eq!(projected.absent, 0);
    }

    #[test]
    fn test_percentage_recomputed() {
        let projected = project(&baseline(), None, Some(AttendanceStatus::Absent));
        // 10 present out of 15 total -> 66.7%
        assert!((projected.percentage - 66.666).abs() < 0.01);
        assert_eq!(projected.absent, 3);
    }

    #[test]
    fn test_percentage_zero_when_no_total() {
        let empty = SubjectStats::empty("MATH101");
        let projected = project(&empty, None, Some(AttendanceStatus::Present));
        assert_eq!(projected.percentage, 0.0);
    }

    #[test]
    fn test_derived_targets_left_stale() {
        let projected = project(&baseline(), None, Some(AttendanceStatus::Absent));
        assert_eq!(projected.classes_needed, 3);
        assert_eq!(projected.bunkable_classes, 1);
    }

    #[test]
    fn test_projection_inverts_exactly() {
        use AttendanceStatus::{Absent, Present};

        for (previous, new) in [
            (None, Some(Present)),
            (None, Some(Absent)),
            (Some(Present), Some(Absent)),
            (Some(Absent), Some(Present)),
        ] {
            let forward = project(&baseline(), previous, new);
            let back = project(&forward, new, previous);
            assert_eq!(
                (back.present, back.absent, back.total),
                (10, 2, 15),
                "{previous:?} -> {new:?}"
            );
        }
    }
}
