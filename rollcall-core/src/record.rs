//! Attendance statuses and per-slot records.

use serde::{Deserialize, Serialize};

use crate::error::{RollcallError, RollcallResult};

/// The mark a student can put on a lecture occurrence.
///
/// The "unmarked" case is modelled by the absence of a record, not by a
/// variant, so every stored record carries a real status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Cancelled,
}

impl AttendanceStatus {
    /// Parse a backend status string, tolerating casing differences.
    pub fn parse(s: &str) -> RollcallResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "cancelled" | "canceled" => Ok(AttendanceStatus::Cancelled),
            other => Err(RollcallError::UnknownStatus(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Cancelled => "cancelled",
        }
    }
}

/// Backend-assigned identifier for a stored attendance record.
pub type RecordId = i64;

/// One marked lecture occurrence, keyed in the store by its slot key.
///
/// Created on first mark, removed on toggle-delete. `remote_id` is `None`
/// until the backend acknowledges the upsert (and stays `None` if the
/// backend acknowledged without returning an identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub status: AttendanceStatus,
    pub remote_id: Option<RecordId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statuses() {
        assert_eq!(
            AttendanceStatus::parse("present").unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(
            AttendanceStatus::parse("  Absent ").unwrap(),
            AttendanceStatus::Absent
        );
        assert_eq!(
            AttendanceStatus::parse("CANCELLED").unwrap(),
            AttendanceStatus::Cancelled
        );
        // US spelling shows up in older backend rows
        assert_eq!(
            AttendanceStatus::parse("canceled").unwrap(),
            AttendanceStatus::Cancelled
        );
        assert!(AttendanceStatus::parse("late").is_err());
    }
}
