//! Wire types for the attendance backend.
//!
//! Defines the request/response shapes the engine exchanges with a backend
//! and normalizes their quirks (mixed string/number identifiers, optional
//! slot-descriptor fields, free-form status strings) exactly once, at this
//! boundary. Everything past this module works with the typed model.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::RollcallResult;
use crate::record::{AttendanceStatus, RecordId};
use crate::slot::SlotDescriptor;
use crate::stats::SubjectStats;

/// Upsert request sent to the backend when a slot is marked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAttendance {
    pub subject_id: String,
    pub lecture_date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_extra_class: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_class_index: Option<u32>,
}

impl UpsertAttendance {
    pub fn new(
        subject_id: &str,
        lecture_date: NaiveDate,
        status: AttendanceStatus,
        descriptor: &SlotDescriptor,
    ) -> UpsertAttendance {
        let mut request = UpsertAttendance {
            subject_id: subject_id.to_string(),
            lecture_date,
            status,
            slot_index: None,
            start_time: None,
            end_time: None,
            is_extra_class: None,
            extra_class_index: None,
        };
        match descriptor {
            SlotDescriptor::Standard { index } => request.slot_index = Some(*index),
            SlotDescriptor::CustomRange { start, end } => {
                request.start_time = Some(start.format("%H:%M").to_string());
                request.end_time = Some(end.format("%H:%M").to_string());
            }
            SlotDescriptor::ExtraClass { index } => {
                request.is_extra_class = Some(true);
                request.extra_class_index = Some(*index);
            }
            SlotDescriptor::Legacy => {}
        }
        request
    }
}

/// Identifier as the backend sends it: sometimes a number, sometimes a
/// numeric string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRecordId {
    Number(i64),
    Text(String),
}

impl RawRecordId {
    /// Normalize to a numeric identifier, dropping unparseable values.
    pub fn normalize(&self) -> Option<RecordId> {
        match self {
            RawRecordId::Number(n) => Some(*n),
            RawRecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Backend acknowledgement of an upsert. The identifier can be absent; the
/// engine treats that as a partial success (see `MarkOutcome`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReceipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_id: Option<RawRecordId>,
}

impl UpsertReceipt {
    pub fn remote_id(&self) -> Option<RecordId> {
        self.attendance_id.as_ref().and_then(RawRecordId::normalize)
    }
}

/// One attendance row as the fetch endpoint returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttendanceRecord {
    pub subject_id: String,
    pub lecture_date: NaiveDate,
    pub status: String,
    #[serde(default)]
    pub slot_index: Option<u32>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_extra_class: Option<bool>,
    #[serde(default)]
    pub extra_class_index: Option<u32>,
    #[serde(default)]
    pub attendance_id: Option<RawRecordId>,
}

impl RawAttendanceRecord {
    /// Fold the optional descriptor fields into the tagged union.
    ///
    /// Priority mirrors the key lookup order: extra-class fields win, then
    /// a standard slot index, then a custom time range, and a row with none
    /// of them is a legacy record.
    pub fn descriptor(&self) -> SlotDescriptor {
        if self.is_extra_class == Some(true) {
            return SlotDescriptor::ExtraClass {
                index: self.extra_class_index.unwrap_or(1),
            };
        }
        if let Some(index) = self.slot_index {
            return SlotDescriptor::Standard { index };
        }
        if let (Some(start), Some(end)) = (
            self.start_time.as_deref().and_then(parse_clock),
            self.end_time.as_deref().and_then(parse_clock),
        ) {
            return SlotDescriptor::CustomRange { start, end };
        }
        SlotDescriptor::Legacy
    }

    pub fn parsed_status(&self) -> RollcallResult<AttendanceStatus> {
        AttendanceStatus::parse(&self.status)
    }

    pub fn remote_id(&self) -> Option<RecordId> {
        self.attendance_id.as_ref().and_then(RawRecordId::normalize)
    }
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .ok()
}

/// Everything the fetch-by-date endpoint returns for one day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySnapshot {
    #[serde(default)]
    pub subject_stats: Vec<SubjectStats>,
    #[serde(default)]
    pub attendance_records: Vec<RawAttendanceRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_accepts_string_or_number() {
        let snapshot: DaySnapshot = serde_json::from_value(json!({
            "subjectStats": [],
            "attendanceRecords": [
                {
                    "subjectId": "MATH101",
                    "lectureDate": "2025-03-20",
                    "status": "present",
                    "slotIndex": 2,
                    "attendanceId": "1042"
                },
                {
                    "subjectId": "MATH101",
                    "lectureDate": "2025-03-20",
                    "status": "absent",
                    "slotIndex": 3,
                    "attendanceId": 1043
                }
            ]
        }))
        .unwrap();
        assert_eq!(snapshot.attendance_records[0].remote_id(), Some(1042));
        assert_eq!(snapshot.attendance_records[1].remote_id(), Some(1043));
    }

    #[test]
    fn test_descriptor_priority() {
        let mut record = RawAttendanceRecord {
            subject_id: "MATH101".to_string(),
            lecture_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            status: "present".to_string(),
            slot_index: Some(2),
            start_time: Some("09:00".to_string()),
            end_time: Some("10:30".to_string()),
            is_extra_class: Some(true),
            extra_class_index: Some(1),
            attendance_id: None,
        };
        // Extra-class fields win even when others are present
        assert_eq!(record.descriptor(), SlotDescriptor::ExtraClass { index: 1 });

        record.is_extra_class = None;
        assert_eq!(record.descriptor(), SlotDescriptor::Standard { index: 2 });

        record.slot_index = None;
        assert_eq!(
            record.descriptor(),
            SlotDescriptor::CustomRange {
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            }
        );

        record.start_time = None;
        record.end_time = None;
        assert_eq!(record.descriptor(), SlotDescriptor::Legacy);
    }

    #[test]
    fn test_upsert_request_carries_descriptor_fields() {
        let request = UpsertAttendance::new(
            "MATH101",
            NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            AttendanceStatus::Present,
            &SlotDescriptor::ExtraClass { index: 2 },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["isExtraClass"], json!(true));
        assert_eq!(value["extraClassIndex"], json!(2));
        assert!(value.get("slotIndex").is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let record = RawAttendanceRecord {
            subject_id: "MATH101".to_string(),
            lecture_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            status: "tardy".to_string(),
            slot_index: None,
            start_time: None,
            end_time: None,
            is_extra_class: None,
            extra_class_index: None,
            attendance_id: None,
        };
        assert!(record.parsed_status().is_err());
    }
}
