//! The backend contract the engine synchronizes against.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::RollcallResult;
use crate::protocol::{DaySnapshot, UpsertAttendance, UpsertReceipt};
use crate::record::RecordId;

/// Authoritative attendance backend.
///
/// One implementation speaks HTTP (`rollcall-backend-http`); tests drive the
/// engine with scripted in-memory implementations. Delete is idempotent from
/// the client's perspective: the engine never resubmits after a success.
#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// Create or update the mark for one lecture occurrence. The receipt
    /// carries the backend-assigned record identifier when the backend
    /// returns one.
    async fn upsert_attendance(&self, request: UpsertAttendance) -> RollcallResult<UpsertReceipt>;

    /// Delete a previously stored record by its backend identifier.
    async fn delete_attendance(&self, record_id: RecordId) -> RollcallResult<()>;

    /// Fetch stats and records for a date (`None` means today).
    async fn fetch_day(&self, date: Option<NaiveDate>) -> RollcallResult<DaySnapshot>;
}
