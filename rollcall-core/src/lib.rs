//! Attendance state-synchronization engine.
//!
//! A single-client optimistic cache reconciled against one authoritative
//! backend per mutation. The engine derives stable identifiers for lecture
//! occurrences, applies optimistic local updates, deduplicates concurrent
//! taps, reconciles with backend responses and recomputes per-subject
//! statistics without touching authoritative counters.
//!
//! - `slot` — canonical slot keys for lecture occurrences
//! - `stats` — pure per-subject stats projection
//! - `store` — snapshot state store with sequence fencing
//! - `session` — wipe-vs-preserve rules across identity transitions
//! - `backend` / `protocol` — the backend contract and its wire types
//! - `engine` — the `mark_attendance` orchestration
//!
//! Not a general offline-first database: no durability across restarts and
//! no distributed consistency, by design.

pub mod backend;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod record;
pub mod session;
pub mod slot;
pub mod stats;
pub mod store;

pub use backend::AttendanceBackend;
pub use engine::{MarkOutcome, SyncEngine};
pub use error::{RollcallError, RollcallResult};
pub use record::{AttendanceRecord, AttendanceStatus, RecordId};
pub use slot::{SlotDescriptor, SlotKey};
pub use stats::SubjectStats;
pub use store::{AttendanceStateStore, SavingState, StatsScope, StoreSnapshot};
