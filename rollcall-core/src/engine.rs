//! The synchronization engine.
//!
//! One `mark_attendance` call runs the whole pipeline: validation,
//! deduplication against the in-flight registry, optimistic application,
//! the remote mutation, and rollback-or-commit with a silent stats
//! reconciliation. All failures are converted into [`MarkOutcome`] notices
//! at this boundary; nothing propagates as a panic.
//!
//! Concurrency model: every remote call is a suspension point, so multiple
//! mark operations can be in flight for different slots. Identical
//! `(slot key, status)` submissions share one outcome through the registry;
//! different mutations on the same slot are not fenced against each other,
//! but per-slot sequence stamps in the store keep a late fetch response from
//! clobbering a newer optimistic write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use tokio::sync::watch;

use crate::backend::AttendanceBackend;
use crate::error::{RollcallError, RollcallResult};
use crate::protocol::{DaySnapshot, UpsertAttendance};
use crate::record::{AttendanceRecord, AttendanceStatus, RecordId};
use crate::session::{SessionDecision, SessionGuard};
use crate::slot::{SlotDescriptor, SlotKey};
use crate::stats::SubjectStats;
use crate::store::{AttendanceStateStore, SavingState, StatsScope};

/// How one `mark_attendance` call ended. Every variant is user-presentable;
/// `Rejected` and `Failed` carry the notice to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Upsert acknowledged; the record now carries its backend identifier.
    Committed { remote_id: RecordId },
    /// Upsert acknowledged but the backend omitted the identifier. The mark
    /// is kept locally; a later toggle-off can only clear the local display.
    CommittedWithoutId,
    /// Toggle-delete acknowledged by the backend.
    Cleared,
    /// Toggle-delete of a record that never got a backend identifier; only
    /// the local display was cleared. Informational, not an error.
    ClearedLocally,
    /// Rejected by validation before any state change or network call.
    Rejected { message: String },
    /// The remote call failed; local state was rolled back (upsert) or left
    /// untouched (delete).
    Failed { message: String },
}

type OperationKey = (SlotKey, AttendanceStatus);
type OutcomeReceiver = watch::Receiver<Option<MarkOutcome>>;

/// Orchestrates attendance mutations against a backend and owns the state
/// store. One instance per active session, shared by handle.
pub struct SyncEngine<B: AttendanceBackend> {
    backend: B,
    store: Arc<AttendanceStateStore>,
    session: Mutex<SessionGuard>,
    inflight: Mutex<HashMap<OperationKey, OutcomeReceiver>>,
}

impl<B: AttendanceBackend> SyncEngine<B> {
    pub fn new(backend: B) -> SyncEngine<B> {
        SyncEngine {
            backend,
            store: Arc::new(AttendanceStateStore::new()),
            session: Mutex::new(SessionGuard::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Read access for UI layers. Consumers only read snapshots; all
    /// mutation goes through the engine.
    pub fn store(&self) -> &AttendanceStateStore {
        &self.store
    }

    pub fn status_of(&self, key: &SlotKey) -> Option<AttendanceStatus> {
        self.store.status_of(key)
    }

    pub fn stats_for(&self, subject_id: &str, scope: StatsScope) -> Option<SubjectStats> {
        self.store.stats_for(subject_id, scope)
    }

    pub fn saving_state(&self) -> Option<SavingState> {
        self.store.saving_state()
    }

    /// The key an operation on `(date, subject, descriptor)` acts on: the
    /// first candidate that already has a record, else the canonical key.
    pub fn resolve_slot_key(
        &self,
        date: NaiveDate,
        subject_id: &str,
        descriptor: &SlotDescriptor,
    ) -> SlotKey {
        let candidates = SlotKey::lookup_order(date, subject_id, descriptor);
        for candidate in &candidates {
            if self.store.status_of(candidate).is_some() {
                return candidate.clone();
            }
        }
        candidates.into_iter().next().unwrap_or_else(|| {
            // lookup_order always yields at least the canonical key
            SlotKey::canonical(date, subject_id, descriptor)
        })
    }

    /// Mark (or toggle off) attendance for one lecture occurrence.
    pub async fn mark_attendance(
        &self,
        subject_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        descriptor: &SlotDescriptor,
    ) -> MarkOutcome {
        // Validating: only cancellations may target future dates.
        if date > today() && status != AttendanceStatus::Cancelled {
            return MarkOutcome::Rejected {
                message: "Attendance can only be marked for today or past dates".to_string(),
            };
        }

        let key = self.resolve_slot_key(date, subject_id, descriptor);
        let operation = (key.clone(), status);

        // Deduplicated: an identical submission is already in flight; await
        // its outcome instead of issuing a second mutation.
        enum Registered {
            Primary(watch::Sender<Option<MarkOutcome>>),
            Duplicate(OutcomeReceiver),
        }
        let registered = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(&operation) {
                Some(rx) => Registered::Duplicate(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(operation.clone(), rx);
                    Registered::Primary(tx)
                }
            }
        };
        let outcome_tx = match registered {
            Registered::Duplicate(rx) => {
                log::debug!("duplicate submission for {key} ({}), awaiting", status.as_str());
                return wait_shared_outcome(rx).await;
            }
            Registered::Primary(tx) => tx,
        };

        self.store.set_saving(Some(SavingState {
            subject_id: subject_id.to_string(),
            action: status,
            descriptor: descriptor.clone(),
        }));

        let (outcome, reconcile) = self.submit(&key, subject_id, date, status, descriptor).await;

        // Cleared on every exit path, including failures.
        self.store.set_saving(None);
        lock(&self.inflight).remove(&operation);
        let _ = outcome_tx.send(Some(outcome.clone()));

        // Silent reconciliation: authoritative totals for the date, no
        // saving indicator involved.
        if reconcile {
            if let Err(e) = self.silent_refresh(date).await {
                log::debug!("silent refresh after commit failed: {e}");
            }
        }

        outcome
    }

    /// Run the toggle-delete or upsert branch. The second value says
    /// whether a silent stats reconciliation should follow.
    async fn submit(
        &self,
        key: &SlotKey,
        subject_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        descriptor: &SlotDescriptor,
    ) -> (MarkOutcome, bool) {
        let prior = self.store.record_of(key);
        let current = prior.as_ref().map(|r| r.status);

        if current == Some(status) {
            return (self.toggle_delete(key, subject_id, status, prior).await, false);
        }

        // Upsert path: the optimistic write lands strictly before the
        // remote call so the UI sees the intent immediately.
        self.store
            .apply_optimistic_mark(key, subject_id, current, status);

        let request = UpsertAttendance::new(subject_id, date, status, descriptor);
        match self.backend.upsert_attendance(request).await {
            Ok(receipt) => match receipt.remote_id() {
                Some(remote_id) => {
                    self.store.commit_remote_id(key, Some(remote_id));
                    (MarkOutcome::Committed { remote_id }, true)
                }
                None => {
                    log::info!("backend acknowledged {key} without an identifier");
                    (MarkOutcome::CommittedWithoutId, true)
                }
            },
            Err(e) => {
                // Exact inverse of the optimistic transition.
                self.store.rollback_mark(key, subject_id, prior, status);
                log::warn!("upsert for {key} failed: {e}");
                let outcome = MarkOutcome::Failed {
                    message: format!("Could not save attendance: {e}"),
                };
                (outcome, false)
            }
        }
    }

    async fn toggle_delete(
        &self,
        key: &SlotKey,
        subject_id: &str,
        status: AttendanceStatus,
        prior: Option<AttendanceRecord>,
    ) -> MarkOutcome {
        match prior.and_then(|r| r.remote_id) {
            Some(remote_id) => match self.backend.delete_attendance(remote_id).await {
                Ok(()) => {
                    self.store.clear_record(key, subject_id, status);
                    MarkOutcome::Cleared
                }
                Err(e) => {
                    // Server state unknown: keep the record rather than risk
                    // dropping a still-valid one.
                    log::warn!("delete for {key} failed: {e}");
                    MarkOutcome::Failed {
                        message: format!("Could not remove the mark: {e}"),
                    }
                }
            },
            None => {
                log::info!("{key} has no backend identifier, clearing locally only");
                self.store.clear_record(key, subject_id, status);
                MarkOutcome::ClearedLocally
            }
        }
    }

    /// Full refetch for a date (`None` means today): records plus stats,
    /// applied under the store's sequence fence. Failure follows the
    /// session policy: content is preserved once any load has succeeded,
    /// otherwise the store falls back to empty-but-valid defaults.
    pub async fn refresh_for_date(&self, date: Option<NaiveDate>) -> RollcallResult<()> {
        let target = date.unwrap_or_else(today);
        let fence = self.store.current_seq();
        match self.backend.fetch_day(date).await {
            Ok(snapshot) => {
                let records = normalize_records(&snapshot);
                self.store.apply_day_snapshot(
                    Some(target),
                    Some(records),
                    snapshot.subject_stats,
                    fence,
                    true,
                    target == today(),
                );
                lock(&self.session).mark_loaded();
                Ok(())
            }
            Err(e) => self.handle_fetch_failure(e),
        }
    }

    /// Refresh only the today-scoped stats projection.
    pub async fn refresh_today(&self) -> RollcallResult<()> {
        let fence = self.store.current_seq();
        match self.backend.fetch_day(None).await {
            Ok(snapshot) => {
                self.store.apply_day_snapshot(
                    None,
                    None,
                    snapshot.subject_stats,
                    fence,
                    false,
                    true,
                );
                lock(&self.session).mark_loaded();
                Ok(())
            }
            Err(e) => self.handle_fetch_failure(e),
        }
    }

    /// Stats-only refetch after a successful mutation. Records are left to
    /// the fence-guarded full refreshes; here only authoritative totals are
    /// reconciled.
    async fn silent_refresh(&self, date: NaiveDate) -> RollcallResult<()> {
        let fence = self.store.current_seq();
        let snapshot = self.backend.fetch_day(Some(date)).await?;
        self.store.apply_day_snapshot(
            None,
            None,
            snapshot.subject_stats,
            fence,
            true,
            date == today(),
        );
        Ok(())
    }

    fn handle_fetch_failure(&self, error: RollcallError) -> RollcallResult<()> {
        if lock(&self.session).has_loaded() {
            // Previously loaded content stays; the UI keeps showing it.
            log::warn!("fetch failed, preserving loaded state: {error}");
        } else {
            log::warn!("fetch failed before any successful load: {error}");
            self.store.wipe();
        }
        Err(error)
    }

    /// Observe an identity signal (login, token refresh, flicker). Wipes
    /// per the session rules, then loads the new identity's data.
    pub async fn set_identity(&self, identity: Option<&str>) -> RollcallResult<()> {
        let decision = lock(&self.session).observe_identity(identity);
        if decision == SessionDecision::Wipe {
            log::info!("identity transition, wiping attendance state");
            self.store.wipe();
        }
        if identity.is_some() {
            self.refresh_for_date(None).await?;
        }
        Ok(())
    }

    /// Confirmed logout: always wipe.
    pub fn logout(&self) {
        lock(&self.session).confirm_logout();
        log::info!("logout confirmed, wiping attendance state");
        self.store.wipe();
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn wait_shared_outcome(mut rx: OutcomeReceiver) -> MarkOutcome {
    match rx.wait_for(|outcome| outcome.is_some()).await {
        Ok(outcome) => outcome.clone().unwrap_or(MarkOutcome::Failed {
            message: "Operation was interrupted".to_string(),
        }),
        Err(_) => MarkOutcome::Failed {
            message: "Operation was interrupted".to_string(),
        },
    }
}

/// Normalize fetched rows into keyed records. Rows with unknown statuses
/// are dropped with a warning; the engine never fabricates data for them.
fn normalize_records(
    snapshot: &DaySnapshot,
) -> HashMap<SlotKey, (String, AttendanceRecord)> {
    let mut records = HashMap::new();
    for raw in &snapshot.attendance_records {
        let status = match raw.parsed_status() {
            Ok(status) => status,
            Err(e) => {
                log::warn!("dropping attendance row for {}: {e}", raw.subject_id);
                continue;
            }
        };
        let key = SlotKey::canonical(raw.lecture_date, &raw.subject_id, &raw.descriptor());
        records.insert(
            key,
            (
                raw.subject_id.clone(),
                AttendanceRecord {
                    status,
                    remote_id: raw.remote_id(),
                },
            ),
        );
    }
    records
}
