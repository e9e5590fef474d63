//! The mutable attendance state, held as swappable snapshots.
//!
//! Reads never observe a half-applied write: every mutation clones the
//! current snapshot, edits the clone and swaps it in whole. Two independent
//! stats projections coexist, one scoped to the currently viewed date and
//! one permanently scoped to today.
//!
//! Each optimistic mutation bumps a store-wide sequence and stamps the slot
//! (and its subject) with it. A fetch response captured at sequence S is
//! applied per-slot and per-subject only where no stamp is newer than S, so
//! a late-arriving response can never clobber a newer optimistic write. A
//! wipe advances the same sequence and records it as an epoch; responses
//! fetched before the wipe are dropped whole and can never repopulate the
//! store with a previous identity's records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{AttendanceRecord, AttendanceStatus, RecordId};
use crate::slot::{SlotDescriptor, SlotKey};
use crate::stats::{self, SubjectStats};

/// Which stats projection a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    /// Stats for the date the user is currently browsing.
    ViewedDate,
    /// Cumulative stats for today, regardless of browsed date.
    Today,
}

/// Descriptor of the one operation currently shown as "in progress".
///
/// Advisory UI signal only; correctness is carried by the engine's in-flight
/// registry, not by this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingState {
    pub subject_id: String,
    pub action: AttendanceStatus,
    pub descriptor: SlotDescriptor,
}

/// One immutable view of everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub viewed_date: Option<NaiveDate>,
    pub records: HashMap<SlotKey, AttendanceRecord>,
    pub viewed_stats: HashMap<String, SubjectStats>,
    pub today_stats: HashMap<String, SubjectStats>,
    pub saving: Option<SavingState>,
    seq: u64,
    wipe_seq: u64,
    slot_seq: HashMap<SlotKey, u64>,
    subject_seq: HashMap<String, u64>,
}

impl StoreSnapshot {
    fn stamp(&mut self, key: &SlotKey, subject_id: &str) {
        self.seq += 1;
        self.slot_seq.insert(key.clone(), self.seq);
        self.subject_seq.insert(subject_id.to_string(), self.seq);
    }

    fn project_both(
        &mut self,
        subject_id: &str,
        previous: Option<AttendanceStatus>,
        new: Option<AttendanceStatus>,
    ) {
        for scoped in [&mut self.viewed_stats, &mut self.today_stats] {
            let current = scoped
                .get(subject_id)
                .cloned()
                .unwrap_or_else(|| SubjectStats::empty(subject_id));
            scoped.insert(subject_id.to_string(), stats::project(&current, previous, new));
        }
    }
}

/// Owner of the attendance state. One instance per active session; only the
/// engine mutates it, UI layers read snapshots.
#[derive(Debug)]
pub struct AttendanceStateStore {
    snapshot: ArcSwap<StoreSnapshot>,
    write: Mutex<()>,
}

impl Default for AttendanceStateStore {
    fn default() -> AttendanceStateStore {
        AttendanceStateStore::new()
    }
}

impl AttendanceStateStore {
    pub fn new() -> AttendanceStateStore {
        AttendanceStateStore {
            snapshot: ArcSwap::from_pointee(StoreSnapshot::default()),
            write: Mutex::new(()),
        }
    }

    /// A consistent view of the whole store.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.snapshot.load_full()
    }

    pub fn status_of(&self, key: &SlotKey) -> Option<AttendanceStatus> {
        self.snapshot.load().records.get(key).map(|r| r.status)
    }

    pub fn remote_id_of(&self, key: &SlotKey) -> Option<RecordId> {
        self.snapshot.load().records.get(key).and_then(|r| r.remote_id)
    }

    pub fn record_of(&self, key: &SlotKey) -> Option<AttendanceRecord> {
        self.snapshot.load().records.get(key).cloned()
    }

    pub fn stats_for(&self, subject_id: &str, scope: StatsScope) -> Option<SubjectStats> {
        let snapshot = self.snapshot.load();
        let scoped = match scope {
            StatsScope::ViewedDate => &snapshot.viewed_stats,
            StatsScope::Today => &snapshot.today_stats,
        };
        scoped.get(subject_id).cloned()
    }

    pub fn saving_state(&self) -> Option<SavingState> {
        self.snapshot.load().saving.clone()
    }

    /// The store-wide mutation sequence; fetches capture this before issuing
    /// the request and pass it back to [`AttendanceStateStore::apply_day_snapshot`].
    pub fn current_seq(&self) -> u64 {
        self.snapshot.load().seq
    }

    fn update(&self, edit: impl FnOnce(&mut StoreSnapshot)) {
        let _guard = self.write_lock();
        let mut next = StoreSnapshot::clone(&self.snapshot.load());
        edit(&mut next);
        self.snapshot.store(Arc::new(next));
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects writers from each other; a poisoned lock left
        // the snapshot itself untouched, so recover rather than propagate.
        self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_saving(&self, saving: Option<SavingState>) {
        self.update(|s| s.saving = saving);
    }

    /// Apply an optimistic status change: record, sequence stamp and both
    /// stats projections in one swap.
    pub fn apply_optimistic_mark(
        &self,
        key: &SlotKey,
        subject_id: &str,
        previous: Option<AttendanceStatus>,
        new: AttendanceStatus,
    ) {
        self.update(|s| {
            let remote_id = s.records.get(key).and_then(|r| r.remote_id);
            s.records.insert(
                key.clone(),
                AttendanceRecord {
                    status: new,
                    remote_id,
                },
            );
            s.stamp(key, subject_id);
            s.project_both(subject_id, previous, Some(new));
        });
    }

    /// Store the backend-assigned identifier after a successful upsert.
    pub fn commit_remote_id(&self, key: &SlotKey, remote_id: Option<RecordId>) {
        let Some(remote_id) = remote_id else { return };
        self.update(|s| {
            if let Some(record) = s.records.get_mut(key) {
                record.remote_id = Some(remote_id);
            }
        });
    }

    /// Undo an optimistic mark exactly: restore the prior record (or its
    /// absence) and apply the inverse projection.
    pub fn rollback_mark(
        &self,
        key: &SlotKey,
        subject_id: &str,
        prior: Option<AttendanceRecord>,
        attempted: AttendanceStatus,
    ) {
        self.update(|s| {
            let previous = prior.as_ref().map(|r| r.status);
            match prior {
                Some(record) => {
                    s.records.insert(key.clone(), record);
                }
                None => {
                    s.records.remove(key);
                }
            }
            s.stamp(key, subject_id);
            s.project_both(subject_id, Some(attempted), previous);
        });
    }

    /// Remove a record after a toggle-delete and project the clear.
    pub fn clear_record(&self, key: &SlotKey, subject_id: &str, previous: AttendanceStatus) {
        self.update(|s| {
            s.records.remove(key);
            s.stamp(key, subject_id);
            s.project_both(subject_id, Some(previous), None);
        });
    }

    /// Replace store content from an authoritative day snapshot, keeping any
    /// state that was optimistically written after `fence_seq`.
    ///
    /// `records` are already normalized and keyed. Stats land in the viewed
    /// and/or today projection depending on the flags.
    pub fn apply_day_snapshot(
        &self,
        viewed_date: Option<NaiveDate>,
        records: Option<HashMap<SlotKey, (String, AttendanceRecord)>>,
        subject_stats: Vec<SubjectStats>,
        fence_seq: u64,
        update_viewed: bool,
        update_today: bool,
    ) {
        self.update(|s| {
            if fence_seq < s.wipe_seq {
                log::warn!("dropping fetch response issued before a wipe");
                return;
            }

            if let Some(records) = records {
                let mut next: HashMap<SlotKey, AttendanceRecord> = HashMap::new();
                for (key, (_, record)) in &records {
                    if s.slot_seq.get(key).copied().unwrap_or(0) > fence_seq {
                        continue;
                    }
                    next.insert(key.clone(), record.clone());
                }
                // Slots mutated after the fence keep their local state, even
                // where that state is "removed".
                for (key, stamped_at) in &s.slot_seq {
                    if *stamped_at > fence_seq {
                        log::warn!("keeping optimistic state for {key}, fetch response is stale");
                        if let Some(local) = s.records.get(key) {
                            next.insert(key.clone(), local.clone());
                        }
                    }
                }
                s.records = next;
                // Stamps at or below the fence have done their job; only
                // the newer ones still guard anything.
                s.slot_seq.retain(|_, stamped| *stamped > fence_seq);
            }

            for incoming in subject_stats {
                let stamped_at = s
                    .subject_seq
                    .get(&incoming.subject_id)
                    .copied()
                    .unwrap_or(0);
                if stamped_at > fence_seq {
                    log::warn!(
                        "keeping optimistic stats for {}, fetch response is stale",
                        incoming.subject_id
                    );
                    continue;
                }
                if update_viewed {
                    s.viewed_stats
                        .insert(incoming.subject_id.clone(), incoming.clone());
                }
                if update_today {
                    s.today_stats
                        .insert(incoming.subject_id.clone(), incoming.clone());
                }
            }
            s.subject_seq.retain(|_, stamped| *stamped > fence_seq);

            if update_viewed {
                if let Some(date) = viewed_date {
                    s.viewed_date = Some(date);
                }
            }
        });
    }

    /// Drop everything. Used on identity change and confirmed logout.
    ///
    /// The sequence stays monotonic across the wipe and its value becomes
    /// the new epoch, so any fetch issued before the wipe is fenced out.
    pub fn wipe(&self) {
        self.update(|s| {
            let seq = s.seq + 1;
            *s = StoreSnapshot::default();
            s.seq = seq;
            s.wipe_seq = seq;
        });
    }
}
