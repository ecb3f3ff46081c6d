//! Attendance ledger.
//!
//! Each (identity, subject, day) cell moves Unmarked → Marked exactly once.
//! The duplicate check, the store `touch` and the append share one critical
//! section, so concurrent captures of the same student cannot both record.
//!
//! Lock order is always ledger → store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::policy::{DayBoundary, Policy};
use crate::store::DescriptorStore;
use crate::types::{AttendanceEvent, CaptureMethod, Identity};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("attendance already recorded for {} in {} on {}", .0.roll_number, .0.subject, .0.day)]
    DuplicateForDay(Box<AttendanceEvent>),
    #[error("identity {0} not found")]
    NotFound(Uuid),
}

/// A committed event together with the identity's updated counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub event: AttendanceEvent,
    pub identity: Identity,
}

/// Deduplication key for one ledger cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CellKey {
    identity_id: Uuid,
    subject: String,
    day: NaiveDate,
}

#[derive(Default)]
struct Inner {
    /// Append order (oldest first).
    events: Vec<AttendanceEvent>,
    marked: HashMap<CellKey, usize>,
}

pub struct AttendanceLedger {
    store: Arc<DescriptorStore>,
    policy: Policy,
    days: DayBoundary,
    inner: Mutex<Inner>,
}

impl AttendanceLedger {
    pub fn new(store: Arc<DescriptorStore>, policy: Policy, days: DayBoundary) -> Self {
        Self {
            store,
            policy,
            days,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record one attendance event for `identity_id` in `subject` at `now`.
    ///
    /// Returns [`LedgerError::DuplicateForDay`] carrying the existing event if
    /// the cell is already marked, or [`LedgerError::NotFound`] if the identity
    /// is no longer enrolled.
    pub fn record(
        &self,
        identity_id: Uuid,
        subject: &str,
        similarity: f64,
        method: CaptureMethod,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Recorded, LedgerError> {
        let day = self.days.day_of(now);
        let key = CellKey {
            identity_id,
            subject: subject.to_string(),
            day,
        };

        let mut inner = self.inner.lock();

        if let Some(&idx) = inner.marked.get(&key) {
            let existing = inner.events[idx].clone();
            tracing::info!(
                roll_number = %existing.roll_number,
                subject,
                %day,
                "attendance already marked"
            );
            return Err(LedgerError::DuplicateForDay(Box::new(existing)));
        }

        // Validates the identity still exists before anything is appended.
        let identity = self
            .store
            .touch(identity_id, day)
            .map_err(|_| LedgerError::NotFound(identity_id))?;

        let confidence = self.policy.confidence(similarity);
        let event = AttendanceEvent {
            id: Uuid::new_v4(),
            identity_id,
            roll_number: identity.roll_number.clone(),
            name: identity.name.clone(),
            subject: subject.to_string(),
            timestamp: now,
            day,
            confidence,
            similarity,
            status: self.policy.status(confidence),
            method,
            session_id: session_id.to_string(),
        };

        let idx = inner.events.len();
        inner.events.push(event.clone());
        inner.marked.insert(key, idx);

        tracing::info!(
            roll_number = %event.roll_number,
            subject,
            confidence,
            status = %event.status,
            method = %event.method,
            "attendance recorded"
        );

        Ok(Recorded { event, identity })
    }

    /// Every event, most recent first.
    pub fn events(&self) -> Vec<AttendanceEvent> {
        self.inner.lock().events.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn days(&self) -> DayBoundary {
        self.days
    }

    /// Clear the store and the ledger in one step with respect to `record`.
    pub(crate) fn purge_all(&self) {
        let mut inner = self.inner.lock();
        self.store.clear();
        *inner = Inner::default();
    }
}
