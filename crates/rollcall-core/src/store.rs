//! Enrolled identities, keyed by roll number.
//!
//! Enrollment, `touch` and purge take the write lock; snapshots share the
//! read lock. Descriptors are never rewritten after enrollment.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Identity, RollNumber};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("roll number {0} is already enrolled")]
    DuplicateKey(RollNumber),
    #[error("descriptor has {found} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("identity {0} not found")]
    NotFound(Uuid),
}

#[derive(Default)]
struct Inner {
    /// Insertion order; snapshots and tie-breaks depend on it.
    identities: Vec<Identity>,
    by_roll: HashMap<RollNumber, usize>,
    by_id: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct DescriptorStore {
    inner: RwLock<Inner>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new identity.
    ///
    /// The counter is reset to 0 and last-seen to "never". The first enrolled
    /// identity fixes the descriptor dimensionality until the next purge.
    pub fn enroll(&self, mut identity: Identity) -> Result<Identity, StoreError> {
        let mut inner = self.inner.write();

        if inner.by_roll.contains_key(&identity.roll_number) {
            tracing::warn!(roll_number = %identity.roll_number, "duplicate enrollment rejected");
            return Err(StoreError::DuplicateKey(identity.roll_number));
        }
        if let Some(expected) = inner.identities.first().map(|i| i.descriptor.len()) {
            if identity.descriptor.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    found: identity.descriptor.len(),
                });
            }
        }

        identity.total_attendance = 0;
        identity.last_seen = None;

        let idx = inner.identities.len();
        inner.by_roll.insert(identity.roll_number.clone(), idx);
        inner.by_id.insert(identity.id, idx);
        inner.identities.push(identity.clone());
        Ok(identity)
    }

    /// Consistent copy of every identity, in enrollment order.
    pub fn all(&self) -> Vec<Identity> {
        self.inner.read().identities.clone()
    }

    /// Record one more attendance for `id` on `day`. Fails only with `NotFound`.
    pub fn touch(&self, id: Uuid, day: NaiveDate) -> Result<Identity, StoreError> {
        let mut inner = self.inner.write();
        let idx = *inner.by_id.get(&id).ok_or(StoreError::NotFound(id))?;
        let identity = &mut inner.identities[idx];
        identity.total_attendance = identity.total_attendance.saturating_add(1);
        identity.last_seen = Some(day);
        Ok(identity.clone())
    }

    pub fn get(&self, id: Uuid) -> Option<Identity> {
        let inner = self.inner.read();
        inner.by_id.get(&id).map(|&idx| inner.identities[idx].clone())
    }

    pub fn find_by_roll(&self, roll_number: &RollNumber) -> Option<Identity> {
        let inner = self.inner.read();
        inner
            .by_roll
            .get(roll_number)
            .map(|&idx| inner.identities[idx].clone())
    }

    /// Descriptor length established by the first enrollment, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.inner.read().identities.first().map(|i| i.descriptor.len())
    }

    pub fn len(&self) -> usize {
        self.inner.read().identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every identity. Callers coordinate with the ledger.
    pub(crate) fn clear(&self) {
        *self.inner.write() = Inner::default();
    }
}
