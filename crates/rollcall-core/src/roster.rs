//! Process-scoped aggregate owning the store and ledger.
//!
//! This is the only handle the application layer needs; it is `Send + Sync`
//! and is shared behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::enrollment::{EnrollError, EnrollmentRequest, EnrollmentService};
use crate::ledger::AttendanceLedger;
use crate::policy::{DayBoundary, Policy, PolicyError};
use crate::recognition::{RecognitionOutcome, RecognitionRequest, RecognitionService};
use crate::store::DescriptorStore;
use crate::summary::AttendanceSummary;
use crate::types::{AttendanceEvent, Identity, RollNumber};

pub struct Roster {
    store: Arc<DescriptorStore>,
    ledger: Arc<AttendanceLedger>,
    enrollment: EnrollmentService,
    recognition: RecognitionService,
}

impl Default for Roster {
    fn default() -> Self {
        Self::build(Policy::default(), DayBoundary::utc())
    }
}

impl Roster {
    /// Build a roster after validating `policy`.
    pub fn new(policy: Policy, days: DayBoundary) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self::build(policy, days))
    }

    fn build(policy: Policy, days: DayBoundary) -> Self {
        let store = Arc::new(DescriptorStore::new());
        let ledger = Arc::new(AttendanceLedger::new(store.clone(), policy, days));
        Self {
            enrollment: EnrollmentService::new(store.clone(), days),
            recognition: RecognitionService::new(store.clone(), ledger.clone()),
            store,
            ledger,
        }
    }

    pub fn enroll(&self, request: EnrollmentRequest, now: DateTime<Utc>) -> Result<Identity, EnrollError> {
        self.enrollment.register(request, now)
    }

    pub fn recognize(&self, request: RecognitionRequest) -> RecognitionOutcome {
        self.recognition.recognize(request)
    }

    pub fn mark_manual(
        &self,
        roll_number: &str,
        subject: Option<&str>,
        session_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> RecognitionOutcome {
        self.recognition.mark_manual(roll_number, subject, session_id, at)
    }

    /// Identities in enrollment order.
    pub fn list_identities(&self) -> Vec<Identity> {
        self.store.all()
    }

    /// Events, most recent first.
    pub fn list_events(&self) -> Vec<AttendanceEvent> {
        self.ledger.events()
    }

    pub fn identity(&self, roll_number: &str) -> Option<Identity> {
        RollNumber::parse(roll_number).and_then(|roll| self.store.find_by_roll(&roll))
    }

    pub fn events_for(&self, roll_number: &str) -> Vec<AttendanceEvent> {
        let Some(roll) = RollNumber::parse(roll_number) else {
            return Vec::new();
        };
        self.ledger
            .events()
            .into_iter()
            .filter(|e| e.roll_number == roll)
            .collect()
    }

    pub fn summary(&self, day: Option<NaiveDate>) -> AttendanceSummary {
        let events = self.ledger.events();
        AttendanceSummary::compute(self.store.len(), &events, day)
    }

    /// Clear every identity and event in one step.
    pub fn purge_all(&self) {
        self.ledger.purge_all();
        tracing::info!("roster purged");
    }

    pub fn policy(&self) -> &Policy {
        self.ledger.policy()
    }

    pub fn days(&self) -> DayBoundary {
        self.ledger.days()
    }
}
