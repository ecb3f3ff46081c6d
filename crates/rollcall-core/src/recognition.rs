//! Recognition entry point: matcher + ledger, normalized into one outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{AttendanceLedger, LedgerError, Recorded};
use crate::matcher::{CosineMatcher, MatchError, Matcher};
use crate::policy::DEFAULT_SUBJECT;
use crate::store::DescriptorStore;
use crate::types::{AttendanceEvent, AttendanceStatus, CaptureMethod, Descriptor, Identity, RollNumber};

/// Similarity assigned to operator-entered attendance.
const MANUAL_SIMILARITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoMatch,
    InvalidInput,
    /// The identity disappeared between match and record (concurrent purge),
    /// or a manual mark named an unknown roll number.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    Recognized {
        identity: Identity,
        similarity: f64,
        confidence: f64,
        status: AttendanceStatus,
        event: AttendanceEvent,
    },
    Rejected {
        reason: RejectReason,
        detail: String,
    },
    AlreadyMarked {
        identity: Identity,
        existing_event: AttendanceEvent,
    },
}

impl RecognitionOutcome {
    fn rejected(reason: RejectReason, detail: impl ToString) -> Self {
        Self::Rejected {
            reason,
            detail: detail.to_string(),
        }
    }
}

/// One capture submitted for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub descriptor: Vec<f64>,
    pub subject: Option<String>,
    pub session_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl RecognitionRequest {
    pub fn new(descriptor: Vec<f64>, at: DateTime<Utc>) -> Self {
        Self {
            descriptor,
            subject: None,
            session_id: None,
            at,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Subject label, falling back to [`DEFAULT_SUBJECT`] when blank.
    pub fn resolved_subject(&self) -> String {
        resolve_subject(self.subject.as_deref())
    }

    /// Session id, falling back to `session_<unix millis>` of the capture.
    pub fn resolved_session(&self) -> String {
        resolve_session(self.session_id.as_deref(), self.at)
    }
}

fn resolve_subject(subject: Option<&str>) -> String {
    match subject.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_SUBJECT.to_string(),
    }
}

fn resolve_session(session_id: Option<&str>, at: DateTime<Utc>) -> String {
    match session_id.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => format!("session_{}", at.timestamp_millis()),
    }
}

pub struct RecognitionService<M = CosineMatcher> {
    matcher: M,
    store: Arc<DescriptorStore>,
    ledger: Arc<AttendanceLedger>,
}

impl RecognitionService<CosineMatcher> {
    pub fn new(store: Arc<DescriptorStore>, ledger: Arc<AttendanceLedger>) -> Self {
        Self::with_matcher(CosineMatcher, store, ledger)
    }
}

impl<M: Matcher> RecognitionService<M> {
    pub fn with_matcher(matcher: M, store: Arc<DescriptorStore>, ledger: Arc<AttendanceLedger>) -> Self {
        Self {
            matcher,
            store,
            ledger,
        }
    }

    /// Identify the capture and record attendance for the match.
    pub fn recognize(&self, request: RecognitionRequest) -> RecognitionOutcome {
        let subject = request.resolved_subject();
        let session_id = request.resolved_session();
        let probe = Descriptor::new(request.descriptor);
        let threshold = self.ledger.policy().similarity_threshold;

        let snapshot = self.store.all();
        let matched = match self.matcher.best_match(&probe, &snapshot, threshold) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(error = %err, candidates = snapshot.len(), "capture rejected");
                let reason = match &err {
                    MatchError::InvalidInput(_) => RejectReason::InvalidInput,
                    MatchError::NoMatch { .. } => RejectReason::NoMatch,
                };
                return RecognitionOutcome::rejected(reason, err);
            }
        };

        tracing::debug!(
            roll_number = %matched.identity.roll_number,
            similarity = matched.similarity,
            "best match"
        );

        let result = self.ledger.record(
            matched.identity.id,
            &subject,
            matched.similarity,
            CaptureMethod::FacialRecognition,
            &session_id,
            request.at,
        );
        Self::finish(result, matched.identity)
    }

    /// Record attendance for a roll number without a capture.
    pub fn mark_manual(
        &self,
        roll_number: &str,
        subject: Option<&str>,
        session_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> RecognitionOutcome {
        let Some(roll) = RollNumber::parse(roll_number) else {
            return RecognitionOutcome::rejected(RejectReason::InvalidInput, "roll number is required");
        };
        let Some(identity) = self.store.find_by_roll(&roll) else {
            return RecognitionOutcome::rejected(
                RejectReason::NotFound,
                format!("roll number {roll} is not enrolled"),
            );
        };

        let result = self.ledger.record(
            identity.id,
            &resolve_subject(subject),
            MANUAL_SIMILARITY,
            CaptureMethod::Manual,
            &resolve_session(session_id, at),
            at,
        );
        Self::finish(result, &identity)
    }

    fn finish(result: Result<Recorded, LedgerError>, matched: &Identity) -> RecognitionOutcome {
        match result {
            Ok(Recorded { event, identity }) => RecognitionOutcome::Recognized {
                similarity: event.similarity,
                confidence: event.confidence,
                status: event.status,
                identity,
                event,
            },
            Err(LedgerError::DuplicateForDay(existing)) => RecognitionOutcome::AlreadyMarked {
                identity: matched.clone(),
                existing_event: *existing,
            },
            Err(err @ LedgerError::NotFound(_)) => {
                tracing::warn!(roll_number = %matched.roll_number, "matched identity vanished before recording");
                RecognitionOutcome::rejected(RejectReason::NotFound, err)
            }
        }
    }
}
