use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::{EnrollError, EnrollmentRequest, RecognitionRequest, Roster};
use serde::Serialize;
use zbus::{fdo, interface};

pub const BUS_NAME: &str = "org.rollcall.Attendance1";
pub const OBJECT_PATH: &str = "/org/rollcall/Attendance1";

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Empty string arguments mean "not provided". Records are returned as JSON.
pub struct AttendanceService {
    roster: Arc<Roster>,
    started_at: DateTime<Utc>,
}

impl AttendanceService {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self {
            roster,
            started_at: Utc::now(),
        }
    }
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Enroll a student; returns the stored identity.
    async fn enroll(
        &self,
        roll_number: &str,
        name: &str,
        email: &str,
        descriptor: Vec<f64>,
    ) -> fdo::Result<String> {
        tracing::info!(roll_number, dimensions = descriptor.len(), "enroll requested");
        let request = EnrollmentRequest {
            roll_number: roll_number.to_string(),
            name: name.to_string(),
            email: non_empty(email).map(str::to_string),
            descriptor,
        };
        let identity = self
            .roster
            .enroll(request, Utc::now())
            .map_err(enroll_error)?;
        to_json(&identity)
    }

    /// Identify a capture and record attendance; returns the outcome.
    async fn recognize(
        &self,
        descriptor: Vec<f64>,
        subject: &str,
        session_id: &str,
    ) -> fdo::Result<String> {
        tracing::debug!(subject, session_id, "recognize requested");
        let request = RecognitionRequest {
            descriptor,
            subject: non_empty(subject).map(str::to_string),
            session_id: non_empty(session_id).map(str::to_string),
            at: Utc::now(),
        };
        to_json(&self.roster.recognize(request))
    }

    /// Record attendance for a roll number without a capture.
    async fn mark_manual(
        &self,
        roll_number: &str,
        subject: &str,
        session_id: &str,
    ) -> fdo::Result<String> {
        tracing::info!(roll_number, subject, "manual mark requested");
        let outcome = self.roster.mark_manual(
            roll_number,
            non_empty(subject),
            non_empty(session_id),
            Utc::now(),
        );
        to_json(&outcome)
    }

    async fn list_identities(&self) -> fdo::Result<String> {
        to_json(&self.roster.list_identities())
    }

    async fn list_events(&self) -> fdo::Result<String> {
        to_json(&self.roster.list_events())
    }

    /// Attendance statistics, optionally for one `YYYY-MM-DD` day.
    async fn summary(&self, day: &str) -> fdo::Result<String> {
        let day = match non_empty(day) {
            None => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| fdo::Error::InvalidArgs(format!("invalid day {raw:?}: {e}")))?,
            ),
        };
        to_json(&self.roster.summary(day))
    }

    /// Clear every identity and attendance event.
    async fn purge_all(&self) -> fdo::Result<bool> {
        tracing::warn!("purge requested");
        self.roster.purge_all();
        Ok(true)
    }

    /// Return daemon status information.
    async fn status(&self) -> fdo::Result<String> {
        let policy = self.roster.policy();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": self.started_at,
            "identities": self.roster.list_identities().len(),
            "events": self.roster.list_events().len(),
            "similarity_threshold": policy.similarity_threshold,
            "present_confidence": policy.present_confidence,
            "confidence_cap": policy.confidence_cap,
            "day_offset_minutes": self.roster.days().offset_minutes(),
        })
        .to_string())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn to_json<T: Serialize>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(format!("serialization: {e}")))
}

fn enroll_error(err: EnrollError) -> fdo::Error {
    match err {
        EnrollError::InvalidInput(_) => fdo::Error::InvalidArgs(err.to_string()),
        EnrollError::DuplicateKey(_) => fdo::Error::FileExists(err.to_string()),
    }
}
