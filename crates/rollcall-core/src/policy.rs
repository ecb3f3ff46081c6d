//! Attendance policy knobs and the calendar-day reference.
//!
//! The thresholds carry no derivation; they are named here so deployments can
//! tune them without touching matching or ledger code.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use thiserror::Error;

use crate::types::AttendanceStatus;

// --- Named constants (no magic numbers) ---
/// Minimum cosine similarity a candidate must strictly exceed.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.4;
/// Recognition is never asserted as certain.
pub const CONFIDENCE_CAP: f64 = 95.0;
/// Confidence strictly above this is `present`, otherwise `late`.
pub const PRESENT_CONFIDENCE: f64 = 80.0;
/// Subject used when a capture names none.
pub const DEFAULT_SUBJECT: &str = "General";

const SECONDS_PER_MINUTE: i32 = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("similarity threshold {0} must lie in [-1, 1)")]
    Threshold(f64),
    #[error("confidence cap {0} must lie in (0, 100]")]
    Cap(f64),
    #[error("present confidence {present} must not exceed the cap {cap}")]
    PresentAboveCap { present: f64, cap: f64 },
    #[error("day offset of {0} minutes is out of range")]
    DayOffset(i32),
}

/// Tunable recognition and attendance policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub similarity_threshold: f64,
    pub confidence_cap: f64,
    pub present_confidence: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            confidence_cap: CONFIDENCE_CAP,
            present_confidence: PRESENT_CONFIDENCE,
        }
    }
}

impl Policy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        let t = self.similarity_threshold;
        if !(-1.0..1.0).contains(&t) {
            return Err(PolicyError::Threshold(t));
        }
        let cap = self.confidence_cap;
        if !(cap > 0.0 && cap <= 100.0) {
            return Err(PolicyError::Cap(cap));
        }
        if self.present_confidence.is_nan() || self.present_confidence > cap {
            return Err(PolicyError::PresentAboveCap {
                present: self.present_confidence,
                cap,
            });
        }
        Ok(())
    }

    /// Percentage confidence for a raw similarity, kept within [0, cap].
    pub fn confidence(&self, similarity: f64) -> f64 {
        (similarity * 100.0).min(self.confidence_cap).max(0.0)
    }

    pub fn status(&self, confidence: f64) -> AttendanceStatus {
        if confidence > self.present_confidence {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }
}

/// Maps timestamps to the calendar day used for deduplication.
///
/// A fixed offset has no DST transitions, so each instant belongs to exactly
/// one day key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBoundary {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Day boundary at `minutes` east of UTC (negative for west).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, PolicyError> {
        minutes
            .checked_mul(SECONDS_PER_MINUTE)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(PolicyError::DayOffset(minutes))
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / SECONDS_PER_MINUTE
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}
