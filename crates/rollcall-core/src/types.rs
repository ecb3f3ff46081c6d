use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Face descriptor vector produced by the external perception step.
///
/// Dimensionality is fixed per store by the first enrolled identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f64>,
}

impl Descriptor {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Compute cosine similarity between two descriptors.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Returns 0 when
    /// either norm is zero or the lengths differ, so the result is never NaN
    /// for finite input. Always processes all dimensions.
    pub fn similarity(&self, other: &Descriptor) -> f64 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }

        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        // Rounding can push |dot| a hair past denom for near-parallel vectors.
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

impl From<Vec<f64>> for Descriptor {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Unique enrollment key for a student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollNumber(String);

impl RollNumber {
    /// Trim and accept a roll number; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An enrolled student.
///
/// Only `total_attendance` and `last_seen` change after enrollment, and only
/// through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub roll_number: RollNumber,
    pub name: String,
    pub email: String,
    pub descriptor: Descriptor,
    pub registered_on: NaiveDate,
    pub total_attendance: u32,
    /// `None` until the first recorded event.
    pub last_seen: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Late => f.write_str("late"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    FacialRecognition,
    Manual,
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FacialRecognition => f.write_str("facial_recognition"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// Immutable record that an identity attended a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub roll_number: RollNumber,
    pub name: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    /// Calendar day this event was deduplicated under.
    pub day: NaiveDate,
    /// Percentage in [0, cap].
    pub confidence: f64,
    /// Raw cosine similarity [-1, 1].
    pub similarity: f64,
    pub status: AttendanceStatus,
    pub method: CaptureMethod,
    pub session_id: String,
}
