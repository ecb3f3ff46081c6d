//! Aggregate attendance statistics over the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{AttendanceEvent, AttendanceStatus};

/// Headline numbers for the dashboard and report collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// Restricts the event counts when set.
    pub day: Option<NaiveDate>,
    pub total_identities: usize,
    pub total_events: usize,
    pub present_count: usize,
    pub late_count: usize,
    /// Present events as a percentage of all events; 0 with no events.
    pub attendance_rate: f64,
    /// Mean event confidence (percent); 0 with no events.
    pub average_confidence: f64,
}

impl AttendanceSummary {
    pub fn compute(total_identities: usize, events: &[AttendanceEvent], day: Option<NaiveDate>) -> Self {
        let mut total_events = 0usize;
        let mut present_count = 0usize;
        let mut confidence_sum = 0.0f64;

        for event in events.iter().filter(|e| day.map_or(true, |d| e.day == d)) {
            total_events += 1;
            confidence_sum += event.confidence;
            if event.status == AttendanceStatus::Present {
                present_count += 1;
            }
        }

        let (attendance_rate, average_confidence) = if total_events > 0 {
            let n = total_events as f64;
            (present_count as f64 / n * 100.0, confidence_sum / n)
        } else {
            (0.0, 0.0)
        };

        Self {
            day,
            total_identities,
            total_events,
            present_count,
            late_count: total_events - present_count,
            attendance_rate,
            average_confidence,
        }
    }
}
