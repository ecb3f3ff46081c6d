//! rollcall-core — Face-descriptor matching and attendance ledger.
//!
//! Identifies enrolled students from a face descriptor using cosine
//! similarity, and records at most one attendance event per student,
//! subject and calendar day.

pub mod enrollment;
pub mod ledger;
pub mod matcher;
pub mod policy;
pub mod recognition;
pub mod roster;
pub mod store;
pub mod summary;
pub mod types;

pub use enrollment::{EnrollError, EnrollmentRequest};
pub use ledger::{AttendanceLedger, LedgerError};
pub use matcher::{CosineMatcher, MatchError, MatchResult, Matcher};
pub use policy::{DayBoundary, Policy, PolicyError};
pub use recognition::{RecognitionOutcome, RecognitionRequest, RejectReason};
pub use roster::Roster;
pub use store::{DescriptorStore, StoreError};
pub use summary::AttendanceSummary;
pub use types::{AttendanceEvent, AttendanceStatus, CaptureMethod, Descriptor, Identity, RollNumber};
