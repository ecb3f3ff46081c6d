//! Student enrollment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::policy::DayBoundary;
use crate::store::{DescriptorStore, StoreError};
use crate::types::{Descriptor, Identity, RollNumber};

/// Domain for emails derived from a student's name.
pub const EMAIL_DOMAIN: &str = "school.edu";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrollError {
    #[error("invalid enrollment: {0}")]
    InvalidInput(String),
    #[error("roll number {0} is already enrolled")]
    DuplicateKey(RollNumber),
}

impl From<StoreError> for EnrollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(roll) => EnrollError::DuplicateKey(roll),
            StoreError::DimensionMismatch { .. } | StoreError::NotFound(_) => {
                EnrollError::InvalidInput(err.to_string())
            }
        }
    }
}

/// Raw enrollment payload as received from the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub roll_number: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub descriptor: Vec<f64>,
}

/// An enrollment payload whose required fields have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidEnrollment {
    pub roll_number: RollNumber,
    pub name: String,
    pub email: String,
    pub descriptor: Descriptor,
}

impl EnrollmentRequest {
    pub fn validate(self) -> Result<ValidEnrollment, EnrollError> {
        let roll_number = RollNumber::parse(&self.roll_number)
            .ok_or_else(|| EnrollError::InvalidInput("roll number is required".into()))?;

        let name = self.name.trim();
        if name.is_empty() {
            return Err(EnrollError::InvalidInput("name is required".into()));
        }

        let descriptor = Descriptor::new(self.descriptor);
        if descriptor.is_empty() {
            return Err(EnrollError::InvalidInput("face descriptor is required".into()));
        }
        if !descriptor.is_finite() {
            return Err(EnrollError::InvalidInput(
                "face descriptor contains non-finite values".into(),
            ));
        }

        let email = match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => derive_email(name),
        };

        Ok(ValidEnrollment {
            roll_number,
            name: name.to_string(),
            email,
            descriptor,
        })
    }
}

/// `"Asha  Rao"` → `"asha.rao@school.edu"`.
pub fn derive_email(name: &str) -> String {
    let local = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".");
    format!("{local}@{EMAIL_DOMAIN}")
}

pub struct EnrollmentService {
    store: Arc<DescriptorStore>,
    days: DayBoundary,
}

impl EnrollmentService {
    pub fn new(store: Arc<DescriptorStore>, days: DayBoundary) -> Self {
        Self { store, days }
    }

    /// Validate and enroll a new identity.
    ///
    /// The first identity in the store fixes the descriptor length; later
    /// descriptors of another length are rejected, never padded or truncated.
    pub fn register(
        &self,
        request: EnrollmentRequest,
        now: DateTime<Utc>,
    ) -> Result<Identity, EnrollError> {
        let valid = request.validate()?;

        if let Some(expected) = self.store.dimension() {
            if valid.descriptor.len() != expected {
                return Err(EnrollError::InvalidInput(format!(
                    "descriptor has {} dimensions, store expects {expected}",
                    valid.descriptor.len()
                )));
            }
        }

        let identity = self.store.enroll(Identity {
            id: Uuid::new_v4(),
            roll_number: valid.roll_number,
            name: valid.name,
            email: valid.email,
            descriptor: valid.descriptor,
            registered_on: self.days.day_of(now),
            total_attendance: 0,
            last_seen: None,
        })?;

        tracing::info!(
            roll_number = %identity.roll_number,
            id = %identity.id,
            dimensions = identity.descriptor.len(),
            "identity enrolled"
        );
        Ok(identity)
    }
}
