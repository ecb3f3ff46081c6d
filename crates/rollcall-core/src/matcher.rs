//! Probe-vs-roster matching.
//!
//! Pure computation over a snapshot: no locking, no store mutation.

use thiserror::Error;

use crate::types::{Descriptor, Identity};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("invalid probe descriptor: {0}")]
    InvalidInput(String),
    #[error("no enrolled identity above similarity threshold {threshold}")]
    NoMatch {
        threshold: f64,
        /// Best similarity among comparable candidates, if any were compared.
        best_similarity: Option<f64>,
    },
}

/// Winning candidate of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub identity: &'a Identity,
    /// Raw cosine similarity [-1, 1].
    pub similarity: f64,
}

/// Strategy for comparing a probe descriptor against enrolled identities.
pub trait Matcher {
    fn best_match<'a>(
        &self,
        probe: &Descriptor,
        candidates: &'a [Identity],
        threshold: f64,
    ) -> Result<MatchResult<'a>, MatchError>;
}

/// Cosine similarity matcher.
///
/// Iterates every candidate in snapshot order. A candidate wins only if its
/// similarity strictly exceeds both the threshold and the current best, so
/// ties keep the first-seen candidate. Candidates whose dimensionality differs
/// from the probe are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn best_match<'a>(
        &self,
        probe: &Descriptor,
        candidates: &'a [Identity],
        threshold: f64,
    ) -> Result<MatchResult<'a>, MatchError> {
        if probe.is_empty() {
            return Err(MatchError::InvalidInput("probe descriptor is empty".into()));
        }
        if !probe.is_finite() {
            return Err(MatchError::InvalidInput(
                "probe descriptor contains non-finite values".into(),
            ));
        }

        let mut best: Option<MatchResult<'a>> = None;
        let mut best_seen: Option<f64> = None;

        for identity in candidates {
            if identity.descriptor.len() != probe.len() {
                tracing::debug!(
                    roll_number = %identity.roll_number,
                    expected = probe.len(),
                    found = identity.descriptor.len(),
                    "skipping candidate with mismatched dimensionality"
                );
                continue;
            }

            let similarity = probe.similarity(&identity.descriptor);
            tracing::debug!(roll_number = %identity.roll_number, similarity, "candidate scored");
            best_seen = Some(best_seen.map_or(similarity, |b| b.max(similarity)));

            let beats_best = best.as_ref().map_or(true, |b| similarity > b.similarity);
            if similarity > threshold && beats_best {
                best = Some(MatchResult { identity, similarity });
            }
        }

        best.ok_or(MatchError::NoMatch {
            threshold,
            best_similarity: best_seen,
        })
    }
}
