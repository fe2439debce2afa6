//! Pending-error correlation
//!
//! The worker reports a validation error and the question it belongs to as
//! two separate events: first the error, then the question it re-asks.
//! The error is held here until that question arrives.

use crate::question::QuestionKind;
use crate::types::{FieldError, FieldKind};
use mig_store::QuestionId;

/// An error waiting for its question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingError {
    /// Error identifier that raised it
    pub source: QuestionId,
    /// Extended description of the error
    pub message: String,
}

/// Single-slot buffer for one pending error
#[derive(Debug, Clone, Default)]
pub struct ErrorCorrelator {
    pending: Option<PendingError>,
}

impl ErrorCorrelator {
    /// Create an empty correlator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold an error, returning the one it displaced
    pub fn hold(&mut self, source: QuestionId, message: impl Into<String>) -> Option<PendingError> {
        self.pending.replace(PendingError {
            source,
            message: message.into(),
        })
    }

    /// Whether an error is held
    #[inline]
    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.pending.is_some()
    }

    /// The held error
    #[inline]
    #[must_use]
    pub fn pending(&self) -> Option<&PendingError> {
        self.pending.as_ref()
    }

    /// Attach the held error to `kind` if it is a user or password field
    ///
    /// Clears the slot on a match; otherwise leaves it untouched.
    pub fn correlate(&mut self, kind: &QuestionKind) -> Option<FieldError> {
        let (username, field) = match kind {
            QuestionKind::UserField { username } => (username, FieldKind::User),
            QuestionKind::PasswordField { username } => (username, FieldKind::Password),
            _ => return None,
        };
        let pending = self.pending.take()?;
        Some(FieldError {
            message: pending.message,
            username: username.clone(),
            field,
        })
    }

    /// Clear the slot, returning whatever was never correlated
    pub fn expire(&mut self) -> Option<PendingError> {
        self.pending.take()
    }
}
