//! Unified error type for the domain layer.

use thiserror::Error;

/// Unified error type for domain operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced skeleton node does not exist (data desync or a lookup
    /// against a skeleton that is still being generated).
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A submitted option does not belong to the decision point it was
    /// offered at, or the decision point is already resolved.
    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    /// State transition not allowed (e.g. advancing a completed story).
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Validation failed (e.g. invalid field values).
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    /// Create a not found error.
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create an invalid choice error.
    pub fn invalid_choice(msg: impl Into<String>) -> Self {
        Self::InvalidChoice(msg.into())
    }

    /// Create an invalid state transition error.
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
