//! Error types for the duty subsystem
//!
//! This module defines the various errors that can occur during duty operations.

use thiserror::Error;

/// Errors that can occur during duty operations
#[derive(Debug, Error)]
pub enum DutyError {
    /// Duty type is not present in the catalog
    #[error("Unknown duty type: {0}")]
    UnknownDuty(String),

    /// Player lacks the role required by the duty type
    #[error("Missing required role for duty {duty}: {permission}")]
    PermissionDenied { duty: String, permission: String },

    /// Player already has an active session
    #[error("Already on duty for {0}")]
    AlreadyOnDuty(String),

    /// Player has no active session
    #[error("Not currently on duty")]
    NotOnDuty,

    /// Leaderboard page number is not usable
    #[error("Invalid page number")]
    InvalidPage,

    /// Failed to read or write the duty store or config document
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Webhook delivery failed; always swallowed by the notifier
    #[error("Notification failure: {0}")]
    Notification(String),
}

/// Convert a string into a DutyError
impl From<String> for DutyError {
    fn from(message: String) -> Self {
        Self::Persistence(message)
    }
}

/// Result type for duty operations
pub type DutyResult<T> = Result<T, DutyError>;
