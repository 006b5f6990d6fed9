//! Error types for the consent module.

use thiserror::Error;

use crate::models::{ActionType, RegulationKind};

/// Errors surfaced to consent hosts.
///
/// Page-view reporting failures are never surfaced; they are logged by the
/// module and do not have a variant here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsentError {
    /// A mandatory backend call (metadata, consent-status, messages) failed.
    #[error("{operation} request failed: {message}")]
    Network { operation: String, message: String },

    /// A backend response lacked a required field or was not valid JSON.
    #[error("malformed {operation} response: {message}")]
    MalformedResponse { operation: String, message: String },

    /// No consent object exists after a choice was submitted.
    #[error("invalid consent response: {message}")]
    InvalidConsentState { message: String },

    /// The operation needs a recorded consent for the regulation.
    #[error("{regulation} consent is missing")]
    MissingConsent { regulation: RegulationKind },

    /// The regulation is not part of the configured campaigns.
    #[error("{regulation} campaign is not configured")]
    NotConfigured { regulation: RegulationKind },

    /// The action does not record a consent choice.
    #[error("action {action} cannot be submitted")]
    UnsupportedAction { action: ActionType },

    /// Local consent storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsentError {
    #[must_use]
    pub fn network(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_consent(message: impl Into<String>) -> Self {
        Self::InvalidConsentState {
            message: message.into(),
        }
    }

    /// Whether the error aborted a message-load cycle.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::MalformedResponse { .. } | Self::Configuration(_)
        )
    }
}
