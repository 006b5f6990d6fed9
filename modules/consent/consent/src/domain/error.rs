//! Domain errors for the consent module.

use consent_sdk::{ActionType, ConsentError, RegulationKind};
use thiserror::Error;

use super::model::Operation;
use super::ports::GatewayError;

#[derive(Debug, Error)]
pub enum DomainError {
    /// A backend call failed.
    #[error("{operation} failed: {source}")]
    Gateway {
        operation: Operation,
        #[source]
        source: GatewayError,
    },

    #[error("invalid consent response: {message}")]
    InvalidConsentState { message: String },

    #[error("{regulation} consent is missing")]
    MissingConsent { regulation: RegulationKind },

    #[error("{regulation} campaign is not configured")]
    NotConfigured { regulation: RegulationKind },

    #[error("action {action} does not record a choice")]
    UnsupportedAction { action: ActionType },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    #[must_use]
    pub const fn gateway(operation: Operation, source: GatewayError) -> Self {
        Self::Gateway { operation, source }
    }

    #[must_use]
    pub fn invalid_consent(message: impl Into<String>) -> Self {
        Self::InvalidConsentState {
            message: message.into(),
        }
    }
}

impl From<DomainError> for ConsentError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Gateway {
                operation,
                source: GatewayError::Malformed(message),
            } => Self::malformed(operation.as_str(), message),
            DomainError::Gateway { operation, source } => {
                Self::network(operation.as_str(), source.to_string())
            }
            DomainError::InvalidConsentState { message } => Self::invalid_consent(message),
            DomainError::MissingConsent { regulation } => Self::MissingConsent { regulation },
            DomainError::NotConfigured { regulation } => Self::NotConfigured { regulation },
            DomainError::UnsupportedAction { action } => Self::UnsupportedAction { action },
            DomainError::Configuration(msg) => Self::Configuration(msg),
            DomainError::Storage(e) => Self::Storage(format!("{e:#}")),
        }
    }
}
