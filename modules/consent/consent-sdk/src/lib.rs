//! Consent SDK
//!
//! This crate provides the public API for the `consent` module:
//!
//! - [`ConsentClient`] - Public API trait for hosts
//! - [`ConsentEvents`] - Callback surface for background outcomes
//! - [`HttpTransport`] - Plugin API for HTTP transports
//! - [`GdprConsentState`], [`CcpaConsentState`], [`MessagesResponse`] - Models
//! - [`ConsentError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use consent_sdk::{ActionType, ConsentAction, ConsentClient, RegulationKind};
//!
//! let outcome = client.load_messages(None, Default::default()).await?;
//! let consent = client
//!     .submit_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::RejectAll))
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

pub use api::{ConsentClient, ConsentEvents, NoopConsentEvents};
pub use error::ConsentError;
pub use models::{
    ActionType, CampaignConfig, CampaignMessage, CampaignsEnv, CcpaConsentState, CcpaMessage,
    CcpaStatus, ConsentAction, ConsentState, ConsentStatus, Consents, CustomConsentRequest,
    Environment, GdprConsentState, GdprMessage, GranularState, GranularStatus, LoadOutcome,
    LocalState, MessageCampaigns, MessageCategory, MessageMetaData, MessageSubCategory,
    MessagesResponse, OsInfo, PropertyConfig, RegulationKind, TargetingParam, VendorGrants,
};
pub use plugin_api::{
    HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse,
};
