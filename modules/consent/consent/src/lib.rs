#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Consent Module Implementation
//!
//! Orchestrates GDPR and CCPA consent for one property:
//!
//! - Message-load cycle (meta-data, consent-status, messages, page views)
//! - Choice submission (get-choice, store-choice) through a serialized lane
//! - Custom consent grants and revocations
//! - Session persistence in an on-device key-value store
//!
//! ## Architecture
//!
//! ```text
//!                Host (app, CLI)
//!                      │
//!                      ▼ ConsentClient / ConsentEvents
//! ┌─────────────────────────────────────────┐
//! │           ConsentLocalClient            │
//! │   load cycle          action lane       │
//! │       │                    │            │
//! │       ▼                    ▼            │
//! │ ReconciliationEngine  ActionSubmitter   │
//! │       └──────┬─────────────┘            │
//! │              ▼                          │
//! │  CampaignRegistry · ConsentStorage      │
//! └──────────────┬──────────────────────────┘
//!                ▼ NetworkGateway
//!        HttpNetworkGateway ──▶ HttpTransport plugin
//! ```
//!
//! ## Usage
//!
//! The public API is defined in `consent-sdk` and re-exported here.

// === PUBLIC API (from SDK) ===
pub use consent_sdk::{
    ActionType, CcpaConsentState, ConsentAction, ConsentClient, ConsentError, ConsentEvents,
    ConsentState, Consents, CustomConsentRequest, Environment, GdprConsentState, HttpTransport,
    LoadOutcome, MessagesResponse, NoopConsentEvents, RegulationKind,
};

// === MODULE DEFINITION ===
pub mod module;
pub use module::ConsentModule;

// === LOCAL CLIENT ===
pub mod local_client;
pub use local_client::ConsentLocalClient;

pub mod config;
pub use config::{CampaignEntry, ConfigError, ConsentConfig};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
