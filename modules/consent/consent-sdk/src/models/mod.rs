//! Consent domain models.
//!
//! These models are shared by the consent module, its plugins and hosts.
//! They carry serde derives because they are also the shape persisted on the
//! device and exchanged with the backend; decoding is tolerant (missing or
//! `null` optional fields fall back to defaults, unknown codes map to an
//! `Unknown` variant).

mod action;
mod campaign;
mod consent;
pub mod de;
mod message;

pub use action::{ActionType, ConsentAction, CustomConsentRequest};
pub use campaign::{
    CampaignConfig, CampaignsEnv, Environment, OsInfo, PropertyConfig, RegulationKind,
    TargetingParam,
};
pub use consent::{
    CcpaConsentState, CcpaStatus, ConsentState, ConsentStatus, Consents, GdprConsentState,
    GranularState, GranularStatus, VendorGrants,
};
pub use message::{
    CampaignMessage, CcpaMessage, GdprMessage, LoadOutcome, LocalState, MessageCampaigns,
    MessageCategory, MessageMetaData, MessageSubCategory, MessagesResponse,
};
