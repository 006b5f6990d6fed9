use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::campaign::RegulationKind;
use super::de::{lenient_datetime, null_as_default};

/// Aggregate state of a group of purposes or vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum GranularState {
    All,
    Some,
    None,
    EmptyVendorList,
    Unknown,
}

impl From<Value> for GranularState {
    fn from(value: Value) -> Self {
        match value.as_str() {
            Some("ALL") => Self::All,
            Some("SOME") => Self::Some,
            Some("NONE") => Self::None,
            Some("EMPTY_VL") => Self::EmptyVendorList,
            _ => Self::Unknown,
        }
    }
}

impl From<GranularState> for String {
    fn from(state: GranularState) -> Self {
        match state {
            GranularState::All => "ALL",
            GranularState::Some => "SOME",
            GranularState::None => "NONE",
            GranularState::EmptyVendorList => "EMPTY_VL",
            GranularState::Unknown => "UNKNOWN",
        }
        .to_owned()
    }
}

/// Per-purpose / per-vendor grant summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranularStatus {
    #[serde(default)]
    pub default_consent: Option<bool>,
    #[serde(default)]
    pub previous_opt_in_all: Option<bool>,
    #[serde(default)]
    pub purpose_consent: Option<GranularState>,
    #[serde(default)]
    pub purpose_leg_int: Option<GranularState>,
    #[serde(default)]
    pub vendor_consent: Option<GranularState>,
    #[serde(default)]
    pub vendor_leg_int: Option<GranularState>,
}

/// Summary flags for a regulation's consent.
///
/// Invariant: `consented_all` implies `!rejected_any`; see [`ConsentStatus::normalized`].
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub consented_all: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consented_to_any: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_any: bool,
    #[serde(rename = "rejectedLI", default, deserialize_with = "null_as_default")]
    pub rejected_li: bool,
    #[serde(default)]
    pub granular_status: Option<GranularStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_consent_data: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub legal_basis_changes: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vendor_list_additions: bool,
}

impl ConsentStatus {
    /// Enforces `consented_all => !rejected_any`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.consented_all {
            self.rejected_any = false;
        }
        self
    }

    /// Whether the vendor list or legal bases changed since the consent was given.
    #[must_use]
    pub fn requires_renewal(&self) -> bool {
        self.legal_basis_changes || self.vendor_list_additions
    }
}

/// Grants of a single vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorGrants {
    #[serde(default, deserialize_with = "null_as_default")]
    pub vendor_grant: bool,
    /// Purpose id to grant.
    #[serde(default, deserialize_with = "null_as_default")]
    pub purpose_grants: BTreeMap<String, bool>,
}

/// Recorded GDPR consent of the current user.
///
/// Absence of this object means no consent was recorded yet, not a rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsentState {
    #[serde(default)]
    pub uuid: Option<String>,
    /// IAB TCF consent string.
    #[serde(default)]
    pub euconsent: Option<String>,
    /// Vendor id to grants.
    #[serde(default, deserialize_with = "null_as_default")]
    pub grants: BTreeMap<String, VendorGrants>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vendors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub leg_int_categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub special_features: Vec<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    /// Raw TCF key/value payload (`IABTCF_*`).
    #[serde(rename = "TCData", default, deserialize_with = "null_as_default")]
    pub tc_data: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consent_status: ConsentStatus,
    #[serde(default)]
    pub applies: Option<bool>,
    #[serde(default)]
    pub vendor_list_id: Option<String>,
    #[serde(default)]
    pub addtl_consent: Option<String>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
}

/// CCPA opt-out status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum CcpaStatus {
    ConsentedAll,
    RejectedAll,
    RejectedSome,
    #[default]
    RejectedNone,
    LinkedNoAction,
    Unknown,
}

impl CcpaStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConsentedAll => "consentedAll",
            Self::RejectedAll => "rejectedAll",
            Self::RejectedSome => "rejectedSome",
            Self::RejectedNone => "rejectedNone",
            Self::LinkedNoAction => "linkedNoAction",
            Self::Unknown => "unknown",
        }
    }
}

impl From<Value> for CcpaStatus {
    fn from(value: Value) -> Self {
        match value.as_str() {
            Some("consentedAll") => Self::ConsentedAll,
            Some("rejectedAll") => Self::RejectedAll,
            Some("rejectedSome") => Self::RejectedSome,
            Some("rejectedNone") => Self::RejectedNone,
            Some("linkedNoAction") => Self::LinkedNoAction,
            _ => Self::Unknown,
        }
    }
}

impl From<CcpaStatus> for String {
    fn from(status: CcpaStatus) -> Self {
        status.as_str().to_owned()
    }
}

/// Recorded CCPA consent of the current user.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaConsentState {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CcpaStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consented_all: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_all: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_vendors: Vec<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    /// Raw GPP key/value payload.
    #[serde(rename = "GPPData", default, deserialize_with = "null_as_default")]
    pub gpp_data: BTreeMap<String, Value>,
    #[serde(default)]
    pub applies: Option<bool>,
    #[serde(default)]
    pub signed_lspa: Option<bool>,
    #[serde(default)]
    pub new_user: Option<bool>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
}

impl CcpaConsentState {
    /// IAB US Privacy string (`1YNN` style) derived from the status.
    #[must_use]
    pub fn usp_string(&self) -> String {
        if self.applies == Some(false) {
            return "1---".to_owned();
        }
        let opted_out = match self.status {
            CcpaStatus::RejectedAll | CcpaStatus::RejectedSome => 'Y',
            _ => 'N',
        };
        let lspa = if self.signed_lspa == Some(true) { 'Y' } else { 'N' };
        format!("1Y{opted_out}{lspa}")
    }
}

/// Consent of a single regulation, as returned by a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsentState {
    Gdpr(GdprConsentState),
    Ccpa(CcpaConsentState),
}

impl ConsentState {
    #[must_use]
    pub const fn kind(&self) -> RegulationKind {
        match self {
            Self::Gdpr(_) => RegulationKind::Gdpr,
            Self::Ccpa(_) => RegulationKind::Ccpa,
        }
    }

    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Self::Gdpr(c) => c.uuid.as_deref(),
            Self::Ccpa(c) => c.uuid.as_deref(),
        }
    }
}

/// Cross-regulation view of the user's consent delivered to the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consents {
    #[serde(default)]
    pub gdpr: Option<GdprConsentState>,
    #[serde(default)]
    pub ccpa: Option<CcpaConsentState>,
}

impl Consents {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gdpr.is_none() && self.ccpa.is_none()
    }
}
