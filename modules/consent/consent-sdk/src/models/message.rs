use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use super::campaign::RegulationKind;
use super::consent::{CcpaConsentState, CcpaStatus, ConsentStatus, GdprConsentState, VendorGrants};
use super::de::{lenient_datetime, null_as_default};

/// Opaque state blob issued by the backend.
///
/// Kept as raw JSON text and sent back byte-for-byte on the next request.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalState(Box<RawValue>);

impl LocalState {
    /// Wraps a JSON document.
    ///
    /// # Errors
    /// Returns an error when `json` is not valid JSON.
    pub fn from_json(json: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(json.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for LocalState {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Debug for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalState").field(&self.as_str()).finish()
    }
}

/// Message category (`categoryId`) reported in message metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "i64")]
pub enum MessageCategory {
    Gdpr,
    Ccpa,
    AdBlock,
    Ios14,
    Custom,
    Unknown,
}

impl From<Value> for MessageCategory {
    fn from(value: Value) -> Self {
        match value.as_i64() {
            Some(1) => Self::Gdpr,
            Some(2) => Self::Ccpa,
            Some(3) => Self::AdBlock,
            Some(4) => Self::Ios14,
            Some(5) => Self::Custom,
            _ => Self::Unknown,
        }
    }
}

impl From<MessageCategory> for i64 {
    fn from(category: MessageCategory) -> Self {
        match category {
            MessageCategory::Gdpr => 1,
            MessageCategory::Ccpa => 2,
            MessageCategory::AdBlock => 3,
            MessageCategory::Ios14 => 4,
            MessageCategory::Custom => 5,
            MessageCategory::Unknown => -1,
        }
    }
}

/// Message sub-category (`subCategoryId`): which renderer the message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "i64")]
pub enum MessageSubCategory {
    Tcf2,
    NativeInApp,
    Ott,
    NativeOtt,
    Unknown,
}

impl From<Value> for MessageSubCategory {
    fn from(value: Value) -> Self {
        match value.as_i64() {
            Some(5) => Self::Tcf2,
            Some(6) => Self::NativeInApp,
            Some(7) => Self::Ott,
            Some(14) => Self::NativeOtt,
            _ => Self::Unknown,
        }
    }
}

impl From<MessageSubCategory> for i64 {
    fn from(sub: MessageSubCategory) -> Self {
        match sub {
            MessageSubCategory::Tcf2 => 5,
            MessageSubCategory::NativeInApp => 6,
            MessageSubCategory::Ott => 7,
            MessageSubCategory::NativeOtt => 14,
            MessageSubCategory::Unknown => -1,
        }
    }
}

/// Identifies the message a campaign served; echoed on page-view reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetaData {
    #[serde(default)]
    pub bucket: Option<i64>,
    #[serde(default = "unknown_category")]
    pub category_id: MessageCategory,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub msg_description: Option<String>,
    #[serde(rename = "prtnUUID", default)]
    pub prtn_uuid: Option<String>,
    #[serde(default = "unknown_sub_category")]
    pub sub_category_id: MessageSubCategory,
}

const fn unknown_category() -> MessageCategory {
    MessageCategory::Unknown
}

const fn unknown_sub_category() -> MessageSubCategory {
    MessageSubCategory::Unknown
}

/// GDPR block of a messages response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprMessage {
    #[serde(rename = "type")]
    pub kind: RegulationKind,
    #[serde(default)]
    pub addtl_consent: Option<String>,
    #[serde(default)]
    pub child_pm_id: Option<String>,
    #[serde(default)]
    pub consent_status: Option<ConsentStatus>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub euconsent: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub grants: BTreeMap<String, VendorGrants>,
    #[serde(default)]
    pub has_local_data: Option<bool>,
    /// Renderer payload; `None` when no message is to be shown.
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub message_meta_data: Option<MessageMetaData>,
    #[serde(rename = "TCData", default, deserialize_with = "null_as_default")]
    pub tc_data: BTreeMap<String, Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
}

impl GdprMessage {
    /// Consent recorded by the backend for this campaign. Never carries a uuid.
    #[must_use]
    pub fn to_consent(&self) -> GdprConsentState {
        GdprConsentState {
            euconsent: self.euconsent.clone(),
            grants: self.grants.clone(),
            date_created: self.date_created,
            tc_data: self.tc_data.clone(),
            consent_status: self.consent_status.clone().unwrap_or_default().normalized(),
            addtl_consent: self.addtl_consent.clone(),
            web_consent_payload: self.web_consent_payload.clone(),
            ..GdprConsentState::default()
        }
    }
}

/// CCPA block of a messages response.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaMessage {
    #[serde(rename = "type")]
    pub kind: RegulationKind,
    #[serde(default)]
    pub applies: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub consented_all: bool,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub message_meta_data: Option<MessageMetaData>,
    #[serde(default)]
    pub new_user: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_all: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_categories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rejected_vendors: Vec<String>,
    #[serde(default)]
    pub signed_lspa: Option<bool>,
    #[serde(rename = "GPPData", default, deserialize_with = "null_as_default")]
    pub gpp_data: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CcpaStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
}

impl CcpaMessage {
    /// Consent recorded by the backend for this campaign. Never carries a uuid.
    #[must_use]
    pub fn to_consent(&self) -> CcpaConsentState {
        CcpaConsentState {
            uuid: None,
            status: self.status,
            consented_all: self.consented_all,
            rejected_all: self.rejected_all,
            rejected_categories: self.rejected_categories.clone(),
            rejected_vendors: self.rejected_vendors.clone(),
            date_created: self.date_created,
            gpp_data: self.gpp_data.clone(),
            applies: self.applies,
            signed_lspa: self.signed_lspa,
            new_user: self.new_user,
            web_consent_payload: self.web_consent_payload.clone(),
        }
    }
}

/// Regulation blocks of a messages response; either, both, or none may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCampaigns {
    #[serde(rename = "GDPR", default)]
    pub gdpr: Option<GdprMessage>,
    #[serde(rename = "CCPA", default)]
    pub ccpa: Option<CcpaMessage>,
}

/// One campaign of a messages response.
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignMessage {
    Gdpr(GdprMessage),
    Ccpa(CcpaMessage),
}

impl CampaignMessage {
    #[must_use]
    pub const fn kind(&self) -> RegulationKind {
        match self {
            Self::Gdpr(_) => RegulationKind::Gdpr,
            Self::Ccpa(_) => RegulationKind::Ccpa,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&Value> {
        match self {
            Self::Gdpr(m) => m.message.as_ref(),
            Self::Ccpa(m) => m.message.as_ref(),
        }
    }

    #[must_use]
    pub fn meta_data(&self) -> Option<&MessageMetaData> {
        match self {
            Self::Gdpr(m) => m.message_meta_data.as_ref(),
            Self::Ccpa(m) => m.message_meta_data.as_ref(),
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Gdpr(m) => m.url.as_deref(),
            Self::Ccpa(m) => m.url.as_deref(),
        }
    }
}

/// Messages to be shown to the user, as delivered on a successful load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    #[serde(default)]
    pub campaigns: Option<MessageCampaigns>,
    #[serde(default)]
    pub local_state: Option<LocalState>,
    #[serde(default)]
    pub non_keyed_local_state: Option<LocalState>,
    /// Category ids (GDPR = 1, CCPA = 2) in the order messages must be shown.
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Vec<i64>,
    #[serde(default)]
    pub property_id: Option<i64>,
}

impl MessagesResponse {
    /// Campaigns in priority order, each at most once.
    ///
    /// Campaigns whose category is not listed in `priority` are left out.
    #[must_use]
    pub fn campaign_list(&self) -> Vec<CampaignMessage> {
        let Some(campaigns) = &self.campaigns else {
            return Vec::new();
        };
        let mut seen = Vec::with_capacity(2);
        let mut list = Vec::with_capacity(2);
        for kind in self
            .priority
            .iter()
            .filter_map(|id| RegulationKind::from_category_id(*id))
        {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);
            match kind {
                RegulationKind::Gdpr => {
                    if let Some(gdpr) = &campaigns.gdpr {
                        list.push(CampaignMessage::Gdpr(gdpr.clone()));
                    }
                }
                RegulationKind::Ccpa => {
                    if let Some(ccpa) = &campaigns.ccpa {
                        list.push(CampaignMessage::Ccpa(ccpa.clone()));
                    }
                }
            }
        }
        list
    }
}

/// Outcome of a successful message-load cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Messages were fetched and must be rendered by the host.
    Messages(Box<MessagesResponse>),
    /// Consent is current; nothing to render.
    ShowConsentOnly,
}
