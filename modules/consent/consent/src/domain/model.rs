//! Requests and responses exchanged with the consent backend.
//!
//! Field names follow the backend's camelCase JSON. Transport-only constants
//! (`includeData`, `hasCsp`, query layout) are added by the HTTP gateway.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use consent_sdk::{
    ActionType, CcpaConsentState, CcpaStatus, ConsentStatus, CustomConsentRequest, Environment,
    GdprConsentState, GranularStatus, LocalState, OsInfo, RegulationKind, VendorGrants,
};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Backend operation, used in logs and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Metadata,
    ConsentStatus,
    Messages,
    GetChoice,
    StoreChoice,
    PageView,
    CustomConsent,
    DeleteCustomConsent,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "meta-data",
            Self::ConsentStatus => "consent-status",
            Self::Messages => "messages",
            Self::GetChoice => "get-choice",
            Self::StoreChoice => "store-choice",
            Self::PageView => "pv-data",
            Self::CustomConsent => "custom-consent",
            Self::DeleteCustomConsent => "delete-custom-consent",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_sample_rate() -> f64 {
    1.0
}

/// Writes `{}` for a missing blob; the backend expects an object.
fn state_or_empty<S: Serializer>(
    state: &Option<LocalState>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match state {
        Some(state) => state.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

// === meta-data ===

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataCampaign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_pm_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaDataCampaigns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<MetaDataCampaign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccpa: Option<MetaDataCampaign>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataRequest {
    pub env: Environment,
    pub account_id: i64,
    pub property_id: i64,
    pub metadata: MetaDataCampaigns,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprMetaData {
    #[serde(default, deserialize_with = "consent_sdk::models::de::lenient_datetime")]
    pub additions_change_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::lenient_datetime")]
    pub legal_basis_change_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub applies: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub vendor_list_id: Option<String>,
    #[serde(default)]
    pub child_pm_id: Option<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub get_message_always: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaMetaData {
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub applies: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetaDataResponse {
    #[serde(default)]
    pub gdpr: Option<GdprMetaData>,
    #[serde(default)]
    pub ccpa: Option<CcpaMetaData>,
}

impl MetaDataResponse {
    #[must_use]
    pub fn applies(&self, kind: RegulationKind) -> Option<bool> {
        match kind {
            RegulationKind::Gdpr => self.gdpr.as_ref().map(|g| g.applies),
            RegulationKind::Ccpa => self.ccpa.as_ref().map(|c| c.applies),
        }
    }

    #[must_use]
    pub fn sample_rate(&self, kind: RegulationKind) -> Option<f64> {
        match kind {
            RegulationKind::Gdpr => self.gdpr.as_ref().map(|g| g.sample_rate),
            RegulationKind::Ccpa => self.ccpa.as_ref().map(|c| c.sample_rate),
        }
    }

    /// `applies` flags only, the shape messages and choice calls expect.
    #[must_use]
    pub fn applies_meta(&self) -> AppliesMetaData {
        AppliesMetaData {
            gdpr: self.gdpr.as_ref().map(|g| Applies { applies: g.applies }),
            ccpa: self.ccpa.as_ref().map(|c| Applies { applies: c.applies }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Applies {
    pub applies: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliesMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<Applies>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccpa: Option<Applies>,
}

// === consent-status ===

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatusMeta {
    pub applies: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub has_local_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsentStatusMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<CampaignStatusMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccpa: Option<CampaignStatusMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsentStatusRequest {
    pub env: Environment,
    pub account_id: i64,
    pub property_id: i64,
    pub auth_id: Option<String>,
    pub metadata: ConsentStatusMetaData,
    pub local_state: Option<LocalState>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConsentStatusData {
    #[serde(default)]
    pub gdpr: Option<GdprConsentState>,
    #[serde(default)]
    pub ccpa: Option<CcpaConsentState>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentStatusResponse {
    #[serde(default)]
    pub consent_status_data: Option<ConsentStatusData>,
    #[serde(default)]
    pub local_state: Option<LocalState>,
}

// === messages ===

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprCampaignRequest {
    pub targeting_params: BTreeMap<String, String>,
    pub has_local_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_status: Option<ConsentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_pm_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaCampaignRequest {
    pub targeting_params: BTreeMap<String, String>,
    pub has_local_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CcpaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_pm_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagesCampaigns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<GdprCampaignRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccpa: Option<CcpaCampaignRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesBody {
    pub account_id: i64,
    pub property_href: String,
    pub campaigns: MessagesCampaigns,
    pub campaign_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_language: Option<String>,
    #[serde(serialize_with = "state_or_empty")]
    pub local_state: Option<LocalState>,
    pub operating_system: OsInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagesRequest {
    pub env: Environment,
    pub body: MessagesBody,
    pub metadata: AppliesMetaData,
    pub non_keyed_local_state: Option<LocalState>,
}

// === choice ===

/// Choice type of the get-choice call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceType {
    ConsentAll,
    RejectAll,
}

impl ChoiceType {
    #[must_use]
    pub const fn from_action(action: ActionType) -> Option<Self> {
        match action {
            ActionType::AcceptAll => Some(Self::ConsentAll),
            ActionType::RejectAll => Some(Self::RejectAll),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConsentAll => "consent-all",
            Self::RejectAll => "reject-all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetChoiceRequest {
    pub env: Environment,
    pub choice_type: ChoiceType,
    pub account_id: i64,
    pub property_id: i64,
    /// Carries only the regulation the choice is for.
    pub metadata: AppliesMetaData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprChoice {
    #[serde(flatten)]
    pub consent: GdprConsentState,
    #[serde(default)]
    pub consent_all_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceResponse {
    #[serde(default)]
    pub gdpr: Option<GdprChoice>,
    #[serde(default)]
    pub ccpa: Option<CcpaConsentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprChoiceBody {
    pub sample_rate: f64,
    pub property_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granular_status: Option<GranularStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_all_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_list_id: Option<String>,
    pub pm_save_and_exit_variables: Map<String, Value>,
    #[serde(rename = "authId", skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "sendPVData")]
    pub send_pv_data: bool,
    pub pub_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaChoiceBody {
    pub sample_rate: f64,
    pub property_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    pub pm_save_and_exit_variables: Map<String, Value>,
    #[serde(rename = "authId", skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "sendPVData")]
    pub send_pv_data: bool,
    pub pub_data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreChoiceBody {
    Gdpr(GdprChoiceBody),
    Ccpa(CcpaChoiceBody),
}

impl StoreChoiceBody {
    #[must_use]
    pub const fn kind(&self) -> RegulationKind {
        match self {
            Self::Gdpr(_) => RegulationKind::Gdpr,
            Self::Ccpa(_) => RegulationKind::Ccpa,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreChoiceRequest {
    pub env: Environment,
    pub action_type: ActionType,
    pub body: StoreChoiceBody,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprStoreChoiceResponse {
    pub uuid: String,
    #[serde(default, deserialize_with = "consent_sdk::models::de::lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(rename = "TCData", default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub tc_data: BTreeMap<String, Value>,
    #[serde(default)]
    pub euconsent: Option<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub grants: BTreeMap<String, VendorGrants>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub vendors: Vec<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaStoreChoiceResponse {
    pub uuid: String,
    #[serde(default, deserialize_with = "consent_sdk::models::de::lenient_datetime")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub consented_all: bool,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub rejected_all: bool,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub status: CcpaStatus,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub rejected_categories: Vec<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub rejected_vendors: Vec<String>,
    #[serde(rename = "GPPData", default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub gpp_data: BTreeMap<String, Value>,
    #[serde(default)]
    pub web_consent_payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreChoiceResponse {
    Gdpr(GdprStoreChoiceResponse),
    Ccpa(CcpaStoreChoiceResponse),
}

// === pv-data ===

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprPageView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub euconsent: Option<String>,
    pub account_id: i64,
    pub pub_data: Map<String, Value>,
    pub applies: bool,
    pub site_id: i64,
    pub consent_status: ConsentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category_id: Option<i64>,
    #[serde(rename = "prtnUUID", skip_serializing_if = "Option::is_none")]
    pub prtn_uuid: Option<String>,
    pub sample_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaPageViewStatus {
    pub has_consent_data: bool,
    pub rejected_categories: Vec<String>,
    pub rejected_vendors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CcpaPageView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub account_id: i64,
    pub pub_data: Map<String, Value>,
    pub applies: bool,
    pub site_id: i64,
    pub consent_status: CcpaPageViewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    pub sample_rate: f64,
}

/// One page-view report; the backend takes one regulation per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PageViewBody {
    #[serde(rename = "gdpr")]
    Gdpr(GdprPageView),
    #[serde(rename = "ccpa")]
    Ccpa(CcpaPageView),
}

impl PageViewBody {
    #[must_use]
    pub const fn kind(&self) -> RegulationKind {
        match self {
            Self::Gdpr(_) => RegulationKind::Gdpr,
            Self::Ccpa(_) => RegulationKind::Ccpa,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageViewRequest {
    pub env: Environment,
    pub body: PageViewBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageViewAck {
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageViewResponse {
    #[serde(default)]
    pub gdpr: Option<PageViewAck>,
    #[serde(default)]
    pub ccpa: Option<PageViewAck>,
}

impl PageViewResponse {
    #[must_use]
    pub fn uuid(&self, kind: RegulationKind) -> Option<&str> {
        match kind {
            RegulationKind::Gdpr => self.gdpr.as_ref(),
            RegulationKind::Ccpa => self.ccpa.as_ref(),
        }
        .and_then(|ack| ack.uuid.as_deref())
    }
}

// === custom consent ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomConsentMutation {
    pub env: Environment,
    pub property_id: i64,
    pub consent_uuid: String,
    pub request: CustomConsentRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomConsentResponse {
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub grants: BTreeMap<String, VendorGrants>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub vendors: Vec<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub leg_int_categories: Vec<String>,
    #[serde(default, deserialize_with = "consent_sdk::models::de::null_as_default")]
    pub special_features: Vec<String>,
}
