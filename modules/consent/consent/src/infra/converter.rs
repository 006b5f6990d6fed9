//! Backend JSON bodies to typed responses.
//!
//! Decoding goes through `serde_json::from_str` so `LocalState` blobs keep
//! their exact bytes.

use consent_sdk::{CampaignMessage, ConsentAction, MessagesResponse, RegulationKind};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::model::{
    ChoiceResponse, ConsentStatusResponse, CustomConsentResponse, MetaDataResponse,
    PageViewResponse, StoreChoiceResponse,
};
use crate::domain::ports::GatewayError;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<ConvertError> for GatewayError {
    fn from(e: ConvertError) -> Self {
        Self::Malformed(e.to_string())
    }
}

fn parse_object<T: DeserializeOwned>(body: &str) -> Result<T, ConvertError> {
    if !body.trim_start().starts_with('{') {
        return Err(ConvertError::NotAnObject);
    }
    Ok(serde_json::from_str(body)?)
}

/// # Errors
/// `ConvertError` for a non-object or undecodable body.
pub fn meta_data(body: &str) -> Result<MetaDataResponse, ConvertError> {
    parse_object(body)
}

/// # Errors
/// `ConvertError` for a non-object or undecodable body.
pub fn consent_status(body: &str) -> Result<ConsentStatusResponse, ConvertError> {
    parse_object(body)
}

/// Consent status is normalized on the way in.
///
/// # Errors
/// `ConvertError` for a non-object body or a campaign block without `type`.
pub fn messages(body: &str) -> Result<MessagesResponse, ConvertError> {
    let mut resp: MessagesResponse = parse_object(body)?;
    if let Some(gdpr) = resp.campaigns.as_mut().and_then(|c| c.gdpr.as_mut()) {
        gdpr.consent_status = gdpr.consent_status.take().map(|s| s.normalized());
    }
    Ok(resp)
}

/// # Errors
/// `ConvertError` for a non-object or undecodable body.
pub fn choice(body: &str) -> Result<ChoiceResponse, ConvertError> {
    let mut resp: ChoiceResponse = parse_object(body)?;
    if let Some(gdpr) = resp.gdpr.as_mut() {
        gdpr.consent.consent_status = std::mem::take(&mut gdpr.consent.consent_status).normalized();
    }
    Ok(resp)
}

/// # Errors
/// `ConvertError` for a non-object body or a response without `uuid`.
pub fn store_choice(kind: RegulationKind, body: &str) -> Result<StoreChoiceResponse, ConvertError> {
    Ok(match kind {
        RegulationKind::Gdpr => StoreChoiceResponse::Gdpr(parse_object(body)?),
        RegulationKind::Ccpa => StoreChoiceResponse::Ccpa(parse_object(body)?),
    })
}

/// # Errors
/// `ConvertError` for a non-object or undecodable body.
pub fn page_view(body: &str) -> Result<PageViewResponse, ConvertError> {
    parse_object(body)
}

/// # Errors
/// `ConvertError` for a non-object or undecodable body.
pub fn custom_consent(body: &str) -> Result<CustomConsentResponse, ConvertError> {
    parse_object(body)
}

/// Campaigns in priority order, limited to the configured regulations.
#[must_use]
pub fn prioritized_campaigns(
    resp: &MessagesResponse,
    configured: &[RegulationKind],
) -> Vec<CampaignMessage> {
    resp.campaign_list()
        .into_iter()
        .filter(|c| configured.contains(&c.kind()))
        .collect()
}

/// Action payload posted by a message renderer.
///
/// # Errors
/// `ConvertError` for a non-object payload or one without `actionType` or
/// `campaignType`.
pub fn consent_action(json: &str) -> Result<ConsentAction, ConvertError> {
    parse_object(json)
}
