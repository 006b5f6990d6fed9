//! Ports the domain depends on.

use async_trait::async_trait;
use consent_sdk::{Consents, MessagesResponse, TransportError};
use thiserror::Error;

use super::model::{
    ChoiceResponse, ConsentStatusRequest, ConsentStatusResponse, CustomConsentMutation,
    CustomConsentResponse, GetChoiceRequest, MessagesRequest, MetaDataRequest, MetaDataResponse,
    PageViewRequest, PageViewResponse, StoreChoiceRequest, StoreChoiceResponse,
};

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request encoding failed: {0}")]
    Encoding(String),
}

/// Typed calls to the consent backend.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    async fn get_metadata(&self, req: &MetaDataRequest) -> Result<MetaDataResponse, GatewayError>;

    async fn get_consent_status(
        &self,
        req: &ConsentStatusRequest,
    ) -> Result<ConsentStatusResponse, GatewayError>;

    async fn get_messages(&self, req: &MessagesRequest) -> Result<MessagesResponse, GatewayError>;

    async fn get_choice(&self, req: &GetChoiceRequest) -> Result<ChoiceResponse, GatewayError>;

    async fn store_choice(
        &self,
        req: &StoreChoiceRequest,
    ) -> Result<StoreChoiceResponse, GatewayError>;

    async fn post_page_view(&self, req: &PageViewRequest)
    -> Result<PageViewResponse, GatewayError>;

    async fn send_custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<CustomConsentResponse, GatewayError>;

    async fn delete_custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<CustomConsentResponse, GatewayError>;
}

/// On-device key-value storage.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove(&self, key: &str) -> anyhow::Result<()>;

    fn clear_all(&self) -> anyhow::Result<()>;
}

/// Decides whether a page view is reported for a given sample rate.
pub trait SamplingPolicy: Send + Sync {
    /// `sample_rate` is a fraction in `0.0..=1.0`.
    fn sample(&self, sample_rate: f64) -> bool;
}

/// Receives the merged consent view whenever a submission changes it.
pub trait ConsentNotifier: Send + Sync {
    fn consents_changed(&self, consents: &Consents);
}
