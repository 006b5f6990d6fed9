//! [`NetworkGateway`] over an [`HttpTransport`] plugin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use consent_sdk::{HttpTransport, MessagesResponse, TransportRequest};
use tracing::instrument;

use super::converter;
use super::endpoints::Endpoints;
use crate::domain::model::{
    ChoiceResponse, ConsentStatusRequest, ConsentStatusResponse, CustomConsentMutation,
    CustomConsentResponse, GetChoiceRequest, MessagesRequest, MetaDataRequest, MetaDataResponse,
    Operation, PageViewRequest, PageViewResponse, StoreChoiceRequest, StoreChoiceResponse,
};
use crate::domain::ports::{GatewayError, NetworkGateway};

fn encoded(
    request: Result<TransportRequest, serde_json::Error>,
) -> Result<TransportRequest, GatewayError> {
    request.map_err(|e| GatewayError::Encoding(e.to_string()))
}

pub struct HttpNetworkGateway {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    timeout: Option<Duration>,
}

impl HttpNetworkGateway {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
            timeout: None,
        }
    }

    /// Per-request timeout passed down to the transport.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[instrument(skip(self, request), fields(method = %request.method))]
    async fn send(
        &self,
        operation: Operation,
        mut request: TransportRequest,
    ) -> Result<String, GatewayError> {
        if request.timeout.is_none() {
            request.timeout = self.timeout;
        }
        let start = Instant::now();
        let response = self.transport.execute(request).await?;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            status_code = response.status,
            duration_ms,
            body_size = response.body.len(),
            "Backend call completed"
        );

        if !response.is_success() {
            return Err(GatewayError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl NetworkGateway for HttpNetworkGateway {
    async fn get_metadata(&self, req: &MetaDataRequest) -> Result<MetaDataResponse, GatewayError> {
        let request = encoded(self.endpoints.meta_data(req))?;
        let body = self.send(Operation::Metadata, request).await?;
        Ok(converter::meta_data(&body)?)
    }

    async fn get_consent_status(
        &self,
        req: &ConsentStatusRequest,
    ) -> Result<ConsentStatusResponse, GatewayError> {
        let request = encoded(self.endpoints.consent_status(req))?;
        let body = self.send(Operation::ConsentStatus, request).await?;
        Ok(converter::consent_status(&body)?)
    }

    async fn get_messages(&self, req: &MessagesRequest) -> Result<MessagesResponse, GatewayError> {
        let request = encoded(self.endpoints.messages(req))?;
        let body = self.send(Operation::Messages, request).await?;
        Ok(converter::messages(&body)?)
    }

    async fn get_choice(&self, req: &GetChoiceRequest) -> Result<ChoiceResponse, GatewayError> {
        let request = encoded(self.endpoints.get_choice(req))?;
        let body = self.send(Operation::GetChoice, request).await?;
        Ok(converter::choice(&body)?)
    }

    async fn store_choice(
        &self,
        req: &StoreChoiceRequest,
    ) -> Result<StoreChoiceResponse, GatewayError> {
        let request = encoded(self.endpoints.store_choice(req))?;
        let body = self.send(Operation::StoreChoice, request).await?;
        Ok(converter::store_choice(req.body.kind(), &body)?)
    }

    async fn post_page_view(
        &self,
        req: &PageViewRequest,
    ) -> Result<PageViewResponse, GatewayError> {
        let request = encoded(self.endpoints.page_view(req))?;
        let body = self.send(Operation::PageView, request).await?;
        Ok(converter::page_view(&body)?)
    }

    async fn send_custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<CustomConsentResponse, GatewayError> {
        let request = encoded(self.endpoints.custom_consent(req))?;
        let body = self.send(Operation::CustomConsent, request).await?;
        Ok(converter::custom_consent(&body)?)
    }

    async fn delete_custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<CustomConsentResponse, GatewayError> {
        let request = encoded(self.endpoints.delete_custom_consent(req))?;
        let body = self.send(Operation::DeleteCustomConsent, request).await?;
        Ok(converter::custom_consent(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MetaDataCampaigns, PageViewBody};
    use consent_sdk::{Environment, TransportError, TransportResponse};
    use parking_lot::Mutex;

    struct OneShot {
        reply: Mutex<Option<Result<TransportResponse, TransportError>>>,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl OneShot {
        fn new(reply: Result<TransportResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for OneShot {
        async fn execute(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().push(request);
            self.reply
                .lock()
                .take()
                .unwrap_or(Err(TransportError::Request("no reply scripted".to_owned())))
        }
    }

    fn gateway(transport: Arc<OneShot>) -> HttpNetworkGateway {
        HttpNetworkGateway::new(
            transport,
            Endpoints::new(Environment::Production, None).unwrap(),
        )
        .with_timeout(Duration::from_secs(3))
    }

    fn metadata_request() -> MetaDataRequest {
        MetaDataRequest {
            env: Environment::Production,
            account_id: 22,
            property_id: 7,
            metadata: MetaDataCampaigns::default(),
        }
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let transport = OneShot::new(Ok(TransportResponse {
            status: 503,
            body: "maintenance".to_owned(),
        }));

        let err = gateway(transport)
            .get_metadata(&metadata_request())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 503, ref body } if body == "maintenance"));
    }

    #[tokio::test]
    async fn transport_failures_pass_through() {
        let transport = OneShot::new(Err(TransportError::Timeout));

        let err = gateway(transport)
            .get_metadata(&metadata_request())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Transport(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn gateway_timeout_is_applied_to_requests() {
        let transport = OneShot::new(Ok(TransportResponse {
            status: 200,
            body: "{}".to_owned(),
        }));

        gateway(transport.clone())
            .get_metadata(&metadata_request())
            .await
            .unwrap();

        assert_eq!(transport.seen.lock()[0].timeout, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let transport = OneShot::new(Ok(TransportResponse {
            status: 200,
            body: "<html>".to_owned(),
        }));
        let req = PageViewRequest {
            env: Environment::Production,
            body: PageViewBody::Ccpa(crate::domain::model::CcpaPageView {
                uuid: None,
                account_id: 22,
                pub_data: serde_json::Map::new(),
                applies: true,
                site_id: 7,
                consent_status: crate::domain::model::CcpaPageViewStatus::default(),
                message_id: None,
                sample_rate: 1.0,
            }),
        };

        let err = gateway(transport).post_page_view(&req).await.unwrap_err();

        assert!(matches!(err, GatewayError::Malformed(_)));
    }
}
