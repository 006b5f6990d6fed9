//! reqwest implementation of [`HttpTransport`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use consent_sdk::{HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse};
use tracing::{Instrument, info_span, instrument};

use crate::config::TransportConfig;

pub struct ReqwestTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    /// # Errors
    /// Returns `TransportError::Request` when the HTTP client cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.default_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    const fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

fn map_send_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(target_url = %request.url, method = %request.method))]
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let start = Instant::now();

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), &request.url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder
            .send()
            .instrument(info_span!("http_request"))
            .await
            .map_err(|e| map_send_error(&e))?;

        let status_code = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(format!("failed to read response body: {e}"))
            }
        })?;
        if body.len() > self.config.max_response_size_bytes {
            return Err(TransportError::Request(format!(
                "response body of {} bytes exceeds the {} byte limit",
                body.len(),
                self.config.max_response_size_bytes
            )));
        }
        let body = String::from_utf8(body.to_vec())
            .map_err(|e| TransportError::Request(format!("response body is not UTF-8: {e}")))?;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            status_code,
            duration_ms,
            body_size = body.len(),
            "HTTP request completed"
        );

        Ok(TransportResponse {
            status: status_code,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(TransportConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/wrapper/v2/meta-data")
                    .query_param("env", "prod")
                    .header("accept", "application/json");
                then.status(200).body(r#"{"gdpr":{"applies":true}}"#);
            })
            .await;

        let resp = transport()
            .execute(TransportRequest::get(
                server.url("/wrapper/v2/meta-data?env=prod"),
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, r#"{"gdpr":{"applies":true}}"#);
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/wrapper/v2/pv-data")
                    .header("content-type", "application/json")
                    .body(r#"{"ccpa":{}}"#);
                then.status(200).body("{}");
            })
            .await;

        let resp = transport()
            .execute(TransportRequest::post(
                server.url("/wrapper/v2/pv-data"),
                r#"{"ccpa":{}}"#,
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(resp.is_success());
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/consent/tcfv2/consent/v3/custom/7");
                then.status(500).body("Internal Server Error");
            })
            .await;

        let resp = transport()
            .execute(TransportRequest::delete(
                server.url("/consent/tcfv2/consent/v3/custom/7"),
                "{}",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status, 500);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn request_timeout_is_reported_as_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).delay(Duration::from_millis(500)).body("{}");
            })
            .await;
        let mut request = TransportRequest::get(server.url("/slow"));
        request.timeout = Some(Duration::from_millis(50));

        let err = transport().execute(request).await.unwrap_err();

        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big");
                then.status(200).body("x".repeat(64));
            })
            .await;
        let transport = ReqwestTransport::new(TransportConfig {
            max_response_size_bytes: 16,
            ..TransportConfig::default()
        })
        .unwrap();

        let err = transport
            .execute(TransportRequest::get(server.url("/big")))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Request(ref m) if m.contains("exceeds")));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connect_error() {
        let err = transport()
            .execute(TransportRequest::get("http://127.0.0.1:1/meta-data"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)));
    }
}
