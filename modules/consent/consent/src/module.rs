//! Consent module wiring.

use std::sync::Arc;

use consent_sdk::{ConsentError, ConsentEvents, HttpTransport, NoopConsentEvents};
use tracing::info;

use crate::config::ConsentConfig;
use crate::domain::engine::ReconciliationEngine;
use crate::domain::ports::{LocalStore, NetworkGateway, SamplingPolicy};
use crate::domain::registry::CampaignRegistry;
use crate::domain::sampling::{RandomSampling, SamplingGate};
use crate::domain::storage::ConsentStorage;
use crate::domain::submitter::ActionSubmitter;
use crate::infra::endpoints::Endpoints;
use crate::infra::http_gateway::HttpNetworkGateway;
use crate::infra::storage::{FileLocalStore, InMemoryLocalStore};
use crate::local_client::ConsentLocalClient;

/// Builds a [`ConsentLocalClient`] from configuration and host-provided parts.
///
/// Required: an [`HttpTransport`] or a ready [`NetworkGateway`]. Everything
/// else has a default: the device store follows `storage_path` (in memory when
/// unset), sampling is random, events are ignored.
///
/// ```ignore
/// let client = ConsentModule::builder(config)
///     .transport(Arc::new(ReqwestTransport::new(TransportConfig::default())?))
///     .events(Arc::new(MyEvents))
///     .build()?;
/// ```
pub struct ConsentModule {
    config: ConsentConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    gateway: Option<Arc<dyn NetworkGateway>>,
    store: Option<Arc<dyn LocalStore>>,
    sampling: Option<Arc<dyn SamplingPolicy>>,
    events: Option<Arc<dyn ConsentEvents>>,
}

impl ConsentModule {
    #[must_use]
    pub fn builder(config: ConsentConfig) -> Self {
        Self {
            config,
            transport: None,
            gateway: None,
            store: None,
            sampling: None,
            events: None,
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Bypass HTTP entirely; takes precedence over [`Self::transport`].
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn NetworkGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn sampling(mut self, sampling: Arc<dyn SamplingPolicy>) -> Self {
        self.sampling = Some(sampling);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn ConsentEvents>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate the configuration, restore the persisted session and start the
    /// action lane. Must run inside a Tokio runtime.
    ///
    /// # Errors
    /// - `Configuration` for invalid configuration, a bad base URL or a missing
    ///   transport
    /// - `Storage` when the device store cannot be opened or read
    pub fn build(self) -> Result<ConsentLocalClient, ConsentError> {
        info!("Initializing consent module");
        let config = self.config;
        config
            .validate()
            .map_err(|e| ConsentError::Configuration(e.to_string()))?;

        let store: Arc<dyn LocalStore> = match (self.store, &config.storage_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(
                FileLocalStore::open(path).map_err(|e| ConsentError::Storage(e.to_string()))?,
            ),
            (None, None) => Arc::new(InMemoryLocalStore::new()),
        };
        let storage = ConsentStorage::new(store);
        let restored = storage
            .load_snapshot()
            .map_err(|e| ConsentError::Storage(format!("{e:#}")))?;

        let registry = Arc::new(
            CampaignRegistry::new(config.property(), config.campaign_configs())?
                .with_state(restored),
        );

        let gateway: Arc<dyn NetworkGateway> = match (self.gateway, self.transport) {
            (Some(gateway), _) => gateway,
            (None, Some(transport)) => {
                let endpoints = Endpoints::new(config.environment, config.base_url.as_deref())
                    .map_err(|e| ConsentError::Configuration(format!("invalid base_url: {e}")))?;
                info!(base_url = %endpoints.base_url(), "Consent backend endpoints resolved");
                Arc::new(
                    HttpNetworkGateway::new(transport, endpoints)
                        .with_timeout(config.request_timeout()),
                )
            }
            (None, None) => {
                return Err(ConsentError::Configuration(
                    "an HTTP transport or a network gateway is required".to_owned(),
                ));
            }
        };

        let policy = self
            .sampling
            .unwrap_or_else(|| Arc::new(RandomSampling));
        let sampling = Arc::new(SamplingGate::new(policy, storage.clone()));
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(NoopConsentEvents));

        let engine = ReconciliationEngine::new(
            gateway.clone(),
            registry.clone(),
            storage.clone(),
            sampling.clone(),
        );
        let submitter = ActionSubmitter::new(gateway, registry.clone(), storage.clone(), sampling);

        info!(
            account_id = config.account_id,
            property_id = config.property_id,
            campaigns = config.campaigns.len(),
            "Consent module initialized"
        );
        Ok(ConsentLocalClient::new(
            engine, submitter, registry, storage, events,
        ))
    }
}
