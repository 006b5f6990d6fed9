//! Message-load cycle.
//!
//! One cycle runs as a single task and awaits every backend call in order:
//! meta-data, consent-status (when needed), staleness check, messages (when
//! needed), page-view reports. Any failure before page views aborts the cycle.
//! The host is told the outcome between the last two steps.

use std::sync::Arc;

use consent_sdk::{
    CampaignConfig, LoadOutcome, MessagesResponse, RegulationKind,
};
use serde_json::{Map, Value};
use tracing::instrument;

use super::error::DomainError;
use super::model::{
    CampaignStatusMeta, CcpaCampaignRequest, CcpaPageView, CcpaPageViewStatus,
    ConsentStatusMetaData, ConsentStatusRequest, GdprCampaignRequest, GdprPageView,
    MessagesBody, MessagesCampaigns, MessagesRequest, MetaDataCampaign, MetaDataCampaigns,
    MetaDataRequest, MetaDataResponse, Operation, PageViewBody, PageViewRequest,
};
use super::ports::NetworkGateway;
use super::registry::{CampaignRegistry, LOCAL_DATA_VERSION, RegistrySnapshot};
use super::renewal::flag_stale_consent;
use super::sampling::SamplingGate;
use super::storage::ConsentStorage;

/// Outcome of [`ReconciliationEngine::reconcile`], kept for the reporting step.
#[derive(Debug)]
pub struct Reconciled {
    pub outcome: LoadOutcome,
    metadata: MetaDataResponse,
}

pub struct ReconciliationEngine {
    gateway: Arc<dyn NetworkGateway>,
    registry: Arc<CampaignRegistry>,
    storage: ConsentStorage,
    sampling: Arc<SamplingGate>,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn NetworkGateway>,
        registry: Arc<CampaignRegistry>,
        storage: ConsentStorage,
        sampling: Arc<SamplingGate>,
    ) -> Self {
        Self {
            gateway,
            registry,
            storage,
            sampling,
        }
    }

    /// Run one load cycle: [`Self::reconcile`] followed by [`Self::report`].
    ///
    /// # Errors
    /// Returns `Gateway` when meta-data, consent-status or messages fail.
    pub async fn load(
        &self,
        auth_id: Option<String>,
        pub_data: &Map<String, Value>,
    ) -> Result<LoadOutcome, DomainError> {
        let reconciled = self.reconcile(auth_id).await?;
        self.report(&reconciled, pub_data).await;
        Ok(reconciled.outcome)
    }

    /// Everything up to the messages decision. The session is persisted
    /// before returning.
    ///
    /// # Errors
    /// Returns `Gateway` when meta-data, consent-status or messages fail.
    #[instrument(skip_all, fields(authenticated = auth_id.is_some()))]
    pub async fn reconcile(&self, auth_id: Option<String>) -> Result<Reconciled, DomainError> {
        self.registry.update(|s| s.auth_id.clone_from(&auth_id));

        let metadata = self.fetch_metadata().await?;

        let forced = self.registry.should_call_consent_status();
        let renew = self.registry.requires_new_consent_data();
        if auth_id.is_some() || forced || renew {
            tracing::debug!(forced, renew, "Refreshing consent status");
            self.fetch_consent_status(auth_id, &metadata).await?;
        }

        self.flag_stale_gdpr(&metadata);

        let outcome = if self.registry.should_call_messages() {
            let messages = self.fetch_messages(&metadata).await?;
            LoadOutcome::Messages(Box::new(messages))
        } else {
            tracing::debug!("Consent is current, nothing to render");
            LoadOutcome::ShowConsentOnly
        };

        self.persist();
        Ok(Reconciled { outcome, metadata })
    }

    /// Page-view reporting. Never fails; a uuid adopted from a page-view
    /// response is persisted.
    #[instrument(skip_all)]
    pub async fn report(&self, reconciled: &Reconciled, pub_data: &Map<String, Value>) {
        self.report_page_views(&reconciled.metadata, pub_data).await;
        self.persist();
    }

    async fn fetch_metadata(&self) -> Result<MetaDataResponse, DomainError> {
        let property = self.registry.property();
        let campaign = |kind| {
            self.registry.campaign(kind).map(|c| MetaDataCampaign {
                group_pm_id: c.group_pm_id.clone(),
            })
        };
        let req = MetaDataRequest {
            env: property.environment,
            account_id: property.account_id,
            property_id: property.property_id,
            metadata: MetaDataCampaigns {
                gdpr: campaign(RegulationKind::Gdpr),
                ccpa: campaign(RegulationKind::Ccpa),
            },
        };

        let metadata = self
            .gateway
            .get_metadata(&req)
            .await
            .map_err(|e| DomainError::gateway(Operation::Metadata, e))?;

        self.registry.update(|s| s.metadata = Some(metadata.clone()));
        Ok(metadata)
    }

    async fn fetch_consent_status(
        &self,
        auth_id: Option<String>,
        metadata: &MetaDataResponse,
    ) -> Result<(), DomainError> {
        let property = self.registry.property();
        let snapshot = self.registry.snapshot();
        let status_meta = |kind: RegulationKind| {
            metadata.applies(kind).map(|applies| CampaignStatusMeta {
                applies,
                date_created: match kind {
                    RegulationKind::Gdpr => snapshot.gdpr.as_ref().and_then(|c| c.date_created),
                    RegulationKind::Ccpa => snapshot.ccpa.as_ref().and_then(|c| c.date_created),
                },
                uuid: snapshot.uuid(kind).map(str::to_owned),
                has_local_data: snapshot.has_consent(kind),
            })
        };
        let req = ConsentStatusRequest {
            env: property.environment,
            account_id: property.account_id,
            property_id: property.property_id,
            auth_id,
            metadata: ConsentStatusMetaData {
                gdpr: status_meta(RegulationKind::Gdpr),
                ccpa: status_meta(RegulationKind::Ccpa),
            },
            local_state: snapshot.local_state.clone(),
        };

        let resp = self
            .gateway
            .get_consent_status(&req)
            .await
            .map_err(|e| DomainError::gateway(Operation::ConsentStatus, e))?;

        let gdpr_configured = self.registry.is_configured(RegulationKind::Gdpr);
        let ccpa_configured = self.registry.is_configured(RegulationKind::Ccpa);
        self.registry.update(|s| {
            s.local_data_version = Some(LOCAL_DATA_VERSION);
            if let Some(local_state) = resp.local_state {
                s.local_state = Some(local_state);
            }
            if let Some(data) = resp.consent_status_data {
                match data.gdpr {
                    Some(gdpr) if gdpr_configured => s.set_gdpr(gdpr),
                    _ => s.gdpr = None,
                }
                match data.ccpa {
                    Some(ccpa) if ccpa_configured => s.set_ccpa(ccpa),
                    _ => s.ccpa = None,
                }
            }
        });
        Ok(())
    }

    fn flag_stale_gdpr(&self, metadata: &MetaDataResponse) {
        let Some(meta) = &metadata.gdpr else {
            return;
        };
        let (Some(additions), Some(legal_basis)) =
            (meta.additions_change_date, meta.legal_basis_change_date)
        else {
            return;
        };

        self.registry.update(|s| {
            let Some(consent) = s.gdpr.as_mut() else {
                return;
            };
            let Some(created) = consent.date_created else {
                return;
            };
            let updated =
                flag_stale_consent(&consent.consent_status, created, additions, legal_basis);
            if updated != consent.consent_status {
                tracing::info!(
                    legal_basis_changes = updated.legal_basis_changes,
                    vendor_list_additions = updated.vendor_list_additions,
                    "GDPR consent predates vendor list changes"
                );
                consent.consent_status = updated;
            }
        });
    }

    async fn fetch_messages(
        &self,
        metadata: &MetaDataResponse,
    ) -> Result<MessagesResponse, DomainError> {
        let property = self.registry.property();
        let snapshot = self.registry.snapshot();
        let req = MessagesRequest {
            env: property.environment,
            body: MessagesBody {
                account_id: property.account_id,
                property_href: property.property_href(),
                campaigns: self.messages_campaigns(&snapshot),
                campaign_env: property.campaigns_env.as_str().to_owned(),
                consent_language: property.consent_language.clone(),
                local_state: snapshot.local_state.clone(),
                operating_system: property.os.clone(),
            },
            metadata: metadata.applies_meta(),
            non_keyed_local_state: snapshot.non_keyed_local_state.clone(),
        };

        let resp = self
            .gateway
            .get_messages(&req)
            .await
            .map_err(|e| DomainError::gateway(Operation::Messages, e))?;

        let gdpr_configured = self.registry.is_configured(RegulationKind::Gdpr);
        let ccpa_configured = self.registry.is_configured(RegulationKind::Ccpa);
        self.registry.update(|s| {
            if let Some(local_state) = &resp.local_state {
                s.local_state = Some(local_state.clone());
            }
            if let Some(non_keyed) = &resp.non_keyed_local_state {
                s.non_keyed_local_state = Some(non_keyed.clone());
            }
            let gdpr = resp.campaigns.as_ref().and_then(|c| c.gdpr.as_ref());
            let ccpa = resp.campaigns.as_ref().and_then(|c| c.ccpa.as_ref());
            s.gdpr_message_meta = gdpr.and_then(|m| m.message_meta_data.clone());
            s.ccpa_message_meta = ccpa.and_then(|m| m.message_meta_data.clone());

            if let Some(message) = gdpr.filter(|_| gdpr_configured && s.gdpr.is_none()) {
                let mut consent = message.to_consent();
                consent.applies = metadata.applies(RegulationKind::Gdpr);
                s.gdpr = Some(consent);
                s.local_data_version = Some(LOCAL_DATA_VERSION);
            }
            if let Some(message) = ccpa.filter(|_| ccpa_configured && s.ccpa.is_none()) {
                let mut consent = message.to_consent();
                consent.applies = consent.applies.or(metadata.applies(RegulationKind::Ccpa));
                s.ccpa = Some(consent);
                s.local_data_version = Some(LOCAL_DATA_VERSION);
            }
        });

        tracing::info!(
            campaigns = resp.campaign_list().len(),
            property_id = ?resp.property_id,
            "Messages received"
        );
        Ok(resp)
    }

    fn messages_campaigns(&self, snapshot: &RegistrySnapshot) -> MessagesCampaigns {
        let targeting = |c: &CampaignConfig| {
            c.targeting_params
                .iter()
                .map(|p| (p.key.clone(), p.value.clone()))
                .collect()
        };
        MessagesCampaigns {
            gdpr: self
                .registry
                .campaign(RegulationKind::Gdpr)
                .map(|c| GdprCampaignRequest {
                    targeting_params: targeting(c),
                    has_local_data: snapshot.gdpr.is_some(),
                    consent_status: snapshot.gdpr.as_ref().map(|g| g.consent_status.clone()),
                    group_pm_id: c.group_pm_id.clone(),
                }),
            ccpa: self
                .registry
                .campaign(RegulationKind::Ccpa)
                .map(|c| CcpaCampaignRequest {
                    targeting_params: targeting(c),
                    has_local_data: snapshot.ccpa.is_some(),
                    status: snapshot.ccpa.as_ref().map(|c| c.status),
                    group_pm_id: c.group_pm_id.clone(),
                }),
        }
    }

    /// Page-view failures are reported in logs only.
    async fn report_page_views(&self, metadata: &MetaDataResponse, pub_data: &Map<String, Value>) {
        for kind in self.registry.configured_kinds() {
            let Some(sample_rate) = metadata.sample_rate(kind) else {
                continue;
            };
            if !self.sampling.admits(kind, sample_rate) {
                tracing::debug!(regulation = %kind, sample_rate, "Page view not sampled");
                continue;
            }

            let req = PageViewRequest {
                env: self.registry.property().environment,
                body: self.page_view_body(kind, metadata, pub_data, sample_rate),
            };
            match self.gateway.post_page_view(&req).await {
                Ok(resp) => {
                    if let Some(uuid) = resp.uuid(kind) {
                        self.registry.update(|s| s.adopt_uuid(kind, uuid));
                    }
                }
                Err(e) => {
                    tracing::warn!(regulation = %kind, error = %e, "Page-view report failed");
                }
            }
        }
    }

    fn page_view_body(
        &self,
        kind: RegulationKind,
        metadata: &MetaDataResponse,
        pub_data: &Map<String, Value>,
        sample_rate: f64,
    ) -> PageViewBody {
        let property = self.registry.property();
        let snapshot = self.registry.snapshot();
        let applies = metadata.applies(kind).unwrap_or(false);
        let meta = snapshot.message_meta(kind);

        match kind {
            RegulationKind::Gdpr => {
                let consent = snapshot.gdpr.as_ref();
                PageViewBody::Gdpr(GdprPageView {
                    uuid: consent.and_then(|c| c.uuid.clone()),
                    euconsent: consent.and_then(|c| c.euconsent.clone()),
                    account_id: property.account_id,
                    pub_data: pub_data.clone(),
                    applies,
                    site_id: property.property_id,
                    consent_status: consent.map(|c| c.consent_status.clone()).unwrap_or_default(),
                    msg_id: meta.and_then(|m| m.message_id),
                    category_id: meta.map(|m| m.category_id.into()),
                    sub_category_id: meta.map(|m| m.sub_category_id.into()),
                    prtn_uuid: meta.and_then(|m| m.prtn_uuid.clone()),
                    sample_rate,
                })
            }
            RegulationKind::Ccpa => {
                let consent = snapshot.ccpa.as_ref();
                let uuid = consent.and_then(|c| c.uuid.clone());
                PageViewBody::Ccpa(CcpaPageView {
                    consent_status: CcpaPageViewStatus {
                        has_consent_data: uuid.is_some(),
                        rejected_categories: consent
                            .map(|c| c.rejected_categories.clone())
                            .unwrap_or_default(),
                        rejected_vendors: consent
                            .map(|c| c.rejected_vendors.clone())
                            .unwrap_or_default(),
                    },
                    uuid,
                    account_id: property.account_id,
                    pub_data: pub_data.clone(),
                    applies,
                    site_id: property.property_id,
                    message_id: meta.and_then(|m| m.message_id),
                    sample_rate,
                })
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save_snapshot(&self.registry.snapshot()) {
            tracing::warn!(error = %e, "Failed to persist consent state");
        }
    }
}
