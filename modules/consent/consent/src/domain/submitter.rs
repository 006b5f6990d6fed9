//! Choice submission and custom consent.

use std::sync::Arc;

use consent_sdk::{
    ActionType, ConsentAction, ConsentState, CustomConsentRequest, GdprConsentState,
    RegulationKind,
};
use tracing::instrument;

use super::error::DomainError;
use super::model::{
    AppliesMetaData, CcpaChoiceBody, ChoiceResponse, ChoiceType, CustomConsentMutation,
    CustomConsentResponse, GdprChoiceBody, GetChoiceRequest, MetaDataResponse, Operation,
    StoreChoiceBody, StoreChoiceRequest, StoreChoiceResponse,
};
use super::ports::{ConsentNotifier, NetworkGateway};
use super::registry::CampaignRegistry;
use super::sampling::SamplingGate;
use super::storage::ConsentStorage;

pub struct ActionSubmitter {
    gateway: Arc<dyn NetworkGateway>,
    registry: Arc<CampaignRegistry>,
    storage: ConsentStorage,
    sampling: Arc<SamplingGate>,
}

impl ActionSubmitter {
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

    /// Submit one user choice.
    ///
    /// Get-choice and store-choice failures are logged; the call only fails
    /// when no consent exists for the regulation afterwards.
    ///
    /// # Errors
    /// - `UnsupportedAction` / `NotConfigured` before any network call
    /// - `InvalidConsentState` when the regulation still has no consent
    /// - `Storage` when the result cannot be persisted
    #[instrument(skip_all, fields(regulation = %action.regulation, action = %action.action_type))]
    pub async fn submit(
        &self,
        action: &ConsentAction,
        notifier: &dyn ConsentNotifier,
    ) -> Result<ConsentState, DomainError> {
        if !action.action_type.is_choice() {
            return Err(DomainError::UnsupportedAction {
                action: action.action_type,
            });
        }
        let kind = action.regulation;
        if !self.registry.is_configured(kind) {
            return Err(DomainError::NotConfigured { regulation: kind });
        }

        let choice = match ChoiceType::from_action(action.action_type) {
            Some(choice_type) => self.fetch_choice(kind, choice_type, notifier).await,
            None => None,
        };

        self.store_choice(action, choice.as_ref(), notifier).await;

        let snapshot = self.registry.snapshot();
        let state = match kind {
            RegulationKind::Gdpr => snapshot.gdpr.clone().map(ConsentState::Gdpr),
            RegulationKind::Ccpa => snapshot.ccpa.clone().map(ConsentState::Ccpa),
        }
        .ok_or_else(|| {
            DomainError::invalid_consent(format!("The {kind} consent object cannot be null"))
        })?;

        self.storage.save_snapshot(&snapshot)?;
        tracing::info!(uuid = ?state.uuid(), "Choice recorded");
        Ok(state)
    }

    async fn fetch_choice(
        &self,
        kind: RegulationKind,
        choice_type: ChoiceType,
        notifier: &dyn ConsentNotifier,
    ) -> Option<ChoiceResponse> {
        let property = self.registry.property();
        let applies = self
            .registry
            .snapshot()
            .metadata
            .as_ref()
            .map(MetaDataResponse::applies_meta)
            .unwrap_or_default();
        let req = GetChoiceRequest {
            env: property.environment,
            choice_type,
            account_id: property.account_id,
            property_id: property.property_id,
            metadata: match kind {
                RegulationKind::Gdpr => AppliesMetaData {
                    gdpr: applies.gdpr,
                    ccpa: None,
                },
                RegulationKind::Ccpa => AppliesMetaData {
                    gdpr: None,
                    ccpa: applies.ccpa,
                },
            },
        };

        let resp = match self.gateway.get_choice(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(operation = %Operation::GetChoice, error = %e, "Get-choice failed");
                return None;
            }
        };

        let consents = self.registry.update(|s| {
            match kind {
                RegulationKind::Gdpr => {
                    if let Some(choice) = &resp.gdpr {
                        s.apply_gdpr_choice(choice.consent.clone());
                    }
                }
                RegulationKind::Ccpa => {
                    if let Some(ccpa) = &resp.ccpa {
                        s.apply_ccpa_choice(ccpa.clone());
                    }
                }
            }
            s.consents()
        });
        notifier.consents_changed(&consents);
        Some(resp)
    }

    async fn store_choice(
        &self,
        action: &ConsentAction,
        choice: Option<&ChoiceResponse>,
        notifier: &dyn ConsentNotifier,
    ) {
        let kind = action.regulation;
        let property = self.registry.property();
        let snapshot = self.registry.snapshot();
        let sampling = self.sampling.last_decision(kind);
        let sample_rate = sampling.map_or(1.0, |d| d.rate);
        let send_pv_data = sampling.is_some_and(|d| d.sampled);
        let message_id = snapshot.message_meta(kind).and_then(|m| m.message_id);

        let body = match kind {
            RegulationKind::Gdpr => {
                let gdpr_choice = choice.and_then(|c| c.gdpr.as_ref());
                StoreChoiceBody::Gdpr(GdprChoiceBody {
                    sample_rate,
                    property_id: property.property_id,
                    message_id,
                    granular_status: snapshot
                        .gdpr
                        .as_ref()
                        .and_then(|c| c.consent_status.granular_status.clone()),
                    consent_all_ref: gdpr_choice.and_then(|c| c.consent_all_ref.clone()),
                    vendor_list_id: gdpr_choice.and_then(|c| c.consent.vendor_list_id.clone()),
                    pm_save_and_exit_variables: action.save_and_exit_variables.clone(),
                    auth_id: snapshot.auth_id.clone(),
                    uuid: snapshot.uuid(kind).map(str::to_owned),
                    send_pv_data,
                    pub_data: action.pub_data.clone(),
                })
            }
            RegulationKind::Ccpa => StoreChoiceBody::Ccpa(CcpaChoiceBody {
                sample_rate,
                property_id: property.property_id,
                message_id,
                pm_save_and_exit_variables: action.save_and_exit_variables.clone(),
                auth_id: snapshot.auth_id.clone(),
                uuid: snapshot.uuid(kind).map(str::to_owned),
                send_pv_data,
                pub_data: action.pub_data.clone(),
            }),
        };
        let req = StoreChoiceRequest {
            env: property.environment,
            action_type: action.action_type,
            body,
        };

        let resp = match self.gateway.store_choice(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(operation = %Operation::StoreChoice, error = %e, "Store-choice failed");
                return;
            }
        };

        let save_and_exit = action.action_type == ActionType::SaveAndExit;
        let consents = self.registry.update(|s| {
            match resp {
                StoreChoiceResponse::Gdpr(resp) => {
                    let Some(consent) = s.gdpr.as_mut() else {
                        return None;
                    };
                    consent.uuid = Some(resp.uuid);
                    consent.date_created = resp.date_created;
                    if save_and_exit {
                        consent.tc_data = resp.tc_data;
                        consent.euconsent = resp.euconsent;
                        consent.grants = resp.grants;
                        consent.web_consent_payload = resp.web_consent_payload;
                        consent.vendors = resp.vendors;
                        consent.categories = resp.categories;
                    }
                }
                StoreChoiceResponse::Ccpa(resp) => {
                    let Some(consent) = s.ccpa.as_mut() else {
                        return None;
                    };
                    consent.uuid = Some(resp.uuid);
                    consent.date_created = resp.date_created;
                    consent.consented_all = resp.consented_all;
                    consent.rejected_all = resp.rejected_all;
                    consent.status = resp.status;
                    consent.rejected_categories = resp.rejected_categories;
                    consent.rejected_vendors = resp.rejected_vendors;
                    consent.gpp_data = resp.gpp_data;
                    if save_and_exit {
                        consent.web_consent_payload = resp.web_consent_payload;
                    }
                }
            }
            Some(s.consents())
        });

        match consents {
            Some(consents) if save_and_exit => notifier.consents_changed(&consents),
            Some(_) => {}
            None => tracing::warn!(regulation = %kind, "Store-choice answered without a consent to update"),
        }
    }

    /// Grant custom vendors and purposes.
    ///
    /// # Errors
    /// `MissingConsent` without a recorded GDPR consent uuid, `Gateway` when
    /// the call fails.
    #[instrument(skip_all)]
    pub async fn send_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, DomainError> {
        let mutation = self.custom_consent_mutation(request)?;
        let resp = self
            .gateway
            .send_custom_consent(&mutation)
            .await
            .map_err(|e| DomainError::gateway(Operation::CustomConsent, e))?;
        self.apply_custom_consent(resp)
    }

    /// Revoke custom vendors and purposes.
    ///
    /// # Errors
    /// Same as [`Self::send_custom_consent`].
    #[instrument(skip_all)]
    pub async fn delete_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, DomainError> {
        let mutation = self.custom_consent_mutation(request)?;
        let resp = self
            .gateway
            .delete_custom_consent(&mutation)
            .await
            .map_err(|e| DomainError::gateway(Operation::DeleteCustomConsent, e))?;
        self.apply_custom_consent(resp)
    }

    fn custom_consent_mutation(
        &self,
        request: CustomConsentRequest,
    ) -> Result<CustomConsentMutation, DomainError> {
        let consent_uuid = self
            .registry
            .snapshot()
            .uuid(RegulationKind::Gdpr)
            .map(str::to_owned)
            .ok_or(DomainError::MissingConsent {
                regulation: RegulationKind::Gdpr,
            })?;
        let property = self.registry.property();
        Ok(CustomConsentMutation {
            env: property.environment,
            property_id: property.property_id,
            consent_uuid,
            request,
        })
    }

    fn apply_custom_consent(
        &self,
        resp: CustomConsentResponse,
    ) -> Result<GdprConsentState, DomainError> {
        let updated = self.registry.update(|s| {
            let consent = s.gdpr.as_mut()?;
            consent.grants = resp.grants;
            consent.categories = resp.categories;
            consent.vendors = resp.vendors;
            consent.leg_int_categories = resp.leg_int_categories;
            consent.special_features = resp.special_features;
            Some(consent.clone())
        });
        let consent = updated.ok_or(DomainError::MissingConsent {
            regulation: RegulationKind::Gdpr,
        })?;
        self.storage.save_snapshot(&self.registry.snapshot())?;
        Ok(consent)
    }
}
