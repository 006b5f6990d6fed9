//! Campaign registry.
//!
//! Holds the immutable campaign configuration and the session's consent
//! state. Only the engine and the submitter write (crate-private `update`);
//! everyone else reads cloned snapshots.

use std::collections::BTreeSet;

use consent_sdk::{
    CampaignConfig, CcpaConsentState, Consents, GdprConsentState, LocalState, MessageMetaData,
    PropertyConfig, RegulationKind,
};
use parking_lot::RwLock;

use super::error::DomainError;
use super::model::MetaDataResponse;
use super::renewal::predates;

/// Version of the locally persisted layout. Stored consent written by an
/// older version is re-checked against the backend.
pub const LOCAL_DATA_VERSION: u32 = 1;

/// Mutable session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub gdpr: Option<GdprConsentState>,
    pub ccpa: Option<CcpaConsentState>,
    pub local_state: Option<LocalState>,
    pub non_keyed_local_state: Option<LocalState>,
    pub metadata: Option<MetaDataResponse>,
    pub gdpr_message_meta: Option<MessageMetaData>,
    pub ccpa_message_meta: Option<MessageMetaData>,
    pub auth_id: Option<String>,
    pub local_data_version: Option<u32>,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn consents(&self) -> Consents {
        Consents {
            gdpr: self.gdpr.clone(),
            ccpa: self.ccpa.clone(),
        }
    }

    #[must_use]
    pub fn has_consent(&self, kind: RegulationKind) -> bool {
        match kind {
            RegulationKind::Gdpr => self.gdpr.is_some(),
            RegulationKind::Ccpa => self.ccpa.is_some(),
        }
    }

    #[must_use]
    pub fn uuid(&self, kind: RegulationKind) -> Option<&str> {
        match kind {
            RegulationKind::Gdpr => self.gdpr.as_ref().and_then(|c| c.uuid.as_deref()),
            RegulationKind::Ccpa => self.ccpa.as_ref().and_then(|c| c.uuid.as_deref()),
        }
    }

    /// Replace the GDPR consent; a payload without uuid keeps the known one.
    pub fn set_gdpr(&mut self, mut consent: GdprConsentState) {
        if consent.uuid.is_none() {
            consent.uuid = self.gdpr.as_ref().and_then(|c| c.uuid.clone());
        }
        consent.consent_status = consent.consent_status.normalized();
        self.gdpr = Some(consent);
    }

    /// Replace the CCPA consent; a payload without uuid keeps the known one.
    pub fn set_ccpa(&mut self, mut consent: CcpaConsentState) {
        if consent.uuid.is_none() {
            consent.uuid = self.ccpa.as_ref().and_then(|c| c.uuid.clone());
        }
        self.ccpa = Some(consent);
    }

    /// Replace the GDPR consent with a get-choice result. The session uuid
    /// always wins over the one in the payload.
    pub fn apply_gdpr_choice(&mut self, mut consent: GdprConsentState) {
        consent.uuid = self.gdpr.as_ref().and_then(|c| c.uuid.clone());
        consent.consent_status = consent.consent_status.normalized();
        self.gdpr = Some(consent);
    }

    /// CCPA counterpart of [`Self::apply_gdpr_choice`].
    pub fn apply_ccpa_choice(&mut self, mut consent: CcpaConsentState) {
        consent.uuid = self.ccpa.as_ref().and_then(|c| c.uuid.clone());
        self.ccpa = Some(consent);
    }

    /// Adopt a backend-issued uuid for an existing consent that has none yet.
    pub fn adopt_uuid(&mut self, kind: RegulationKind, uuid: &str) {
        let slot = match kind {
            RegulationKind::Gdpr => self.gdpr.as_mut().map(|c| &mut c.uuid),
            RegulationKind::Ccpa => self.ccpa.as_mut().map(|c| &mut c.uuid),
        };
        if let Some(slot) = slot {
            slot.get_or_insert_with(|| uuid.to_owned());
        }
    }

    #[must_use]
    pub fn message_meta(&self, kind: RegulationKind) -> Option<&MessageMetaData> {
        match kind {
            RegulationKind::Gdpr => self.gdpr_message_meta.as_ref(),
            RegulationKind::Ccpa => self.ccpa_message_meta.as_ref(),
        }
    }

    /// Messages are needed while a configured regulation has no consent or a
    /// GDPR renewal is flagged.
    pub fn should_call_messages(&self, mut configured: impl Iterator<Item = RegulationKind>) -> bool {
        configured.any(|kind| match kind {
            RegulationKind::Gdpr => self
                .gdpr
                .as_ref()
                .is_none_or(|c| c.consent_status.requires_renewal()),
            RegulationKind::Ccpa => self.ccpa.is_none(),
        })
    }

    /// Stored consent written by an older local data layout must be re-checked.
    #[must_use]
    pub fn should_call_consent_status(&self) -> bool {
        let has_uuid = self.uuid(RegulationKind::Gdpr).is_some()
            || self.uuid(RegulationKind::Ccpa).is_some();
        has_uuid && self.local_data_version != Some(LOCAL_DATA_VERSION)
    }

    /// The vendor list changed, or the recorded GDPR consent predates a
    /// legal-basis or vendor-additions change.
    #[must_use]
    pub fn requires_new_consent_data(&self) -> bool {
        let (Some(consent), Some(meta)) = (
            self.gdpr.as_ref(),
            self.metadata.as_ref().and_then(|m| m.gdpr.as_ref()),
        ) else {
            return false;
        };

        let vendor_list_changed = matches!(
            (&consent.vendor_list_id, &meta.vendor_list_id),
            (Some(known), Some(current)) if known != current
        );
        let outdated = consent.date_created.is_some_and(|created| {
            predates(created, meta.legal_basis_change_date)
                || predates(created, meta.additions_change_date)
        });
        vendor_list_changed || outdated
    }
}

/// Per-session campaign registry.
#[derive(Debug)]
pub struct CampaignRegistry {
    property: PropertyConfig,
    campaigns: Vec<CampaignConfig>,
    state: RwLock<RegistrySnapshot>,
}

impl CampaignRegistry {
    /// # Errors
    /// Returns `Configuration` when no campaign is given or a regulation repeats.
    pub fn new(property: PropertyConfig, campaigns: Vec<CampaignConfig>) -> Result<Self, DomainError> {
        if campaigns.is_empty() {
            return Err(DomainError::Configuration(
                "at least one GDPR or CCPA campaign is required".to_owned(),
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = campaigns.iter().find(|c| !seen.insert(c.kind)) {
            return Err(DomainError::Configuration(format!(
                "{} campaign is configured more than once",
                dup.kind
            )));
        }
        Ok(Self {
            property,
            campaigns,
            state: RwLock::new(RegistrySnapshot::default()),
        })
    }

    /// Seed the session with previously persisted state.
    #[must_use]
    pub fn with_state(self, state: RegistrySnapshot) -> Self {
        *self.state.write() = state;
        self
    }

    #[must_use]
    pub fn property(&self) -> &PropertyConfig {
        &self.property
    }

    #[must_use]
    pub fn campaigns(&self) -> &[CampaignConfig] {
        &self.campaigns
    }

    #[must_use]
    pub fn campaign(&self, kind: RegulationKind) -> Option<&CampaignConfig> {
        self.campaigns.iter().find(|c| c.kind == kind)
    }

    #[must_use]
    pub fn is_configured(&self, kind: RegulationKind) -> bool {
        self.campaign(kind).is_some()
    }

    pub fn configured_kinds(&self) -> impl Iterator<Item = RegulationKind> + '_ {
        self.campaigns.iter().map(|c| c.kind)
    }

    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.read().clone()
    }

    #[must_use]
    pub fn consents(&self) -> Consents {
        self.state.read().consents()
    }

    #[must_use]
    pub fn should_call_messages(&self) -> bool {
        self.state.read().should_call_messages(self.configured_kinds())
    }

    #[must_use]
    pub fn should_call_consent_status(&self) -> bool {
        self.state.read().should_call_consent_status()
    }

    #[must_use]
    pub fn requires_new_consent_data(&self) -> bool {
        self.state.read().requires_new_consent_data()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut RegistrySnapshot) -> R) -> R {
        f(&mut self.state.write())
    }

    pub(crate) fn reset(&self) {
        *self.state.write() = RegistrySnapshot::default();
    }
}
