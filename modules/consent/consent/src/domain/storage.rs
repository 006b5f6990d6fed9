//! Typed view over the device key-value store.

use std::sync::Arc;

use anyhow::Context;
use consent_sdk::{CcpaConsentState, GdprConsentState, LocalState, RegulationKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ports::LocalStore;
use super::registry::RegistrySnapshot;

const GDPR_CONSENT: &str = "sp.gdpr.consent";
const CCPA_CONSENT: &str = "sp.ccpa.consent";
const GDPR_APPLIES: &str = "sp.gdpr.applies";
const CCPA_APPLIES: &str = "sp.ccpa.applies";
const GDPR_SAMPLING: &str = "sp.gdpr.sampling";
const CCPA_SAMPLING: &str = "sp.ccpa.sampling";
const TC_DATA: &str = "sp.gdpr.tc_data";
const GPP_DATA: &str = "sp.ccpa.gpp_data";
const LOCAL_STATE: &str = "sp.local_state";
const NON_KEYED_LOCAL_STATE: &str = "sp.non_keyed_local_state";
const LOCAL_DATA_VERSION: &str = "sp.local_data_version";
const AUTH_ID: &str = "sp.auth_id";

/// Page-view sampling decision and the rate it was taken for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingDecision {
    pub rate: f64,
    pub sampled: bool,
}

/// Consent persistence on top of a [`LocalStore`].
#[derive(Clone)]
pub struct ConsentStorage {
    store: Arc<dyn LocalStore>,
}

impl ConsentStorage {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Restore the last persisted session.
    ///
    /// Entries that no longer decode are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error when the underlying store fails.
    pub fn load_snapshot(&self) -> anyhow::Result<RegistrySnapshot> {
        let mut gdpr: Option<GdprConsentState> = self.read_json(GDPR_CONSENT)?;
        let mut ccpa: Option<CcpaConsentState> = self.read_json(CCPA_CONSENT)?;
        if let (Some(consent), Some(applies)) =
            (gdpr.as_mut(), self.applies(RegulationKind::Gdpr)?)
        {
            consent.applies = Some(applies);
        }
        if let (Some(consent), Some(applies)) =
            (ccpa.as_mut(), self.applies(RegulationKind::Ccpa)?)
        {
            consent.applies = Some(applies);
        }
        Ok(RegistrySnapshot {
            gdpr,
            ccpa,
            local_state: self.read_state(LOCAL_STATE)?,
            non_keyed_local_state: self.read_state(NON_KEYED_LOCAL_STATE)?,
            auth_id: self.store.get(AUTH_ID)?,
            local_data_version: self.read_json(LOCAL_DATA_VERSION)?,
            ..RegistrySnapshot::default()
        })
    }

    /// Persist consents, state blobs and raw TCF/GPP payloads.
    ///
    /// # Errors
    /// Returns an error when the underlying store fails.
    pub fn save_snapshot(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()> {
        self.write_json(GDPR_CONSENT, snapshot.gdpr.as_ref())?;
        self.write_json(CCPA_CONSENT, snapshot.ccpa.as_ref())?;
        self.write_json(TC_DATA, snapshot.gdpr.as_ref().map(|c| &c.tc_data))?;
        self.write_json(GPP_DATA, snapshot.ccpa.as_ref().map(|c| &c.gpp_data))?;
        self.write_raw(LOCAL_STATE, snapshot.local_state.as_ref().map(LocalState::as_str))?;
        self.write_raw(
            NON_KEYED_LOCAL_STATE,
            snapshot.non_keyed_local_state.as_ref().map(LocalState::as_str),
        )?;
        self.write_raw(AUTH_ID, snapshot.auth_id.as_deref())?;
        self.write_json(LOCAL_DATA_VERSION, snapshot.local_data_version.as_ref())?;
        if let Some(metadata) = &snapshot.metadata {
            for kind in RegulationKind::ALL {
                if let Some(applies) = metadata.applies(kind) {
                    self.set_applies(kind, applies)?;
                }
            }
        }
        Ok(())
    }

    fn applies(&self, kind: RegulationKind) -> anyhow::Result<Option<bool>> {
        self.read_json(applies_key(kind))
    }

    fn set_applies(&self, kind: RegulationKind, applies: bool) -> anyhow::Result<()> {
        self.write_json(applies_key(kind), Some(&applies))
    }

    /// # Errors
    /// Returns an error when the underlying store fails.
    pub fn sampling(&self, kind: RegulationKind) -> anyhow::Result<Option<SamplingDecision>> {
        self.read_json(sampling_key(kind))
    }

    /// # Errors
    /// Returns an error when the underlying store fails.
    pub fn save_sampling(
        &self,
        kind: RegulationKind,
        decision: SamplingDecision,
    ) -> anyhow::Result<()> {
        self.write_json(sampling_key(kind), Some(&decision))
    }

    /// # Errors
    /// Returns an error when the underlying store fails.
    pub fn clear_all(&self) -> anyhow::Result<()> {
        self.store.clear_all()
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable stored entry");
                Ok(None)
            }
        }
    }

    fn read_state(&self, key: &str) -> anyhow::Result<Option<LocalState>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match LocalState::from_json(raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable stored state");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: Option<&T>) -> anyhow::Result<()> {
        match value {
            Some(value) => {
                let raw = serde_json::to_string(value)
                    .with_context(|| format!("failed to encode {key}"))?;
                self.store.set(key, &raw)
            }
            None => self.store.remove(key),
        }
    }

    fn write_raw(&self, key: &str, value: Option<&str>) -> anyhow::Result<()> {
        match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        }
    }
}

const fn applies_key(kind: RegulationKind) -> &'static str {
    match kind {
        RegulationKind::Gdpr => GDPR_APPLIES,
        RegulationKind::Ccpa => CCPA_APPLIES,
    }
}

const fn sampling_key(kind: RegulationKind) -> &'static str {
    match kind {
        RegulationKind::Gdpr => GDPR_SAMPLING,
        RegulationKind::Ccpa => CCPA_SAMPLING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::storage::InMemoryLocalStore;
    use consent_sdk::CcpaStatus;
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn storage() -> (Arc<InMemoryLocalStore>, ConsentStorage) {
        let store = Arc::new(InMemoryLocalStore::new());
        (store.clone(), ConsentStorage::new(store))
    }

    #[test]
    fn snapshot_survives_a_restart() {
        let (store, storage) = storage();
        let mut tc_data = BTreeMap::new();
        tc_data.insert("IABTCF_gdprApplies".to_owned(), Value::from(1));
        let snapshot = RegistrySnapshot {
            gdpr: Some(GdprConsentState {
                uuid: Some("g".to_owned()),
                tc_data,
                ..GdprConsentState::default()
            }),
            ccpa: Some(CcpaConsentState {
                uuid: Some("c".to_owned()),
                status: CcpaStatus::RejectedSome,
                ..CcpaConsentState::default()
            }),
            local_state: Some(LocalState::from_json(r#"{"gdpr": {"a": 1}}"#).unwrap()),
            local_data_version: Some(1),
            auth_id: Some("user-7".to_owned()),
            ..RegistrySnapshot::default()
        };

        storage.save_snapshot(&snapshot).unwrap();
        let restored = storage.load_snapshot().unwrap();

        assert_eq!(restored, snapshot);
        assert_eq!(store.get(TC_DATA).unwrap().as_deref(), Some(r#"{"IABTCF_gdprApplies":1}"#));
        assert_eq!(store.get(GPP_DATA).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn applies_flags_are_restored_onto_stored_consents() {
        let (_, storage) = storage();
        storage
            .save_snapshot(&RegistrySnapshot {
                gdpr: Some(GdprConsentState::default()),
                ccpa: Some(CcpaConsentState::default()),
                metadata: Some(
                    serde_json::from_value(serde_json::json!({
                        "gdpr": {"applies": true},
                        "ccpa": {"applies": false}
                    }))
                    .unwrap(),
                ),
                ..RegistrySnapshot::default()
            })
            .unwrap();

        let restored = storage.load_snapshot().unwrap();

        assert_eq!(restored.gdpr.unwrap().applies, Some(true));
        assert_eq!(restored.ccpa.unwrap().applies, Some(false));
        assert!(restored.metadata.is_none());
    }

    #[test]
    fn cleared_fields_are_removed() {
        let (store, storage) = storage();
        storage
            .save_snapshot(&RegistrySnapshot {
                auth_id: Some("user".to_owned()),
                ..RegistrySnapshot::default()
            })
            .unwrap();

        storage.save_snapshot(&RegistrySnapshot::default()).unwrap();

        assert!(store.get(AUTH_ID).unwrap().is_none());
    }

    #[test]
    fn corrupt_entries_are_skipped() {
        let (store, storage) = storage();
        store.set(GDPR_CONSENT, "{not json").unwrap();
        store.set(LOCAL_STATE, "]").unwrap();

        let restored = storage.load_snapshot().unwrap();

        assert!(restored.gdpr.is_none());
        assert!(restored.local_state.is_none());
    }

    #[test]
    fn sampling_decision_is_kept_per_regulation() {
        let (_, storage) = storage();
        let decision = SamplingDecision {
            rate: 0.5,
            sampled: true,
        };

        storage.save_sampling(RegulationKind::Gdpr, decision).unwrap();

        assert_eq!(storage.sampling(RegulationKind::Gdpr).unwrap(), Some(decision));
        assert_eq!(storage.sampling(RegulationKind::Ccpa).unwrap(), None);
    }
}
