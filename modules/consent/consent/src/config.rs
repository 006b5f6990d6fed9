//! Configuration for the consent module.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use consent_sdk::{
    CampaignConfig, CampaignsEnv, Environment, OsInfo, PropertyConfig, RegulationKind,
};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment variables overriding file configuration,
/// e.g. `CONSENT__PROPERTY_ID=16893`.
pub const ENV_PREFIX: &str = "CONSENT__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load consent configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid consent configuration: {0}")]
    Invalid(String),
}

/// Module configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsentConfig {
    pub account_id: i64,
    pub property_id: i64,
    /// Property domain without scheme, e.g. `mobile.demo`.
    pub property_name: String,
    pub environment: Environment,
    pub campaigns_env: CampaignsEnv,
    /// Forces the message language (ISO 639-1) instead of the device default.
    pub message_language: Option<String>,
    pub os_version: String,
    /// Overrides the backend host derived from `environment`.
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// JSON file used as the device store; in-memory when unset.
    pub storage_path: Option<PathBuf>,
    pub campaigns: Vec<CampaignEntry>,
}

/// One enabled regulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignEntry {
    pub kind: RegulationKind,
    pub privacy_manager_id: String,
    #[serde(default)]
    pub group_pm_id: Option<String>,
    #[serde(default)]
    pub targeting_params: BTreeMap<String, String>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            account_id: 0,
            property_id: 0,
            property_name: String::new(),
            environment: Environment::Production,
            campaigns_env: CampaignsEnv::Public,
            message_language: None,
            os_version: String::new(),
            base_url: None,
            request_timeout_ms: 10_000,
            storage_path: None,
            campaigns: Vec::new(),
        }
    }
}

impl ConsentConfig {
    /// Layer defaults, an optional YAML file and `CONSENT__*` variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_id <= 0 {
            return Err(ConfigError::Invalid("account_id must be positive".to_owned()));
        }
        if self.property_id <= 0 {
            return Err(ConfigError::Invalid("property_id must be positive".to_owned()));
        }
        if self.property_name.trim().is_empty() {
            return Err(ConfigError::Invalid("property_name is required".to_owned()));
        }
        if self.campaigns.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one GDPR or CCPA campaign is required".to_owned(),
            ));
        }
        let mut seen = BTreeSet::new();
        for campaign in &self.campaigns {
            if !seen.insert(campaign.kind) {
                return Err(ConfigError::Invalid(format!(
                    "{} campaign is configured more than once",
                    campaign.kind
                )));
            }
            if campaign.privacy_manager_id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{} campaign needs a privacy_manager_id",
                    campaign.kind
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn property(&self) -> PropertyConfig {
        PropertyConfig {
            account_id: self.account_id,
            property_id: self.property_id,
            property_name: self.property_name.clone(),
            environment: self.environment,
            campaigns_env: self.campaigns_env,
            consent_language: self.message_language.clone(),
            os: OsInfo {
                version: self.os_version.clone(),
                ..OsInfo::default()
            },
        }
    }

    #[must_use]
    pub fn campaign_configs(&self) -> Vec<CampaignConfig> {
        let property = self.property();
        self.campaigns
            .iter()
            .map(|entry| {
                let mut campaign =
                    CampaignConfig::new(entry.kind, &property, entry.privacy_manager_id.clone());
                campaign.group_pm_id.clone_from(&entry.group_pm_id);
                campaign.targeting_params = entry
                    .targeting_params
                    .iter()
                    .map(|(key, value)| consent_sdk::TargetingParam {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect();
                campaign
            })
            .collect()
    }
}
