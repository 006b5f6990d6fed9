use std::fmt;

use serde::{Deserialize, Serialize};

/// Privacy regulation a campaign enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegulationKind {
    Gdpr,
    Ccpa,
}

impl RegulationKind {
    /// All regulations in their default display order.
    pub const ALL: [Self; 2] = [Self::Gdpr, Self::Ccpa];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gdpr => "GDPR",
            Self::Ccpa => "CCPA",
        }
    }

    /// Category id the backend uses in the campaign priority list.
    #[must_use]
    pub const fn category_id(self) -> i64 {
        match self {
            Self::Gdpr => 1,
            Self::Ccpa => 2,
        }
    }

    #[must_use]
    pub const fn from_category_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Gdpr),
            2 => Some(Self::Ccpa),
            _ => None,
        }
    }
}

impl fmt::Display for RegulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend environment the SDK talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl Environment {
    /// Value of the `env` query parameter sent with every request.
    #[must_use]
    pub const fn env_param(self) -> &'static str {
        match self {
            Self::Production => "prod",
            Self::Staging => "stage",
        }
    }
}

/// Campaign environment used by the messaging backend for targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignsEnv {
    #[default]
    Public,
    Stage,
}

impl CampaignsEnv {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "prod",
            Self::Stage => "stage",
        }
    }
}

/// Key/value pair forwarded to the message targeting rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingParam {
    pub key: String,
    pub value: String,
}

/// Operating system descriptor sent with the messages request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

impl Default for OsInfo {
    fn default() -> Self {
        Self {
            name: std::env::consts::OS.to_owned(),
            version: String::new(),
        }
    }
}

/// Property-wide settings shared by every campaign of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyConfig {
    pub account_id: i64,
    pub property_id: i64,
    pub property_name: String,
    pub environment: Environment,
    pub campaigns_env: CampaignsEnv,
    /// ISO 639-1 language the messages should be rendered in, if forced.
    pub consent_language: Option<String>,
    pub os: OsInfo,
}

impl PropertyConfig {
    /// Property URL as the backend expects it in `propertyHref`.
    #[must_use]
    pub fn property_href(&self) -> String {
        format!("https://{}", self.property_name)
    }
}

/// Immutable configuration for one enabled regulation.
///
/// Built once from host configuration; there is at most one per
/// [`RegulationKind`] in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    pub kind: RegulationKind,
    pub account_id: i64,
    pub property_id: i64,
    pub property_name: String,
    pub privacy_manager_id: String,
    /// Group privacy manager id forwarded to the metadata call.
    pub group_pm_id: Option<String>,
    pub environment: Environment,
    pub targeting_params: Vec<TargetingParam>,
}

impl CampaignConfig {
    #[must_use]
    pub fn new(
        kind: RegulationKind,
        property: &PropertyConfig,
        privacy_manager_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            account_id: property.account_id,
            property_id: property.property_id,
            property_name: property.property_name.clone(),
            privacy_manager_id: privacy_manager_id.into(),
            group_pm_id: None,
            environment: property.environment,
            targeting_params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_group_pm_id(mut self, group_pm_id: impl Into<String>) -> Self {
        self.group_pm_id = Some(group_pm_id.into());
        self
    }

    #[must_use]
    pub fn with_targeting_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.targeting_params.push(TargetingParam {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ids_match_backend_priority_codes() {
        assert_eq!(RegulationKind::Gdpr.category_id(), 1);
        assert_eq!(RegulationKind::Ccpa.category_id(), 2);
        assert_eq!(RegulationKind::from_category_id(2), Some(RegulationKind::Ccpa));
        assert_eq!(RegulationKind::from_category_id(7), None);
    }

    #[test]
    fn campaign_inherits_property_identifiers() {
        let property = PropertyConfig {
            account_id: 22,
            property_id: 16_893,
            property_name: "mobile.multicampaign.demo".to_owned(),
            environment: Environment::Staging,
            campaigns_env: CampaignsEnv::Public,
            consent_language: None,
            os: OsInfo::default(),
        };

        let campaign = CampaignConfig::new(RegulationKind::Gdpr, &property, "488393")
            .with_group_pm_id("613056")
            .with_targeting_param("location", "EU");

        assert_eq!(campaign.account_id, 22);
        assert_eq!(campaign.property_id, 16_893);
        assert_eq!(campaign.environment, Environment::Staging);
        assert_eq!(campaign.group_pm_id.as_deref(), Some("613056"));
        assert_eq!(campaign.targeting_params.len(), 1);
        assert_eq!(property.property_href(), "https://mobile.multicampaign.demo");
    }
}
