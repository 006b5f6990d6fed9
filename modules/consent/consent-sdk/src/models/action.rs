use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::campaign::RegulationKind;
use super::de::null_as_default;

/// User action taken on a consent message or privacy manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "i64")]
pub enum ActionType {
    SaveAndExit,
    PmDismiss,
    Custom,
    AcceptAll,
    ShowOptions,
    RejectAll,
    MsgCancel,
    Unknown,
}

impl ActionType {
    /// Numeric code used by the backend and the message renderer.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::SaveAndExit => 1,
            Self::PmDismiss => 2,
            Self::Custom => 9,
            Self::AcceptAll => 11,
            Self::ShowOptions => 12,
            Self::RejectAll => 13,
            Self::MsgCancel => 15,
            Self::Unknown => -1,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::SaveAndExit,
            2 => Self::PmDismiss,
            9 => Self::Custom,
            11 => Self::AcceptAll,
            12 => Self::ShowOptions,
            13 => Self::RejectAll,
            15 => Self::MsgCancel,
            _ => Self::Unknown,
        }
    }

    /// Whether the action records a consent choice on the backend.
    #[must_use]
    pub const fn is_choice(self) -> bool {
        matches!(
            self,
            Self::AcceptAll | Self::RejectAll | Self::SaveAndExit | Self::Custom
        )
    }
}

impl From<Value> for ActionType {
    fn from(value: Value) -> Self {
        value.as_i64().map_or(Self::Unknown, Self::from_code)
    }
}

impl From<ActionType> for i64 {
    fn from(action: ActionType) -> Self {
        action.code()
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SaveAndExit => "save_and_exit",
            Self::PmDismiss => "pm_dismiss",
            Self::Custom => "custom",
            Self::AcceptAll => "accept_all",
            Self::ShowOptions => "show_options",
            Self::RejectAll => "reject_all",
            Self::MsgCancel => "msg_cancel",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A user's consent decision, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentAction {
    pub action_type: ActionType,
    #[serde(rename = "campaignType")]
    pub regulation: RegulationKind,
    #[serde(default)]
    pub choice_id: Option<String>,
    #[serde(default)]
    pub privacy_manager_id: Option<String>,
    #[serde(default)]
    pub pm_tab: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub request_from_pm: bool,
    /// Privacy manager selections, forwarded verbatim on save-and-exit.
    #[serde(default, deserialize_with = "null_as_default")]
    pub save_and_exit_variables: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pub_data: Map<String, Value>,
    #[serde(default)]
    pub consent_language: Option<String>,
}

impl ConsentAction {
    #[must_use]
    pub fn new(regulation: RegulationKind, action_type: ActionType) -> Self {
        Self {
            action_type,
            regulation,
            choice_id: None,
            privacy_manager_id: None,
            pm_tab: None,
            request_from_pm: false,
            save_and_exit_variables: Map::new(),
            pub_data: Map::new(),
            consent_language: None,
        }
    }

    #[must_use]
    pub fn with_pub_data(mut self, pub_data: Map<String, Value>) -> Self {
        self.pub_data = pub_data;
        self
    }

    #[must_use]
    pub fn with_save_and_exit_variables(mut self, variables: Map<String, Value>) -> Self {
        self.save_and_exit_variables = variables;
        self
    }
}

/// Custom GDPR consent mutation: vendors and purposes to grant or revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomConsentRequest {
    pub vendors: Vec<String>,
    pub categories: Vec<String>,
    pub leg_int_categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_choice_actions_are_submittable() {
        assert!(ActionType::AcceptAll.is_choice());
        assert!(ActionType::SaveAndExit.is_choice());
        assert!(!ActionType::ShowOptions.is_choice());
        assert!(!ActionType::from_code(42).is_choice());
    }

    #[test]
    fn action_payload_from_renderer_is_decoded() {
        let json = r#"{
            "actionType": 11,
            "campaignType": "CCPA",
            "choiceId": "3466",
            "requestFromPm": null,
            "pubData": {"foo": "bar"}
        }"#;

        let action: ConsentAction = serde_json::from_str(json).unwrap();

        assert_eq!(action.action_type, ActionType::AcceptAll);
        assert_eq!(action.regulation, RegulationKind::Ccpa);
        assert_eq!(action.choice_id.as_deref(), Some("3466"));
        assert!(!action.request_from_pm);
        assert_eq!(action.pub_data["foo"], "bar");
        assert!(action.save_and_exit_variables.is_empty());
    }
}
