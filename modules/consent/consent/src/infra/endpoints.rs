//! Backend URL layout and request encoding.

use consent_sdk::{Environment, TransportRequest};
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

use crate::domain::model::{
    ConsentStatusRequest, CustomConsentMutation, GetChoiceRequest, MessagesBody, MessagesRequest,
    MetaDataRequest, PageViewRequest, StoreChoiceBody, StoreChoiceRequest,
};

pub const PRODUCTION_BASE_URL: &str = "https://cdn.privacy-mgmt.com";
pub const STAGING_BASE_URL: &str = "https://cdn.sp-stage.net";

/// Data sets the backend is asked to include in consent payloads.
#[must_use]
pub fn include_data() -> Value {
    json!({
        "TCData": {"type": "RecordString"},
        "localState": {"type": "RecordString"},
        "campaigns": {"type": "RecordString"},
        "customVendorsResponse": {"type": "RecordString"},
        "messageMetaData": {"type": "RecordString"},
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessagesWireBody<'a> {
    #[serde(flatten)]
    body: &'a MessagesBody,
    include_data: Value,
    #[serde(rename = "hasCSP")]
    has_csp: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithIncludeData<'a, T> {
    #[serde(flatten)]
    body: &'a T,
    include_data: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomConsentBody<'a> {
    #[serde(rename = "consentUUID", skip_serializing_if = "Option::is_none")]
    consent_uuid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    property_id: Option<i64>,
    vendors: &'a [String],
    categories: &'a [String],
    leg_int_categories: &'a [String],
}

/// Builds transport requests against one backend host.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Backend host for `env`, or `base_url` when given.
    ///
    /// # Errors
    /// Returns the parse error for an invalid `base_url`.
    pub fn new(env: Environment, base_url: Option<&str>) -> Result<Self, url::ParseError> {
        let default = match env {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Staging => STAGING_BASE_URL,
        };
        Ok(Self {
            base: Url::parse(base_url.unwrap_or(default))?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, path: &str, env: Environment, query: &[(&str, String)]) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.query_pairs_mut()
            .append_pair("env", env.env_param())
            .extend_pairs(query);
        url.into()
    }

    /// `GET /wrapper/v2/meta-data`
    ///
    /// # Errors
    /// Returns an error when a query payload fails to encode.
    pub fn meta_data(&self, req: &MetaDataRequest) -> Result<TransportRequest, serde_json::Error> {
        let query = [
            ("accountId", req.account_id.to_string()),
            ("propertyId", req.property_id.to_string()),
            ("metadata", serde_json::to_string(&req.metadata)?),
        ];
        Ok(TransportRequest::get(self.url(
            "/wrapper/v2/meta-data",
            req.env,
            &query,
        )))
    }

    /// `GET /wrapper/v2/consent-status`
    ///
    /// # Errors
    /// Returns an error when a query payload fails to encode.
    pub fn consent_status(
        &self,
        req: &ConsentStatusRequest,
    ) -> Result<TransportRequest, serde_json::Error> {
        let mut query = vec![
            ("accountId", req.account_id.to_string()),
            ("propertyId", req.property_id.to_string()),
        ];
        if let Some(auth_id) = &req.auth_id {
            query.push(("authId", auth_id.clone()));
        }
        query.push(("metadata", serde_json::to_string(&req.metadata)?));
        if let Some(local_state) = &req.local_state {
            query.push(("localState", local_state.as_str().to_owned()));
        }
        query.push(("includeData", serde_json::to_string(&include_data())?));
        Ok(TransportRequest::get(self.url(
            "/wrapper/v2/consent-status",
            req.env,
            &query,
        )))
    }

    /// `GET /wrapper/v2/messages`
    ///
    /// # Errors
    /// Returns an error when a query payload fails to encode.
    pub fn messages(&self, req: &MessagesRequest) -> Result<TransportRequest, serde_json::Error> {
        let body = MessagesWireBody {
            body: &req.body,
            include_data: include_data(),
            has_csp: false,
        };
        let mut query = Vec::with_capacity(3);
        if let Some(non_keyed) = &req.non_keyed_local_state {
            query.push(("nonKeyedLocalState", non_keyed.as_str().to_owned()));
        }
        query.push(("body", serde_json::to_string(&body)?));
        query.push(("metadata", serde_json::to_string(&req.metadata)?));
        Ok(TransportRequest::get(self.url(
            "/wrapper/v2/messages",
            req.env,
            &query,
        )))
    }

    /// `GET /wrapper/v2/choice/{consent-all|reject-all}`
    ///
    /// # Errors
    /// Returns an error when a query payload fails to encode.
    pub fn get_choice(&self, req: &GetChoiceRequest) -> Result<TransportRequest, serde_json::Error> {
        let query = [
            ("accountId", req.account_id.to_string()),
            ("propertyId", req.property_id.to_string()),
            ("metadata", serde_json::to_string(&req.metadata)?),
            ("includeData", serde_json::to_string(&include_data())?),
            ("hasCsp", "true".to_owned()),
            ("includeCustomVendorsRes", "false".to_owned()),
            ("withSiteActions", "false".to_owned()),
        ];
        let path = format!("/wrapper/v2/choice/{}", req.choice_type.as_str());
        Ok(TransportRequest::get(self.url(&path, req.env, &query)))
    }

    /// `POST /wrapper/v2/choice/{gdpr|ccpa}/{action code}`
    ///
    /// # Errors
    /// Returns an error when the body fails to encode.
    pub fn store_choice(
        &self,
        req: &StoreChoiceRequest,
    ) -> Result<TransportRequest, serde_json::Error> {
        let body = match &req.body {
            StoreChoiceBody::Gdpr(body) => serde_json::to_string(&WithIncludeData {
                body,
                include_data: include_data(),
            })?,
            StoreChoiceBody::Ccpa(body) => serde_json::to_string(&WithIncludeData {
                body,
                include_data: include_data(),
            })?,
        };
        let path = format!(
            "/wrapper/v2/choice/{}/{}",
            req.body.kind().as_str().to_lowercase(),
            req.action_type.code()
        );
        Ok(TransportRequest::post(self.url(&path, req.env, &[]), body))
    }

    /// `POST /wrapper/v2/pv-data`
    ///
    /// # Errors
    /// Returns an error when the body fails to encode.
    pub fn page_view(&self, req: &PageViewRequest) -> Result<TransportRequest, serde_json::Error> {
        let body = serde_json::to_string(&req.body)?;
        Ok(TransportRequest::post(
            self.url("/wrapper/v2/pv-data", req.env, &[]),
            body,
        ))
    }

    /// `POST /wrapper/tcfv2/v1/gdpr/custom-consent`
    ///
    /// # Errors
    /// Returns an error when the body fails to encode.
    pub fn custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<TransportRequest, serde_json::Error> {
        let body = serde_json::to_string(&CustomConsentBody {
            consent_uuid: Some(&req.consent_uuid),
            property_id: Some(req.property_id),
            vendors: &req.request.vendors,
            categories: &req.request.categories,
            leg_int_categories: &req.request.leg_int_categories,
        })?;
        let query = [("inApp", "true".to_owned())];
        Ok(TransportRequest::post(
            self.url("/wrapper/tcfv2/v1/gdpr/custom-consent", req.env, &query),
            body,
        ))
    }

    /// `DELETE /consent/tcfv2/consent/v3/custom/{propertyId}`
    ///
    /// # Errors
    /// Returns an error when the body fails to encode.
    pub fn delete_custom_consent(
        &self,
        req: &CustomConsentMutation,
    ) -> Result<TransportRequest, serde_json::Error> {
        let body = serde_json::to_string(&CustomConsentBody {
            consent_uuid: None,
            property_id: None,
            vendors: &req.request.vendors,
            categories: &req.request.categories,
            leg_int_categories: &req.request.leg_int_categories,
        })?;
        let path = format!("/consent/tcfv2/consent/v3/custom/{}", req.property_id);
        let query = [("consentUUID", req.consent_uuid.clone())];
        Ok(TransportRequest::delete(self.url(&path, req.env, &query), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        AppliesMetaData, CcpaChoiceBody, ChoiceType, MessagesCampaigns, MetaDataCampaign,
        MetaDataCampaigns,
    };
    use consent_sdk::{ActionType, CustomConsentRequest, HttpMethod, LocalState, OsInfo};
    use serde_json::Map;

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    fn param(url: &str, key: &str) -> Option<String> {
        query(url).into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn metadata_request_targets_the_environment_host() {
        let req = MetaDataRequest {
            env: Environment::Staging,
            account_id: 22,
            property_id: 7,
            metadata: MetaDataCampaigns {
                gdpr: Some(MetaDataCampaign {
                    group_pm_id: Some("g-1".to_owned()),
                }),
                ccpa: None,
            },
        };

        let request = Endpoints::new(Environment::Staging, None)
            .unwrap()
            .meta_data(&req)
            .unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.url.starts_with("https://cdn.sp-stage.net/wrapper/v2/meta-data?"));
        assert_eq!(param(&request.url, "env").as_deref(), Some("stage"));
        assert_eq!(param(&request.url, "accountId").as_deref(), Some("22"));
        assert_eq!(
            param(&request.url, "metadata").as_deref(),
            Some(r#"{"gdpr":{"groupPmId":"g-1"}}"#)
        );
    }

    #[test]
    fn messages_body_carries_local_state_bytes_and_transport_flags() {
        let local_state = LocalState::from_json(r#"{"gdpr": {"uuid" : "x"}}"#).unwrap();
        let req = MessagesRequest {
            env: Environment::Production,
            body: MessagesBody {
                account_id: 22,
                property_href: "https://demo".to_owned(),
                campaigns: MessagesCampaigns::default(),
                campaign_env: "prod".to_owned(),
                consent_language: None,
                local_state: Some(local_state),
                operating_system: OsInfo {
                    name: "linux".to_owned(),
                    version: "6".to_owned(),
                },
            },
            metadata: AppliesMetaData::default(),
            non_keyed_local_state: None,
        };

        let request = Endpoints::new(Environment::Production, None)
            .unwrap()
            .messages(&req)
            .unwrap();

        let body = param(&request.url, "body").unwrap();
        assert!(body.contains(r#""localState":{"gdpr": {"uuid" : "x"}}"#));
        assert!(body.contains(r#""hasCSP":false"#));
        assert!(body.contains(r#""includeData":{"#));
        assert!(param(&request.url, "nonKeyedLocalState").is_none());

        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["propertyHref"], "https://demo");
    }

    #[test]
    fn missing_local_state_is_sent_as_empty_object() {
        let body = MessagesBody {
            account_id: 1,
            property_href: "https://demo".to_owned(),
            campaigns: MessagesCampaigns::default(),
            campaign_env: "prod".to_owned(),
            consent_language: None,
            local_state: None,
            operating_system: OsInfo::default(),
        };

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["localState"], json!({}));
    }

    #[test]
    fn store_choice_path_uses_regulation_and_action_code() {
        let req = StoreChoiceRequest {
            env: Environment::Production,
            action_type: ActionType::RejectAll,
            body: StoreChoiceBody::Ccpa(CcpaChoiceBody {
                sample_rate: 1.0,
                property_id: 7,
                message_id: None,
                pm_save_and_exit_variables: Map::new(),
                auth_id: None,
                uuid: Some("c-1".to_owned()),
                send_pv_data: true,
                pub_data: Map::new(),
            }),
        };

        let request = Endpoints::new(Environment::Production, Some("http://127.0.0.1:8080"))
            .unwrap()
            .store_choice(&req)
            .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            "http://127.0.0.1:8080/wrapper/v2/choice/ccpa/13?env=prod"
        );
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["uuid"], "c-1");
        assert_eq!(body["sendPVData"], true);
        assert_eq!(body["includeData"]["TCData"]["type"], "RecordString");
    }

    #[test]
    fn get_choice_path_uses_choice_type() {
        let req = GetChoiceRequest {
            env: Environment::Production,
            choice_type: ChoiceType::ConsentAll,
            account_id: 22,
            property_id: 7,
            metadata: AppliesMetaData::default(),
        };

        let request = Endpoints::new(Environment::Production, None)
            .unwrap()
            .get_choice(&req)
            .unwrap();

        assert!(request.url.contains("/wrapper/v2/choice/consent-all?"));
        assert_eq!(param(&request.url, "hasCsp").as_deref(), Some("true"));
    }

    #[test]
    fn custom_consent_delete_targets_the_property() {
        let req = CustomConsentMutation {
            env: Environment::Production,
            property_id: 7,
            consent_uuid: "u-1".to_owned(),
            request: CustomConsentRequest {
                vendors: vec!["v".to_owned()],
                categories: Vec::new(),
                leg_int_categories: Vec::new(),
            },
        };
        let endpoints = Endpoints::new(Environment::Production, None).unwrap();

        let add = endpoints.custom_consent(&req).unwrap();
        let delete = endpoints.delete_custom_consent(&req).unwrap();

        let add_body: Value = serde_json::from_str(add.body.as_deref().unwrap()).unwrap();
        assert_eq!(add_body["consentUUID"], "u-1");
        assert_eq!(param(&add.url, "inApp").as_deref(), Some("true"));

        assert_eq!(delete.method, HttpMethod::Delete);
        assert!(delete.url.contains("/consent/tcfv2/consent/v3/custom/7?"));
        assert_eq!(param(&delete.url, "consentUUID").as_deref(), Some("u-1"));
        let delete_body: Value = serde_json::from_str(delete.body.as_deref().unwrap()).unwrap();
        assert!(delete_body.get("consentUUID").is_none());
    }
}
