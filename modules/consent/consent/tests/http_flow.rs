#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end flows through the HTTP gateway with a scripted transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use consent::domain::sampling::FixedSampling;
use consent::infra::storage::InMemoryLocalStore;
use consent::{
    ActionType, CampaignEntry, ConsentAction, ConsentClient, ConsentConfig, ConsentError,
    ConsentEvents, ConsentModule, ConsentState, Consents, LoadOutcome, MessagesResponse,
    RegulationKind,
};
use consent_sdk::{
    CcpaStatus, HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse,
};
use parking_lot::Mutex;
use serde_json::Map;

struct Route {
    method: HttpMethod,
    path: &'static str,
    status: u16,
    body: &'static str,
}

#[derive(Default)]
struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    seen: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    fn route(self, method: HttpMethod, path: &'static str, status: u16, body: &'static str) -> Self {
        self.routes.lock().push(Route {
            method,
            path,
            status,
            body,
        });
        self
    }

    fn paths(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|r| {
                let url = url::Url::parse(&r.url).unwrap();
                url.path().to_owned()
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let path = url::Url::parse(&request.url)
            .map_err(|e| TransportError::Request(e.to_string()))?
            .path()
            .to_owned();
        let method = request.method;
        self.seen.lock().push(request);

        self.routes
            .lock()
            .iter()
            .find(|r| r.method == method && r.path == path)
            .map(|r| TransportResponse {
                status: r.status,
                body: r.body.to_owned(),
            })
            .ok_or_else(|| TransportError::Connect(format!("no route for {method} {path}")))
    }
}

#[derive(Default)]
struct RecordedEvents {
    successes: Mutex<usize>,
    consent_only: Mutex<usize>,
    failures: Mutex<Vec<(ConsentError, bool)>>,
    ready: Mutex<Vec<Consents>>,
    submitted: Mutex<Vec<ConsentState>>,
    errors: Mutex<Vec<ConsentError>>,
}

impl ConsentEvents for RecordedEvents {
    fn on_success(&self, _messages: &MessagesResponse) {
        *self.successes.lock() += 1;
    }

    fn on_show_consent_only(&self) {
        *self.consent_only.lock() += 1;
    }

    fn on_failure(&self, error: &ConsentError, is_fatal: bool) {
        self.failures.lock().push((error.clone(), is_fatal));
    }

    fn on_consent_ready(&self, consents: &Consents) {
        self.ready.lock().push(consents.clone());
    }

    fn on_action_submitted(&self, consent: &ConsentState) {
        self.submitted.lock().push(consent.clone());
    }

    fn on_error(&self, error: &ConsentError) {
        self.errors.lock().push(error.clone());
    }
}

const CCPA_META: &str = r#"{"ccpa": {"applies": true, "sampleRate": 1}}"#;

const CCPA_MESSAGES: &str = r#"{
    "campaigns": {
        "CCPA": {
            "type": "CCPA",
            "message": {"message_json": {"type": "Notice"}},
            "status": "rejectedNone",
            "applies": true,
            "messageMetaData": {"categoryId": 2, "subCategoryId": 6, "messageId": 77}
        }
    },
    "localState": {"ccpa": {"mmsCookies": ["_sp_v1_uid"]}},
    "nonKeyedLocalState": {"ccpa": {"_sp_v1_data": "1"}},
    "priority": [2],
    "propertyId": 16893
}"#;

const CCPA_PAGE_VIEW: &str = r#"{"ccpa": {"uuid": "ccpa-pv-uuid"}}"#;

const CCPA_CHOICE: &str =
    r#"{"ccpa": {"uuid": "ccpa-choice-uuid", "status": "consentedAll", "consentedAll": true}}"#;

const CCPA_STORE: &str = r#"{
    "uuid": "ccpa-store-uuid",
    "status": "consentedAll",
    "consentedAll": true,
    "rejectedAll": false,
    "dateCreated": "2024-05-01T10:00:00.000Z",
    "GPPData": {"IABGPP_HDR_Version": 1}
}"#;

fn ccpa_config() -> ConsentConfig {
    ConsentConfig {
        account_id: 22,
        property_id: 16_893,
        property_name: "mobile.multicampaign.demo".to_owned(),
        os_version: "14".to_owned(),
        campaigns: vec![CampaignEntry {
            kind: RegulationKind::Ccpa,
            privacy_manager_id: "509688".to_owned(),
            group_pm_id: None,
            targeting_params: BTreeMap::new(),
        }],
        ..ConsentConfig::default()
    }
}

fn ccpa_backend() -> ScriptedTransport {
    ScriptedTransport::default()
        .route(HttpMethod::Get, "/wrapper/v2/meta-data", 200, CCPA_META)
        .route(HttpMethod::Get, "/wrapper/v2/messages", 200, CCPA_MESSAGES)
        .route(HttpMethod::Post, "/wrapper/v2/pv-data", 200, CCPA_PAGE_VIEW)
        .route(HttpMethod::Get, "/wrapper/v2/choice/consent-all", 200, CCPA_CHOICE)
        .route(HttpMethod::Get, "/wrapper/v2/choice/reject-all", 200, CCPA_CHOICE)
        .route(HttpMethod::Post, "/wrapper/v2/choice/ccpa/11", 200, CCPA_STORE)
        .route(HttpMethod::Post, "/wrapper/v2/choice/ccpa/13", 200, CCPA_STORE)
}

fn client(
    config: ConsentConfig,
    transport: &Arc<ScriptedTransport>,
    events: &Arc<RecordedEvents>,
) -> consent::ConsentLocalClient {
    ConsentModule::builder(config)
        .transport(transport.clone())
        .store(Arc::new(InMemoryLocalStore::new()))
        .sampling(Arc::new(FixedSampling(true)))
        .events(events.clone())
        .build()
        .unwrap()
}

#[tokio::test]
async fn ccpa_fresh_install_accept_all_then_consent_only() {
    let transport = Arc::new(ccpa_backend());
    let events = Arc::new(RecordedEvents::default());
    let client = client(ccpa_config(), &transport, &events);

    let first = client.load_messages(None, Map::new()).await.unwrap();

    assert!(matches!(first, LoadOutcome::Messages(_)));
    assert_eq!(*events.successes.lock(), 1);
    assert_eq!(
        transport.paths(),
        vec!["/wrapper/v2/meta-data", "/wrapper/v2/messages", "/wrapper/v2/pv-data"]
    );
    let seeded = client.consents().ccpa.unwrap();
    assert_eq!(seeded.uuid.as_deref(), Some("ccpa-pv-uuid"));

    let state = client
        .submit_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::AcceptAll))
        .await
        .unwrap();

    let ConsentState::Ccpa(ccpa) = state else {
        panic!("expected CCPA consent");
    };
    assert_eq!(ccpa.status, CcpaStatus::ConsentedAll);
    assert_eq!(ccpa.uuid.as_deref(), Some("ccpa-store-uuid"));
    assert!(ccpa.gpp_data.contains_key("IABGPP_HDR_Version"));
    assert_eq!(events.submitted.lock().len(), 1);
    assert!(!events.ready.lock().is_empty());

    let second = client.load_messages(None, Map::new()).await.unwrap();

    assert!(matches!(second, LoadOutcome::ShowConsentOnly));
    assert_eq!(*events.consent_only.lock(), 1);
    let messages_calls = transport
        .paths()
        .iter()
        .filter(|p| p.as_str() == "/wrapper/v2/messages")
        .count();
    assert_eq!(messages_calls, 1);
    assert!(events.failures.lock().is_empty());
}

/// Captures the backend calls made before the host heard the outcome.
struct CallsAtOutcome {
    transport: Arc<ScriptedTransport>,
    seen: Mutex<Option<Vec<String>>>,
}

impl ConsentEvents for CallsAtOutcome {
    fn on_success(&self, _messages: &MessagesResponse) {
        *self.seen.lock() = Some(self.transport.paths());
    }
}

#[tokio::test]
async fn host_hears_the_outcome_before_page_views_are_reported() {
    let transport = Arc::new(ccpa_backend());
    let events = Arc::new(CallsAtOutcome {
        transport: transport.clone(),
        seen: Mutex::new(None),
    });
    let client = ConsentModule::builder(ccpa_config())
        .transport(transport.clone())
        .store(Arc::new(InMemoryLocalStore::new()))
        .sampling(Arc::new(FixedSampling(true)))
        .events(events.clone())
        .build()
        .unwrap();

    client.load_messages(None, Map::new()).await.unwrap();

    assert_eq!(
        events.seen.lock().clone().unwrap(),
        vec!["/wrapper/v2/meta-data", "/wrapper/v2/messages"]
    );
    assert!(transport.paths().contains(&"/wrapper/v2/pv-data".to_owned()));
    assert_eq!(
        client.consents().ccpa.unwrap().uuid.as_deref(),
        Some("ccpa-pv-uuid")
    );
}

#[tokio::test]
async fn metadata_failure_is_reported_once_and_stops_the_cycle() {
    let transport = Arc::new(ScriptedTransport::default().route(
        HttpMethod::Get,
        "/wrapper/v2/meta-data",
        503,
        "maintenance",
    ));
    let events = Arc::new(RecordedEvents::default());
    let client = client(ccpa_config(), &transport, &events);

    let err = client.load_messages(None, Map::new()).await.unwrap_err();

    assert!(matches!(err, ConsentError::Network { ref operation, .. } if operation == "meta-data"));
    let failures = events.failures.lock();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1);
    assert_eq!(transport.paths().len(), 1);
    assert_eq!(*events.successes.lock(), 0);
}

#[tokio::test]
async fn queued_actions_are_submitted_in_order() {
    let transport = Arc::new(ccpa_backend());
    let events = Arc::new(RecordedEvents::default());
    let client = client(ccpa_config(), &transport, &events);
    client.load_messages(None, Map::new()).await.unwrap();

    client
        .enqueue_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::RejectAll))
        .unwrap();
    client
        .enqueue_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::PmDismiss))
        .unwrap();
    client
        .submit_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::AcceptAll))
        .await
        .unwrap();

    let stores: Vec<String> = transport
        .paths()
        .into_iter()
        .filter(|p| p.starts_with("/wrapper/v2/choice/ccpa/"))
        .collect();
    assert_eq!(stores, vec!["/wrapper/v2/choice/ccpa/13", "/wrapper/v2/choice/ccpa/11"]);
    assert_eq!(events.submitted.lock().len(), 2);
    let errors = events.errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        ConsentError::UnsupportedAction {
            action: ActionType::PmDismiss
        }
    ));
}

#[tokio::test]
async fn consent_survives_a_restart_through_the_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ccpa_config();
    config.storage_path = Some(dir.path().join("consent.json"));

    let transport = Arc::new(ccpa_backend());
    let events = Arc::new(RecordedEvents::default());
    let first = ConsentModule::builder(config.clone())
        .transport(transport.clone())
        .sampling(Arc::new(FixedSampling(false)))
        .events(events.clone())
        .build()
        .unwrap();
    first.load_messages(None, Map::new()).await.unwrap();
    first
        .submit_action(ConsentAction::new(RegulationKind::Ccpa, ActionType::RejectAll))
        .await
        .unwrap();
    drop(first);

    let restarted_events = Arc::new(RecordedEvents::default());
    let restarted = ConsentModule::builder(config)
        .transport(transport.clone())
        .events(restarted_events.clone())
        .build()
        .unwrap();

    assert_eq!(
        restarted.consents().ccpa.unwrap().uuid.as_deref(),
        Some("ccpa-store-uuid")
    );
    assert!(restarted.send_stored_consent_to_client());
    assert_eq!(restarted_events.ready.lock().len(), 1);
    assert!(!transport.paths().contains(&"/wrapper/v2/pv-data".to_owned()));
}

#[tokio::test]
async fn clear_all_forgets_consent() {
    let transport = Arc::new(ccpa_backend());
    let events = Arc::new(RecordedEvents::default());
    let client = client(ccpa_config(), &transport, &events);
    client.load_messages(None, Map::new()).await.unwrap();
    assert!(client.consents().ccpa.is_some());

    client.clear_all().unwrap();

    assert!(client.consents().ccpa.is_none());
    assert!(!client.send_stored_consent_to_client());
}
