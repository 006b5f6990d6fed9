//! Local (in-process) client for the consent module.
//!
//! Load cycles run on the caller's task (or a spawned one via
//! [`ConsentLocalClient::spawn_load`]). Action submissions are funneled
//! through a single worker task so they are applied one at a time, in the
//! order they were queued.

use std::sync::Arc;

use async_trait::async_trait;
use consent_sdk::{
    ConsentAction, ConsentClient, ConsentError, ConsentEvents, ConsentState, Consents,
    CustomConsentRequest, GdprConsentState, LoadOutcome,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::engine::ReconciliationEngine;
use crate::domain::error::DomainError;
use crate::domain::ports::ConsentNotifier;
use crate::domain::registry::CampaignRegistry;
use crate::domain::storage::ConsentStorage;
use crate::domain::submitter::ActionSubmitter;

fn log_and_convert(op: &str, e: DomainError) -> ConsentError {
    tracing::error!(operation = op, error = ?e, "consent call failed");
    e.into()
}

/// Forwards consent changes produced by a submission to the host.
struct EventsNotifier<'a>(&'a dyn ConsentEvents);

impl ConsentNotifier for EventsNotifier<'_> {
    fn consents_changed(&self, consents: &Consents) {
        self.0.on_consent_ready(consents);
    }
}

struct QueuedAction {
    action: ConsentAction,
    reply: Option<oneshot::Sender<Result<ConsentState, ConsentError>>>,
}

struct Inner {
    engine: ReconciliationEngine,
    submitter: ActionSubmitter,
    registry: Arc<CampaignRegistry>,
    storage: ConsentStorage,
    events: Arc<dyn ConsentEvents>,
}

impl Inner {
    async fn submit(&self, action: &ConsentAction) -> Result<ConsentState, ConsentError> {
        let notifier = EventsNotifier(self.events.as_ref());
        match self.submitter.submit(action, &notifier).await {
            Ok(state) => {
                self.events.on_action_submitted(&state);
                Ok(state)
            }
            Err(e) => {
                let err = log_and_convert("submit_action", e);
                self.events.on_error(&err);
                Err(err)
            }
        }
    }

    fn custom_consent_done(
        &self,
        op: &str,
        result: Result<GdprConsentState, DomainError>,
    ) -> Result<GdprConsentState, ConsentError> {
        match result {
            Ok(consent) => {
                self.events.on_consent_ready(&self.registry.consents());
                Ok(consent)
            }
            Err(e) => {
                let err = log_and_convert(op, e);
                self.events.on_error(&err);
                Err(err)
            }
        }
    }
}

async fn run_action_lane(inner: Arc<Inner>, mut queue: mpsc::UnboundedReceiver<QueuedAction>) {
    while let Some(QueuedAction { action, reply }) = queue.recv().await {
        let result = inner.submit(&action).await;
        if let Some(reply) = reply
            && reply.send(result).is_err()
        {
            tracing::debug!("Submitter stopped waiting for the action result");
        }
    }
    tracing::debug!("Action lane closed");
}

/// Local client wrapping the load engine and the action submitter.
///
/// Cheap to clone; clones share the session and the action lane. Must be
/// created inside a Tokio runtime.
#[derive(Clone)]
pub struct ConsentLocalClient {
    inner: Arc<Inner>,
    lane: mpsc::UnboundedSender<QueuedAction>,
}

impl ConsentLocalClient {
    #[must_use]
    pub fn new(
        engine: ReconciliationEngine,
        submitter: ActionSubmitter,
        registry: Arc<CampaignRegistry>,
        storage: ConsentStorage,
        events: Arc<dyn ConsentEvents>,
    ) -> Self {
        let inner = Arc::new(Inner {
            engine,
            submitter,
            registry,
            storage,
            events,
        });
        let (lane, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_action_lane(inner.clone(), queue));
        Self { inner, lane }
    }

    /// Run a load cycle on a background task; the outcome arrives through
    /// [`ConsentEvents`].
    #[must_use = "the handle resolves when the cycle has finished"]
    pub fn spawn_load(&self, auth_id: Option<String>, pub_data: Map<String, Value>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.load_messages(auth_id, pub_data).await {
                tracing::debug!(error = %e, "Background load cycle failed");
            }
        })
    }

    /// Queue an action without waiting for it; the outcome arrives through
    /// [`ConsentEvents`].
    ///
    /// # Errors
    /// `Internal` when the action lane has stopped.
    pub fn enqueue_action(&self, action: ConsentAction) -> Result<(), ConsentError> {
        self.lane
            .send(QueuedAction {
                action,
                reply: None,
            })
            .map_err(|_| ConsentError::Internal("action lane is closed".to_owned()))
    }

    /// Deliver the consent restored from the device store, if any.
    ///
    /// Returns whether anything was delivered.
    pub fn send_stored_consent_to_client(&self) -> bool {
        let consents = self.inner.registry.consents();
        if consents.gdpr.is_none() && consents.ccpa.is_none() {
            return false;
        }
        self.inner.events.on_consent_ready(&consents);
        true
    }
}

#[async_trait]
impl ConsentClient for ConsentLocalClient {
    async fn load_messages(
        &self,
        auth_id: Option<String>,
        pub_data: Map<String, Value>,
    ) -> Result<LoadOutcome, ConsentError> {
        let events = &self.inner.events;
        match self.inner.engine.reconcile(auth_id).await {
            Ok(reconciled) => {
                match &reconciled.outcome {
                    LoadOutcome::Messages(messages) => events.on_success(messages),
                    LoadOutcome::ShowConsentOnly => events.on_show_consent_only(),
                }
                self.inner.engine.report(&reconciled, &pub_data).await;
                Ok(reconciled.outcome)
            }
            Err(e) => {
                let err = log_and_convert("load_messages", e);
                events.on_failure(&err, err.is_fatal());
                Err(err)
            }
        }
    }

    async fn submit_action(&self, action: ConsentAction) -> Result<ConsentState, ConsentError> {
        let (tx, rx) = oneshot::channel();
        self.lane
            .send(QueuedAction {
                action,
                reply: Some(tx),
            })
            .map_err(|_| ConsentError::Internal("action lane is closed".to_owned()))?;
        rx.await
            .map_err(|_| ConsentError::Internal("action lane dropped the submission".to_owned()))?
    }

    async fn send_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, ConsentError> {
        let result = self.inner.submitter.send_custom_consent(request).await;
        self.inner.custom_consent_done("send_custom_consent", result)
    }

    async fn delete_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, ConsentError> {
        let result = self.inner.submitter.delete_custom_consent(request).await;
        self.inner.custom_consent_done("delete_custom_consent", result)
    }

    fn consents(&self) -> Consents {
        self.inner.registry.consents()
    }

    fn clear_all(&self) -> Result<(), ConsentError> {
        self.inner.registry.reset();
        self.inner
            .storage
            .clear_all()
            .map_err(|e| log_and_convert("clear_all", DomainError::Storage(e)))?;
        tracing::info!("Cleared all consent data");
        Ok(())
    }
}
