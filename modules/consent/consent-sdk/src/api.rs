//! Public API traits for the consent module.
//!
//! [`ConsentClient`] is the request/response surface; [`ConsentEvents`] is the
//! callback surface a host registers to be told about outcomes produced on
//! background tasks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ConsentError;
use crate::models::{
    ConsentAction, ConsentState, Consents, CustomConsentRequest, GdprConsentState, LoadOutcome,
    MessagesResponse,
};

/// Public API of the consent module.
///
/// ```ignore
/// let outcome = client.load_messages(None, Map::new()).await?;
/// if let LoadOutcome::Messages(messages) = outcome {
///     render(messages.campaign_list());
/// }
///
/// let consent = client
///     .submit_action(ConsentAction::new(RegulationKind::Gdpr, ActionType::AcceptAll))
///     .await?;
/// ```
#[async_trait]
pub trait ConsentClient: Send + Sync {
    /// Run one message-load cycle.
    ///
    /// `auth_id` forces a consent-status lookup for an authenticated user;
    /// `pub_data` is forwarded on page-view reports.
    ///
    /// # Errors
    ///
    /// - `Network` / `MalformedResponse` when metadata, consent-status or
    ///   messages fail. These are fatal for the cycle.
    async fn load_messages(
        &self,
        auth_id: Option<String>,
        pub_data: Map<String, Value>,
    ) -> Result<LoadOutcome, ConsentError>;

    /// Submit a user action. Submissions are applied one at a time, in order.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAction` for actions that do not record a choice
    /// - `NotConfigured` when the action's regulation has no campaign
    /// - `InvalidConsentState` when no consent exists after the submission
    async fn submit_action(&self, action: ConsentAction) -> Result<ConsentState, ConsentError>;

    /// Grant custom vendors and purposes on top of the recorded GDPR consent.
    ///
    /// # Errors
    ///
    /// - `MissingConsent` when no GDPR consent has been recorded
    async fn send_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, ConsentError>;

    /// Revoke custom vendors and purposes from the recorded GDPR consent.
    ///
    /// # Errors
    ///
    /// - `MissingConsent` when no GDPR consent has been recorded
    async fn delete_custom_consent(
        &self,
        request: CustomConsentRequest,
    ) -> Result<GdprConsentState, ConsentError>;

    /// Snapshot of the consent currently held for the session.
    fn consents(&self) -> Consents;

    /// Drop all consent held in memory and on the device.
    ///
    /// # Errors
    ///
    /// - `Storage` when the device store cannot be cleared
    fn clear_all(&self) -> Result<(), ConsentError>;
}

/// Callbacks a host registers to observe consent outcomes.
///
/// Every method has an empty default so hosts implement only what they need.
/// Callbacks run on the task that produced the outcome; hosts with a UI
/// thread are expected to hop onto it themselves.
pub trait ConsentEvents: Send + Sync {
    /// Messages were fetched and must be rendered.
    fn on_success(&self, _messages: &MessagesResponse) {}

    /// Consent is current; nothing to render.
    fn on_show_consent_only(&self) {}

    /// A load cycle failed. Delivered once per cycle.
    fn on_failure(&self, _error: &ConsentError, _is_fatal: bool) {}

    /// Consent changed, or stored consent was loaded.
    fn on_consent_ready(&self, _consents: &Consents) {}

    /// A queued action was submitted successfully.
    fn on_action_submitted(&self, _consent: &ConsentState) {}

    /// A queued action or custom-consent call failed.
    fn on_error(&self, _error: &ConsentError) {}
}

/// Events sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConsentEvents;

impl ConsentEvents for NoopConsentEvents {}
