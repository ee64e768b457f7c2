use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value as JsonValue;
use subtle::ConstantTimeEq;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::subscriber_directory::SubscriberDirectory;
use crate::domain::entities::{
    billing_event::BillingEvent, subscription_transition::apply_transition,
};

// ============================================================================
// Constants
// ============================================================================

pub const IGNORED_MARKER_PREFIX: &str = "ignored:";
/// Stored as `processing_error` while a replay owns a failed event.
pub const REPLAY_CLAIM_MARKER: &str = "replaying";
pub const DEFAULT_FAILED_EVENTS_LIMIT: i64 = 50;
pub const MAX_FAILED_EVENTS_LIMIT: i64 = 200;

// ============================================================================
// Repository Traits
// ============================================================================

/// Append-only log of received billing events.
#[async_trait]
pub trait WebhookEventRepoTrait: Send + Sync {
    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>>;

    /// Store a new event. The store rejects a second record for the same
    /// `event_id` with [`AppendOutcome::Conflict`].
    async fn append(&self, event: &NewWebhookEvent) -> AppResult<AppendOutcome>;

    /// Persist the processing outcome together with the record's profile link.
    async fn mark_outcome(
        &self,
        record: &WebhookEventRecord,
        outcome: &EventOutcome,
    ) -> AppResult<WebhookEventRecord>;

    /// Atomically take a failed event for replay by setting its error to
    /// [`REPLAY_CLAIM_MARKER`]. Returns `None` when the event is unknown,
    /// already processed, still in flight, or claimed by another replay.
    async fn claim_for_replay(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>>;

    async fn list_failed(&self, limit: i64) -> AppResult<Vec<WebhookEventRecord>>;
}

// ============================================================================
// Event Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WebhookEventRecord {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub subject_id: String,
    pub payload: JsonValue,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub processing_error: Option<String>,
    pub profile_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub subject_id: String,
    pub payload: JsonValue,
}

impl From<&BillingEvent> for NewWebhookEvent {
    fn from(event: &BillingEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            event_type: event.event_type.as_str().to_string(),
            subject_id: event.subject_id.clone(),
            payload: event.payload.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppendOutcome {
    Inserted(WebhookEventRecord),
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    /// Accepted without touching any profile; carries the `ignored:<TYPE>` marker.
    Ignored(String),
    Failed(String),
}

impl EventOutcome {
    pub fn processed(&self) -> bool {
        !matches!(self, EventOutcome::Failed(_))
    }

    pub fn processing_error(&self) -> Option<&str> {
        match self {
            EventOutcome::Processed => None,
            EventOutcome::Ignored(marker) => Some(marker),
            EventOutcome::Failed(error) => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Duplicate,
    Ignored { event_type: String },
    Processed { event_type: String },
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct BillingWebhookUseCases {
    event_repo: Arc<dyn WebhookEventRepoTrait>,
    directory: SubscriberDirectory,
    webhook_secret: Option<SecretString>,
}

impl BillingWebhookUseCases {
    pub fn new(
        event_repo: Arc<dyn WebhookEventRepoTrait>,
        directory: SubscriberDirectory,
        webhook_secret: Option<SecretString>,
    ) -> Self {
        Self {
            event_repo,
            directory,
            webhook_secret,
        }
    }

    pub fn source(&self) -> &str {
        self.directory.source()
    }

    /// Check the caller's `Authorization` header against the configured secret.
    pub fn authenticate(&self, authorization: Option<&str>) -> AppResult<()> {
        let Some(secret) = &self.webhook_secret else {
            return Err(AppError::Configuration(
                "billing webhook secret is not configured".into(),
            ));
        };

        let token = authorization
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        if constant_time_compare(token.as_bytes(), secret.expose_secret().as_bytes()) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    /// Run one delivered webhook through the pipeline.
    ///
    /// Redelivery of a known `event_id` is acknowledged as a duplicate no
    /// matter how the first delivery ended. Failed events are re-driven
    /// explicitly through [`Self::replay`].
    #[instrument(skip(self, authorization, body))]
    pub async fn ingest(&self, authorization: Option<&str>, body: &str) -> AppResult<IngestOutcome> {
        self.authenticate(authorization)?;

        let payload: JsonValue = serde_json::from_str(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
        let event = BillingEvent::from_payload(payload, Utc::now().timestamp_millis())
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;

        let record = match self.event_repo.append(&NewWebhookEvent::from(&event)).await? {
            AppendOutcome::Inserted(record) => record,
            AppendOutcome::Conflict => {
                tracing::info!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    "Duplicate billing event, acknowledging"
                );
                return Ok(IngestOutcome::Duplicate);
            }
        };

        self.process(record, &event).await
    }

    /// Re-run a stored event that previously failed.
    #[instrument(skip(self, authorization))]
    pub async fn replay(
        &self,
        authorization: Option<&str>,
        event_id: &str,
    ) -> AppResult<IngestOutcome> {
        self.authenticate(authorization)?;

        let Some(record) = self.event_repo.claim_for_replay(event_id).await? else {
            let existing = self
                .event_repo
                .find_by_event_id(event_id)
                .await?
                .ok_or(AppError::NotFound)?;
            let reason = if existing.processed {
                "was already processed"
            } else if existing.processing_error.as_deref() == Some(REPLAY_CLAIM_MARKER) {
                "is already being replayed"
            } else {
                "has no recorded failure to replay"
            };
            return Err(AppError::InvalidInput(format!("event {} {}", event_id, reason)));
        };

        let mut event = match BillingEvent::from_payload(
            record.payload.clone(),
            Utc::now().timestamp_millis(),
        ) {
            Ok(event) => event,
            Err(e) => {
                let err = AppError::InvalidInput(e.to_string());
                self.record_failure(&record, &err).await;
                return Err(err);
            }
        };
        event.event_id = record.event_id.clone();

        tracing::info!(event_type = %event.event_type, "Replaying failed billing event");
        self.process(record, &event).await
    }

    pub async fn get_event(
        &self,
        authorization: Option<&str>,
        event_id: &str,
    ) -> AppResult<WebhookEventRecord> {
        self.authenticate(authorization)?;
        self.event_repo
            .find_by_event_id(event_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_failed(
        &self,
        authorization: Option<&str>,
        limit: Option<i64>,
    ) -> AppResult<Vec<WebhookEventRecord>> {
        self.authenticate(authorization)?;
        let limit = limit
            .unwrap_or(DEFAULT_FAILED_EVENTS_LIMIT)
            .clamp(1, MAX_FAILED_EVENTS_LIMIT);
        self.event_repo.list_failed(limit).await
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    async fn process(
        &self,
        mut record: WebhookEventRecord,
        event: &BillingEvent,
    ) -> AppResult<IngestOutcome> {
        let event_type = event.event_type.as_str().to_string();

        if !event.event_type.is_supported() {
            let marker = format!("{}{}", IGNORED_MARKER_PREFIX, event_type);
            self.finalize(&record, EventOutcome::Ignored(marker)).await?;
            tracing::info!(event_id = %event.event_id, event_type = %event_type, "Ignoring unsupported billing event");
            return Ok(IngestOutcome::Ignored { event_type });
        }

        // A linked profile means the transition was saved before finalizing failed.
        if record.profile_id.is_some() {
            tracing::info!(
                event_id = %event.event_id,
                profile_id = ?record.profile_id,
                "Transition already applied, finalizing only"
            );
        } else if let Err(err) = self.apply(&mut record, event).await {
            tracing::error!(
                error = %err,
                event_id = %event.event_id,
                event_type = %event_type,
                subject_id = %event.subject_id,
                "Billing event failed"
            );
            self.record_failure(&record, &err).await;
            return Err(err);
        }

        self.finalize(&record, EventOutcome::Processed).await?;
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event_type,
            profile_id = ?record.profile_id,
            "Billing event processed"
        );
        Ok(IngestOutcome::Processed { event_type })
    }

    async fn finalize(&self, record: &WebhookEventRecord, outcome: EventOutcome) -> AppResult<()> {
        if let Err(e) = self.event_repo.mark_outcome(record, &outcome).await {
            let err = AppError::Internal(format!("failed to finalize billing event: {}", e));
            tracing::error!(error = %err, event_id = %record.event_id, "Billing event not finalized");
            self.record_failure(record, &err).await;
            return Err(err);
        }
        Ok(())
    }

    /// Best effort: the caller already holds the error it will return.
    async fn record_failure(&self, record: &WebhookEventRecord, err: &AppError) {
        let outcome = EventOutcome::Failed(err.to_string());
        if let Err(mark_err) = self.event_repo.mark_outcome(record, &outcome).await {
            tracing::error!(
                error = %mark_err,
                event_id = %record.event_id,
                "Failed to record billing event failure"
            );
        }
    }

    async fn apply(&self, record: &mut WebhookEventRecord, event: &BillingEvent) -> AppResult<()> {
        let mut profile = self
            .directory
            .resolve(&event.subject_id)
            .await
            .ok_or_else(|| AppError::UnmappedSubject(event.subject_id.clone()))?;

        apply_transition(&mut profile, event, self.directory.source())
            .map_err(|e| AppError::Transition(e.to_string()))?;
        profile.last_event_type = Some(event.event_type.as_str().to_string());
        profile.last_event_at = Some(Utc::now());

        let saved = self
            .directory
            .save(&profile)
            .await
            .map_err(|e| AppError::Transition(e.to_string()))?;

        record.profile_id = Some(saved.id);
        Ok(())
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
