//! In-memory mock implementations for billing-related repository traits.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        billing_webhook::{
            AppendOutcome, EventOutcome, NewWebhookEvent, REPLAY_CLAIM_MARKER,
            WebhookEventRecord, WebhookEventRepoTrait,
        },
        subscriber_directory::{
            CreateSubscriberProfileInput, IdentityProfile, IdentityRepoTrait,
            SubscriberProfileRepoTrait,
        },
    },
    domain::entities::subscriber_profile::SubscriberProfile,
};

// ============================================================================
// InMemoryWebhookEventRepo
// ============================================================================

/// Keyed by `event_id`, so a second append for the same id conflicts the
/// same way the unique index does in Postgres.
#[derive(Default)]
pub struct InMemoryWebhookEventRepo {
    pub events: Mutex<HashMap<String, WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, event_id: &str) -> Option<WebhookEventRecord> {
        self.events.lock().unwrap().get(event_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookEventRepoTrait for InMemoryWebhookEventRepo {
    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        Ok(self.get(event_id))
    }

    async fn append(&self, event: &NewWebhookEvent) -> AppResult<AppendOutcome> {
        let mut events = self.events.lock().unwrap();
        if events.contains_key(&event.event_id) {
            return Ok(AppendOutcome::Conflict);
        }

        let record = WebhookEventRecord {
            id: Uuid::new_v4(),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            subject_id: event.subject_id.clone(),
            payload: event.payload.clone(),
            processed: false,
            processed_at: None,
            processing_error: None,
            profile_id: None,
            created_at: Some(chrono::Utc::now()),
        };
        events.insert(record.event_id.clone(), record.clone());
        Ok(AppendOutcome::Inserted(record))
    }

    async fn mark_outcome(
        &self,
        record: &WebhookEventRecord,
        outcome: &EventOutcome,
    ) -> AppResult<WebhookEventRecord> {
        let mut events = self.events.lock().unwrap();
        let stored = events
            .get_mut(&record.event_id)
            .ok_or(AppError::NotFound)?;
        stored.processed = outcome.processed();
        stored.processed_at = Some(chrono::Utc::now());
        stored.processing_error = outcome.processing_error().map(str::to_string);
        stored.profile_id = record.profile_id;
        Ok(stored.clone())
    }

    async fn claim_for_replay(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        let mut events = self.events.lock().unwrap();
        let Some(stored) = events.get_mut(event_id) else {
            return Ok(None);
        };
        let claimable = !stored.processed
            && stored
                .processing_error
                .as_deref()
                .is_some_and(|e| e != REPLAY_CLAIM_MARKER);
        if !claimable {
            return Ok(None);
        }
        stored.processing_error = Some(REPLAY_CLAIM_MARKER.to_string());
        Ok(Some(stored.clone()))
    }

    async fn list_failed(&self, limit: i64) -> AppResult<Vec<WebhookEventRecord>> {
        let events = self.events.lock().unwrap();
        let mut failed: Vec<_> = events
            .values()
            .filter(|e| !e.processed && e.processing_error.is_some())
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        failed.truncate(limit.max(0) as usize);
        Ok(failed)
    }
}

// ============================================================================
// FailingWebhookEventRepo
// ============================================================================

/// Delegates to an in-memory repo but fails `mark_outcome` for the chosen
/// outcome kinds until [`FailingWebhookEventRepo::recover`] is called.
/// Failure marks always go through.
pub struct FailingWebhookEventRepo {
    pub inner: Arc<InMemoryWebhookEventRepo>,
    fail_processed: bool,
    fail_ignored: bool,
    recovered: AtomicBool,
}

impl FailingWebhookEventRepo {
    pub fn failing_processed_marks() -> Self {
        Self::build(true, false)
    }

    pub fn failing_ignored_marks() -> Self {
        Self::build(false, true)
    }

    fn build(fail_processed: bool, fail_ignored: bool) -> Self {
        Self {
            inner: Arc::new(InMemoryWebhookEventRepo::new()),
            fail_processed,
            fail_ignored,
            recovered: AtomicBool::new(false),
        }
    }

    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }

    fn should_fail(&self, outcome: &EventOutcome) -> bool {
        if self.recovered.load(Ordering::SeqCst) {
            return false;
        }
        match outcome {
            EventOutcome::Processed => self.fail_processed,
            EventOutcome::Ignored(_) => self.fail_ignored,
            EventOutcome::Failed(_) => false,
        }
    }
}

#[async_trait]
impl WebhookEventRepoTrait for FailingWebhookEventRepo {
    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        self.inner.find_by_event_id(event_id).await
    }

    async fn append(&self, event: &NewWebhookEvent) -> AppResult<AppendOutcome> {
        self.inner.append(event).await
    }

    async fn mark_outcome(
        &self,
        record: &WebhookEventRecord,
        outcome: &EventOutcome,
    ) -> AppResult<WebhookEventRecord> {
        if self.should_fail(outcome) {
            return Err(AppError::Database("down".into()));
        }
        self.inner.mark_outcome(record, outcome).await
    }

    async fn claim_for_replay(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        self.inner.claim_for_replay(event_id).await
    }

    async fn list_failed(&self, limit: i64) -> AppResult<Vec<WebhookEventRecord>> {
        self.inner.list_failed(limit).await
    }
}

// ============================================================================
// YieldingWebhookEventRepo
// ============================================================================

/// Yields to the scheduler before every call so joined futures interleave.
pub struct YieldingWebhookEventRepo {
    pub inner: Arc<InMemoryWebhookEventRepo>,
}

impl YieldingWebhookEventRepo {
    pub fn new(inner: Arc<InMemoryWebhookEventRepo>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl WebhookEventRepoTrait for YieldingWebhookEventRepo {
    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        tokio::task::yield_now().await;
        self.inner.find_by_event_id(event_id).await
    }

    async fn append(&self, event: &NewWebhookEvent) -> AppResult<AppendOutcome> {
        tokio::task::yield_now().await;
        self.inner.append(event).await
    }

    async fn mark_outcome(
        &self,
        record: &WebhookEventRecord,
        outcome: &EventOutcome,
    ) -> AppResult<WebhookEventRecord> {
        tokio::task::yield_now().await;
        self.inner.mark_outcome(record, outcome).await
    }

    async fn claim_for_replay(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        tokio::task::yield_now().await;
        self.inner.claim_for_replay(event_id).await
    }

    async fn list_failed(&self, limit: i64) -> AppResult<Vec<WebhookEventRecord>> {
        tokio::task::yield_now().await;
        self.inner.list_failed(limit).await
    }
}

// ============================================================================
// InMemoryIdentityRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryIdentityRepo {
    pub identities: Mutex<HashSet<String>>,
}

impl InMemoryIdentityRepo {
    pub fn with_identities(ids: &[&str]) -> Self {
        Self {
            identities: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
        }
    }
}

#[async_trait]
impl IdentityRepoTrait for InMemoryIdentityRepo {
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<IdentityProfile>> {
        Ok(self
            .identities
            .lock()
            .unwrap()
            .get(user_id)
            .map(|id| IdentityProfile { id: id.clone() }))
    }
}

// ============================================================================
// InMemorySubscriberProfileRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriberProfileRepo {
    pub profiles: Mutex<HashMap<Uuid, SubscriberProfile>>,
    saves: AtomicUsize,
}

impl InMemorySubscriberProfileRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: Vec<SubscriberProfile>) -> Self {
        let repo = Self::new();
        for profile in profiles {
            repo.insert(profile);
        }
        repo
    }

    /// Seed a profile without counting it as a save.
    pub fn insert(&self, profile: SubscriberProfile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    pub fn get_by_user_id(&self, user_id: &str) -> Option<SubscriberProfile> {
        self.profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.user_id == user_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberProfileRepoTrait for InMemorySubscriberProfileRepo {
    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<SubscriberProfile>> {
        Ok(self.get_by_user_id(user_id))
    }

    async fn find_by_external_subject_id(
        &self,
        external_subject_id: &str,
    ) -> AppResult<Option<SubscriberProfile>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.external_subject_id.as_deref() == Some(external_subject_id))
            .cloned())
    }

    async fn create(&self, input: &CreateSubscriberProfileInput) -> AppResult<SubscriberProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.values().any(|p| p.user_id == input.user_id) {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }

        let now = chrono::Utc::now();
        let profile = SubscriberProfile {
            id: Uuid::new_v4(),
            user_id: input.user_id.clone(),
            subscription_tier: input.subscription_tier,
            subscription_expires_at: None,
            subscription_source: input.subscription_source.clone(),
            external_subject_id: Some(input.external_subject_id.clone()),
            last_event_type: None,
            last_event_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn save(&self, profile: &SubscriberProfile) -> AppResult<SubscriberProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        if !profiles.contains_key(&profile.id) {
            return Err(AppError::NotFound);
        }

        let mut saved = profile.clone();
        saved.updated_at = Some(chrono::Utc::now());
        profiles.insert(saved.id, saved.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }
}

// ============================================================================
// FailingSubscriberProfileRepo
// ============================================================================

/// Wraps the in-memory repo and fails selected operations with a database error.
#[derive(Default)]
pub struct FailingSubscriberProfileRepo {
    inner: InMemorySubscriberProfileRepo,
    fail_lookups: bool,
    fail_creates: bool,
    fail_saves: bool,
}

impl FailingSubscriberProfileRepo {
    pub fn failing_lookups() -> Self {
        Self {
            fail_lookups: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_creates: true,
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_saves(profiles: Vec<SubscriberProfile>) -> Self {
        Self {
            inner: InMemorySubscriberProfileRepo::with_profiles(profiles),
            fail_saves: true,
            ..Self::default()
        }
    }

    fn fail<T>() -> AppResult<T> {
        Err(AppError::Database("Database operation failed".into()))
    }
}

#[async_trait]
impl SubscriberProfileRepoTrait for FailingSubscriberProfileRepo {
    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<SubscriberProfile>> {
        if self.fail_lookups {
            return Self::fail();
        }
        self.inner.find_by_user_id(user_id).await
    }

    async fn find_by_external_subject_id(
        &self,
        external_subject_id: &str,
    ) -> AppResult<Option<SubscriberProfile>> {
        if self.fail_lookups {
            return Self::fail();
        }
        self.inner
            .find_by_external_subject_id(external_subject_id)
            .await
    }

    async fn create(&self, input: &CreateSubscriberProfileInput) -> AppResult<SubscriberProfile> {
        if self.fail_creates {
            return Self::fail();
        }
        self.inner.create(input).await
    }

    async fn save(&self, profile: &SubscriberProfile) -> AppResult<SubscriberProfile> {
        if self.fail_saves {
            return Self::fail();
        }
        self.inner.save(profile).await
    }
}
