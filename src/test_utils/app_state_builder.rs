//! Test app state builder for HTTP-level integration testing.
//!
//! `TestAppStateBuilder` wires an `AppState` to in-memory repositories and
//! keeps handles on them so tests can inspect what a request persisted.

use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        billing_webhook::BillingWebhookUseCases, subscriber_directory::SubscriberDirectory,
    },
    infra::config::{AppConfig, DEFAULT_BILLING_PROVIDER},
    test_utils::{
        InMemoryIdentityRepo, InMemorySubscriberProfileRepo, InMemoryWebhookEventRepo,
        TEST_WEBHOOK_SECRET,
    },
};

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let builder = TestAppStateBuilder::new().with_identity("u1");
/// let server = TestServer::new(router().with_state(builder.build())).unwrap();
/// // ... drive requests ...
/// assert_eq!(builder.events().count(), 1);
/// ```
pub struct TestAppStateBuilder {
    identities: Vec<String>,
    webhook_secret: Option<String>,
    events: Arc<InMemoryWebhookEventRepo>,
    profiles: Arc<InMemorySubscriberProfileRepo>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            identities: Vec::new(),
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
            events: Arc::new(InMemoryWebhookEventRepo::new()),
            profiles: Arc::new(InMemorySubscriberProfileRepo::new()),
        }
    }

    pub fn with_identity(mut self, user_id: &str) -> Self {
        self.identities.push(user_id.to_string());
        self
    }

    pub fn without_webhook_secret(mut self) -> Self {
        self.webhook_secret = None;
        self
    }

    pub fn events(&self) -> &InMemoryWebhookEventRepo {
        &self.events
    }

    pub fn profiles(&self) -> &InMemorySubscriberProfileRepo {
        &self.profiles
    }

    pub fn build(&self) -> AppState {
        let identity_ids: Vec<&str> = self.identities.iter().map(String::as_str).collect();
        let webhook_secret = self
            .webhook_secret
            .clone()
            .map(|s| SecretString::new(s.into()));

        let directory = SubscriberDirectory::new(
            Arc::new(InMemoryIdentityRepo::with_identities(&identity_ids)),
            self.profiles.clone(),
            DEFAULT_BILLING_PROVIDER,
        );
        let billing_webhook_use_cases =
            BillingWebhookUseCases::new(self.events.clone(), directory, webhook_secret.clone());

        let config = AppConfig {
            database_url: "postgres://localhost/test".to_string(),
            db_max_connections: 1,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            billing_webhook_secret: webhook_secret,
            billing_provider: DEFAULT_BILLING_PROVIDER.to_string(),
        };

        AppState {
            config: Arc::new(config),
            billing_webhook_use_cases: Arc::new(billing_webhook_use_cases),
        }
    }
}
