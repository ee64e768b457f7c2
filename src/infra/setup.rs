use crate::{
    adapters::http::app_state::AppState,
    infra::{InfraError, config::AppConfig, postgres_persistence},
    use_cases::{
        billing_webhook::{BillingWebhookUseCases, WebhookEventRepoTrait},
        subscriber_directory::{IdentityRepoTrait, SubscriberDirectory, SubscriberProfileRepoTrait},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> Result<AppState, InfraError> {
    let config = AppConfig::from_env()?;

    let postgres_arc =
        Arc::new(postgres_persistence(&config.database_url, config.db_max_connections).await?);

    let directory = SubscriberDirectory::new(
        postgres_arc.clone() as Arc<dyn IdentityRepoTrait>,
        postgres_arc.clone() as Arc<dyn SubscriberProfileRepoTrait>,
        config.billing_provider.clone(),
    );

    let billing_webhook_use_cases = BillingWebhookUseCases::new(
        postgres_arc.clone() as Arc<dyn WebhookEventRepoTrait>,
        directory,
        config.billing_webhook_secret.clone(),
    );

    Ok(AppState {
        config: Arc::new(config),
        billing_webhook_use_cases: Arc::new(billing_webhook_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "walk_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), skipped when the log file cannot be created
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
