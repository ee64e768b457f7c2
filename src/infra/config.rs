use std::net::SocketAddr;

use env_helpers::get_env_default;
use secrecy::SecretString;

use crate::infra::error::InfraError;

pub const DEFAULT_BILLING_PROVIDER: &str = "revenuecat";

pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Shared secret the billing provider sends as a bearer token.
    /// Left unset, the service still starts but rejects every webhook.
    pub billing_webhook_secret: Option<SecretString>,
    /// Provider tag used in the webhook path and stored as the subscription source.
    pub billing_provider: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| InfraError::ConfigMissing { var: "DATABASE_URL" })?;
        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 5);
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));

        let billing_webhook_secret = std::env::var("BILLING_WEBHOOK_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()));
        let billing_provider: String =
            get_env_default("BILLING_PROVIDER", DEFAULT_BILLING_PROVIDER.to_string());

        if billing_webhook_secret.is_none() {
            tracing::warn!("BILLING_WEBHOOK_SECRET is not set; billing webhooks will be rejected");
        }

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            billing_webhook_secret,
            billing_provider: billing_provider.trim().to_lowercase(),
        })
    }
}
