use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriber_directory::{IdentityProfile, IdentityRepoTrait},
};

// The users table belongs to the main app; ids are compared as text so the
// lookup works whatever key type it uses.
#[async_trait]
impl IdentityRepoTrait for PostgresPersistence {
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<IdentityProfile>> {
        let row = sqlx::query("SELECT id::text AS id FROM users WHERE id::text = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.map(|r| IdentityProfile { id: r.get("id") }))
    }
}
