use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscriber_directory::{
        CreateSubscriberProfileInput, SubscriberProfileRepoTrait,
    },
    domain::entities::subscriber_profile::SubscriberProfile,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> SubscriberProfile {
    SubscriberProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subscription_tier: row.get("subscription_tier"),
        subscription_expires_at: row.get("subscription_expires_at"),
        subscription_source: row.get("subscription_source"),
        external_subject_id: row.get("external_subject_id"),
        last_event_type: row.get("last_event_type"),
        last_event_at: row.get("last_event_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, subscription_tier, subscription_expires_at, subscription_source,
    external_subject_id, last_event_type, last_event_at, created_at, updated_at
"#;

#[async_trait]
impl SubscriberProfileRepoTrait for PostgresPersistence {
    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<SubscriberProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriber_profiles WHERE user_id = $1",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn find_by_external_subject_id(
        &self,
        external_subject_id: &str,
    ) -> AppResult<Option<SubscriberProfile>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriber_profiles
            WHERE external_subject_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(external_subject_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn create(&self, input: &CreateSubscriberProfileInput) -> AppResult<SubscriberProfile> {
        // A concurrent delivery may have created the profile first; hand back that row.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriber_profiles
                (user_id, subscription_tier, subscription_source, external_subject_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET external_subject_id = COALESCE(subscriber_profiles.external_subject_id, EXCLUDED.external_subject_id)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&input.user_id)
        .bind(input.subscription_tier)
        .bind(&input.subscription_source)
        .bind(&input.external_subject_id)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_profile(row))
    }

    async fn save(&self, profile: &SubscriberProfile) -> AppResult<SubscriberProfile> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriber_profiles
            SET subscription_tier = $2,
                subscription_expires_at = $3,
                subscription_source = $4,
                external_subject_id = $5,
                last_event_type = $6,
                last_event_at = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(profile.id)
        .bind(profile.subscription_tier)
        .bind(profile.subscription_expires_at)
        .bind(&profile.subscription_source)
        .bind(&profile.external_subject_id)
        .bind(&profile.last_event_type)
        .bind(profile.last_event_at)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        Ok(row_to_profile(row))
    }
}
