use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing_webhook::{
        AppendOutcome, EventOutcome, NewWebhookEvent, REPLAY_CLAIM_MARKER, WebhookEventRecord,
        WebhookEventRepoTrait,
    },
};

fn row_to_record(row: sqlx::postgres::PgRow) -> WebhookEventRecord {
    WebhookEventRecord {
        id: row.get("id"),
        event_id: row.get("event_id"),
        event_type: row.get("event_type"),
        subject_id: row.get("subject_id"),
        payload: row.get("payload"),
        processed: row.get("processed"),
        processed_at: row.get("processed_at"),
        processing_error: row.get("processing_error"),
        profile_id: row.get("profile_id"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, event_id, event_type, subject_id, payload, processed, processed_at,
    processing_error, profile_id, created_at
"#;

#[async_trait]
impl WebhookEventRepoTrait for PostgresPersistence {
    async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM billing_webhook_events WHERE event_id = $1",
            SELECT_COLS
        ))
        .bind(event_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn append(&self, event: &NewWebhookEvent) -> AppResult<AppendOutcome> {
        // The unique index on event_id decides which delivery wins.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO billing_webhook_events (event_id, event_type, subject_id, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.subject_id)
        .bind(&event.payload)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(match row {
            Some(row) => AppendOutcome::Inserted(row_to_record(row)),
            None => AppendOutcome::Conflict,
        })
    }

    async fn mark_outcome(
        &self,
        record: &WebhookEventRecord,
        outcome: &EventOutcome,
    ) -> AppResult<WebhookEventRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE billing_webhook_events
            SET processed = $2,
                processed_at = NOW(),
                processing_error = $3,
                profile_id = $4
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(record.id)
        .bind(outcome.processed())
        .bind(outcome.processing_error())
        .bind(record.profile_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound)?;

        Ok(row_to_record(row))
    }

    async fn claim_for_replay(&self, event_id: &str) -> AppResult<Option<WebhookEventRecord>> {
        // Only recorded failures qualify; a NULL error means the first run is still going.
        let row = sqlx::query(&format!(
            r#"
            UPDATE billing_webhook_events
            SET processing_error = $2
            WHERE event_id = $1
              AND processed = FALSE
              AND processing_error IS NOT NULL
              AND processing_error <> $2
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(event_id)
        .bind(REPLAY_CLAIM_MARKER)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn list_failed(&self, limit: i64) -> AppResult<Vec<WebhookEventRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM billing_webhook_events
            WHERE processed = FALSE AND processing_error IS NOT NULL
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            SELECT_COLS
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }
}
