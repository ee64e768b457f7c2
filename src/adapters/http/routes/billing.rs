//! Billing provider webhook and event audit routes.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::billing_webhook::IngestOutcome,
};

pub const MAX_WEBHOOK_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{provider}/webhook",
            post(handle_webhook).layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY_BYTES)),
        )
        .route("/{provider}/failed-events", get(list_failed_events))
        .route("/{provider}/events/{event_id}", get(get_event))
        .route("/{provider}/events/{event_id}/replay", post(replay_event))
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_type: Option<String>,
}

impl From<IngestOutcome> for WebhookResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let mut resp = WebhookResponse {
            ok: true,
            duplicate: None,
            ignored: None,
            processed: None,
            event_type: None,
        };
        match outcome {
            IngestOutcome::Duplicate => resp.duplicate = Some(true),
            IngestOutcome::Ignored { .. } => resp.ignored = Some(true),
            IngestOutcome::Processed { event_type } => {
                resp.processed = Some(true);
                resp.event_type = Some(event_type);
            }
        }
        resp
    }
}

#[derive(Debug, Deserialize)]
struct FailedEventsQuery {
    limit: Option<i64>,
}

/// POST /api/billing/{provider}/webhook
async fn handle_webhook(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    ensure_provider(&app_state, &provider)?;

    let outcome = app_state
        .billing_webhook_use_cases
        .ingest(authorization(&headers), &body)
        .await?;

    Ok(Json(WebhookResponse::from(outcome)))
}

/// GET /api/billing/{provider}/events/{event_id}
async fn get_event(
    State(app_state): State<AppState>,
    Path((provider, event_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    ensure_provider(&app_state, &provider)?;

    let record = app_state
        .billing_webhook_use_cases
        .get_event(authorization(&headers), &event_id)
        .await?;

    Ok(Json(record))
}

/// GET /api/billing/{provider}/failed-events
async fn list_failed_events(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<FailedEventsQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    ensure_provider(&app_state, &provider)?;

    let events = app_state
        .billing_webhook_use_cases
        .list_failed(authorization(&headers), query.limit)
        .await?;

    Ok(Json(events))
}

/// POST /api/billing/{provider}/events/{event_id}/replay
async fn replay_event(
    State(app_state): State<AppState>,
    Path((provider, event_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    ensure_provider(&app_state, &provider)?;

    let outcome = app_state
        .billing_webhook_use_cases
        .replay(authorization(&headers), &event_id)
        .await?;

    Ok(Json(WebhookResponse::from(outcome)))
}

fn ensure_provider(app_state: &AppState, provider: &str) -> AppResult<()> {
    if provider.eq_ignore_ascii_case(app_state.billing_webhook_use_cases.source()) {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}
