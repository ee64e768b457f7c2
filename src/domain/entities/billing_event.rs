//! Canonical form of an inbound billing provider event.
//!
//! Providers deliver either a bare event object or the same object wrapped
//! under an `event` key. Both shapes are normalized into [`BillingEvent`]
//! before any other logic looks at them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventType {
    InitialPurchase,
    Renewal,
    Cancellation,
    Expiration,
    /// Any other provider event type, kept in canonical (upper-case) form.
    Unsupported(String),
}

impl BillingEventType {
    /// Parse a provider event type, trimming and upper-casing it first.
    pub fn parse(raw: &str) -> Self {
        let canonical = raw.trim().to_uppercase();
        match canonical.as_str() {
            "INITIAL_PURCHASE" => Self::InitialPurchase,
            "RENEWAL" => Self::Renewal,
            "CANCELLATION" => Self::Cancellation,
            "EXPIRATION" => Self::Expiration,
            _ => Self::Unsupported(canonical),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InitialPurchase => "INITIAL_PURCHASE",
            Self::Renewal => "RENEWAL",
            Self::Cancellation => "CANCELLATION",
            Self::Expiration => "EXPIRATION",
            Self::Unsupported(other) => other.as_str(),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for BillingEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventPayloadError {
    #[error("webhook payload must be a JSON object")]
    NotAnObject,

    #[error("missing event type")]
    MissingEventType,
}

#[derive(Debug, Clone)]
pub struct BillingEvent {
    pub event_id: String,
    pub event_type: BillingEventType,
    pub subject_id: String,
    pub event_timestamp_ms: Option<i64>,
    pub expiration_at_ms: Option<i64>,
    /// The body exactly as delivered, kept for the audit trail.
    pub payload: JsonValue,
}

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(rename = "type", default)]
    event_type: Option<JsonValue>,
    #[serde(default)]
    app_user_id: Option<JsonValue>,
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    event_timestamp_ms: Option<JsonValue>,
    #[serde(default)]
    expiration_at_ms: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundPayload {
    Wrapped { event: RawEvent },
    Bare(RawEvent),
}

impl InboundPayload {
    fn into_raw(self) -> RawEvent {
        match self {
            InboundPayload::Wrapped { event } => event,
            InboundPayload::Bare(event) => event,
        }
    }
}

impl BillingEvent {
    /// Normalize a delivered payload.
    ///
    /// `now_ms` is only used to synthesize an event id when the provider
    /// sent neither `id` nor `event_timestamp_ms`.
    pub fn from_payload(payload: JsonValue, now_ms: i64) -> Result<Self, EventPayloadError> {
        if !payload.is_object() {
            return Err(EventPayloadError::NotAnObject);
        }

        let raw = InboundPayload::deserialize(&payload)
            .map(InboundPayload::into_raw)
            .map_err(|_| EventPayloadError::NotAnObject)?;

        let type_str = text_value(raw.event_type.as_ref());
        if type_str.trim().is_empty() {
            return Err(EventPayloadError::MissingEventType);
        }
        let event_type = BillingEventType::parse(&type_str);
        let subject_id = text_value(raw.app_user_id.as_ref()).trim().to_string();
        let event_timestamp_ms = millis_value(raw.event_timestamp_ms.as_ref());
        let expiration_at_ms = millis_value(raw.expiration_at_ms.as_ref());

        let supplied_id = text_value(raw.id.as_ref()).trim().to_string();
        let event_id = if supplied_id.is_empty() {
            format!(
                "{}:{}:{}",
                event_type.as_str(),
                subject_id,
                event_timestamp_ms.unwrap_or(now_ms)
            )
        } else {
            supplied_id
        };

        Ok(Self {
            event_id,
            event_type,
            subject_id,
            event_timestamp_ms,
            expiration_at_ms,
            payload,
        })
    }

    /// Expiration instant carried by the event, if it is a usable timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiration_at_ms.and_then(millis_to_timestamp)
    }
}

/// Convert epoch milliseconds to a timestamp. Zero, negative and
/// out-of-range values yield `None`.
pub fn millis_to_timestamp(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Render a timestamp the way clients read it: RFC 3339, millisecond
/// precision, `Z` suffix. A missing timestamp renders as an empty string.
pub fn format_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn text_value(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn millis_value(value: Option<&JsonValue>) -> Option<i64> {
    let as_float = |f: f64| f.is_finite().then(|| f.trunc() as i64);
    match value? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(as_float)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(as_float))
        }
        _ => None,
    }
}
