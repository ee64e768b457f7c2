use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::{billing_event::format_timestamp, subscription_tier::SubscriptionTier};

/// Local subscription state for one user, as driven by billing events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberProfile {
    pub id: Uuid,
    /// Identity key of the owning user.
    pub user_id: String,
    pub subscription_tier: SubscriptionTier,
    /// Always `None` while the tier is free.
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub subscription_source: String,
    pub external_subject_id: Option<String>,
    pub last_event_type: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriberProfile {
    /// Expiration in client-facing form; empty when there is none.
    pub fn expires_at_display(&self) -> String {
        format_timestamp(self.subscription_expires_at.as_ref())
    }
}
