//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::entities::{
    subscriber_profile::SubscriberProfile, subscription_tier::SubscriptionTier,
};

pub const TEST_WEBHOOK_SECRET: &str = "rc_test_webhook_secret_12345";

/// `Authorization` header value carrying the test secret.
pub fn test_bearer() -> String {
    format!("Bearer {}", TEST_WEBHOOK_SECRET)
}

/// Create a free-tier subscriber profile owned by `user_id`.
pub fn create_test_profile(
    user_id: &str,
    overrides: impl FnOnce(&mut SubscriberProfile),
) -> SubscriberProfile {
    let mut profile = SubscriberProfile {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        subscription_tier: SubscriptionTier::Free,
        subscription_expires_at: None,
        subscription_source: "revenuecat".to_string(),
        external_subject_id: None,
        last_event_type: None,
        last_event_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut profile);
    profile
}

/// Fixed timestamp so fixtures compare deterministically.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0)
        .single()
        .unwrap_or_default()
}
