//! Subscription state machine driven by billing events.
//!
//! | event            | tier    | expires at                |
//! |------------------|---------|---------------------------|
//! | INITIAL_PURCHASE | premium | event expiration          |
//! | RENEWAL          | premium | event expiration          |
//! | CANCELLATION     | premium | event expiration          |
//! | EXPIRATION       | free    | none                      |
//!
//! A cancellation keeps access until the period runs out; only the
//! expiration event revokes it. Persistence is the caller's job.

use thiserror::Error;

use crate::domain::entities::{
    billing_event::{BillingEvent, BillingEventType},
    subscriber_profile::SubscriberProfile,
    subscription_tier::SubscriptionTier,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no subscription transition for event type {0}")]
pub struct UnsupportedTransition(pub String);

/// Apply `event` to `profile` in memory.
///
/// `source` tags the billing system that issued the event. It and the
/// external subject id are refreshed on every supported event.
pub fn apply_transition(
    profile: &mut SubscriberProfile,
    event: &BillingEvent,
    source: &str,
) -> Result<(), UnsupportedTransition> {
    match &event.event_type {
        BillingEventType::InitialPurchase
        | BillingEventType::Renewal
        | BillingEventType::Cancellation => {
            profile.subscription_tier = SubscriptionTier::Premium;
            profile.subscription_expires_at = event.expires_at();
        }
        BillingEventType::Expiration => {
            profile.subscription_tier = SubscriptionTier::Free;
            profile.subscription_expires_at = None;
        }
        BillingEventType::Unsupported(other) => {
            return Err(UnsupportedTransition(other.clone()));
        }
    }

    profile.subscription_source = source.to_string();
    profile.external_subject_id = Some(event.subject_id.clone());
    Ok(())
}
