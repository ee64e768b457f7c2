pub mod billing_event;
pub mod subscriber_profile;
pub mod subscription_tier;
pub mod subscription_transition;
