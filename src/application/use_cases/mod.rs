pub mod billing_webhook;
pub mod subscriber_directory;
