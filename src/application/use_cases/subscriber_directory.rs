use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::app_error::AppResult;
use crate::domain::entities::{
    subscriber_profile::SubscriberProfile, subscription_tier::SubscriptionTier,
};

// ============================================================================
// Repository Traits
// ============================================================================

/// Read-only view of the identity store owned by the main app.
#[async_trait]
pub trait IdentityRepoTrait: Send + Sync {
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<IdentityProfile>>;
}

#[async_trait]
pub trait SubscriberProfileRepoTrait: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<SubscriberProfile>>;

    async fn find_by_external_subject_id(
        &self,
        external_subject_id: &str,
    ) -> AppResult<Option<SubscriberProfile>>;

    async fn create(&self, input: &CreateSubscriberProfileInput) -> AppResult<SubscriberProfile>;

    async fn save(&self, profile: &SubscriberProfile) -> AppResult<SubscriberProfile>;
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriberProfileInput {
    pub user_id: String,
    pub subscription_tier: SubscriptionTier,
    pub subscription_source: String,
    pub external_subject_id: String,
}

// ============================================================================
// Use Cases
// ============================================================================

/// Maps external billing subjects onto local subscriber profiles.
#[derive(Clone)]
pub struct SubscriberDirectory {
    identity_repo: Arc<dyn IdentityRepoTrait>,
    profile_repo: Arc<dyn SubscriberProfileRepoTrait>,
    source: String,
}

impl SubscriberDirectory {
    pub fn new(
        identity_repo: Arc<dyn IdentityRepoTrait>,
        profile_repo: Arc<dyn SubscriberProfileRepoTrait>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            identity_repo,
            profile_repo,
            source: source.into(),
        }
    }

    /// Resolve the profile for an external subject id.
    ///
    /// Tries, in order: a profile owned by the identity with that id, a
    /// profile that recorded it as its external subject, and finally a
    /// fresh free-tier profile for an existing identity with that id.
    /// Lookup failures fall through to the next step; only the final
    /// absence is returned.
    #[instrument(skip(self))]
    pub async fn resolve(&self, external_subject_id: &str) -> Option<SubscriberProfile> {
        if external_subject_id.is_empty() {
            return None;
        }

        match self.profile_repo.find_by_user_id(external_subject_id).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Profile lookup by user id failed"),
        }

        match self
            .profile_repo
            .find_by_external_subject_id(external_subject_id)
            .await
        {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Profile lookup by external subject failed"),
        }

        let identity = match self.identity_repo.find_identity(external_subject_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::debug!("No identity for external subject");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity lookup failed");
                return None;
            }
        };

        let input = CreateSubscriberProfileInput {
            user_id: identity.id,
            subscription_tier: SubscriptionTier::Free,
            subscription_source: self.source.clone(),
            external_subject_id: external_subject_id.to_string(),
        };

        match self.profile_repo.create(&input).await {
            Ok(profile) => {
                tracing::info!(profile_id = %profile.id, "Created subscriber profile");
                Some(profile)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create subscriber profile");
                None
            }
        }
    }

    pub async fn save(&self, profile: &SubscriberProfile) -> AppResult<SubscriberProfile> {
        self.profile_repo.save(profile).await
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
