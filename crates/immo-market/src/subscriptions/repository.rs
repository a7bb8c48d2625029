use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AgencyId, BillingRecord, SubscriptionId, SubscriptionStatus, UserId, UserSubscription,
};
use super::limits::ResourceType;
use super::plan::{PlanId, SubscriptionPlan};

/// Storage for the plan catalog, user subscriptions and their billing history.
pub trait SubscriptionStore: Send + Sync {
    fn plan(&self, id: &PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError>;
    fn free_plan(&self) -> Result<Option<SubscriptionPlan>, RepositoryError>;
    fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError>;

    /// Most recently created active subscription of the user.
    fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserSubscription>, RepositoryError>;
    fn insert_subscription(
        &self,
        subscription: UserSubscription,
    ) -> Result<UserSubscription, RepositoryError>;
    /// Moves the row from `from` to `to` atomically. Returns `false` without writing
    /// when the stored status is no longer `from`.
    fn transition_subscription(
        &self,
        id: &SubscriptionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, RepositoryError>;
    /// Active subscriptions whose end date is at or before `cutoff`.
    fn active_ending_by(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError>;

    fn record_billing(&self, record: BillingRecord) -> Result<BillingRecord, RepositoryError>;
    /// Billing rows of the user, newest first.
    fn billing_history(&self, user_id: &UserId) -> Result<Vec<BillingRecord>, RepositoryError>;
}

/// Identifier of an agency, property, lease or user row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub String);

/// Active resource owned by a user, as seen by excess deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedResource {
    pub id: ResourceId,
    pub created_at: DateTime<Utc>,
}

/// Read/deactivate access to the resources a plan caps.
pub trait ResourceInventory: Send + Sync {
    /// Count of resources attributed to the user, optionally scoped to one agency.
    fn count(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        agency_id: Option<&AgencyId>,
    ) -> Result<u32, RepositoryError>;
    fn active_resources(
        &self,
        user_id: &UserId,
        resource: ResourceType,
    ) -> Result<Vec<OwnedResource>, RepositoryError>;
    fn deactivate(&self, resource: ResourceType, ids: &[ResourceId])
        -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
