//! Subscription plans, resource limits and the expiry lifecycle.

pub mod billing;
pub mod catalog;
pub mod domain;
pub mod limits;
pub mod plan;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use billing::{BillingCycle, UnknownBillingCycle};
pub use catalog::{PlanCatalogImporter, PlanImportError};
pub use domain::{
    ActiveSubscription, AgencyId, BillingRecord, BillingRecordId, SubscriptionId,
    SubscriptionOperation, SubscriptionStatus, UserId, UserSubscription,
};
pub use limits::{
    limit_level, usage_percentage, LimitLevel, ResourceLimit, ResourceType,
    WARNING_THRESHOLD_PCT,
};
pub use plan::{PlanCap, PlanId, ResourceCaps, SubscriptionPlan, FREE_PLAN_ID};
pub use repository::{
    OwnedResource, RepositoryError, ResourceId, ResourceInventory, SubscriptionStore,
};
pub use router::subscription_router;
pub use service::{
    ExpiryOutcome, LimitCheck, SubscriptionService, SubscriptionServiceError, SweepReport,
    UpgradeOutcome, UpgradeRequest, UsageOverview, DEFAULT_ACTIVATION_WINDOW_MINUTES,
};
pub use sweep::ExpirySweeper;
