use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    ActiveSubscription, AgencyId, BillingRecord, BillingRecordId, SubscriptionId,
    SubscriptionOperation, SubscriptionStatus, UserId, UserSubscription,
};
use super::limits::{ResourceLimit, ResourceType};
use super::plan::{PlanCap, PlanId, SubscriptionPlan};
use super::repository::{RepositoryError, ResourceId, ResourceInventory, SubscriptionStore};

/// Resources trimmed back to the free-tier caps when a paid period lapses.
const DEACTIVATED_ON_EXPIRY: [ResourceType; 3] = [
    ResourceType::Agencies,
    ResourceType::Properties,
    ResourceType::Leases,
];

/// A second activation of the same plan inside this window is refused.
pub const DEFAULT_ACTIVATION_WINDOW_MINUTES: i64 = 5;

static SUBSCRIPTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static BILLING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> SubscriptionId {
    let id = SUBSCRIPTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubscriptionId(format!("sub-{id:06}"))
}

fn next_billing_id() -> BillingRecordId {
    let id = BILLING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BillingRecordId(format!("bill-{id:06}"))
}

/// Limit evaluation for one resource together with the plan it was checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub plan_name: String,
    #[serde(flatten)]
    pub limit: ResourceLimit,
    /// Set when the subscription lookup failed and free-tier caps were applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All capped resources of a user at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageOverview {
    pub user_id: UserId,
    pub plan: SubscriptionPlan,
    pub limits: Vec<ResourceLimit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    #[serde(default)]
    pub agency_id: Option<AgencyId>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub auto_renew: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeOutcome {
    pub operation: SubscriptionOperation,
    pub subscription: UserSubscription,
    pub plan: SubscriptionPlan,
    pub billing: BillingRecord,
    pub message: String,
}

/// Result of demoting one lapsed subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryOutcome {
    pub user_id: UserId,
    pub expired_subscription: SubscriptionId,
    pub expired_plan: PlanId,
    pub fallback_subscription: SubscriptionId,
    pub deactivated: BTreeMap<ResourceType, usize>,
}

impl ExpiryOutcome {
    pub fn total_deactivated(&self) -> usize {
        self.deactivated.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: Vec<ExpiryOutcome>,
    pub failures: usize,
}

/// Plan limits, plan changes and expiry handling on top of the storage traits.
pub struct SubscriptionService<S, I> {
    store: Arc<S>,
    inventory: Arc<I>,
    fallback_plan: SubscriptionPlan,
    activation_window: Duration,
}

impl<S, I> SubscriptionService<S, I>
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    pub fn new(store: Arc<S>, inventory: Arc<I>) -> Self {
        Self {
            store,
            inventory,
            fallback_plan: SubscriptionPlan::free_tier(),
            activation_window: Duration::minutes(DEFAULT_ACTIVATION_WINDOW_MINUTES),
        }
    }

    pub fn with_activation_window(mut self, window: Duration) -> Self {
        self.activation_window = window;
        self
    }

    /// Replace the caps applied when no plan can be resolved.
    pub fn with_fallback_plan(mut self, plan: SubscriptionPlan) -> Self {
        self.fallback_plan = plan;
        self
    }

    pub fn fallback_plan(&self) -> &SubscriptionPlan {
        &self.fallback_plan
    }

    pub fn plans(&self) -> Result<Vec<SubscriptionPlan>, SubscriptionServiceError> {
        let mut plans = self.store.active_plans()?;
        plans.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(plans)
    }

    /// Active subscription joined with its plan. A dangling plan reference resolves to
    /// the fallback plan.
    pub fn current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ActiveSubscription>, SubscriptionServiceError> {
        let Some(subscription) = self.store.active_subscription(user_id)? else {
            return Ok(None);
        };

        let plan = match self.store.plan(&subscription.plan_id)? {
            Some(plan) => plan,
            None => {
                warn!(
                    user_id = %user_id.0,
                    plan_id = %subscription.plan_id.0,
                    "subscription references a missing plan, applying free tier"
                );
                self.fallback_plan.clone()
            }
        };

        Ok(Some(ActiveSubscription { subscription, plan }))
    }

    /// Plan whose caps apply to the user at `now`; never fails. A subscription whose
    /// period is over yields the free tier even before the sweep has demoted it.
    pub fn effective_plan(&self, user_id: &UserId, now: DateTime<Utc>) -> SubscriptionPlan {
        self.resolve_plan(user_id, now).0
    }

    fn resolve_plan(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> (SubscriptionPlan, Option<String>) {
        let lookup = self.current_subscription(user_id).and_then(|current| match current {
            Some(active) if active.subscription.is_expired(now) => {
                debug!(
                    user_id = %user_id.0,
                    subscription_id = %active.subscription.id.0,
                    "subscription period over, applying free tier"
                );
                self.free_plan()
            }
            Some(active) => Ok(active.plan),
            None => Ok(self.fallback_plan.clone()),
        });

        match lookup {
            Ok(plan) => (plan, None),
            Err(err) => {
                warn!(user_id = %user_id.0, error = %err, "subscription lookup failed, applying free tier");
                (
                    self.fallback_plan.clone(),
                    Some(format!("failed to check limit: {err}")),
                )
            }
        }
    }

    pub fn check_resource_limit(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        agency_id: Option<&AgencyId>,
        now: DateTime<Utc>,
    ) -> Result<LimitCheck, SubscriptionServiceError> {
        let (plan, error) = self.resolve_plan(user_id, now);
        let current = self.inventory.count(user_id, resource, agency_id)?;
        let limit = ResourceLimit::evaluate(resource, current, plan.cap_for(resource));

        tracing::debug!(
            user_id = %user_id.0,
            %resource,
            current,
            max = %limit.max_allowed,
            allowed = limit.allowed,
            plan = %plan.name,
            "resource limit evaluated"
        );

        Ok(LimitCheck {
            plan_name: plan.name,
            limit,
            error,
        })
    }

    /// Gate used before creating a resource.
    pub fn ensure_can_create(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        agency_id: Option<&AgencyId>,
        now: DateTime<Utc>,
    ) -> Result<ResourceLimit, SubscriptionServiceError> {
        let check = self.check_resource_limit(user_id, resource, agency_id, now)?;
        if check.limit.allowed {
            Ok(check.limit)
        } else {
            Err(SubscriptionServiceError::LimitReached {
                resource,
                max: check.limit.max_allowed,
                plan: check.plan_name,
            })
        }
    }

    pub fn usage_overview(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<UsageOverview, SubscriptionServiceError> {
        let plan = self.effective_plan(user_id, now);
        let limits = ResourceType::ALL
            .into_iter()
            .map(|resource| {
                let current = self.inventory.count(user_id, resource, None)?;
                Ok(ResourceLimit::evaluate(
                    resource,
                    current,
                    plan.cap_for(resource),
                ))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(UsageOverview {
            user_id: user_id.clone(),
            plan,
            limits,
        })
    }

    /// Signup path: give the user the free tier unless something is already active.
    pub fn ensure_free_tier(
        &self,
        user_id: &UserId,
        agency_id: Option<AgencyId>,
        now: DateTime<Utc>,
    ) -> Result<UserSubscription, SubscriptionServiceError> {
        if let Some(existing) = self.store.active_subscription(user_id)? {
            return Ok(existing);
        }

        let plan = self.free_plan()?;
        let subscription = self.store.insert_subscription(UserSubscription {
            id: next_subscription_id(),
            user_id: user_id.clone(),
            agency_id,
            plan_id: plan.id,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: None,
            auto_renew: false,
            payment_method: None,
            created_at: now,
        })?;
        Ok(subscription)
    }

    /// Move the user onto `request.plan_id` and record the charge.
    ///
    /// An upgrade keeps the running period's end date. New subscriptions and renewals
    /// open a fresh period from `now`. Switching to the plan already running is refused,
    /// as is a second activation of the same plan inside the activation window. The
    /// previous row is retired with a status compare-and-set, so of two concurrent
    /// changes only the first succeeds.
    pub fn upgrade(
        &self,
        request: UpgradeRequest,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome, SubscriptionServiceError> {
        let UpgradeRequest {
            user_id,
            plan_id,
            agency_id,
            payment_method,
            auto_renew,
        } = request;

        let plan = self
            .store
            .plan(&plan_id)?
            .ok_or_else(|| SubscriptionServiceError::UnknownPlan(plan_id.0.clone()))?;
        if !plan.is_active {
            return Err(SubscriptionServiceError::InactivePlan(plan_id.0));
        }
        self.ensure_no_recent_activation(&user_id, &plan, now)?;

        let current = self.store.active_subscription(&user_id)?;
        let operation = SubscriptionOperation::determine(current.as_ref(), now);
        if operation == SubscriptionOperation::Upgrade
            && current.as_ref().is_some_and(|sub| sub.plan_id == plan.id)
        {
            return Err(SubscriptionServiceError::AlreadyOnPlan(plan.name));
        }

        let end_date = if plan.is_free_tier() {
            None
        } else {
            let kept = match operation {
                SubscriptionOperation::Upgrade => current.as_ref().and_then(|sub| sub.end_date),
                SubscriptionOperation::NewSubscription | SubscriptionOperation::Renewal => None,
            };
            Some(kept.unwrap_or_else(|| plan.billing_cycle.end_date(now)))
        };

        let inherited_agency = current.as_ref().and_then(|sub| sub.agency_id.clone());
        if let Some(previous) = current {
            let retired = match operation {
                SubscriptionOperation::Renewal => SubscriptionStatus::Expired,
                _ => SubscriptionStatus::Inactive,
            };
            if !self
                .store
                .transition_subscription(&previous.id, SubscriptionStatus::Active, retired)?
            {
                warn!(
                    user_id = %previous.user_id.0,
                    subscription_id = %previous.id.0,
                    "subscription changed concurrently, plan change aborted"
                );
                return Err(RepositoryError::Conflict.into());
            }
        }

        let subscription = self.store.insert_subscription(UserSubscription {
            id: next_subscription_id(),
            user_id,
            agency_id: agency_id.or(inherited_agency),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date,
            auto_renew: auto_renew.unwrap_or(true),
            payment_method,
            created_at: now,
        })?;

        let billing = self.store.record_billing(BillingRecord {
            id: next_billing_id(),
            user_id: subscription.user_id.clone(),
            agency_id: subscription.agency_id.clone(),
            subscription_id: subscription.id.clone(),
            plan_id: plan.id.clone(),
            amount: plan.price,
            payment_method: subscription.payment_method.clone(),
            description: format!("{} subscription ({})", plan.name, operation.as_str()),
            created_at: now,
        })?;

        let message = operation.summary(&plan.name, subscription.end_date);
        info!(
            user_id = %subscription.user_id.0,
            subscription_id = %subscription.id.0,
            plan = %plan.name,
            ?operation,
            "subscription plan changed"
        );

        Ok(UpgradeOutcome {
            operation,
            subscription,
            plan,
            billing,
            message,
        })
    }

    fn ensure_no_recent_activation(
        &self,
        user_id: &UserId,
        plan: &SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionServiceError> {
        let window_start = now - self.activation_window;
        let recent = self
            .store
            .billing_history(user_id)?
            .into_iter()
            .find(|record| record.plan_id == plan.id && record.created_at >= window_start);

        match recent {
            Some(record) => {
                let minutes_ago = (now - record.created_at).num_minutes().max(0);
                Err(SubscriptionServiceError::RecentActivation {
                    plan: plan.name.clone(),
                    minutes_ago,
                    retry_in_minutes: (self.activation_window.num_minutes() - minutes_ago).max(1),
                })
            }
            None => Ok(()),
        }
    }

    pub fn billing_history(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BillingRecord>, SubscriptionServiceError> {
        Ok(self.store.billing_history(user_id)?)
    }

    /// Session check: demote the user's subscription if its period is over.
    pub fn refresh_session(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExpiryOutcome>, SubscriptionServiceError> {
        match self.store.active_subscription(user_id)? {
            Some(subscription) if subscription.is_expired(now) => self.expire(subscription, now),
            _ => Ok(None),
        }
    }

    /// Expire every active subscription whose period ended by `now`.
    ///
    /// Failures on individual subscriptions are logged and counted.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, SubscriptionServiceError> {
        let due = self.store.active_ending_by(now)?;
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for subscription in due {
            let subscription_id = subscription.id.clone();
            match self.expire(subscription, now) {
                Ok(Some(outcome)) => report.expired.push(outcome),
                Ok(None) => {}
                Err(err) => {
                    warn!(subscription_id = %subscription_id.0, error = %err, "failed to expire subscription");
                    report.failures += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                expired = report.expired.len(),
                failures = report.failures,
                "subscription expiry sweep finished"
            );
        }

        Ok(report)
    }

    /// `None` when another caller already moved the row off `active`.
    fn expire(
        &self,
        subscription: UserSubscription,
        now: DateTime<Utc>,
    ) -> Result<Option<ExpiryOutcome>, SubscriptionServiceError> {
        let free_plan = self.free_plan()?;
        let UserSubscription {
            id: expired_subscription,
            plan_id: expired_plan,
            user_id,
            agency_id,
            ..
        } = subscription;

        if !self.store.transition_subscription(
            &expired_subscription,
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
        )? {
            debug!(subscription_id = %expired_subscription.0, "subscription already retired");
            return Ok(None);
        }

        let fallback = self.store.insert_subscription(UserSubscription {
            id: next_subscription_id(),
            user_id: user_id.clone(),
            agency_id,
            plan_id: free_plan.id.clone(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: None,
            auto_renew: false,
            payment_method: None,
            created_at: now,
        })?;

        let mut deactivated = BTreeMap::new();
        for resource in DEACTIVATED_ON_EXPIRY {
            let count = self.deactivate_excess(&user_id, resource, free_plan.cap_for(resource))?;
            deactivated.insert(resource, count);
        }

        info!(
            user_id = %user_id.0,
            expired_subscription = %expired_subscription.0,
            fallback_subscription = %fallback.id.0,
            "subscription expired, reverted to free tier"
        );

        Ok(Some(ExpiryOutcome {
            user_id,
            expired_subscription,
            expired_plan,
            fallback_subscription: fallback.id,
            deactivated,
        }))
    }

    /// Deactivate everything past the `cap` most recently created resources.
    fn deactivate_excess(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        cap: PlanCap,
    ) -> Result<usize, SubscriptionServiceError> {
        let PlanCap::Limited(max) = cap else {
            return Ok(0);
        };

        let mut active = self.inventory.active_resources(user_id, resource)?;
        if active.len() <= max as usize {
            return Ok(0);
        }

        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let excess: Vec<ResourceId> = active
            .into_iter()
            .skip(max as usize)
            .map(|owned| owned.id)
            .collect();

        self.inventory.deactivate(resource, &excess)?;
        Ok(excess.len())
    }

    fn free_plan(&self) -> Result<SubscriptionPlan, SubscriptionServiceError> {
        Ok(self
            .store
            .free_plan()?
            .unwrap_or_else(|| self.fallback_plan.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("plan '{0}' does not exist")]
    UnknownPlan(String),
    #[error("plan '{0}' is not open to new subscriptions")]
    InactivePlan(String),
    #[error("user already has plan {0} active")]
    AlreadyOnPlan(String),
    #[error(
        "plan {plan} was activated {minutes_ago} minute(s) ago, retry in {retry_in_minutes} minute(s)"
    )]
    RecentActivation {
        plan: String,
        minutes_ago: i64,
        retry_in_minutes: i64,
    },
    #[error("limit reached: plan {plan} allows at most {max} {resource}")]
    LimitReached {
        resource: ResourceType,
        max: PlanCap,
        plan: String,
    },
}
