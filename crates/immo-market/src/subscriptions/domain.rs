use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::{PlanId, SubscriptionPlan};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgencyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

/// Lifecycle state of a user subscription. Rows are only ever transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Expired,
}

impl SubscriptionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// A user's binding to a catalog plan for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub agency_id: Option<AgencyId>,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    /// Free-tier subscriptions have no end.
    pub end_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserSubscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// A period is over once its end instant has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end <= now)
    }

    /// Whole days left, rounded up. `None` when the subscription never ends.
    pub fn days_until_expiration(&self, now: DateTime<Utc>) -> Option<i64> {
        let end = self.end_date?;
        let remaining = end.signed_duration_since(now);
        let days = remaining.num_days();
        let partial = remaining - chrono::Duration::days(days);
        if partial > chrono::Duration::zero() {
            Some(days + 1)
        } else {
            Some(days)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingRecordId(pub String);

/// Settled charge written for every plan activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: BillingRecordId,
    pub user_id: UserId,
    pub agency_id: Option<AgencyId>,
    pub subscription_id: SubscriptionId,
    pub plan_id: PlanId,
    pub amount: u32,
    pub payment_method: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Active subscription joined with its plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSubscription {
    pub subscription: UserSubscription,
    pub plan: SubscriptionPlan,
}

/// Kind of plan change being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionOperation {
    NewSubscription,
    Upgrade,
    Renewal,
}

impl SubscriptionOperation {
    pub fn determine(current: Option<&UserSubscription>, now: DateTime<Utc>) -> Self {
        match current {
            None => Self::NewSubscription,
            Some(subscription) if subscription.is_expired(now) => Self::Renewal,
            Some(_) => Self::Upgrade,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SubscriptionOperation::NewSubscription => "new_subscription",
            SubscriptionOperation::Upgrade => "upgrade",
            SubscriptionOperation::Renewal => "renewal",
        }
    }

    pub fn summary(self, plan_name: &str, end_date: Option<DateTime<Utc>>) -> String {
        let until = end_date
            .map(|end| format!(" until {}", end.format("%Y-%m-%d")))
            .unwrap_or_default();
        match self {
            SubscriptionOperation::Upgrade => {
                format!("Upgraded to {plan_name}; the current period is kept.")
            }
            SubscriptionOperation::NewSubscription => {
                format!("Subscription {plan_name} activated{until}.")
            }
            SubscriptionOperation::Renewal => format!("Renewed on {plan_name}{until}."),
        }
    }
}
