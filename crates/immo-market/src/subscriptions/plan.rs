use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::billing::BillingCycle;
use super::limits::ResourceType;

/// Identifier wrapper for catalog plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(pub String);

/// Identifier of the built-in free tier used when the catalog has none.
pub const FREE_PLAN_ID: &str = "free";

/// Maximum number of a resource a plan allows.
///
/// Stored and exchanged as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanCap {
    Limited(u32),
    Unlimited,
}

impl PlanCap {
    pub const UNLIMITED_SENTINEL: i64 = -1;

    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            Self::UNLIMITED_SENTINEL => Some(Self::Unlimited),
            value => u32::try_from(value).ok().map(Self::Limited),
        }
    }

    pub const fn as_raw(self) -> i64 {
        match self {
            PlanCap::Limited(max) => max as i64,
            PlanCap::Unlimited => Self::UNLIMITED_SENTINEL,
        }
    }

    pub const fn is_unlimited(self) -> bool {
        matches!(self, PlanCap::Unlimited)
    }

    /// Whether one more resource fits under the cap.
    pub const fn admits(self, current: u32) -> bool {
        match self {
            PlanCap::Limited(max) => current < max,
            PlanCap::Unlimited => true,
        }
    }
}

impl std::fmt::Display for PlanCap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanCap::Limited(max) => write!(f, "{max}"),
            PlanCap::Unlimited => f.write_str("Unlimited"),
        }
    }
}

impl Serialize for PlanCap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for PlanCap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Self::from_raw(raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "plan cap must be a non-negative integer or -1 for unlimited, found {raw}"
            ))
        })
    }
}

/// Per-resource caps of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCaps {
    pub max_properties: PlanCap,
    pub max_agencies: PlanCap,
    pub max_leases: PlanCap,
    pub max_users: PlanCap,
}

impl ResourceCaps {
    pub const fn cap_for(&self, resource: ResourceType) -> PlanCap {
        match resource {
            ResourceType::Properties => self.max_properties,
            ResourceType::Agencies => self.max_agencies,
            ResourceType::Leases => self.max_leases,
            ResourceType::Users => self.max_users,
        }
    }

    pub const fn free_tier() -> Self {
        Self {
            max_properties: PlanCap::Limited(1),
            max_agencies: PlanCap::Limited(1),
            max_leases: PlanCap::Limited(2),
            max_users: PlanCap::Limited(1),
        }
    }
}

/// Catalog entry describing a subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: PlanId,
    pub name: String,
    pub price: u32,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(flatten)]
    pub caps: ResourceCaps,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_free: bool,
}

fn default_true() -> bool {
    true
}

impl SubscriptionPlan {
    /// Caps applied when no plan can be resolved for a user.
    pub fn free_tier() -> Self {
        Self {
            id: PlanId(FREE_PLAN_ID.to_string()),
            name: "Free".to_string(),
            price: 0,
            billing_cycle: BillingCycle::Monthly,
            caps: ResourceCaps::free_tier(),
            features: vec![
                "1 agency".to_string(),
                "1 property".to_string(),
                "2 leases".to_string(),
                "1 user".to_string(),
                "Basic support".to_string(),
            ],
            is_active: true,
            is_free: true,
        }
    }

    pub fn is_free_tier(&self) -> bool {
        self.is_free || self.price == 0
    }

    pub fn cap_for(&self, resource: ResourceType) -> PlanCap {
        self.caps.cap_for(resource)
    }

    pub fn price_label(&self) -> String {
        if self.is_free_tier() {
            return "Free".to_string();
        }
        format!("{} FCFA{}", self.price, self.billing_cycle.price_suffix())
    }
}
