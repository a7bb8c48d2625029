use serde::{Deserialize, Serialize};

use super::plan::PlanCap;

/// Usage share at which a limit starts warning the user.
pub const WARNING_THRESHOLD_PCT: u32 = 80;

/// Resource families capped by subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Properties,
    Agencies,
    Leases,
    Users,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Properties,
        ResourceType::Agencies,
        ResourceType::Leases,
        ResourceType::Users,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceType::Properties => "properties",
            ResourceType::Agencies => "agencies",
            ResourceType::Leases => "leases",
            ResourceType::Users => "users",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "properties" | "property" => Some(Self::Properties),
            "agencies" | "agency" => Some(Self::Agencies),
            "leases" | "lease" => Some(Self::Leases),
            "users" | "user" => Some(Self::Users),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic-light reading of a limit for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitLevel {
    Healthy,
    Warning,
    Exhausted,
}

impl LimitLevel {
    pub const fn color(self) -> &'static str {
        match self {
            LimitLevel::Healthy => "green",
            LimitLevel::Warning => "yellow",
            LimitLevel::Exhausted => "red",
        }
    }
}

/// Derived view of one resource against the active plan. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimit {
    pub resource: ResourceType,
    pub allowed: bool,
    pub current_count: u32,
    pub max_allowed: PlanCap,
    pub percentage_used: u32,
}

impl ResourceLimit {
    pub fn evaluate(resource: ResourceType, current_count: u32, cap: PlanCap) -> Self {
        Self {
            resource,
            allowed: cap.admits(current_count),
            current_count,
            max_allowed: cap,
            percentage_used: usage_percentage(current_count, cap),
        }
    }

    pub fn level(&self) -> LimitLevel {
        limit_level(self.current_count, self.max_allowed)
    }

    pub fn status_text(&self) -> String {
        match self.max_allowed {
            PlanCap::Unlimited => format!("{} (unlimited)", self.current_count),
            PlanCap::Limited(max) => format!("{} / {}", self.current_count, max),
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        match self.max_allowed {
            PlanCap::Unlimited => None,
            PlanCap::Limited(max) => Some(max.saturating_sub(self.current_count)),
        }
    }
}

/// Rounded share of the cap in use. Unlimited caps read 0, a zero cap reads 100.
pub fn usage_percentage(current: u32, cap: PlanCap) -> u32 {
    match cap {
        PlanCap::Unlimited => 0,
        PlanCap::Limited(0) => 100,
        PlanCap::Limited(max) => {
            let pct = (f64::from(current) / f64::from(max) * 100.0).round();
            pct.min(f64::from(u32::MAX)) as u32
        }
    }
}

pub fn limit_level(current: u32, cap: PlanCap) -> LimitLevel {
    if cap.is_unlimited() {
        return LimitLevel::Healthy;
    }

    match usage_percentage(current, cap) {
        pct if pct >= 100 => LimitLevel::Exhausted,
        pct if pct >= WARNING_THRESHOLD_PCT => LimitLevel::Warning,
        _ => LimitLevel::Healthy,
    }
}
