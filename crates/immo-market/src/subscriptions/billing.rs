use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Billing period attached to a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Quarterly,
    Semestrial,
    Yearly,
    Lifetime,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized billing cycle '{0}'")]
pub struct UnknownBillingCycle(pub String);

impl BillingCycle {
    pub const ALL: [BillingCycle; 6] = [
        BillingCycle::Weekly,
        BillingCycle::Monthly,
        BillingCycle::Quarterly,
        BillingCycle::Semestrial,
        BillingCycle::Yearly,
        BillingCycle::Lifetime,
    ];

    /// Strict parser for admin input. Accepts the stored aliases.
    pub fn try_from_label(raw: &str) -> Result<Self, UnknownBillingCycle> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "semestrial" | "semestriel" => Ok(Self::Semestrial),
            "yearly" | "annual" => Ok(Self::Yearly),
            "lifetime" => Ok(Self::Lifetime),
            _ => Err(UnknownBillingCycle(raw.to_string())),
        }
    }

    /// Lenient parser used for stored plans: anything unknown bills monthly.
    pub fn from_label(raw: &str) -> Self {
        Self::try_from_label(raw).unwrap_or_else(|err| {
            tracing::warn!(cycle = %err.0, "unknown billing cycle, billing monthly");
            Self::Monthly
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Semestrial => "semestrial",
            BillingCycle::Yearly => "yearly",
            BillingCycle::Lifetime => "lifetime",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BillingCycle::Weekly => "Weekly",
            BillingCycle::Monthly => "Monthly",
            BillingCycle::Quarterly => "Quarterly",
            BillingCycle::Semestrial => "Semestrial",
            BillingCycle::Yearly => "Yearly",
            BillingCycle::Lifetime => "Lifetime",
        }
    }

    /// Suffix appended to a displayed price, e.g. `15000 FCFA/month`.
    pub const fn price_suffix(self) -> &'static str {
        match self {
            BillingCycle::Weekly => "/week",
            BillingCycle::Monthly => "/month",
            BillingCycle::Quarterly => "/quarter",
            BillingCycle::Semestrial => "/6 months",
            BillingCycle::Yearly => "/year",
            BillingCycle::Lifetime => " (lifetime)",
        }
    }

    /// End of the period starting at `start`.
    ///
    /// Month arithmetic clamps to the last day of the target month, so a monthly
    /// period opened on January 31st of a leap year ends on February 29th. Lifetime
    /// plans run for one hundred years. Results past the representable range
    /// saturate at `DateTime::<Utc>::MAX_UTC`.
    pub fn end_date(self, start: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            BillingCycle::Weekly => start.checked_add_signed(Duration::days(7)),
            BillingCycle::Monthly => start.checked_add_months(Months::new(1)),
            BillingCycle::Quarterly => start.checked_add_months(Months::new(3)),
            BillingCycle::Semestrial => start.checked_add_months(Months::new(6)),
            BillingCycle::Yearly => start.checked_add_months(Months::new(12)),
            BillingCycle::Lifetime => start.checked_add_months(Months::new(12 * 100)),
        };
        end.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for BillingCycle {
    fn default() -> Self {
        Self::Monthly
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BillingCycle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}
