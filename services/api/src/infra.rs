use chrono::{DateTime, NaiveDate, Utc};
use immo_market::contracts::{ContractId, ContractRecord, ContractRepository, ContractUpdate};
use immo_market::subscriptions::{
    AgencyId, BillingCycle, BillingRecord, OwnedResource, PlanCap, PlanId, RepositoryError,
    ResourceCaps, ResourceId, ResourceInventory, ResourceType, SubscriptionId, SubscriptionPlan,
    SubscriptionStatus, SubscriptionStore, UserId, UserSubscription,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySubscriptionStore {
    plans: Arc<Mutex<HashMap<PlanId, SubscriptionPlan>>>,
    subscriptions: Arc<Mutex<Vec<UserSubscription>>>,
    billing: Arc<Mutex<Vec<BillingRecord>>>,
}

impl InMemorySubscriptionStore {
    pub(crate) fn with_plans(plans: Vec<SubscriptionPlan>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.plans.lock().expect("plan mutex poisoned");
            for plan in plans {
                guard.insert(plan.id.clone(), plan);
            }
        }
        store
    }

    pub(crate) fn subscriptions(&self) -> Vec<UserSubscription> {
        self.subscriptions
            .lock()
            .expect("subscription mutex poisoned")
            .clone()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn plan(&self, id: &PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let guard = self.plans.lock().expect("plan mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn free_plan(&self) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        let guard = self.plans.lock().expect("plan mutex poisoned");
        Ok(guard
            .values()
            .filter(|plan| plan.is_active && plan.is_free_tier())
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned())
    }

    fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        let guard = self.plans.lock().expect("plan mutex poisoned");
        Ok(guard.values().filter(|plan| plan.is_active).cloned().collect())
    }

    fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserSubscription>, RepositoryError> {
        let guard = self
            .subscriptions
            .lock()
            .expect("subscription mutex poisoned");
        Ok(guard
            .iter()
            .filter(|sub| &sub.user_id == user_id && sub.is_active())
            .max_by_key(|sub| sub.created_at)
            .cloned())
    }

    fn insert_subscription(
        &self,
        subscription: UserSubscription,
    ) -> Result<UserSubscription, RepositoryError> {
        let mut guard = self
            .subscriptions
            .lock()
            .expect("subscription mutex poisoned");
        if guard.iter().any(|existing| existing.id == subscription.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(subscription.clone());
        Ok(subscription)
    }

    fn transition_subscription(
        &self,
        id: &SubscriptionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self
            .subscriptions
            .lock()
            .expect("subscription mutex poisoned");
        match guard.iter_mut().find(|existing| &existing.id == id) {
            Some(slot) if slot.status == from => {
                slot.status = to;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn active_ending_by(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        let guard = self
            .subscriptions
            .lock()
            .expect("subscription mutex poisoned");
        Ok(guard
            .iter()
            .filter(|sub| sub.is_active() && sub.is_expired(cutoff))
            .cloned()
            .collect())
    }

    fn record_billing(&self, record: BillingRecord) -> Result<BillingRecord, RepositoryError> {
        let mut guard = self.billing.lock().expect("billing mutex poisoned");
        guard.push(record.clone());
        Ok(record)
    }

    fn billing_history(&self, user_id: &UserId) -> Result<Vec<BillingRecord>, RepositoryError> {
        let guard = self.billing.lock().expect("billing mutex poisoned");
        let mut records: Vec<BillingRecord> = guard
            .iter()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[derive(Debug, Clone)]
struct InventoryEntry {
    id: ResourceId,
    owner: UserId,
    resource: ResourceType,
    agency_id: Option<AgencyId>,
    created_at: DateTime<Utc>,
    active: bool,
}

static RESOURCE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Agencies, properties, leases and users owned by marketplace accounts.
#[derive(Default, Clone)]
pub(crate) struct InMemoryResourceInventory {
    entries: Arc<Mutex<Vec<InventoryEntry>>>,
}

impl InMemoryResourceInventory {
    pub(crate) fn record(
        &self,
        owner: &UserId,
        resource: ResourceType,
        agency_id: Option<AgencyId>,
        created_at: DateTime<Utc>,
    ) -> ResourceId {
        let id = RESOURCE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let id = ResourceId(format!("{}-{id:06}", resource.as_str()));
        let mut guard = self.entries.lock().expect("inventory mutex poisoned");
        guard.push(InventoryEntry {
            id: id.clone(),
            owner: owner.clone(),
            resource,
            agency_id,
            created_at,
            active: true,
        });
        id
    }
}

impl ResourceInventory for InMemoryResourceInventory {
    fn count(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        agency_id: Option<&AgencyId>,
    ) -> Result<u32, RepositoryError> {
        let guard = self.entries.lock().expect("inventory mutex poisoned");
        let count = guard
            .iter()
            .filter(|entry| entry.active && entry.resource == resource && &entry.owner == user_id)
            .filter(|entry| match agency_id {
                Some(agency) => entry.agency_id.as_ref() == Some(agency),
                None => true,
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn active_resources(
        &self,
        user_id: &UserId,
        resource: ResourceType,
    ) -> Result<Vec<OwnedResource>, RepositoryError> {
        let guard = self.entries.lock().expect("inventory mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| entry.active && entry.resource == resource && &entry.owner == user_id)
            .map(|entry| OwnedResource {
                id: entry.id.clone(),
                created_at: entry.created_at,
            })
            .collect())
    }

    fn deactivate(&self, resource: ResourceType, ids: &[ResourceId]) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("inventory mutex poisoned");
        for entry in guard.iter_mut() {
            if entry.resource == resource && ids.contains(&entry.id) {
                entry.active = false;
            }
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryContractRepository {
    records: Arc<Mutex<HashMap<ContractId, ContractRecord>>>,
}

impl ContractRepository for InMemoryContractRepository {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("contract mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("contract mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn apply(&self, update: &ContractUpdate) -> Result<ContractRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("contract mutex poisoned");
        let record = guard.get_mut(&update.id).ok_or(RepositoryError::NotFound)?;
        if let Some(terms) = &update.terms {
            record.terms = terms.clone();
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        Ok(record.clone())
    }
}

/// Catalog served when no CSV export is supplied.
pub(crate) fn default_plan_catalog() -> Vec<SubscriptionPlan> {
    vec![
        SubscriptionPlan::free_tier(),
        paid_plan(
            "starter",
            "Starter",
            5_000,
            BillingCycle::Monthly,
            ResourceCaps {
                max_properties: PlanCap::Limited(10),
                max_agencies: PlanCap::Limited(1),
                max_leases: PlanCap::Limited(20),
                max_users: PlanCap::Limited(2),
            },
            &["Listing boost", "Email support"],
        ),
        paid_plan(
            "pro",
            "Pro",
            15_000,
            BillingCycle::Monthly,
            ResourceCaps {
                max_properties: PlanCap::Limited(50),
                max_agencies: PlanCap::Limited(3),
                max_leases: PlanCap::Limited(100),
                max_users: PlanCap::Limited(10),
            },
            &["Contract generation", "Priority support"],
        ),
        paid_plan(
            "elite",
            "Elite",
            150_000,
            BillingCycle::Yearly,
            ResourceCaps {
                max_properties: PlanCap::Unlimited,
                max_agencies: PlanCap::Unlimited,
                max_leases: PlanCap::Unlimited,
                max_users: PlanCap::Limited(50),
            },
            &["Contract generation", "Dedicated account manager"],
        ),
    ]
}

fn paid_plan(
    id: &str,
    name: &str,
    price: u32,
    billing_cycle: BillingCycle,
    caps: ResourceCaps,
    features: &[&str],
) -> SubscriptionPlan {
    SubscriptionPlan {
        id: PlanId(id.to_string()),
        name: name.to_string(),
        price,
        billing_cycle,
        caps,
        features: features.iter().map(|feature| feature.to_string()).collect(),
        is_active: true,
        is_free: false,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp.with_timezone(&Utc));
    }
    parse_date(trimmed).map(|date| date.and_time(chrono::NaiveTime::default()).and_utc())
}

pub(crate) fn parse_billing_cycle(raw: &str) -> Result<BillingCycle, String> {
    BillingCycle::try_from_label(raw).map_err(|err| err.to_string())
}
