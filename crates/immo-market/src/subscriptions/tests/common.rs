use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::subscriptions::billing::BillingCycle;
use crate::subscriptions::domain::{
    AgencyId, BillingRecord, SubscriptionId, SubscriptionStatus, UserId, UserSubscription,
};
use crate::subscriptions::limits::ResourceType;
use crate::subscriptions::plan::{PlanCap, PlanId, ResourceCaps, SubscriptionPlan};
use crate::subscriptions::repository::{
    OwnedResource, RepositoryError, ResourceId, ResourceInventory, SubscriptionStore,
};
use crate::subscriptions::service::SubscriptionService;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn user() -> UserId {
    UserId("user-1".to_string())
}

pub(super) fn pro_plan() -> SubscriptionPlan {
    SubscriptionPlan {
        id: PlanId("pro".to_string()),
        name: "Pro".to_string(),
        price: 15_000,
        billing_cycle: BillingCycle::Monthly,
        caps: ResourceCaps {
            max_properties: PlanCap::Limited(5),
            max_agencies: PlanCap::Limited(2),
            max_leases: PlanCap::Limited(10),
            max_users: PlanCap::Limited(3),
        },
        features: vec!["Priority support".to_string()],
        is_active: true,
        is_free: false,
    }
}

pub(super) fn elite_plan() -> SubscriptionPlan {
    SubscriptionPlan {
        id: PlanId("elite".to_string()),
        name: "Elite".to_string(),
        price: 90_000,
        billing_cycle: BillingCycle::Yearly,
        caps: ResourceCaps {
            max_properties: PlanCap::Unlimited,
            max_agencies: PlanCap::Unlimited,
            max_leases: PlanCap::Unlimited,
            max_users: PlanCap::Limited(25),
        },
        features: Vec::new(),
        is_active: true,
        is_free: false,
    }
}

pub(super) fn retired_plan() -> SubscriptionPlan {
    SubscriptionPlan {
        id: PlanId("legacy".to_string()),
        name: "Legacy".to_string(),
        is_active: false,
        ..pro_plan()
    }
}

pub(super) fn subscription_on(
    plan: &SubscriptionPlan,
    id: &str,
    end_date: Option<DateTime<Utc>>,
) -> UserSubscription {
    let start = now() - Duration::days(20);
    UserSubscription {
        id: SubscriptionId(id.to_string()),
        user_id: user(),
        agency_id: Some(AgencyId("agency-1".to_string())),
        plan_id: plan.id.clone(),
        status: SubscriptionStatus::Active,
        start_date: start,
        end_date,
        auto_renew: true,
        payment_method: Some("mobile_money".to_string()),
        created_at: start,
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    plans: Mutex<HashMap<PlanId, SubscriptionPlan>>,
    subscriptions: Mutex<Vec<UserSubscription>>,
    billing: Mutex<Vec<BillingRecord>>,
}

impl MemoryStore {
    pub(super) fn with_catalog() -> Self {
        let store = Self::default();
        for plan in [
            SubscriptionPlan::free_tier(),
            pro_plan(),
            elite_plan(),
            retired_plan(),
        ] {
            store.add_plan(plan);
        }
        store
    }

    pub(super) fn add_plan(&self, plan: SubscriptionPlan) {
        self.plans
            .lock()
            .expect("plans mutex poisoned")
            .insert(plan.id.clone(), plan);
    }

    pub(super) fn seed(&self, subscription: UserSubscription) {
        self.subscriptions
            .lock()
            .expect("subscriptions mutex poisoned")
            .push(subscription);
    }

    pub(super) fn all(&self) -> Vec<UserSubscription> {
        self.subscriptions
            .lock()
            .expect("subscriptions mutex poisoned")
            .clone()
    }

    pub(super) fn by_id(&self, id: &str) -> Option<UserSubscription> {
        self.all().into_iter().find(|sub| sub.id.0 == id)
    }

    pub(super) fn active_rows(&self) -> Vec<UserSubscription> {
        self.all().into_iter().filter(|sub| sub.is_active()).collect()
    }

    pub(super) fn billing_rows(&self) -> Vec<BillingRecord> {
        self.billing.lock().expect("billing mutex poisoned").clone()
    }
}

impl SubscriptionStore for MemoryStore {
    fn plan(&self, id: &PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        Ok(self
            .plans
            .lock()
            .expect("plans mutex poisoned")
            .get(id)
            .cloned())
    }

    fn free_plan(&self) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        Ok(self
            .plans
            .lock()
            .expect("plans mutex poisoned")
            .values()
            .find(|plan| plan.is_active && plan.is_free_tier())
            .cloned())
    }

    fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        Ok(self
            .plans
            .lock()
            .expect("plans mutex poisoned")
            .values()
            .filter(|plan| plan.is_active)
            .cloned()
            .collect())
    }

    fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserSubscription>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|sub| &sub.user_id == user_id && sub.is_active())
            .max_by_key(|sub| sub.created_at))
    }

    fn insert_subscription(
        &self,
        subscription: UserSubscription,
    ) -> Result<UserSubscription, RepositoryError> {
        let mut guard = self
            .subscriptions
            .lock()
            .expect("subscriptions mutex poisoned");
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
            .expect("subscriptions mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| &existing.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if slot.status != from {
            return Ok(false);
        }
        slot.status = to;
        Ok(true)
    }

    fn active_ending_by(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|sub| sub.is_active() && sub.is_expired(cutoff))
            .collect())
    }

    fn record_billing(&self, record: BillingRecord) -> Result<BillingRecord, RepositoryError> {
        self.billing
            .lock()
            .expect("billing mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    fn billing_history(&self, user_id: &UserId) -> Result<Vec<BillingRecord>, RepositoryError> {
        let mut records: Vec<BillingRecord> = self
            .billing
            .lock()
            .expect("billing mutex poisoned")
            .iter()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// Store whose subscription reads fail.
pub(super) struct UnavailableStore;

impl SubscriptionStore for UnavailableStore {
    fn plan(&self, _id: &PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        Err(unavailable())
    }

    fn free_plan(&self) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        Err(unavailable())
    }

    fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        Err(unavailable())
    }

    fn active_subscription(
        &self,
        _user_id: &UserId,
    ) -> Result<Option<UserSubscription>, RepositoryError> {
        Err(unavailable())
    }

    fn insert_subscription(
        &self,
        _subscription: UserSubscription,
    ) -> Result<UserSubscription, RepositoryError> {
        Err(unavailable())
    }

    fn transition_subscription(
        &self,
        _id: &SubscriptionId,
        _from: SubscriptionStatus,
        _to: SubscriptionStatus,
    ) -> Result<bool, RepositoryError> {
        Err(unavailable())
    }

    fn active_ending_by(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        Err(unavailable())
    }

    fn record_billing(&self, _record: BillingRecord) -> Result<BillingRecord, RepositoryError> {
        Err(unavailable())
    }

    fn billing_history(&self, _user_id: &UserId) -> Result<Vec<BillingRecord>, RepositoryError> {
        Err(unavailable())
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("subscriptions table offline".to_string())
}

/// Store whose subscription queries answer from a snapshot taken earlier, the view
/// a caller has when another one changed the rows after its read.
pub(super) struct SnapshotStore {
    pub(super) inner: MemoryStore,
    snapshot: Mutex<Vec<UserSubscription>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self {
            inner: MemoryStore::with_catalog(),
            snapshot: Mutex::new(Vec::new()),
        }
    }
}

impl SnapshotStore {
    pub(super) fn take_snapshot(&self) {
        *self.snapshot.lock().expect("snapshot mutex poisoned") = self.inner.all();
    }

    fn snapshot(&self) -> Vec<UserSubscription> {
        self.snapshot
            .lock()
            .expect("snapshot mutex poisoned")
            .clone()
    }
}

impl SubscriptionStore for SnapshotStore {
    fn plan(&self, id: &PlanId) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        self.inner.plan(id)
    }

    fn free_plan(&self) -> Result<Option<SubscriptionPlan>, RepositoryError> {
        self.inner.free_plan()
    }

    fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, RepositoryError> {
        self.inner.active_plans()
    }

    fn active_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserSubscription>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|sub| &sub.user_id == user_id && sub.is_active())
            .max_by_key(|sub| sub.created_at))
    }

    fn insert_subscription(
        &self,
        subscription: UserSubscription,
    ) -> Result<UserSubscription, RepositoryError> {
        self.inner.insert_subscription(subscription)
    }

    fn transition_subscription(
        &self,
        id: &SubscriptionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, RepositoryError> {
        self.inner.transition_subscription(id, from, to)
    }

    fn active_ending_by(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<UserSubscription>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|sub| sub.is_active() && sub.is_expired(cutoff))
            .collect())
    }

    fn record_billing(&self, record: BillingRecord) -> Result<BillingRecord, RepositoryError> {
        self.inner.record_billing(record)
    }

    fn billing_history(&self, user_id: &UserId) -> Result<Vec<BillingRecord>, RepositoryError> {
        self.inner.billing_history(user_id)
    }
}

#[derive(Debug, Clone)]
pub(super) struct InventoryItem {
    pub(super) id: ResourceId,
    pub(super) user_id: UserId,
    pub(super) resource: ResourceType,
    pub(super) agency_id: Option<AgencyId>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) active: bool,
}

#[derive(Default)]
pub(super) struct MemoryInventory {
    items: Mutex<Vec<InventoryItem>>,
}

impl MemoryInventory {
    /// Adds `count` active resources, one day apart, the last created at `now()`.
    pub(super) fn add(&self, resource: ResourceType, count: usize) {
        let mut guard = self.items.lock().expect("inventory mutex poisoned");
        let offset = guard.len();
        for index in 0..count {
            guard.push(InventoryItem {
                id: ResourceId(format!("{}-{}", resource.as_str(), offset + index)),
                user_id: user(),
                resource,
                agency_id: Some(AgencyId("agency-1".to_string())),
                created_at: now() - Duration::days((count - index) as i64),
                active: true,
            });
        }
    }

    pub(super) fn active_ids(&self, resource: ResourceType) -> Vec<String> {
        self.items
            .lock()
            .expect("inventory mutex poisoned")
            .iter()
            .filter(|item| item.resource == resource && item.active)
            .map(|item| item.id.0.clone())
            .collect()
    }
}

impl ResourceInventory for MemoryInventory {
    fn count(
        &self,
        user_id: &UserId,
        resource: ResourceType,
        agency_id: Option<&AgencyId>,
    ) -> Result<u32, RepositoryError> {
        let count = self
            .items
            .lock()
            .expect("inventory mutex poisoned")
            .iter()
            .filter(|item| {
                &item.user_id == user_id
                    && item.resource == resource
                    && item.active
                    && agency_id.map_or(true, |agency| item.agency_id.as_ref() == Some(agency))
            })
            .count();
        Ok(count as u32)
    }

    fn active_resources(
        &self,
        user_id: &UserId,
        resource: ResourceType,
    ) -> Result<Vec<OwnedResource>, RepositoryError> {
        Ok(self
            .items
            .lock()
            .expect("inventory mutex poisoned")
            .iter()
            .filter(|item| &item.user_id == user_id && item.resource == resource && item.active)
            .map(|item| OwnedResource {
                id: item.id.clone(),
                created_at: item.created_at,
            })
            .collect())
    }

    fn deactivate(&self, resource: ResourceType, ids: &[ResourceId]) -> Result<(), RepositoryError> {
        let mut guard = self.items.lock().expect("inventory mutex poisoned");
        for item in guard
            .iter_mut()
            .filter(|item| item.resource == resource && ids.contains(&item.id))
        {
            item.active = false;
        }
        Ok(())
    }
}

pub(super) type MemoryService = SubscriptionService<MemoryStore, MemoryInventory>;

pub(super) fn build_service() -> (Arc<MemoryService>, Arc<MemoryStore>, Arc<MemoryInventory>) {
    let store = Arc::new(MemoryStore::with_catalog());
    let inventory = Arc::new(MemoryInventory::default());
    let service = Arc::new(SubscriptionService::new(store.clone(), inventory.clone()));
    (service, store, inventory)
}
