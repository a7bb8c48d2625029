use crate::infra::{
    default_plan_catalog, parse_billing_cycle, parse_instant, InMemoryResourceInventory,
    InMemorySubscriptionStore,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use immo_market::error::AppError;
use immo_market::subscriptions::{
    AgencyId, BillingCycle, PlanCap, PlanCatalogImporter, PlanId, ResourceLimit, ResourceType,
    SubscriptionPlan, SubscriptionService, SubscriptionServiceError, UpgradeRequest, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EndDateArgs {
    /// Period start (YYYY-MM-DD or RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// weekly, monthly, quarterly, semestrial, yearly or lifetime
    #[arg(long, value_parser = parse_billing_cycle, default_value = "monthly")]
    pub(crate) cycle: BillingCycle,
}

#[derive(Args, Debug)]
pub(crate) struct LimitCheckArgs {
    /// properties, agencies, leases or users
    #[arg(long, value_parser = parse_resource)]
    pub(crate) resource: ResourceType,
    /// Plan cap; -1 means unlimited
    #[arg(long, allow_hyphen_values = true, value_parser = parse_cap)]
    pub(crate) cap: PlanCap,
    /// Current number of resources
    #[arg(long)]
    pub(crate) count: u32,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PlanListArgs {
    /// CSV export to list instead of the built-in catalog
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Plan to upgrade to during the demo
    #[arg(long, default_value = "pro")]
    pub(crate) plan: String,
    /// Properties created while on the paid plan
    #[arg(long, default_value_t = 4)]
    pub(crate) properties: u32,
}

fn parse_resource(raw: &str) -> Result<ResourceType, String> {
    ResourceType::parse(raw).ok_or_else(|| {
        format!("unknown resource '{raw}', expected properties, agencies, leases or users")
    })
}

fn parse_cap(raw: &str) -> Result<PlanCap, String> {
    raw.parse::<i64>()
        .ok()
        .and_then(PlanCap::from_raw)
        .ok_or_else(|| format!("cap must be a non-negative integer or -1, got '{raw}'"))
}

pub(crate) fn run_end_date(args: EndDateArgs) -> Result<(), AppError> {
    let start = args.start.unwrap_or_else(Utc::now);
    let end = args.cycle.end_date(start);
    println!("Billing cycle: {} ({})", args.cycle.label(), args.cycle.as_str());
    println!("- start: {}", start.to_rfc3339());
    println!("- end:   {}", end.to_rfc3339());
    Ok(())
}

pub(crate) fn run_limit_check(args: LimitCheckArgs) -> Result<(), AppError> {
    let limit = ResourceLimit::evaluate(args.resource, args.count, args.cap);
    render_limit(&limit);
    Ok(())
}

pub(crate) fn run_plan_listing(args: PlanListArgs) -> Result<(), AppError> {
    let plans = match args.csv {
        Some(path) => PlanCatalogImporter::from_path(path)?,
        None => default_plan_catalog(),
    };
    println!("Plan catalog ({} plans)", plans.len());
    for plan in &plans {
        render_plan(plan);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemorySubscriptionStore::with_plans(default_plan_catalog()));
    let inventory = Arc::new(InMemoryResourceInventory::default());
    let service = SubscriptionService::new(store.clone(), inventory.clone());

    let user = UserId("demo-user".to_string());
    let agency = AgencyId("demo-agency".to_string());
    let signup = Utc::now() - Duration::days(45);

    println!("Subscription lifecycle demo");
    if let Err(err) = walk_through(&service, &inventory, &user, &agency, signup, &args) {
        println!("demo stopped: {err}");
    }

    println!("\nSubscription history:");
    for subscription in store.subscriptions() {
        println!(
            "- {} plan={} status={} end={}",
            subscription.id.0,
            subscription.plan_id.0,
            subscription.status.label(),
            subscription
                .end_date
                .map(|end| end.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }
    Ok(())
}

fn walk_through(
    service: &SubscriptionService<InMemorySubscriptionStore, InMemoryResourceInventory>,
    inventory: &InMemoryResourceInventory,
    user: &UserId,
    agency: &AgencyId,
    signup: DateTime<Utc>,
    args: &DemoArgs,
) -> Result<(), SubscriptionServiceError> {
    service.ensure_free_tier(user, Some(agency.clone()), signup)?;
    inventory.record(user, ResourceType::Agencies, Some(agency.clone()), signup);
    inventory.record(user, ResourceType::Properties, Some(agency.clone()), signup);
    println!("\n1. Signed up on the free plan");
    render_limit(&service.check_resource_limit(user, ResourceType::Properties, None, signup)?.limit);

    let upgraded_at = signup + Duration::days(1);
    let outcome = service.upgrade(
        UpgradeRequest {
            user_id: user.clone(),
            plan_id: PlanId(args.plan.clone()),
            agency_id: None,
            payment_method: Some("mobile_money".to_string()),
            auto_renew: Some(false),
        },
        upgraded_at,
    )?;
    println!("\n2. {}", outcome.message);

    for offset in 0..args.properties {
        let created = upgraded_at + Duration::hours(i64::from(offset) + 1);
        inventory.record(user, ResourceType::Properties, Some(agency.clone()), created);
    }
    render_limit(
        &service
            .check_resource_limit(user, ResourceType::Properties, None, upgraded_at)?
            .limit,
    );

    let now = Utc::now();
    println!("\n3. Expiry sweep at {}", now.format("%Y-%m-%d %H:%M"));
    let report = service.sweep_expired(now)?;
    if report.expired.is_empty() {
        println!("- nothing expired yet");
    }
    for expired in &report.expired {
        println!(
            "- {} left plan {}, {} resource(s) deactivated",
            expired.user_id.0,
            expired.expired_plan.0,
            expired.total_deactivated()
        );
    }
    render_limit(&service.check_resource_limit(user, ResourceType::Properties, None, now)?.limit);
    Ok(())
}

fn render_limit(limit: &ResourceLimit) {
    let level = limit.level();
    println!(
        "- {}: {} | {}% used | {} | {}",
        limit.resource,
        limit.status_text(),
        limit.percentage_used,
        level.color(),
        if limit.allowed {
            "can create more"
        } else {
            "limit reached"
        }
    );
}

fn render_plan(plan: &SubscriptionPlan) {
    println!(
        "- {} [{}] {} | properties {} | agencies {} | leases {} | users {}{}",
        plan.name,
        plan.id.0,
        plan.price_label(),
        plan.caps.max_properties,
        plan.caps.max_agencies,
        plan.caps.max_leases,
        plan.caps.max_users,
        if plan.is_active { "" } else { " (retired)" }
    );
}
