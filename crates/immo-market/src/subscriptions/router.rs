use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{AgencyId, UserId};
use super::limits::ResourceType;
use super::plan::PlanId;
use super::repository::{RepositoryError, ResourceInventory, SubscriptionStore};
use super::service::{SubscriptionService, SubscriptionServiceError, UpgradeRequest};

/// Subscription endpoints. Every read of a user's subscription runs the expiry check.
pub fn subscription_router<S, I>(service: Arc<SubscriptionService<S, I>>) -> Router
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    Router::new()
        .route("/api/v1/plans", get(plans_handler::<S, I>))
        .route(
            "/api/v1/subscriptions/:user_id",
            get(current_handler::<S, I>),
        )
        .route(
            "/api/v1/subscriptions/:user_id/usage",
            get(usage_handler::<S, I>),
        )
        .route(
            "/api/v1/subscriptions/:user_id/limits/:resource",
            get(limit_handler::<S, I>),
        )
        .route(
            "/api/v1/subscriptions/:user_id/upgrade",
            post(upgrade_handler::<S, I>),
        )
        .route(
            "/api/v1/subscriptions/:user_id/billing",
            get(billing_handler::<S, I>),
        )
        .route(
            "/api/v1/subscriptions/:user_id/free-tier",
            post(free_tier_handler::<S, I>),
        )
        .route(
            "/api/v1/admin/subscriptions/sweep",
            post(sweep_handler::<S, I>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgencyQuery {
    #[serde(default)]
    agency_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpgradeBody {
    plan_id: PlanId,
    #[serde(default)]
    agency_id: Option<AgencyId>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    auto_renew: Option<bool>,
}

pub(crate) async fn plans_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    match service.plans() {
        Ok(plans) => {
            let plans: Vec<_> = plans
                .into_iter()
                .map(|plan| {
                    let price_label = plan.price_label();
                    json!({ "plan": plan, "price_label": price_label })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "plans": plans }))).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn current_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    let user_id = UserId(user_id);
    let now = Utc::now();

    let expired = match service.refresh_session(&user_id, now) {
        Ok(outcome) => outcome,
        Err(err) => return service_error(err),
    };

    match service.current_subscription(&user_id) {
        Ok(Some(active)) => {
            let days_left = active.subscription.days_until_expiration(now);
            let payload = json!({
                "subscription": active.subscription,
                "plan": active.plan,
                "days_until_expiration": days_left,
                "expired": expired,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(None) => {
            let payload = json!({
                "subscription": serde_json::Value::Null,
                "plan": service.fallback_plan(),
                "days_until_expiration": serde_json::Value::Null,
                "expired": expired,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn usage_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    match service.usage_overview(&UserId(user_id), Utc::now()) {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn limit_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path((user_id, resource)): Path<(String, String)>,
    Query(query): Query<AgencyQuery>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    let Some(resource) = ResourceType::parse(&resource) else {
        let payload = json!({
            "error": format!("unknown resource type '{resource}'"),
        });
        return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
    };

    let agency_id = query.agency_id.map(AgencyId);
    let user_id = UserId(user_id);
    match service.check_resource_limit(&user_id, resource, agency_id.as_ref(), Utc::now()) {
        Ok(check) => {
            let level = check.limit.level();
            let status_text = check.limit.status_text();
            let payload = json!({
                "check": check,
                "level": level,
                "color": level.color(),
                "status_text": status_text,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn upgrade_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpgradeBody>, JsonRejection>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            let payload = json!({ "error": rejection.body_text() });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let request = UpgradeRequest {
        user_id: UserId(user_id),
        plan_id: body.plan_id,
        agency_id: body.agency_id,
        payment_method: body.payment_method,
        auto_renew: body.auto_renew,
    };

    match service.upgrade(request, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn billing_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    match service.billing_history(&UserId(user_id)) {
        Ok(records) => (StatusCode::OK, Json(json!({ "billing": records }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn free_tier_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
    Path(user_id): Path<String>,
    Query(query): Query<AgencyQuery>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    let agency_id = query.agency_id.map(AgencyId);
    match service.ensure_free_tier(&UserId(user_id), agency_id, Utc::now()) {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn sweep_handler<S, I>(
    State(service): State<Arc<SubscriptionService<S, I>>>,
) -> Response
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
{
    match service.sweep_expired(Utc::now()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => service_error(err),
    }
}

fn service_error(err: SubscriptionServiceError) -> Response {
    let status = match &err {
        SubscriptionServiceError::UnknownPlan(_) => StatusCode::NOT_FOUND,
        SubscriptionServiceError::InactivePlan(_)
        | SubscriptionServiceError::AlreadyOnPlan(_) => StatusCode::CONFLICT,
        SubscriptionServiceError::RecentActivation { .. } => StatusCode::TOO_MANY_REQUESTS,
        SubscriptionServiceError::LimitReached { .. } => StatusCode::FORBIDDEN,
        SubscriptionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SubscriptionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        SubscriptionServiceError::Repository(RepositoryError::Unavailable(_)) => {
            tracing::error!(error = %err, "subscription storage unavailable");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
