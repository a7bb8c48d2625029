use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use immo_market::contracts::{contract_router, ContractRepository, ContractService};
use immo_market::notifications::{notification_router, NotifyState};
use immo_market::subscriptions::{
    subscription_router, BillingCycle, ResourceInventory, SubscriptionService, SubscriptionStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct EndDateRequest {
    pub(crate) start: DateTime<Utc>,
    #[serde(default)]
    pub(crate) cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndDateResponse {
    pub(crate) start: DateTime<Utc>,
    pub(crate) cycle: BillingCycle,
    pub(crate) label: &'static str,
    pub(crate) price_suffix: &'static str,
    pub(crate) end_date: DateTime<Utc>,
}

pub(crate) fn with_platform_routes<S, I, R>(
    subscriptions: Arc<SubscriptionService<S, I>>,
    contracts: Arc<ContractService<R>>,
    push: NotifyState,
) -> axum::Router
where
    S: SubscriptionStore + 'static,
    I: ResourceInventory + 'static,
    R: ContractRepository + 'static,
{
    subscription_router(subscriptions)
        .merge(contract_router(contracts))
        .merge(notification_router(push))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/billing/end-date",
            axum::routing::post(end_date_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Preview of a billing period, used by the checkout page.
pub(crate) async fn end_date_endpoint(
    Json(payload): Json<EndDateRequest>,
) -> Json<EndDateResponse> {
    let EndDateRequest { start, cycle } = payload;
    Json(EndDateResponse {
        start,
        cycle,
        label: cycle.label(),
        price_suffix: cycle.price_suffix(),
        end_date: cycle.end_date(start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        default_plan_catalog, InMemoryContractRepository, InMemoryResourceInventory,
        InMemorySubscriptionStore,
    };
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn platform_router(ready: bool) -> axum::Router {
        let store = Arc::new(InMemorySubscriptionStore::with_plans(default_plan_catalog()));
        let inventory = Arc::new(InMemoryResourceInventory::default());
        let subscriptions = Arc::new(SubscriptionService::new(store, inventory));
        let contracts = Arc::new(ContractService::new(
            Arc::new(InMemoryContractRepository::default()),
            None,
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_platform_routes(subscriptions, contracts, None).layer(Extension(state))
    }

    async fn status_of(router: axum::Router, request: Request<Body>) -> StatusCode {
        router
            .oneshot(request)
            .await
            .expect("router responds")
            .status()
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let request = || Request::get("/ready").body(Body::empty()).expect("request");
        assert_eq!(
            status_of(platform_router(false), request()).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(platform_router(true), request()).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn merged_routers_are_reachable() {
        let plans = Request::get("/api/v1/plans").body(Body::empty()).expect("request");
        assert_eq!(status_of(platform_router(true), plans).await, StatusCode::OK);

        let notify = Request::post("/functions/v1/onesignal-notify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"message":"hi","includedSegments":["All"]}"#))
            .expect("request");
        assert_eq!(
            status_of(platform_router(true), notify).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let health = Request::get("/health").body(Body::empty()).expect("request");
        assert_eq!(status_of(platform_router(true), health).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn end_date_endpoint_clamps_month_end() {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 31, 9, 0, 0)
            .single()
            .expect("valid start");
        let Json(body) = end_date_endpoint(Json(EndDateRequest {
            start,
            cycle: BillingCycle::Monthly,
        }))
        .await;

        assert_eq!(
            body.end_date,
            Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0)
                .single()
                .expect("valid end")
        );
        assert_eq!(body.price_suffix, "/month");
    }
}
