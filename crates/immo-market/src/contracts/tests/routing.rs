use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::contracts::router::{contract_router, GENERATE_PATH, UPDATE_PATH};

fn post_json(path: &str, body: String) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request builds")
}

#[tokio::test]
async fn generator_route_returns_contract() {
    let (service, _) = build_service(Some(Arc::new(ScriptedGenerator::default())));
    let response = contract_router(service)
        .oneshot(post_json(GENERATE_PATH, draft_body().to_string()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["contract"]["status"], "draft");
    assert_eq!(body["contract"]["property_id"], "prop-11");
    assert_eq!(body["contract"]["start_date"], "2025-04-01");
}

#[tokio::test]
async fn generator_route_rejects_invalid_json() {
    let (service, _) = build_service(Some(Arc::new(ScriptedGenerator::default())));
    let response = contract_router(service)
        .oneshot(post_json(GENERATE_PATH, "{\"type\":".to_string()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn generator_route_reports_missing_key() {
    let (service, _) = build_service(None);
    let response = contract_router(service)
        .oneshot(post_json(GENERATE_PATH, draft_body().to_string()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn generator_route_maps_upstream_failure_to_bad_gateway() {
    let (service, _) = build_service(Some(Arc::new(FailingGenerator)));
    let response = contract_router(service)
        .oneshot(post_json(GENERATE_PATH, draft_body().to_string()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn update_route_accepts_editor_content_field() {
    let (service, _) = build_service(Some(Arc::new(ScriptedGenerator::default())));
    let router = contract_router(service);

    let created = router
        .clone()
        .oneshot(post_json(GENERATE_PATH, draft_body().to_string()))
        .await
        .expect("router responds");
    let created: Value = read_json(created).await;
    let id = created["contract"]["id"].as_str().expect("id").to_string();

    let response = router
        .oneshot(post_json(
            UPDATE_PATH,
            json!({ "id": id, "content": "<p>Final</p>", "status": "active" }).to_string(),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["contract"]["terms"], "<p>Final</p>");
    assert_eq!(body["contract"]["status"], "active");
}

#[tokio::test]
async fn update_route_returns_not_found_for_unknown_id() {
    let (service, _) = build_service(None);
    let response = contract_router(service)
        .oneshot(post_json(
            UPDATE_PATH,
            json!({ "id": "ctr-404", "status": "signed" }).to_string(),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
