use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use super::domain::NotificationRequest;
use super::gateway::{PushError, PushGateway};

pub const NOTIFY_PATH: &str = "/functions/v1/onesignal-notify";

/// Gateway handle; `None` when the OneSignal credentials are not configured.
pub type NotifyState = Option<Arc<dyn PushGateway>>;

pub fn notification_router(gateway: NotifyState) -> Router {
    Router::new()
        .route(NOTIFY_PATH, post(notify_handler))
        .with_state(gateway)
}

pub(crate) async fn notify_handler(
    State(gateway): State<NotifyState>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> Response {
    let Some(gateway) = gateway else {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Missing OneSignal environment variables",
        );
    };

    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let dispatch = match request.validate() {
        Ok(dispatch) => dispatch,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match gateway.send(&dispatch).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "success": true, "result": result })),
        )
            .into_response(),
        Err(PushError::Provider { status, details }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                Json(json!({ "error": "OneSignal error", "details": details })),
            )
                .into_response()
        }
        Err(other) => {
            tracing::error!(error = %other, "push dispatch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
