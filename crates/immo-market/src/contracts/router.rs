use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use super::domain::{ContractDraftRequest, ContractUpdate};
use super::repository::ContractRepository;
use super::service::{ContractService, ContractServiceError};

pub const GENERATE_PATH: &str = "/functions/v1/contracts-generator";
pub const UPDATE_PATH: &str = "/functions/v1/contracts-update";

pub fn contract_router<R>(service: Arc<ContractService<R>>) -> Router
where
    R: ContractRepository + 'static,
{
    Router::new()
        .route(GENERATE_PATH, post(generate_handler::<R>))
        .route(UPDATE_PATH, post(update_handler::<R>))
        .with_state(service)
}

pub(crate) async fn generate_handler<R>(
    State(service): State<Arc<ContractService<R>>>,
    payload: Result<Json<ContractDraftRequest>, JsonRejection>,
) -> Response
where
    R: ContractRepository + 'static,
{
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "invalid contract draft body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    match service.generate(request, Utc::now()).await {
        Ok(contract) => (StatusCode::OK, Json(json!({ "contract": contract }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn update_handler<R>(
    State(service): State<Arc<ContractService<R>>>,
    payload: Result<Json<ContractUpdate>, JsonRejection>,
) -> Response
where
    R: ContractRepository + 'static,
{
    let Json(update) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    match service.update(update) {
        Ok(contract) => (StatusCode::OK, Json(json!({ "contract": contract }))).into_response(),
        Err(err) => service_error(err),
    }
}

fn service_error(err: ContractServiceError) -> Response {
    let status = match &err {
        ContractServiceError::InvalidDraft(_) => StatusCode::BAD_REQUEST,
        ContractServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ContractServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
        ContractServiceError::GeneratorNotConfigured | ContractServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "contract request failed");
    }
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
