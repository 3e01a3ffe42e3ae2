use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::coordinator::{Coordinator, ProofOutcome};
use crate::error::GatewayError;

/// HTTP surface over the coordinator.
pub struct ApiServer {
    coordinator: Arc<Coordinator>,
}

impl ApiServer {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    pub fn routes(self) -> Router {
        Router::new()
            .route("/start_job", post(start_job))
            .route("/submit_tx", post(submit_tx))
            .route("/status", get(get_status))
            .route("/availability", get(availability))
            .route("/input_schema", get(input_schema))
            .route("/health", get(health))
            .route("/force_run", post(force_run))
            .layer(CorsLayer::permissive())
            .with_state(self.coordinator)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::ProofAlreadySubmitted(_) => StatusCode::CONFLICT,
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub identifier_from_purchaser: String,
    pub input_data: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct StartJobResponse {
    status: &'static str,
    job_id: String,
    message: &'static str,
    seller_address: Option<String>,
    required_lovelace: u64,
}

/// Initiate a job and return payment instructions.
async fn start_job(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<StartJobRequest>,
) -> Result<Json<StartJobResponse>, GatewayError> {
    let created = coordinator
        .create_job(req.identifier_from_purchaser, req.input_data)
        .await?;

    Ok(Json(StartJobResponse {
        status: "pending_payment",
        job_id: created.job_id,
        message: "Send the required payment to the seller address and POST /submit_tx with tx_hash",
        seller_address: created.instructions.seller_address,
        required_lovelace: created.instructions.required_lovelace,
    }))
}

#[derive(Debug, Deserialize)]
struct SubmitTxParams {
    job_id: String,
    tx_hash: String,
}

/// Submit a transaction hash as payment proof. Verification is synchronous;
/// on success the task execution is scheduled and "accepted" returned.
async fn submit_tx(
    State(coordinator): State<Arc<Coordinator>>,
    Query(params): Query<SubmitTxParams>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let outcome = coordinator
        .submit_tx_proof(&params.job_id, &params.tx_hash)
        .await?;

    let body = match outcome {
        ProofOutcome::Accepted {
            job_id,
            tx_hash,
            verification,
        } => serde_json::json!({
            "status": "accepted",
            "job_id": job_id,
            "tx_hash": tx_hash,
            "verification": verification,
        }),
        ProofOutcome::Rejected { verification } => serde_json::json!({
            "status": "failed",
            "details": verification,
        }),
    };

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct StatusParams {
    job_id: String,
}

async fn get_status(
    State(coordinator): State<Arc<Coordinator>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<crate::coordinator::StatusView>, GatewayError> {
    let view = coordinator.job_status(&params.job_id).await?;
    Ok(Json(view))
}

async fn availability() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "available",
        "type": "agent-paygate",
        "message": "Server operational.",
    }))
}

/// Declarative description of the accepted input fields.
async fn input_schema() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "input_data": [
            {
                "id": "text",
                "type": "string",
                "name": "Task Description",
                "data": {
                    "description": "The text input for the task",
                    "placeholder": "Enter your task description here",
                },
            }
        ]
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Run the pipeline without payment gating. Smoke-test endpoint.
async fn force_run(
    State(coordinator): State<Arc<Coordinator>>,
    Json(req): Json<StartJobRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let outcome = coordinator.force_run(&req.input_data).await?;
    Ok(Json(outcome.as_json()))
}
