use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use agent_paygate::api::ApiServer;
use agent_paygate::certificate::{CertificateIssuer, DEFAULT_POLICY_ID};
use agent_paygate::chain::{MatchingOutput, TxVerifier, Verification, VerificationDetails};
use agent_paygate::config::GatewayConfig;
use agent_paygate::coordinator::Coordinator;
use agent_paygate::executor::{ExecutionError, TaskExecutor, TaskOutcome, TaskPayload};
use agent_paygate::payments::{PaymentHandle, PaymentMonitor, PaymentStatus};

const SELLER: &str = "addr_test1qseller";
const REQUIRED: u64 = 10_000_000;

struct StubVerifier {
    received: u64,
}

#[async_trait]
impl TxVerifier for StubVerifier {
    async fn verify_pay_to_address(
        &self,
        _tx_hash: &str,
        seller_address: &str,
        min_lovelace: u64,
    ) -> Verification {
        Verification {
            ok: self.received >= min_lovelace,
            details: VerificationDetails {
                received: self.received,
                matching_outputs: vec![MatchingOutput {
                    address: seller_address.to_string(),
                    value: self.received,
                }],
                required: min_lovelace,
                error: None,
            },
        }
    }
}

struct StubExecutor;

#[async_trait]
impl TaskExecutor for StubExecutor {
    async fn execute(&self, payload: TaskPayload) -> Result<TaskOutcome, ExecutionError> {
        Ok(TaskOutcome::RawText(format!("done: {}", payload.text)))
    }
}

struct StubPayments;

#[async_trait]
impl PaymentMonitor for StubPayments {
    async fn create(&self, job_id: &str, _purchaser: &str) -> anyhow::Result<PaymentHandle> {
        Ok(PaymentHandle {
            payment_id: format!("pay-{}", job_id),
        })
    }

    async fn check_status(&self, _handle: &PaymentHandle) -> PaymentStatus {
        PaymentStatus::Pending
    }

    async fn complete(
        &self,
        _handle: &PaymentHandle,
        _proof: &serde_json::Value,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self, _handle: &PaymentHandle) {}
}

fn app_with_verifier(received: u64) -> Router {
    let coordinator = Arc::new(Coordinator::new(
        GatewayConfig {
            seller_address: Some(SELLER.to_string()),
            required_lovelace: REQUIRED,
            cert_owner_address: None,
        },
        Arc::new(StubVerifier { received }),
        Arc::new(StubExecutor),
        Arc::new(StubPayments),
        CertificateIssuer::new(DEFAULT_POLICY_ID),
    ));

    ApiServer::new(coordinator).routes()
}

fn app() -> Router {
    app_with_verifier(15_000_000)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn start_job(app: &Router, text: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/start_job",
            serde_json::json!({
                "identifier_from_purchaser": "purchaser-1",
                "input_data": { "text": text },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "pending_payment");
    assert_eq!(body["seller_address"], SELLER);
    assert_eq!(body["required_lovelace"], REQUIRED);
    body["job_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_and_availability_probes() {
    let app = app();

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");

    let response = app.clone().oneshot(get("/availability")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "available");
}

#[tokio::test]
async fn input_schema_describes_text_field() {
    let response = app().oneshot(get("/input_schema")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["input_data"][0]["id"], "text");
    assert_eq!(body["input_data"][0]["type"], "string");
}

#[tokio::test]
async fn start_job_with_empty_text_is_bad_request() {
    let response = app()
        .oneshot(post_json(
            "/start_job",
            serde_json::json!({
                "identifier_from_purchaser": "purchaser-1",
                "input_data": { "text": "" },
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("text"));
}

#[tokio::test]
async fn status_of_unknown_job_is_404() {
    let response = app()
        .oneshot(get("/status?job_id=no-such-job"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["detail"], "Job not found");
}

#[tokio::test]
async fn full_payment_gated_flow() {
    let app = app();
    let job_id = start_job(&app, "draft a reply to Alice").await;

    let response = app
        .clone()
        .oneshot(post(&format!(
            "/submit_tx?job_id={}&tx_hash=abc123",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["tx_hash"], "abc123");
    assert_eq!(body["verification"]["ok"], true);

    // execution runs in the background; poll until it lands
    let mut completed = None;
    for _ in 0..400 {
        let response = app
            .clone()
            .oneshot(get(&format!("/status?job_id={}", job_id)))
            .await
            .unwrap();
        let body = json_body(response).await;
        if body["status"] == "completed" {
            completed = Some(body);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let body = completed.expect("job never completed");
    assert_eq!(body["payment_status"], "completed");
    assert_eq!(body["result"], "done: draft a reply to Alice");
    assert_eq!(body["tx"]["tx_hash"], "abc123");
    assert_eq!(body["tx"]["verified"]["received"], 15_000_000);
}

#[tokio::test]
async fn insufficient_payment_is_reported_with_amounts() {
    let app = app_with_verifier(3_000_000);
    let job_id = start_job(&app, "do the thing").await;

    let response = app
        .clone()
        .oneshot(post(&format!(
            "/submit_tx?job_id={}&tx_hash=abc123",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["details"]["ok"], false);
    assert_eq!(body["details"]["details"]["received"], 3_000_000);
    assert_eq!(body["details"]["details"]["required"], REQUIRED);

    let response = app
        .clone()
        .oneshot(get(&format!("/status?job_id={}", job_id)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["payment_status"], "failed");
    assert!(body["result"].is_null());
}

#[tokio::test]
async fn duplicate_proof_submission_conflicts() {
    let app = app();
    let job_id = start_job(&app, "summarize this").await;

    let response = app
        .clone()
        .oneshot(post(&format!(
            "/submit_tx?job_id={}&tx_hash=abc123",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(&format!(
            "/submit_tx?job_id={}&tx_hash=def456",
            job_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_tx_for_unknown_job_is_404() {
    let response = app()
        .oneshot(post("/submit_tx?job_id=no-such-job&tx_hash=abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn force_run_bypasses_payment() {
    let response = app()
        .oneshot(post_json(
            "/force_run",
            serde_json::json!({
                "identifier_from_purchaser": "purchaser-1",
                "input_data": { "text": "quick check" },
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, "done: quick check");
}
