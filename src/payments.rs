use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settlement status as reported by the external payment service.
/// `Unknown` and `Error` are local downgrades for unreadable or unreachable
/// responses; they never propagate as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Unknown,
    Error,
}

impl PaymentStatus {
    pub fn from_remote(status: &str) -> Self {
        match status {
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => {
                log::warn!("unrecognized payment status from service: {}", other);
                Self::Unknown
            }
        }
    }
}

/// Opaque reference to a tracking session on the payment service. Held by
/// the coordinator while a job is in flight and released at terminal status.
#[derive(Debug, Clone)]
pub struct PaymentHandle {
    pub payment_id: String,
}

#[async_trait]
pub trait PaymentMonitor: Send + Sync {
    /// Open a tracking session for a job. Best-effort: the caller logs and
    /// continues without a handle when this fails.
    async fn create(&self, job_id: &str, purchaser: &str) -> Result<PaymentHandle>;

    /// Latest settlement status. Must not propagate transport failures.
    async fn check_status(&self, handle: &PaymentHandle) -> PaymentStatus;

    /// Tell the service the payment is settled, with proof attached.
    async fn complete(&self, handle: &PaymentHandle, proof: &serde_json::Value) -> Result<()>;

    /// Release the tracking session. Idempotent.
    async fn stop(&self, handle: &PaymentHandle);
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedPayment {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentState {
    status: String,
}

/// HTTP client for the external payment-orchestration service.
pub struct PaymentServiceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PaymentServiceClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn payment_url(&self, payment_id: &str) -> String {
        format!("{}/payments/{}", self.base_url, payment_id)
    }
}

#[async_trait]
impl PaymentMonitor for PaymentServiceClient {
    async fn create(&self, job_id: &str, purchaser: &str) -> Result<PaymentHandle> {
        let resp = self
            .client
            .post(format!("{}/payments", self.base_url))
            .header("token", &self.api_key)
            .json(&serde_json::json!({
                "job_id": job_id,
                "identifier_from_purchaser": purchaser,
            }))
            .send()
            .await
            .context("payment service unreachable")?
            .error_for_status()
            .context("payment service rejected the request")?;

        let body: Envelope<CreatedPayment> = resp
            .json()
            .await
            .context("invalid payment creation payload")?;

        Ok(PaymentHandle {
            payment_id: body.data.id,
        })
    }

    async fn check_status(&self, handle: &PaymentHandle) -> PaymentStatus {
        let resp = self
            .client
            .get(self.payment_url(&handle.payment_id))
            .header("token", &self.api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("error checking payment status: {}", e);
                return PaymentStatus::Error;
            }
        };

        match resp.json::<Envelope<PaymentState>>().await {
            Ok(body) => PaymentStatus::from_remote(&body.data.status),
            Err(e) => {
                log::warn!("unreadable payment status payload: {}", e);
                PaymentStatus::Unknown
            }
        }
    }

    async fn complete(&self, handle: &PaymentHandle, proof: &serde_json::Value) -> Result<()> {
        self.client
            .post(format!("{}/complete", self.payment_url(&handle.payment_id)))
            .header("token", &self.api_key)
            .json(proof)
            .send()
            .await
            .context("payment service unreachable")?
            .error_for_status()
            .context("payment service rejected completion")?;

        Ok(())
    }

    async fn stop(&self, handle: &PaymentHandle) {
        // stopping an already-stopped session is a no-op, so any error here
        // is only worth a debug line
        let result = self
            .client
            .post(format!("{}/stop", self.payment_url(&handle.payment_id)))
            .header("token", &self.api_key)
            .send()
            .await;

        if let Err(e) = result {
            log::debug!("could not stop payment monitoring {}: {}", handle.payment_id, e);
        }
    }
}
