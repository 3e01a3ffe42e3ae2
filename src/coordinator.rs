use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::certificate::{Certificate, CertificateIssuer};
use crate::chain::{TxVerifier, Verification, VerificationDetails};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::executor::{TaskExecutor, TaskOutcome, TaskPayload};
use crate::payments::{PaymentHandle, PaymentMonitor, PaymentStatus};

/// Job lifecycle. Moves forward only: AwaitingPayment -> Running ->
/// Completed or Failed. AwaitingPayment can also fail directly when
/// payment verification rejects the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    AwaitingPayment,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub payment_status: PaymentStatus,
    pub input: HashMap<String, String>,
    pub purchaser: String,
    pub tx_hash: Option<String>,
    pub verification: Option<VerificationDetails>,
    pub result: Option<TaskOutcome>,
    pub error: Option<String>,
    pub certificate: Option<Certificate>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInstructions {
    pub seller_address: Option<String>,
    pub required_lovelace: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobCreated {
    pub job_id: String,
    pub instructions: PaymentInstructions,
}

/// Synchronous outcome of a proof submission. Acceptance only means the
/// execution phase has been scheduled; completion is observed via status.
#[derive(Debug, Clone)]
pub enum ProofOutcome {
    Accepted {
        job_id: String,
        tx_hash: String,
        verification: Verification,
    },
    Rejected {
        verification: Verification,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TxRecord {
    pub tx_hash: String,
    pub verified: VerificationDetails,
}

/// Read view returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub payment_status: PaymentStatus,
    pub result: Option<serde_json::Value>,
    pub tx: Option<TxRecord>,
}

/// Owns the job registry and the transition rules. All mutation goes
/// through here; no lock is held across an adapter call.
pub struct Coordinator {
    config: GatewayConfig,
    verifier: Arc<dyn TxVerifier>,
    executor: Arc<dyn TaskExecutor>,
    payments: Arc<dyn PaymentMonitor>,
    certificates: CertificateIssuer,
    jobs: RwLock<HashMap<String, Job>>,
    handles: RwLock<HashMap<String, PaymentHandle>>,
}

impl Coordinator {
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<dyn TxVerifier>,
        executor: Arc<dyn TaskExecutor>,
        payments: Arc<dyn PaymentMonitor>,
        certificates: CertificateIssuer,
    ) -> Self {
        Self {
            config,
            verifier,
            executor,
            payments,
            certificates,
            jobs: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new job awaiting payment and return the out-of-band
    /// payment instructions.
    pub async fn create_job(
        &self,
        purchaser: String,
        input: HashMap<String, String>,
    ) -> Result<JobCreated, GatewayError> {
        let text = input.get("text").map(String::as_str).unwrap_or("");
        if text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "input_data must contain a non-empty text field".to_string(),
            ));
        }

        let truncated: String = if text.chars().count() > 100 {
            format!("{}...", text.chars().take(100).collect::<String>())
        } else {
            text.to_string()
        };
        log::info!("received job request with input: '{}'", truncated);

        let job_id = uuid::Uuid::new_v4().to_string();
        log::info!("starting job {}", job_id);

        let job = Job {
            id: job_id.clone(),
            status: JobStatus::AwaitingPayment,
            payment_status: PaymentStatus::Pending,
            input,
            purchaser: purchaser.clone(),
            tx_hash: None,
            verification: None,
            result: None,
            error: None,
            certificate: None,
            created_at: chrono::Utc::now().timestamp() as u64,
        };
        self.jobs.write().await.insert(job_id.clone(), job);

        // best-effort tracking session; a job without one just skips the
        // payment-status refresh on polls
        match self.payments.create(&job_id, &purchaser).await {
            Ok(handle) => {
                self.handles.write().await.insert(job_id.clone(), handle);
            }
            Err(e) => {
                log::warn!("could not open payment tracking for job {}: {:#}", job_id, e);
            }
        }

        Ok(JobCreated {
            job_id,
            instructions: PaymentInstructions {
                seller_address: self.config.seller_address.clone(),
                required_lovelace: self.config.required_lovelace,
            },
        })
    }

    /// Verify an on-chain payment proof. On success the execution phase is
    /// scheduled in the background and the call returns immediately; the
    /// job stays observable as AwaitingPayment until that task flips it to
    /// Running.
    pub async fn submit_tx_proof(
        self: Arc<Self>,
        job_id: &str,
        tx_hash: &str,
    ) -> Result<ProofOutcome, GatewayError> {
        let seller_address = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| GatewayError::NotFound(job_id.to_string()))?;

            if job.tx_hash.is_some() {
                return Err(GatewayError::ProofAlreadySubmitted(job_id.to_string()));
            }

            let seller_address = self.config.seller_address.clone().ok_or_else(|| {
                GatewayError::Configuration("SELLER_ADDRESS not configured on server".to_string())
            })?;

            // claim the hash slot before verifying so a racing submission
            // cannot pass the same check
            job.tx_hash = Some(tx_hash.to_string());
            seller_address
        };

        let verification = self
            .verifier
            .verify_pay_to_address(tx_hash, &seller_address, self.config.required_lovelace)
            .await;

        if !verification.ok {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = JobStatus::Failed;
                job.payment_status = PaymentStatus::Failed;
                job.error = Some(format!(
                    "payment verification failed: received {} of {} required lovelace",
                    verification.details.received, verification.details.required
                ));
            }
            log::warn!("payment verification failed for job {}", job_id);
            return Ok(ProofOutcome::Rejected { verification });
        }

        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(job_id) {
                job.payment_status = PaymentStatus::Completed;
                job.verification = Some(verification.details.clone());
            }
        }

        // payment is recorded; execution runs as its own unit of work and
        // outlives this request
        let coordinator = Arc::clone(&self);
        let spawn_job_id = job_id.to_string();
        let payment_ref = tx_hash.to_string();
        tokio::spawn(async move {
            coordinator
                .run_execution_phase(&spawn_job_id, &payment_ref)
                .await;
        });

        Ok(ProofOutcome::Accepted {
            job_id: job_id.to_string(),
            tx_hash: tx_hash.to_string(),
            verification,
        })
    }

    /// Background execution phase. Errors end up on the job record; the
    /// tracking handle is released on both paths.
    async fn run_execution_phase(self: Arc<Self>, job_id: &str, payment_ref: &str) {
        log::info!(
            "payment {} confirmed for job {}, executing task",
            payment_ref,
            job_id
        );

        let (payload, purchaser, paying_address) = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.get_mut(job_id) else {
                log::error!("execution phase for unknown job {}", job_id);
                return;
            };
            job.status = JobStatus::Running;

            let paying_address = job
                .verification
                .as_ref()
                .and_then(|v| v.matching_outputs.first())
                .map(|out| out.address.clone());

            (
                TaskPayload::from_input(&job.input),
                job.purchaser.clone(),
                paying_address,
            )
        };

        match self.executor.execute(payload).await {
            Ok(outcome) => {
                {
                    let mut jobs = self.jobs.write().await;
                    if let Some(job) = jobs.get_mut(job_id) {
                        job.status = JobStatus::Completed;
                        job.payment_status = PaymentStatus::Completed;
                        job.result = Some(outcome.clone());
                    }
                }
                log::info!("task completed for job {}", job_id);

                // best-effort: settle on the payment service
                if let Some(handle) = self.handle_for(job_id).await {
                    let proof = serde_json::json!({
                        "tx_hash": payment_ref,
                        "result": outcome.as_json(),
                    });
                    if let Err(e) = self.payments.complete(&handle, &proof).await {
                        log::warn!("could not complete payment for job {}: {:#}", job_id, e);
                    }
                }

                // best-effort: mock completion certificate
                let owner = self
                    .config
                    .cert_owner_address
                    .clone()
                    .or(paying_address)
                    .unwrap_or_else(|| "unknown".to_string());
                let metadata = serde_json::json!({
                    "job_id": job_id,
                    "identifier": purchaser,
                });
                let certificate = self.certificates.issue(&owner, metadata);
                {
                    let mut jobs = self.jobs.write().await;
                    if let Some(job) = jobs.get_mut(job_id) {
                        job.certificate = Some(certificate);
                    }
                }
            }
            Err(e) => {
                log::error!("task failed for job {}: {}", job_id, e);
                let mut jobs = self.jobs.write().await;
                if let Some(job) = jobs.get_mut(job_id) {
                    job.status = JobStatus::Failed;
                    job.error = Some(e.to_string());
                }
            }
        }

        // cleanup runs on both paths
        self.release_handle(job_id).await;
    }

    /// Current job state, refreshing the payment status from the monitor
    /// while a tracking session is still live.
    pub async fn job_status(&self, job_id: &str) -> Result<StatusView, GatewayError> {
        log::info!("checking status for job {}", job_id);

        if !self.jobs.read().await.contains_key(job_id) {
            log::warn!("job {} not found", job_id);
            return Err(GatewayError::NotFound(job_id.to_string()));
        }

        if let Some(handle) = self.handle_for(job_id).await {
            let status = self.payments.check_status(&handle).await;
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(job_id) {
                // a terminal transition owns its payment status; a poll
                // that raced the handle release must not clobber it
                if !job.status.is_terminal() {
                    job.payment_status = status;
                }
            }
        }

        let jobs = self.jobs.read().await;
        let job = jobs
            .get(job_id)
            .ok_or_else(|| GatewayError::NotFound(job_id.to_string()))?;

        Ok(StatusView {
            job_id: job.id.clone(),
            status: job.status,
            payment_status: job.payment_status,
            result: job.result.as_ref().map(TaskOutcome::as_json),
            tx: job
                .tx_hash
                .as_ref()
                .zip(job.verification.as_ref())
                .map(|(hash, verified)| TxRecord {
                    tx_hash: hash.clone(),
                    verified: verified.clone(),
                }),
        })
    }

    /// Run the pipeline directly, bypassing payment. Deployment smoke tests
    /// only.
    pub async fn force_run(
        &self,
        input: &HashMap<String, String>,
    ) -> Result<TaskOutcome, GatewayError> {
        let text = input.get("text").map(String::as_str).unwrap_or("");
        if text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "input_data must contain a non-empty text field".to_string(),
            ));
        }

        self.executor
            .execute(TaskPayload::from_input(input))
            .await
            .map_err(|e| GatewayError::Execution(e.to_string()))
    }

    async fn handle_for(&self, job_id: &str) -> Option<PaymentHandle> {
        self.handles.read().await.get(job_id).cloned()
    }

    async fn release_handle(&self, job_id: &str) {
        let handle = self.handles.write().await.remove(job_id);
        if let Some(handle) = handle {
            self.payments.stop(&handle).await;
        }
    }
}
