use thiserror::Error;

/// Caller-visible failures of the coordinator operations. Anything that
/// happens after a job has been accepted is recorded on the job itself and
/// surfaced through the status endpoint instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed job-creation input.
    #[error("{0}")]
    Validation(String),

    /// Unknown job id.
    #[error("Job not found")]
    NotFound(String),

    /// A transaction proof is already attached to the job.
    #[error("transaction proof already submitted for job {0}")]
    ProofAlreadySubmitted(String),

    /// Required server-side configuration is missing.
    #[error("{0}")]
    Configuration(String),

    /// Direct pipeline invocation failed (force-run path only).
    #[error("task execution failed: {0}")]
    Execution(String),
}
