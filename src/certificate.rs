use serde::{Deserialize, Serialize};

pub const DEFAULT_POLICY_ID: &str = "mockpolicy1234567890";

/// Placeholder completion certificate. No chain write happens; a real mint
/// would need key management and a minting policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub policy_id: String,
    pub token_name: String,
    pub owner: String,
    pub metadata: serde_json::Value,
}

/// Issues mock certificates. Pure and infallible: certificate issuance is a
/// bonus step and must never fail a completed job.
pub struct CertificateIssuer {
    policy_id: String,
}

impl CertificateIssuer {
    pub fn new(policy_id: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
        }
    }

    pub fn issue(&self, owner: &str, metadata: serde_json::Value) -> Certificate {
        let job_id = metadata
            .get("job_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let token_name = format!("Certificate-{}", job_id);

        log::info!(
            "(mock) minted certificate {}.{} for {}",
            self.policy_id,
            token_name,
            owner
        );

        Certificate {
            policy_id: self.policy_id.clone(),
            token_name,
            owner: owner.to_string(),
            metadata,
        }
    }
}
