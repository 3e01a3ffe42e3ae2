use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BLOCKFROST_BASE: &str = "https://cardano-preprod.blockfrost.io/api/v0";

/// Outcome of checking a transaction against the expected payment.
/// Verification failures are data, not errors: the coordinator records a
/// failed job instead of crashing, so this type has no `Err` side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub ok: bool,
    pub details: VerificationDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationDetails {
    pub received: u64,
    pub matching_outputs: Vec<MatchingOutput>,
    pub required: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingOutput {
    pub address: String,
    pub value: u64,
}

impl Verification {
    pub fn failure(required: u64, error: String) -> Self {
        Self {
            ok: false,
            details: VerificationDetails {
                required,
                error: Some(error),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
pub trait TxVerifier: Send + Sync {
    /// Confirm that `tx_hash` paid at least `min_lovelace` to `seller_address`.
    async fn verify_pay_to_address(
        &self,
        tx_hash: &str,
        seller_address: &str,
        min_lovelace: u64,
    ) -> Verification;
}

// Blockfrost /txs/{hash}/utxos response, trimmed to the fields we read.
#[derive(Debug, Deserialize)]
pub struct TxUtxos {
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Deserialize)]
pub struct TxOutput {
    pub address: String,
    #[serde(default)]
    pub amount: Vec<OutputAmount>,
}

#[derive(Debug, Deserialize)]
pub struct OutputAmount {
    pub unit: String,
    pub quantity: String,
}

/// Sum the lovelace sent to `seller_address` across all transaction outputs.
pub fn sum_matching_outputs(utxos: &TxUtxos, seller_address: &str) -> (u64, Vec<MatchingOutput>) {
    let mut received = 0u64;
    let mut matching = Vec::new();

    for out in &utxos.outputs {
        if out.address != seller_address {
            continue;
        }
        for amt in &out.amount {
            if amt.unit == "lovelace" {
                let value = amt.quantity.parse::<u64>().unwrap_or(0);
                received += value;
                matching.push(MatchingOutput {
                    address: out.address.clone(),
                    value,
                });
            }
        }
    }

    (received, matching)
}

/// Chain verifier backed by a Blockfrost-style UTXO index.
pub struct BlockfrostVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BlockfrostVerifier {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        // bounded timeout so a stalled index cannot stall proof submission
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch_utxos(&self, tx_hash: &str) -> Result<TxUtxos> {
        let url = format!("{}/txs/{}/utxos", self.base_url, tx_hash);

        let resp = self
            .client
            .get(&url)
            .header("project_id", &self.api_key)
            .send()
            .await
            .context("request to chain index failed")?
            .error_for_status()
            .context("chain index returned an error status")?;

        resp.json::<TxUtxos>()
            .await
            .context("invalid utxo payload from chain index")
    }
}

#[async_trait]
impl TxVerifier for BlockfrostVerifier {
    async fn verify_pay_to_address(
        &self,
        tx_hash: &str,
        seller_address: &str,
        min_lovelace: u64,
    ) -> Verification {
        let utxos = match self.fetch_utxos(tx_hash).await {
            Ok(utxos) => utxos,
            Err(e) => {
                log::error!("error fetching utxos for tx {}: {:#}", tx_hash, e);
                return Verification::failure(min_lovelace, format!("{e:#}"));
            }
        };

        let (received, matching_outputs) = sum_matching_outputs(&utxos, seller_address);

        Verification {
            ok: received >= min_lovelace,
            details: VerificationDetails {
                received,
                matching_outputs,
                required: min_lovelace,
                error: None,
            },
        }
    }
}
