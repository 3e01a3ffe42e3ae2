/// Values the coordinator needs at runtime. Assembled from the CLI/env
/// arguments in `main` and injected, so tests can construct one directly.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address purchasers must pay. Absent means proof submission fails
    /// with a configuration error; job creation still works.
    pub seller_address: Option<String>,
    /// Minimum payment in lovelace.
    pub required_lovelace: u64,
    /// Fixed owner for issued certificates. Falls back to the paying
    /// address from the verified transaction when unset.
    pub cert_owner_address: Option<String>,
}
