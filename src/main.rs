use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use agent_paygate::api::ApiServer;
use agent_paygate::certificate::{CertificateIssuer, DEFAULT_POLICY_ID};
use agent_paygate::chain::{BlockfrostVerifier, DEFAULT_BLOCKFROST_BASE};
use agent_paygate::config::GatewayConfig;
use agent_paygate::coordinator::Coordinator;
use agent_paygate::executor::PipelineClient;
use agent_paygate::payments::PaymentServiceClient;

#[derive(Parser, Debug)]
#[clap(name = "agent-paygate")]
#[clap(about = "Payment-gated agent task gateway with on-chain proof verification")]
struct Args {
    #[clap(short, long, default_value = "8000")]
    port: u16,

    /// Address purchasers must pay
    #[clap(long, env = "SELLER_ADDRESS")]
    seller_address: Option<String>,

    /// Required payment in lovelace
    #[clap(long, env = "PAYMENT_AMOUNT", default_value = "10000000")]
    payment_amount: u64,

    #[clap(long, env = "BLOCKFROST_BASE", default_value = DEFAULT_BLOCKFROST_BASE)]
    blockfrost_url: String,

    #[clap(long, env = "BLOCKFROST_API_KEY")]
    blockfrost_key: String,

    #[clap(long, env = "PAYMENT_SERVICE_URL")]
    payment_service_url: String,

    #[clap(long, env = "PAYMENT_API_KEY")]
    payment_api_key: String,

    /// Task pipeline endpoint
    #[clap(long, env = "PIPELINE_URL")]
    pipeline_url: String,

    /// Fixed owner for completion certificates
    #[clap(long, env = "CERT_OWNER_ADDRESS")]
    cert_owner: Option<String>,

    #[clap(long, env = "MOCK_POLICY_ID", default_value = DEFAULT_POLICY_ID)]
    policy_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting agent-paygate");
    log::info!("Payment service: {}", args.payment_service_url);
    log::info!("Chain index: {}", args.blockfrost_url);
    log::info!("Pipeline: {}", args.pipeline_url);

    let verifier = Arc::new(BlockfrostVerifier::new(
        &args.blockfrost_url,
        &args.blockfrost_key,
    )?);

    let payments = Arc::new(PaymentServiceClient::new(
        &args.payment_service_url,
        &args.payment_api_key,
    )?);

    let executor = Arc::new(PipelineClient::new(&args.pipeline_url)?);

    let config = GatewayConfig {
        seller_address: args.seller_address,
        required_lovelace: args.payment_amount,
        cert_owner_address: args.cert_owner,
    };

    let coordinator = Arc::new(Coordinator::new(
        config,
        verifier,
        executor,
        payments,
        CertificateIssuer::new(args.policy_id),
    ));

    let app = ApiServer::new(coordinator).routes();

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    log::info!("API server listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
