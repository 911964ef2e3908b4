// src/main.rs

//! # DID Authentication Service - Main Entry Point
//!
//! Initializes logging and configuration, connects to the identity ledger and
//! starts the API server.
//!
//! ## Environment Variables
//! - `JWT_SECRET`: HS256 secret for session credentials (required)
//! - `JWT_EXPIRES_IN`: credential lifetime (default: 24h)
//! - `PORT` / `BIND_ADDRESS`: listen address (default: 127.0.0.1:3001)
//! - `BLOCKCHAIN_NETWORK`: named network (default: hardhat)
//! - `BLOCKCHAIN_RPC_URL`: JSON-RPC endpoint (required for non-local networks)
//! - `DID_MANAGER_ADDRESS`: deployed DIDManager contract
//! - `DID_NAMESPACE`, `ORACLE_TIMEOUT_MS`, `CHALLENGE_TRACKING`, `CHALLENGE_TTL_SECS`

use anyhow::Context;
use did_auth::blockchain::ledger_client::LedgerClient;
use did_auth::contracts::did_manager::DidManager;
use did_auth::services::api_server::ApiServer;
use did_auth::settings::Settings;
use did_auth::AuthService;
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Connect to the configured network and check its chain id
/// 3. Bind the DIDManager contract and build the auth service
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("invalid configuration")?;
    let network = settings.network();
    let rpc_url = settings.rpc_url(network)?;
    info!("using {} (chain id {}) via {}", network.name, network.chain_id, rpc_url);

    let ledger = LedgerClient::new(&rpc_url, settings.oracle_timeout())
        .context("failed to initialize ledger client")?;
    ledger.check_network(network).await;

    let did_manager = DidManager::new(ledger, &settings.did_manager_address)
        .context("failed to bind DIDManager contract")?;
    info!("DIDManager at 0x{:x}", did_manager.address());

    let auth = AuthService::new(
        Arc::new(did_manager),
        settings.jwt_secret.as_bytes(),
        settings.auth_config()?,
    );

    let addr = settings.socket_addr()?;
    ApiServer::new(Arc::new(auth))
        .run(addr)
        .await
        .with_context(|| format!("API server on {addr} failed"))
}
