// src/blockchain/ledger_client.rs
//! Read-only JSON-RPC client for the identity ledger.
//!
//! Wraps an ethers HTTP provider with a bounded request timeout and exposes
//! typed `eth_call` queries against a contract ABI.

use super::networks::{self, Network};
use ethers::providers::{Http, Middleware, Provider};
use ethers_contract::{BaseContract, Contract, ContractError};
use ethers_core::abi::{Detokenize, Tokenize};
use ethers_core::types::Address;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Failure of a single contract query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The endpoint could not be reached or answered with a transport error.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call reached the contract and the contract reverted.
    #[error("contract reverted: {0}")]
    Reverted(String),

    /// The call or its return value did not match the ABI.
    #[error("abi mismatch: {0}")]
    Abi(String),
}

/// Ledger client for contract reads.
///
/// This client provides:
/// - A shared HTTP provider with a request timeout
/// - Contract query functionality (`eth_call` only, nothing is ever signed)
/// - Chain id checks against the configured network
#[derive(Clone)]
pub struct LedgerClient {
    /// JSON-RPC provider
    provider: Arc<Provider<Http>>,
    rpc_url: String,
}

impl LedgerClient {
    /// Creates a new ledger client.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint URL
    /// * `timeout` - Upper bound on every HTTP request to the endpoint
    ///
    /// # Errors
    /// Returns error if the URL does not parse or the HTTP client cannot be built.
    /// No request is made here.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let url = reqwest::Url::parse(rpc_url)
            .map_err(|e| QueryError::Transport(format!("invalid RPC URL {rpc_url}: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        Ok(Self {
            provider: Arc::new(Provider::new(Http::new_with_client(url, http_client))),
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Chain id reported by the endpoint.
    pub async fn chain_id(&self) -> Result<u64, QueryError> {
        self.provider
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(|e| QueryError::Transport(e.to_string()))
    }

    /// Compares the endpoint's chain id with `network`.
    ///
    /// Returns `true` when they match. A mismatch or an unreachable endpoint
    /// is logged and reported as `false`; startup continues either way since
    /// every later read surfaces its own failure.
    pub async fn check_network(&self, network: &Network) -> bool {
        match self.chain_id().await {
            Ok(chain_id) if chain_id == network.chain_id => {
                info!("connected to {} (chain id {})", network.name, chain_id);
                true
            }
            Ok(chain_id) => {
                let actual = networks::by_chain_id(chain_id).map_or("an unknown network", |n| n.name);
                warn!(
                    "endpoint {} reports chain id {} ({}), expected {} for {}",
                    self.rpc_url, chain_id, actual, network.chain_id, network.name
                );
                false
            }
            Err(e) => {
                warn!("could not reach {} at {}: {}", network.name, self.rpc_url, e);
                false
            }
        }
    }

    /// Queries a smart contract (read-only operation).
    ///
    /// # Arguments
    /// * `address` - Address of the target contract
    /// * `abi` - Parsed contract ABI
    /// * `method` - Method name to call
    /// * `params` - Method parameters
    ///
    /// # Returns
    /// Decoded return value from the contract call
    pub async fn query_contract<R: Detokenize>(
        &self,
        address: Address,
        abi: &BaseContract,
        method: &str,
        params: impl Tokenize,
    ) -> Result<R, QueryError> {
        let contract = Contract::new(address, abi.clone(), self.provider.clone());

        contract
            .method::<_, R>(method, params)
            .map_err(|e| QueryError::Abi(e.to_string()))?
            .call()
            .await
            .map_err(classify)
    }
}

fn classify(err: ContractError<Provider<Http>>) -> QueryError {
    match err {
        ContractError::Revert(data) => QueryError::Reverted(data.to_string()),
        ContractError::DecodingError(e) => QueryError::Abi(e.to_string()),
        ContractError::DetokenizationError(e) => QueryError::Abi(e.to_string()),
        ContractError::AbiError(e) => QueryError::Abi(e.to_string()),
        other => QueryError::Transport(other.to_string()),
    }
}
