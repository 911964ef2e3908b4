// src/contracts/did_manager.rs
//! DIDManager smart contract interface implementation.
//!
//! Provides the ledger-backed [`IdentityOracle`]: existence, main public key
//! and full document lookups against the deployed `DIDManager` contract.
//! Every call is a read (`eth_call`); this service never sends transactions.

use crate::blockchain::ledger_client::{LedgerClient, QueryError};
use crate::models::did::{Did, DidDocument};
use crate::oracle::{IdentityOracle, OracleError};
use async_trait::async_trait;
use ethers_contract::BaseContract;
use ethers_core::abi::Abi;
use ethers_core::types::{Address, U256};
use log::{debug, error};
use std::str::FromStr;

const DID_MANAGER_ABI: &[u8] = include_bytes!("abi/DIDManager.json");

/// Return layout of `getDocument(string)`.
type DocumentTuple = (String, U256, String, String, String, String, String, String, Address);

/// Errors constructing the binding.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    #[error("invalid contract address `{0}`")]
    InvalidAddress(String),

    #[error("failed to load DIDManager ABI: {0}")]
    Abi(String),
}

/// DIDManager smart contract interface.
///
/// This struct provides high-level methods to read the DIDManager contract:
/// - DID status (active or not)
/// - Main public key
/// - Full DID document
pub struct DidManager {
    ledger: LedgerClient,
    address: Address,
    abi: BaseContract,
}

impl DidManager {
    /// Creates a new DidManager binding.
    ///
    /// # Arguments
    /// * `ledger` - Client for the chain the contract lives on
    /// * `contract_address` - Hex address of the deployed contract (with or without 0x prefix)
    pub fn new(ledger: LedgerClient, contract_address: &str) -> Result<Self, BindingError> {
        let address = Address::from_str(contract_address)
            .map_err(|_| BindingError::InvalidAddress(contract_address.to_string()))?;
        let abi = Abi::load(DID_MANAGER_ABI).map_err(|e| BindingError::Abi(e.to_string()))?;

        Ok(DidManager {
            ledger,
            address,
            abi: BaseContract::from(abi),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn query<R: ethers_core::abi::Detokenize>(
        &self,
        method: &str,
        did: &Did,
    ) -> Result<R, QueryError> {
        debug!("DIDManager.{}({})", method, did);
        let result = self
            .ledger
            .query_contract(self.address, &self.abi, method, did.as_str().to_owned())
            .await;
        if let Err(QueryError::Transport(e)) = &result {
            error!("DIDManager.{} failed at {}: {}", method, self.ledger.rpc_url(), e);
        }
        result
    }
}

#[async_trait]
impl IdentityOracle for DidManager {
    async fn exists(&self, did: &Did) -> Result<bool, OracleError> {
        // A revert here is not an answer about the DID, so it is not read as `false`.
        self.query::<bool>("getDidStatus", did)
            .await
            .map_err(|e| match e {
                QueryError::Abi(msg) => OracleError::Decode(msg),
                other => OracleError::Unavailable(other.to_string()),
            })
    }

    async fn public_key(&self, did: &Did) -> Result<String, OracleError> {
        match self.query::<String>("getMainPubKeyHex", did).await {
            Ok(key) if key.trim().is_empty() => Err(OracleError::NotFound),
            Ok(key) => Ok(key),
            Err(QueryError::Reverted(_)) => Err(OracleError::NotFound),
            Err(QueryError::Abi(msg)) => Err(OracleError::Decode(msg)),
            Err(QueryError::Transport(msg)) => Err(OracleError::Unavailable(msg)),
        }
    }

    async fn document(&self, did: &Did) -> Result<DidDocument, OracleError> {
        let (
            document_did,
            version,
            created_at,
            updated_at,
            main_public_key,
            reco_public_key,
            service_endpoint,
            did_proof,
            owner,
        ) = match self.query::<DocumentTuple>("getDocument", did).await {
            Ok(tuple) => tuple,
            Err(QueryError::Reverted(_)) => return Err(OracleError::NotFound),
            Err(QueryError::Abi(msg)) => return Err(OracleError::Decode(msg)),
            Err(QueryError::Transport(msg)) => return Err(OracleError::Unavailable(msg)),
        };

        // Unregistered DIDs come back as the zero-valued struct.
        if document_did.is_empty() {
            return Err(OracleError::NotFound);
        }

        Ok(DidDocument {
            did: document_did,
            version: u64::try_from(version)
                .map_err(|_| OracleError::Decode(format!("document version {version} overflows u64")))?,
            created_at,
            updated_at,
            main_public_key,
            reco_public_key,
            service_endpoint,
            did_proof,
            owner: format!("0x{:x}", owner),
        })
    }
}
