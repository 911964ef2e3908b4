// src/blockchain/networks.rs
//! Known EVM networks the identity ledger can be deployed on.

use log::warn;

/// A named network and its chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    /// Configuration key, e.g. `sepolia`
    pub key: &'static str,
    /// Human-readable name for logs
    pub name: &'static str,
    pub chain_id: u64,
    /// Public endpoint used when no RPC URL is configured. Only the local
    /// and mainnet entries have one; everything else must be configured.
    pub default_rpc_url: Option<&'static str>,
}

pub const HARDHAT: Network = Network {
    key: "hardhat",
    name: "Hardhat Local",
    chain_id: 31337,
    default_rpc_url: Some("http://localhost:8545"),
};

pub const NETWORKS: &[Network] = &[
    HARDHAT,
    Network {
        key: "mainnet",
        name: "Ethereum Mainnet",
        chain_id: 1,
        default_rpc_url: Some("https://mainnet.rpc.buidlguidl.com"),
    },
    Network {
        key: "sepolia",
        name: "Ethereum Sepolia",
        chain_id: 11_155_111,
        default_rpc_url: None,
    },
    Network {
        key: "arbitrum",
        name: "Arbitrum One",
        chain_id: 42_161,
        default_rpc_url: None,
    },
    Network {
        key: "arbitrumSepolia",
        name: "Arbitrum Sepolia",
        chain_id: 421_614,
        default_rpc_url: None,
    },
    Network {
        key: "optimism",
        name: "Optimism",
        chain_id: 10,
        default_rpc_url: None,
    },
    Network {
        key: "optimismSepolia",
        name: "Optimism Sepolia",
        chain_id: 11_155_420,
        default_rpc_url: None,
    },
    Network {
        key: "polygon",
        name: "Polygon",
        chain_id: 137,
        default_rpc_url: None,
    },
    Network {
        key: "polygonAmoy",
        name: "Polygon Amoy",
        chain_id: 80_002,
        default_rpc_url: None,
    },
];

pub fn by_key(key: &str) -> Option<&'static Network> {
    NETWORKS.iter().find(|n| n.key == key)
}

pub fn by_chain_id(chain_id: u64) -> Option<&'static Network> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Looks up `key`, falling back to the local Hardhat network with a warning.
pub fn resolve(key: &str) -> &'static Network {
    by_key(key).unwrap_or_else(|| {
        warn!("unknown network `{}`, falling back to {}", key, HARDHAT.name);
        &NETWORKS[0]
    })
}
