// src/settings.rs
//! Environment-driven configuration.
//!
//! Defaults are layered under the process environment (after `.env` has been
//! loaded by `main`). Variable names are the upper-case forms of the fields
//! below, e.g. `JWT_SECRET`, `BLOCKCHAIN_RPC_URL`.

use crate::blockchain::networks::{self, Network};
use crate::models::did::DEFAULT_NAMESPACE;
use crate::models::session::{InvalidTtl, SessionTtl};
use crate::services::auth_service::AuthConfig;
use config::{Config, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Address of the DIDManager contract on a fresh local Hardhat node.
pub const DEFAULT_DID_MANAGER_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error(transparent)]
    InvalidTtl(#[from] InvalidTtl),

    #[error("BLOCKCHAIN_RPC_URL must be set for network `{0}`")]
    MissingRpcUrl(String),

    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),
}

/// Service configuration.
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub bind_address: String,
    pub jwt_secret: String,
    /// Credential lifetime, `<n>{s,m,h,d}`
    pub jwt_expires_in: String,
    pub blockchain_network: String,
    pub blockchain_rpc_url: Option<String>,
    pub did_manager_address: String,
    pub did_namespace: String,
    pub oracle_timeout_ms: u64,
    pub challenge_tracking: bool,
    pub challenge_ttl_secs: u64,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("blockchain_network", &self.blockchain_network)
            .field("blockchain_rpc_url", &self.blockchain_rpc_url)
            .field("did_manager_address", &self.did_manager_address)
            .field("did_namespace", &self.did_namespace)
            .field("oracle_timeout_ms", &self.oracle_timeout_ms)
            .field("challenge_tracking", &self.challenge_tracking)
            .field("challenge_ttl_secs", &self.challenge_ttl_secs)
            .finish()
    }
}

fn with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("port", 3001)?
        .set_default("bind_address", "127.0.0.1")?
        .set_default("jwt_expires_in", "24h")?
        .set_default("blockchain_network", networks::HARDHAT.key)?
        .set_default("did_manager_address", DEFAULT_DID_MANAGER_ADDRESS)?
        .set_default("did_namespace", DEFAULT_NAMESPACE)?
        .set_default("oracle_timeout_ms", 5000)?
        .set_default("challenge_tracking", false)?
        .set_default("challenge_ttl_secs", 300)
}

impl Settings {
    /// Loads settings from the process environment over the defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let config = with_defaults()?
            .add_source(Environment::default().try_parsing(true))
            .build()?;
        config.try_deserialize::<Settings>()?.validated()
    }

    /// Builds settings from explicit key/value pairs over the defaults,
    /// ignoring the environment.
    pub fn from_overrides(pairs: &[(&str, &str)]) -> Result<Self, SettingsError> {
        let mut builder = with_defaults()?;
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize::<Settings>()?.validated()
    }

    fn validated(self) -> Result<Self, SettingsError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(SettingsError::MissingSecret);
        }
        self.session_ttl()?;
        self.socket_addr()?;
        Ok(self)
    }

    pub fn session_ttl(&self) -> Result<SessionTtl, SettingsError> {
        Ok(self.jwt_expires_in.parse()?)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| SettingsError::InvalidBindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The configured network, falling back to Hardhat for unknown names.
    pub fn network(&self) -> &'static Network {
        networks::resolve(&self.blockchain_network)
    }

    /// RPC endpoint: the configured URL, else the network's public default.
    pub fn rpc_url(&self, network: &Network) -> Result<String, SettingsError> {
        match self.blockchain_rpc_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => network
                .default_rpc_url
                .map(str::to_string)
                .ok_or_else(|| SettingsError::MissingRpcUrl(network.key.to_string())),
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn auth_config(&self) -> Result<AuthConfig, SettingsError> {
        Ok(AuthConfig {
            namespace: self.did_namespace.clone(),
            session_ttl: self.session_ttl()?,
            oracle_timeout: self.oracle_timeout(),
            challenge_ttl: self
                .challenge_tracking
                .then(|| Duration::from_secs(self.challenge_ttl_secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_deployment() {
        let settings = Settings::from_overrides(&[("jwt_secret", "s3cret")]).unwrap();

        assert_eq!(settings.socket_addr().unwrap().to_string(), "127.0.0.1:3001");
        assert_eq!(settings.session_ttl().unwrap().label(), "24h");
        assert_eq!(settings.network().chain_id, 31337);
        assert_eq!(settings.rpc_url(settings.network()).unwrap(), "http://localhost:8545");
        assert_eq!(settings.did_manager_address, DEFAULT_DID_MANAGER_ADDRESS);
        assert_eq!(settings.oracle_timeout(), Duration::from_secs(5));
        assert_eq!(settings.auth_config().unwrap().challenge_ttl, None);
    }

    #[test]
    fn secret_is_required() {
        assert!(Settings::from_overrides(&[]).is_err());
        assert!(matches!(
            Settings::from_overrides(&[("jwt_secret", "  ")]),
            Err(SettingsError::MissingSecret)
        ));
    }

    #[test]
    fn rejects_bad_ttl() {
        assert!(matches!(
            Settings::from_overrides(&[("jwt_secret", "s"), ("jwt_expires_in", "forever")]),
            Err(SettingsError::InvalidTtl(_))
        ));
    }

    #[test]
    fn remote_networks_need_an_rpc_url() {
        let settings = Settings::from_overrides(&[
            ("jwt_secret", "s"),
            ("blockchain_network", "sepolia"),
        ])
        .unwrap();
        assert!(matches!(
            settings.rpc_url(settings.network()),
            Err(SettingsError::MissingRpcUrl(_))
        ));

        let settings = Settings::from_overrides(&[
            ("jwt_secret", "s"),
            ("blockchain_network", "sepolia"),
            ("blockchain_rpc_url", "https://rpc.example.org"),
        ])
        .unwrap();
        assert_eq!(settings.rpc_url(settings.network()).unwrap(), "https://rpc.example.org");
    }

    #[test]
    fn challenge_tracking_is_opt_in() {
        let settings = Settings::from_overrides(&[
            ("jwt_secret", "s"),
            ("challenge_tracking", "true"),
            ("challenge_ttl_secs", "60"),
        ])
        .unwrap();
        assert_eq!(
            settings.auth_config().unwrap().challenge_ttl,
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let settings = Settings::from_overrides(&[("jwt_secret", "hunter2-hunter2")]).unwrap();
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
