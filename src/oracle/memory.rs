// src/oracle/memory.rs
//! In-memory identity registry.
//!
//! Provides an [`IdentityOracle`] backed by a hashmap instead of the ledger,
//! for local development and tests. It mirrors the contract's observable
//! behaviour: deactivated DIDs report `exists == false` while their document
//! and key stay readable.

use super::{IdentityOracle, OracleError};
use crate::models::did::{Did, DidDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

struct Entry {
    document: DidDocument,
    active: bool,
}

/// Hashmap-backed identity registry.
///
/// This registry provides:
/// - Registration and deactivation of DIDs
/// - Per-operation call counters, so tests can assert which lookups happened
/// - Simulated outages and latency
///
/// # Note
/// Lookups are keyed on the exact DID string, as the contract does.
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    available: AtomicBool,
    latency: Option<Duration>,
    exists_calls: AtomicUsize,
    public_key_calls: AtomicUsize,
    document_calls: AtomicUsize,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        InMemoryRegistry {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency: None,
            exists_calls: AtomicUsize::new(0),
            public_key_calls: AtomicUsize::new(0),
            document_calls: AtomicUsize::new(0),
        }
    }

    /// Delays every lookup by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Registers `did` with `public_key` as its main key.
    ///
    /// # Behavior
    /// - Overwrites an existing registration for the same DID
    /// - Does not validate the key encoding, as the contract does not either
    pub fn register(&self, did: &str, public_key: &str) {
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.register_document(DidDocument {
            did: did.to_string(),
            version: 1,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            main_public_key: public_key.to_string(),
            reco_public_key: String::new(),
            service_endpoint: String::new(),
            did_proof: String::new(),
            owner: format!("0x{}", "0".repeat(40)),
        });
    }

    /// Registers a complete document, keyed on its `did`.
    pub fn register_document(&self, document: DidDocument) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            document.did.clone(),
            Entry {
                document,
                active: true,
            },
        );
    }

    /// Marks `did` inactive. Returns `false` if it was never registered.
    pub fn deactivate(&self, did: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(did) {
            Some(entry) => {
                entry.active = false;
                true
            }
            None => false,
        }
    }

    /// Makes every subsequent lookup fail with [`OracleError::Unavailable`] (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn public_key_calls(&self) -> usize {
        self.public_key_calls.load(Ordering::SeqCst)
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    /// Total lookups of any kind.
    pub fn total_calls(&self) -> usize {
        self.exists_calls() + self.public_key_calls() + self.document_calls()
    }

    async fn simulate_transport(&self) -> Result<(), OracleError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OracleError::Unavailable("in-memory registry offline".into()))
        }
    }

    fn read<T>(&self, did: &Did, f: impl FnOnce(Option<&Entry>) -> T) -> T {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        f(entries.get(did.as_str()))
    }
}

#[async_trait]
impl IdentityOracle for InMemoryRegistry {
    async fn exists(&self, did: &Did) -> Result<bool, OracleError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        Ok(self.read(did, |entry| entry.map_or(false, |e| e.active)))
    }

    async fn public_key(&self, did: &Did) -> Result<String, OracleError> {
        self.public_key_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        self.read(did, |entry| {
            entry
                .map(|e| e.document.main_public_key.clone())
                .filter(|key| !key.is_empty())
                .ok_or(OracleError::NotFound)
        })
    }

    async fn document(&self, did: &Did) -> Result<DidDocument, OracleError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_transport().await?;
        self.read(did, |entry| {
            entry
                .map(|e| e.document.clone())
                .ok_or(OracleError::NotFound)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::did::DEFAULT_NAMESPACE;

    const DID: &str = "did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0";

    fn did() -> Did {
        Did::parse(DID, DEFAULT_NAMESPACE).unwrap()
    }

    #[tokio::test]
    async fn unknown_did_does_not_exist() {
        let registry = InMemoryRegistry::new();
        assert_eq!(registry.exists(&did()).await, Ok(false));
        assert_eq!(registry.public_key(&did()).await, Err(OracleError::NotFound));
        assert_eq!(registry.exists_calls(), 1);
        assert_eq!(registry.public_key_calls(), 1);
    }

    #[tokio::test]
    async fn registered_did_exposes_key_and_document() {
        let registry = InMemoryRegistry::new();
        registry.register(DID, "02abcd");

        assert_eq!(registry.exists(&did()).await, Ok(true));
        assert_eq!(registry.public_key(&did()).await.unwrap(), "02abcd");
        let document = registry.document(&did()).await.unwrap();
        assert_eq!(document.did, DID);
        assert_eq!(document.main_public_key, "02abcd");
    }

    #[tokio::test]
    async fn deactivation_hides_existence_only() {
        let registry = InMemoryRegistry::new();
        registry.register(DID, "02abcd");
        assert!(registry.deactivate(DID));
        assert!(!registry.deactivate("did:hebeu:other"));

        assert_eq!(registry.exists(&did()).await, Ok(false));
        assert!(registry.public_key(&did()).await.is_ok());
    }

    #[tokio::test]
    async fn outage_is_not_reported_as_absence() {
        let registry = InMemoryRegistry::new();
        registry.register(DID, "02abcd");
        registry.set_available(false);

        assert!(matches!(registry.exists(&did()).await, Err(OracleError::Unavailable(_))));
        assert!(matches!(registry.public_key(&did()).await, Err(OracleError::Unavailable(_))));

        registry.set_available(true);
        assert_eq!(registry.exists(&did()).await, Ok(true));
        assert_eq!(registry.total_calls(), 3);
    }
}
