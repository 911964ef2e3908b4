// src/services/auth_service.rs
//! Authentication service for the DID system.
//!
//! Orchestrates challenge issuance, the login protocol and session credential
//! verification/refresh. The service is stateless per request; the only shared
//! state is the oracle handle, the codec secret and, when enabled, the
//! challenge registry.
//!
//! Login steps run strictly in order and each failure is classified where it
//! happens:
//!
//! ```text
//! Idle -> InputValidated -> IdentityConfirmed -> SignatureVerified -> SessionIssued
//!   \___________________________ Failed(kind) ___________________________/
//! ```

use super::challenge_issuer::{Challenge, ChallengeIssuer};
use super::challenge_registry::{ChallengeRegistry, DEFAULT_MAX_ENTRIES};
use super::session_codec::{CodecError, SessionCodec};
use super::verifier;
use crate::error::{AuthError, ErrorKind};
use crate::models::did::{Did, DidDocument, DEFAULT_NAMESPACE};
use crate::models::session::{SessionClaims, SessionTtl, Subject, DID_AUTH_TYPE};
use crate::oracle::{IdentityOracle, OracleError};
use crate::utils::crypto::{validate_signature_format, CryptoError};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Minimum accepted challenge length, in characters.
pub const MIN_CHALLENGE_LEN: usize = 10;

/// Runtime options of the service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// DID method namespace accepted in `did:<namespace>:<uuid>`
    pub namespace: String,
    /// Lifetime of minted credentials
    pub session_ttl: SessionTtl,
    /// Upper bound on every oracle lookup
    pub oracle_timeout: Duration,
    /// Lifetime of tracked challenges. `None` disables challenge tracking,
    /// in which case any challenge text of sufficient length is signable.
    pub challenge_ttl: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            namespace: DEFAULT_NAMESPACE.to_string(),
            session_ttl: SessionTtl::default(),
            oracle_timeout: Duration::from_secs(5),
            challenge_ttl: None,
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub did: String,
    pub public_key: String,
    /// Configured lifetime label, e.g. `"24h"`
    pub expires_in: String,
    pub claims: SessionClaims,
}

/// Position of a login attempt in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    InputValidated,
    IdentityConfirmed,
    SignatureVerified,
    SessionIssued,
    Failed(ErrorKind),
}

impl LoginState {
    /// Whether `next` may directly follow `self`.
    pub fn can_advance_to(self, next: LoginState) -> bool {
        use LoginState::*;
        match (self, next) {
            (Idle, InputValidated)
            | (InputValidated, IdentityConfirmed)
            | (IdentityConfirmed, SignatureVerified)
            | (SignatureVerified, SessionIssued) => true,
            (SessionIssued, _) | (Failed(_), _) => false,
            (_, Failed(_)) => true,
            _ => false,
        }
    }
}

struct LoginAttempt {
    did: String,
    state: LoginState,
}

impl LoginAttempt {
    fn new(did: &str) -> Self {
        LoginAttempt {
            did: did.to_string(),
            state: LoginState::Idle,
        }
    }

    fn advance(&mut self, next: LoginState) {
        debug_assert!(self.state.can_advance_to(next), "{:?} -> {:?}", self.state, next);
        debug!("login {}: {:?} -> {:?}", self.did, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: &AuthError) {
        let next = LoginState::Failed(err.kind());
        if self.state.can_advance_to(next) {
            debug!("login {}: {:?} -> {:?}", self.did, self.state, next);
            self.state = next;
        }
    }
}

/// DID authentication service.
pub struct AuthService {
    oracle: Arc<dyn IdentityOracle>,
    codec: SessionCodec,
    issuer: ChallengeIssuer,
    challenges: Option<ChallengeRegistry>,
    config: AuthConfig,
}

impl AuthService {
    /// Creates a new service.
    ///
    /// # Arguments
    /// * `oracle` - Identity oracle every lookup goes through
    /// * `secret` - HS256 secret for session credentials
    /// * `config` - Runtime options
    pub fn new(oracle: Arc<dyn IdentityOracle>, secret: &[u8], config: AuthConfig) -> Self {
        let challenges = config
            .challenge_ttl
            .map(|ttl| ChallengeRegistry::new(ttl, DEFAULT_MAX_ENTRIES));
        if challenges.is_some() {
            info!("challenge tracking enabled");
        }

        AuthService {
            oracle,
            codec: SessionCodec::new(secret),
            issuer: ChallengeIssuer::new(),
            challenges,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Parses a DID in the configured namespace.
    pub fn parse_did(&self, raw: &str) -> Result<Did, AuthError> {
        Did::parse(raw, &self.config.namespace)
            .map_err(|e| AuthError::InvalidInput(format!("{raw:?}: {e}")))
    }

    /// Generates a login challenge for `did`.
    ///
    /// No oracle lookup is made: unregistered DIDs still receive a challenge
    /// and fail later at login.
    pub fn issue_challenge(&self, did: &str) -> Result<Challenge, AuthError> {
        let did = self.parse_did(did)?;
        let challenge = self.issuer.generate_challenge(&did);
        if let Some(registry) = &self.challenges {
            registry.record(&challenge);
        }
        debug!("issued challenge for {} (nonce {})", did, challenge.nonce);
        Ok(challenge)
    }

    /// Runs the login protocol.
    ///
    /// # Errors
    /// - `InvalidInput` for malformed DID, signature or challenge (no oracle call is made)
    /// - `ChallengeRejected` when tracking is on and the challenge is not outstanding
    /// - `UnknownIdentity` when the DID is not registered
    /// - `KeyUnavailable` when no usable key is registered
    /// - `SignatureMismatch` when the signer is not the registered key
    /// - `OracleUnavailable` when the ledger cannot answer in time
    pub async fn login(
        &self,
        did: &str,
        signature: &str,
        challenge: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let mut attempt = LoginAttempt::new(did);

        match self.run_login(&mut attempt, did, signature, challenge).await {
            Ok(outcome) => {
                info!("login succeeded for {}", outcome.did);
                Ok(outcome)
            }
            Err(err) => {
                attempt.fail(&err);
                warn!("login failed for {:?}: {}", did, err);
                Err(err)
            }
        }
    }

    async fn run_login(
        &self,
        attempt: &mut LoginAttempt,
        did: &str,
        signature: &str,
        challenge: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let did = self.validate_login_inputs(did, signature, challenge)?;
        attempt.advance(LoginState::InputValidated);

        if let Some(registry) = &self.challenges {
            registry
                .check(did.as_str(), challenge)
                .map_err(|r| AuthError::ChallengeRejected(r.to_string()))?;
        }

        if !self.identity_exists(&did).await? {
            return Err(AuthError::UnknownIdentity(did.into_string()));
        }
        attempt.advance(LoginState::IdentityConfirmed);

        let public_key = self.fetch_public_key(&did).await?;
        let verified = verifier::verify(challenge, signature, &public_key).map_err(|e| match e {
            CryptoError::InvalidPublicKeyFormat(reason) => AuthError::KeyUnavailable {
                did: did.to_string(),
                reason: format!("registered key is unusable: {reason}"),
            },
            CryptoError::InvalidSignatureFormat => AuthError::InvalidInput(e.to_string()),
        })?;
        if !verified {
            return Err(AuthError::SignatureMismatch {
                did: did.to_string(),
                reason: "recovered signer is not the registered key".into(),
            });
        }

        if let Some(registry) = &self.challenges {
            registry
                .consume(did.as_str(), challenge)
                .map_err(|r| AuthError::ChallengeRejected(r.to_string()))?;
        }
        attempt.advance(LoginState::SignatureVerified);

        let subject = Subject {
            did: did.into_string(),
            public_key,
        };
        let issued_at = chrono::Utc::now().timestamp();
        let expires_at = issued_at.saturating_add(self.config.session_ttl.as_secs());
        let outcome = self.issue_session(&subject, issued_at, expires_at)?;
        attempt.advance(LoginState::SessionIssued);
        Ok(outcome)
    }

    fn validate_login_inputs(
        &self,
        did: &str,
        signature: &str,
        challenge: &str,
    ) -> Result<Did, AuthError> {
        if did.is_empty() || signature.is_empty() || challenge.is_empty() {
            return Err(AuthError::InvalidInput(
                "did, signature and challenge are required".into(),
            ));
        }
        let did = self.parse_did(did)?;
        if !validate_signature_format(signature) {
            return Err(AuthError::InvalidInput(
                "signature must be 130 hex characters".into(),
            ));
        }
        if challenge.chars().count() < MIN_CHALLENGE_LEN {
            return Err(AuthError::InvalidInput(format!(
                "challenge must be at least {MIN_CHALLENGE_LEN} characters"
            )));
        }
        Ok(did)
    }

    /// Verifies a session credential and re-checks that its DID is still registered.
    pub async fn verify_credential(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let result = self.check_credential(token).await;
        if let Err(err) = &result {
            warn!("credential rejected: {}", err);
        }
        result
    }

    async fn check_credential(&self, token: &str) -> Result<SessionClaims, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidInput("token is required".into()));
        }

        let claims = self.codec.verify(token).map_err(|e| match e {
            CodecError::Expired => AuthError::Expired,
            CodecError::BadSignature | CodecError::Malformed(_) => {
                AuthError::MalformedCredential(e.to_string())
            }
            CodecError::Encoding(msg) => AuthError::Internal(msg),
        })?;

        if claims.credential_type != DID_AUTH_TYPE {
            return Err(AuthError::MalformedCredential(format!(
                "unexpected credential type {:?}",
                claims.credential_type
            )));
        }

        let did = Did::parse(&claims.did, &self.config.namespace)
            .map_err(|e| AuthError::MalformedCredential(format!("subject DID: {e}")))?;
        if !self.identity_exists(&did).await? {
            return Err(AuthError::IdentityRevoked(claims.did));
        }

        debug!("credential for {} verified", claims.did);
        Ok(claims)
    }

    /// Re-mints a valid credential for the same subject.
    ///
    /// The new credential is issued now and expires strictly after the old
    /// one, but never more than one second past `now + ttl`. A second refresh
    /// within the same second cannot satisfy both and is refused.
    pub async fn refresh_credential(&self, token: &str) -> Result<LoginOutcome, AuthError> {
        let claims = self.verify_credential(token).await?;
        let now = chrono::Utc::now().timestamp();
        let full_term = now.saturating_add(self.config.session_ttl.as_secs());
        let expires_at = full_term.max(claims.exp.saturating_add(1));

        if expires_at > full_term.saturating_add(1) {
            let err = AuthError::InvalidInput(format!(
                "credential for {} was already refreshed this second",
                claims.did
            ));
            warn!("refresh refused: {}", err);
            return Err(err);
        }

        let outcome = self.issue_session(&claims.subject(), now, expires_at)?;
        info!("credential refreshed for {}", outcome.did);
        Ok(outcome)
    }

    fn issue_session(
        &self,
        subject: &Subject,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<LoginOutcome, AuthError> {
        let (token, claims) = self
            .codec
            .mint_until(subject, issued_at, expires_at)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(LoginOutcome {
            token,
            did: subject.did.clone(),
            public_key: subject.public_key.clone(),
            expires_in: self.config.session_ttl.label().to_string(),
            claims,
        })
    }

    /// Whether `did` is registered and active.
    pub async fn identity_exists(&self, did: &Did) -> Result<bool, AuthError> {
        self.ask(self.oracle.exists(did))
            .await
            .map_err(|e| AuthError::OracleUnavailable(format!("existence of {did}: {e}")))
    }

    /// Registered main key of `did`, or `None` if the DID is not registered.
    pub async fn lookup_public_key(&self, did: &Did) -> Result<Option<String>, AuthError> {
        if !self.identity_exists(did).await? {
            return Ok(None);
        }
        self.fetch_public_key(did).await.map(Some)
    }

    /// Registered document of `did`, or `None` if the DID is not registered.
    pub async fn lookup_document(&self, did: &Did) -> Result<Option<DidDocument>, AuthError> {
        if !self.identity_exists(did).await? {
            return Ok(None);
        }
        match self.ask(self.oracle.document(did)).await {
            Ok(document) => Ok(Some(document)),
            Err(OracleError::NotFound) => Ok(None),
            Err(e) => Err(AuthError::OracleUnavailable(format!("document of {did}: {e}"))),
        }
    }

    async fn fetch_public_key(&self, did: &Did) -> Result<String, AuthError> {
        match self.ask(self.oracle.public_key(did)).await {
            Ok(key) => Ok(key),
            Err(OracleError::Unavailable(reason)) => Err(AuthError::OracleUnavailable(format!(
                "public key of {did}: {reason}"
            ))),
            Err(e) => Err(AuthError::KeyUnavailable {
                did: did.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn ask<T>(
        &self,
        lookup: impl Future<Output = Result<T, OracleError>>,
    ) -> Result<T, OracleError> {
        let limit = self.config.oracle_timeout;
        tokio::time::timeout(limit, lookup)
            .await
            .unwrap_or_else(|_| Err(OracleError::Unavailable(format!("no answer within {limit:?}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::memory::InMemoryRegistry;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::utils::hex;
    use k256::ecdsa::SigningKey;

    const DID: &str = "did:hebeu:7aa029b5-4eb2-4231-9651-1c8ebe39edc0";
    const SECRET: &[u8] = b"unit-test-secret";

    struct Holder {
        wallet: LocalWallet,
        public_key: String,
    }

    impl Holder {
        fn new() -> Self {
            let key = SigningKey::random(&mut rand::thread_rng());
            let public_key = hex::encode(key.verifying_key().to_encoded_point(false).as_bytes());
            Holder {
                wallet: LocalWallet::from(key),
                public_key,
            }
        }

        async fn sign(&self, message: &str) -> String {
            format!("0x{}", self.wallet.sign_message(message).await.unwrap())
        }
    }

    fn service_with(registry: Arc<InMemoryRegistry>, config: AuthConfig) -> AuthService {
        AuthService::new(registry, SECRET, config)
    }

    fn setup() -> (AuthService, Arc<InMemoryRegistry>, Holder) {
        let holder = Holder::new();
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register(DID, &holder.public_key);
        (service_with(registry.clone(), AuthConfig::default()), registry, holder)
    }

    async fn login(service: &AuthService, holder: &Holder) -> Result<LoginOutcome, AuthError> {
        let challenge = service.issue_challenge(DID).unwrap().message();
        let signature = holder.sign(&challenge).await;
        service.login(DID, &signature, &challenge).await
    }

    #[test]
    fn state_transitions_are_linear() {
        use LoginState::*;
        assert!(Idle.can_advance_to(InputValidated));
        assert!(SignatureVerified.can_advance_to(SessionIssued));
        assert!(!Idle.can_advance_to(SignatureVerified));
        assert!(IdentityConfirmed.can_advance_to(Failed(ErrorKind::SignatureMismatch)));
        assert!(!SessionIssued.can_advance_to(Failed(ErrorKind::Internal)));
        assert!(!Failed(ErrorKind::Expired).can_advance_to(Idle));
    }

    #[tokio::test]
    async fn login_with_registered_key_issues_credential() {
        let (service, _, holder) = setup();

        let outcome = login(&service, &holder).await.unwrap();
        assert_eq!(outcome.did, DID);
        assert_eq!(outcome.public_key, holder.public_key);
        assert_eq!(outcome.expires_in, "24h");
        assert_eq!(outcome.claims.exp - outcome.claims.iat, 86_400);
    }

    #[tokio::test]
    async fn login_with_foreign_key_is_mismatch() {
        let (service, _, _) = setup();
        let intruder = Holder::new();

        let err = login(&service, &intruder).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }

    #[tokio::test]
    async fn invalid_inputs_make_no_oracle_calls() {
        let (service, registry, holder) = setup();
        let challenge = service.issue_challenge(DID).unwrap().message();
        let signature = holder.sign(&challenge).await;
        let (s, c) = (signature.as_str(), challenge.as_str());

        let cases: [(&str, &str, &str); 5] = [
            ("", s, c),
            ("did:other:7aa029b5-4eb2-4231-9651-1c8ebe39edc0", s, c),
            ("did:hebeu:7aa029b5-4eb2-1231-9651-1c8ebe39edc0", s, c),
            (DID, "0x1234", c),
            (DID, s, "too short"),
        ];
        for (did, signature, challenge) in cases {
            let err = service.login(did, signature, challenge).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{did} {signature} {challenge}");
        }
        assert_eq!(registry.total_calls(), 0);
    }

    #[tokio::test]
    async fn unregistered_did_is_unknown_without_key_lookup() {
        let registry = Arc::new(InMemoryRegistry::new());
        let service = service_with(registry.clone(), AuthConfig::default());

        let err = login(&service, &Holder::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownIdentity);
        assert_eq!(registry.exists_calls(), 1);
        assert_eq!(registry.public_key_calls(), 0);
    }

    #[tokio::test]
    async fn missing_or_unusable_key_is_key_unavailable() {
        let registry = Arc::new(InMemoryRegistry::new());
        let service = service_with(registry.clone(), AuthConfig::default());
        let holder = Holder::new();

        registry.register(DID, "");
        assert_eq!(login(&service, &holder).await.unwrap_err().kind(), ErrorKind::KeyUnavailable);

        registry.register(DID, "04abcd");
        assert_eq!(login(&service, &holder).await.unwrap_err().kind(), ErrorKind::KeyUnavailable);
    }

    #[tokio::test]
    async fn oracle_outage_is_unavailable() {
        let (service, registry, holder) = setup();
        registry.set_available(false);

        assert_eq!(
            login(&service, &holder).await.unwrap_err().kind(),
            ErrorKind::OracleUnavailable
        );
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let holder = Holder::new();
        let registry = Arc::new(InMemoryRegistry::new().with_latency(Duration::from_millis(200)));
        registry.register(DID, &holder.public_key);
        let config = AuthConfig {
            oracle_timeout: Duration::from_millis(20),
            ..AuthConfig::default()
        };
        let service = service_with(registry, config);

        assert_eq!(
            login(&service, &holder).await.unwrap_err().kind(),
            ErrorKind::OracleUnavailable
        );
    }

    #[tokio::test]
    async fn verify_returns_claims_and_rechecks_registration() {
        let (service, registry, holder) = setup();
        let outcome = login(&service, &holder).await.unwrap();

        let claims = service.verify_credential(&outcome.token).await.unwrap();
        assert_eq!(claims, outcome.claims);

        registry.deactivate(DID);
        assert_eq!(
            service.verify_credential(&outcome.token).await.unwrap_err().kind(),
            ErrorKind::IdentityRevoked
        );
    }

    #[tokio::test]
    async fn verify_classifies_bad_tokens() {
        let (service, _, _) = setup();
        assert_eq!(
            service.verify_credential("").await.unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            service.verify_credential("a.b.c").await.unwrap_err().kind(),
            ErrorKind::MalformedCredential
        );

        let codec = SessionCodec::new(SECRET);
        let subject = Subject {
            did: DID.into(),
            public_key: "04ab".into(),
        };
        let ttl: SessionTtl = "1h".parse().unwrap();
        let (expired, _) = codec
            .mint_at(&subject, chrono::Utc::now().timestamp() - 7200, &ttl)
            .unwrap();
        assert_eq!(
            service.verify_credential(&expired).await.unwrap_err().kind(),
            ErrorKind::Expired
        );
    }

    #[tokio::test]
    async fn refresh_extends_expiry_for_same_subject() {
        let (service, _, holder) = setup();
        let first = login(&service, &holder).await.unwrap();

        let second = service.refresh_credential(&first.token).await.unwrap();
        assert_eq!(second.did, first.did);
        assert_eq!(second.public_key, first.public_key);
        assert!(second.claims.exp > first.claims.exp);
        assert_ne!(second.token, first.token);
    }

    #[tokio::test]
    async fn repeated_refresh_cannot_outrun_the_lifetime() {
        let (service, _, holder) = setup();
        let ttl = service.config().session_ttl.as_secs();
        let mut current = login(&service, &holder).await.unwrap();
        let mut refreshed = 0;

        for _ in 0..50 {
            match service.refresh_credential(&current.token).await {
                Ok(next) => {
                    let now = chrono::Utc::now().timestamp();
                    assert!(next.claims.iat <= now, "iat {} ahead of {}", next.claims.iat, now);
                    assert!(next.claims.exp <= now + ttl + 1);
                    assert!(next.claims.exp > current.claims.exp);
                    current = next;
                    refreshed += 1;
                }
                Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidInput),
            }
        }
        assert!(refreshed >= 1);
    }

    #[tokio::test]
    async fn refresh_of_expired_credential_fails() {
        let (service, _, _) = setup();
        let ttl: SessionTtl = "1h".parse().unwrap();
        let subject = Subject {
            did: DID.into(),
            public_key: "04ab".into(),
        };
        let (expired, _) = SessionCodec::new(SECRET)
            .mint_at(&subject, chrono::Utc::now().timestamp() - 7200, &ttl)
            .unwrap();

        assert_eq!(
            service.refresh_credential(&expired).await.unwrap_err().kind(),
            ErrorKind::Expired
        );
    }

    #[tokio::test]
    async fn tracked_challenge_is_single_use() {
        let holder = Holder::new();
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register(DID, &holder.public_key);
        let config = AuthConfig {
            challenge_ttl: Some(Duration::from_secs(60)),
            ..AuthConfig::default()
        };
        let service = service_with(registry.clone(), config);

        let challenge = service.issue_challenge(DID).unwrap().message();
        let signature = holder.sign(&challenge).await;
        assert!(service.login(DID, &signature, &challenge).await.is_ok());
        assert_eq!(
            service.login(DID, &signature, &challenge).await.unwrap_err().kind(),
            ErrorKind::ChallengeRejected
        );

        let forged = "DID Login Challenge\nDID: forged\nTimestamp: 1\nNonce: x".to_string();
        let signature = holder.sign(&forged).await;
        let calls = registry.total_calls();
        assert_eq!(
            service.login(DID, &signature, &forged).await.unwrap_err().kind(),
            ErrorKind::ChallengeRejected
        );
        assert_eq!(registry.total_calls(), calls);
    }

    #[tokio::test]
    async fn untracked_challenges_are_accepted_as_is() {
        let (service, _, holder) = setup();
        let challenge = "any challenge text the client chose";
        let signature = holder.sign(challenge).await;

        assert!(service.login(DID, &signature, challenge).await.is_ok());
        assert!(service.login(DID, &signature, challenge).await.is_ok());
    }

    #[tokio::test]
    async fn lookups_report_unregistered_as_none() {
        let (service, registry, holder) = setup();
        let did = service.parse_did(DID).unwrap();
        let other = service
            .parse_did("did:hebeu:11111111-1111-4111-8111-111111111111")
            .unwrap();

        assert_eq!(service.lookup_public_key(&did).await, Ok(Some(holder.public_key.clone())));
        assert_eq!(service.lookup_public_key(&other).await, Ok(None));
        assert_eq!(service.lookup_document(&other).await, Ok(None));
        assert_eq!(registry.public_key_calls(), 1);
    }
}
