// src/services/api_server.rs
//! API Server for the DID authentication service
//!
//! This module provides the REST API interface for DID login and for read-only
//! DID lookups. Every response uses the same JSON envelope:
//!
//! ```json
//! { "success": true,  "message": "...", "data": { ... } }
//! { "success": false, "error": "<kind code>", "message": "<generic text>" }
//! ```
//!
//! The API is built using Axum and includes endpoints for:
//! - Challenge issuance, login, credential verification, refresh and logout
//! - DID status, public key and document lookups
//! - Batch DID existence checks
//! - Health checks

use crate::error::{AuthError, ErrorKind};
use crate::services::auth_service::AuthService;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Json, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::future::join_all;
use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound on handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Most DIDs accepted by one batch validation request.
pub const MAX_BATCH_DIDS: usize = 10;

/// `Retry-After` hint sent with transient failures, in seconds.
pub const RETRY_AFTER_SECS: u64 = 5;

const SERVICE_NAME: &str = "DID Authentication Backend";

// API request structures

/// Request payload for challenge issuance
#[derive(Deserialize, Default)]
#[serde(default)]
struct ChallengeRequest {
    #[serde(alias = "identity")]
    did: String,
}

/// Request payload for login
#[derive(Deserialize, Default)]
#[serde(default)]
struct LoginRequest {
    #[serde(alias = "identity")]
    did: String,
    signature: String,
    challenge: String,
}

/// Request payload carrying a session credential
#[derive(Deserialize, Default)]
#[serde(default)]
struct TokenRequest {
    token: String,
}

/// Request payload for batch DID validation
#[derive(Deserialize, Default)]
#[serde(default)]
struct ValidateRequest {
    dids: Vec<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let mut response = error_response(status_for(kind), kind.code(), kind.public_message());
        if kind.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownIdentity
        | ErrorKind::SignatureMismatch
        | ErrorKind::MalformedCredential
        | ErrorKind::Expired
        | ErrorKind::IdentityRevoked
        | ErrorKind::ChallengeRejected => StatusCode::UNAUTHORIZED,
        ErrorKind::KeyUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::OracleUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": code,
            "message": message,
        })),
    )
        .into_response()
}

fn success(message: &str, data: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

fn unregistered() -> Response {
    let kind = ErrorKind::UnknownIdentity;
    error_response(StatusCode::NOT_FOUND, kind.code(), kind.public_message())
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::InvalidInput(rejection.body_text()))
}

/// Main API server structure containing all service dependencies
#[derive(Clone)]
pub struct ApiServer {
    /// Authentication protocol service
    auth: Arc<AuthService>,
}

impl ApiServer {
    /// Creates a new API server instance
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }

    /// Builds the router with all API routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::health_handler))
            .route("/api/auth/challenge", post(Self::challenge_handler))
            .route("/api/auth/login", post(Self::login_handler))
            .route("/api/auth/verify", post(Self::verify_handler))
            .route("/api/auth/refresh", post(Self::refresh_handler))
            .route("/api/auth/logout", post(Self::logout_handler))
            .route("/api/did/validate", post(Self::validate_handler))
            .route("/api/did/:did/status", get(Self::status_handler))
            .route("/api/did/:did/public-key", get(Self::public_key_handler))
            .route("/api/did/:did/document", get(Self::document_handler))
            .fallback(Self::not_found_handler)
            .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .with_state(Arc::new(self.clone())) // Share the entire ApiServer state
    }

    /// Starts the API server on the specified address
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let app = self.router();

        // Create TCP listener
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("API server running at http://{}", listener.local_addr()?);
        info!("Available endpoints:");
        info!("- POST /api/auth/challenge");
        info!("- POST /api/auth/login");
        info!("- POST /api/auth/verify");
        info!("- POST /api/auth/refresh");
        info!("- POST /api/auth/logout");
        info!("- GET  /api/did/:did/status");
        info!("- GET  /api/did/:did/public-key");
        info!("- GET  /api/did/:did/document");
        info!("- POST /api/did/validate");
        info!("- GET  /health");

        // Start serving requests
        axum::serve(listener, app).await
    }

    // Handler implementations

    async fn health_handler() -> impl IntoResponse {
        Json(json!({
            "status": "ok",
            "timestamp": timestamp(),
            "service": SERVICE_NAME,
        }))
    }

    async fn not_found_handler() -> Response {
        error_response(StatusCode::NOT_FOUND, "not_found", "endpoint does not exist")
    }

    /// Handler for challenge issuance
    async fn challenge_handler(
        State(server): State<Arc<Self>>,
        payload: Result<Json<ChallengeRequest>, JsonRejection>,
    ) -> Result<Response, AuthError> {
        let request = body(payload)?;
        let challenge = server.auth.issue_challenge(&request.did)?;

        Ok(success(
            "challenge issued",
            json!({
                "challenge": challenge.message(),
                "did": challenge.did,
            }),
        ))
    }

    /// Handler for DID login
    async fn login_handler(
        State(server): State<Arc<Self>>,
        payload: Result<Json<LoginRequest>, JsonRejection>,
    ) -> Result<Response, AuthError> {
        let request = body(payload)?;
        let outcome = server
            .auth
            .login(&request.did, &request.signature, &request.challenge)
            .await?;

        Ok(success(
            "login succeeded",
            json!({
                "token": outcome.token,
                "did": outcome.did,
                "expiresIn": outcome.expires_in,
            }),
        ))
    }

    /// Handler for credential verification
    async fn verify_handler(
        State(server): State<Arc<Self>>,
        payload: Result<Json<TokenRequest>, JsonRejection>,
    ) -> Result<Response, AuthError> {
        let request = body(payload)?;
        let claims = server.auth.verify_credential(&request.token).await?;
        let data = serde_json::to_value(&claims).map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(success("credential is valid", data))
    }

    /// Handler for credential refresh
    async fn refresh_handler(
        State(server): State<Arc<Self>>,
        payload: Result<Json<TokenRequest>, JsonRejection>,
    ) -> Result<Response, AuthError> {
        let request = body(payload)?;
        let outcome = server.auth.refresh_credential(&request.token).await?;

        Ok(success(
            "credential refreshed",
            json!({
                "token": outcome.token,
                "expiresIn": outcome.expires_in,
            }),
        ))
    }

    /// Credentials are stateless; logout is the client discarding its token.
    async fn logout_handler() -> Response {
        debug!("logout acknowledged");
        success("logged out", json!({}))
    }

    /// Handler for DID status lookup
    async fn status_handler(
        State(server): State<Arc<Self>>,
        Path(did): Path<String>,
    ) -> Result<Response, AuthError> {
        let did = server.auth.parse_did(&did)?;
        let exists = server.auth.identity_exists(&did).await?;

        Ok(success(
            "status retrieved",
            json!({
                "did": did,
                "exists": exists,
                "timestamp": timestamp(),
            }),
        ))
    }

    /// Handler for main public key lookup
    async fn public_key_handler(
        State(server): State<Arc<Self>>,
        Path(did): Path<String>,
    ) -> Result<Response, AuthError> {
        let did = server.auth.parse_did(&did)?;
        let Some(public_key) = server.auth.lookup_public_key(&did).await? else {
            return Ok(unregistered());
        };

        Ok(success(
            "public key retrieved",
            json!({
                "did": did,
                "publicKey": public_key,
                "timestamp": timestamp(),
            }),
        ))
    }

    /// Handler for DID document lookup
    async fn document_handler(
        State(server): State<Arc<Self>>,
        Path(did): Path<String>,
    ) -> Result<Response, AuthError> {
        let did = server.auth.parse_did(&did)?;
        let Some(document) = server.auth.lookup_document(&did).await? else {
            return Ok(unregistered());
        };

        Ok(success(
            "document retrieved",
            json!({
                "did": did,
                "document": document,
                "timestamp": timestamp(),
            }),
        ))
    }

    /// Handler for batch DID existence checks
    ///
    /// All DIDs must be syntactically valid. Lookups run concurrently and a
    /// failed lookup is reported per entry instead of failing the batch.
    async fn validate_handler(
        State(server): State<Arc<Self>>,
        payload: Result<Json<ValidateRequest>, JsonRejection>,
    ) -> Result<Response, AuthError> {
        let request = body(payload)?;
        if request.dids.is_empty() || request.dids.len() > MAX_BATCH_DIDS {
            return Err(AuthError::InvalidInput(format!(
                "dids must contain 1 to {MAX_BATCH_DIDS} entries, got {}",
                request.dids.len()
            )));
        }
        let dids = request
            .dids
            .iter()
            .map(|raw| server.auth.parse_did(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let auth = &server.auth;
        let results = join_all(dids.iter().map(|did| async move {
            match auth.identity_exists(did).await {
                Ok(exists) => json!({ "did": did, "exists": exists, "error": null }),
                Err(e) => json!({ "did": did, "exists": false, "error": e.kind().code() }),
            }
        }))
        .await;

        Ok(success(
            "validation complete",
            json!({
                "results": results,
                "timestamp": timestamp(),
            }),
        ))
    }
}
