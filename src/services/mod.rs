// src/services/mod.rs
//! Protocol services and the HTTP surface.

pub mod api_server;
pub mod auth_service;
pub mod challenge_issuer;
pub mod challenge_registry;
pub mod session_codec;
pub mod verifier;
