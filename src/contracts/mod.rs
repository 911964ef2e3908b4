// src/contracts/mod.rs
//! Smart contract bindings.

pub mod did_manager;
