//! HTTP handler definitions for the tarot server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used when building the
//! router. Business endpoints are supplied externally and mounted alongside
//! these.

pub mod root;

pub use root::{health_handler, root_handler};

use std::sync::Arc;

/// Immutable service identity resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Human-readable description returned by the root endpoint.
    pub description: String,
    /// Version read from the packaging manifest (or the fallback).
    pub version: String,
}

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Service identity reported by the root endpoint.
    pub info: Arc<ServiceInfo>,
}
