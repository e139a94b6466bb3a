//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Credential adapters (token exchange, durable store).
pub mod auth;

/// Configuration loading.
pub mod config;

/// Gateway protocol client (framing, registry, handshake, lifecycle).
pub mod ctrader;
