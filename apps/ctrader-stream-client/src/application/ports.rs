//! Ports for the credential source/sink collaborators.
//!
//! The protocol core never talks to the token authority or the durable
//! store directly; it goes through these traits so the collaborators can
//! be swapped out (and mocked) without touching the client.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credentials, TokenGrant};

/// Errors from the durable credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem-level failure.
    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be parsed or written.
    #[error("credential store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the refresh exchange.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The authority rejected the exchange (bad refresh token, revoked app).
    #[error("token endpoint rejected the exchange ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The exchange could not be carried out (network, TLS, malformed body).
    #[error("token exchange transport error: {0}")]
    Transport(String),

    /// Persisting the renewed pair failed.
    #[error("persisting refreshed credentials failed: {0}")]
    Store(#[from] StoreError),

    /// The bounded retry budget ran out.
    #[error("token refresh failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of exchange attempts made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: String,
    },
}

/// Exchanges a refresh credential for a new access/refresh pair against
/// the external token authority.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Perform one exchange attempt.
    async fn exchange(&self, credentials: &Credentials) -> Result<TokenGrant, RefreshError>;
}

/// Durable store for credentials.
///
/// `persist` must be crash-safe: a reader never observes a half-written
/// credential pair, only the previous document or the new one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored credentials.
    async fn load(&self) -> Result<Credentials, StoreError>;

    /// Atomically replace the stored credentials.
    async fn persist(&self, credentials: &Credentials) -> Result<(), StoreError>;
}
