//! Application layer - ports and the credential refresh use case.

pub mod ports;
pub mod refresh;

pub use ports::{CredentialStore, RefreshError, StoreError, TokenExchange};
pub use refresh::{RefreshConfig, RefreshPolicy};
