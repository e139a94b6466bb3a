#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! cTrader Stream Client - Persistent Market Data Gateway Client
//!
//! Maintains a single authenticated TLS connection to the trading
//! gateway's binary protobuf protocol and streams spot prices to the
//! consumer as typed events. Handles the full connection lifecycle:
//! ordered handshake, heartbeats, reconnection with backoff, and
//! single-refresh credential recovery with atomic persistence.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Credentials, session state, outward events
//!
//! - **Application**: Ports and the credential refresh use case
//!   - `ports`: Token exchange and durable store interfaces
//!   - `refresh`: Bounded-retry refresh orchestration
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `ctrader`: Frame codec, message registry, handshake, client
//!   - `auth`: HTTP token exchange, file-backed credential store
//!   - `config`: Environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! Gateway TLS ──► FrameBuffer ──► MessageRegistry ──► Handshake ──► events
//!                                                        │
//!                                                        └──► outbound frames
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external integrations.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{Credentials, GatewayEvent, HandshakeStage, Session, SymbolInfo, TokenGrant};

// Application ports and use cases
pub use application::{
    CredentialStore, RefreshConfig, RefreshError, RefreshPolicy, StoreError, TokenExchange,
};

// Infrastructure config
pub use infrastructure::config::{ClientConfig, ConfigError, ConnectionSettings, Environment};

// Credential adapters
pub use infrastructure::auth::{FileCredentialStore, HttpTokenExchange};

// Gateway client (and the pieces integration tests drive directly)
pub use infrastructure::ctrader::{
    ClientError, FrameBuffer, FrameError, GatewayClient, GatewayClientConfig, InboundMessage,
    InstrumentSelection, MessageKind, MessageRegistry, OutboundMessage, ReconnectConfig,
    ReconnectPolicy, RegistryError, encode_frame,
};
