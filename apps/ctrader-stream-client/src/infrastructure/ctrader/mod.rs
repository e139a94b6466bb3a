//! Gateway protocol adapters.
//!
//! Implements the persistent binary-protocol client for the trading
//! gateway:
//!
//! - **framing**: 4-byte length-prefixed frame codec with partial-frame
//!   buffering
//! - **messages**: protobuf payload types and wire discriminators
//! - **registry**: kind ↔ discriminator table with typed encode/decode
//! - **handshake**: ordered authentication and subscription state machine
//! - **reconnect**: capped exponential backoff with jitter
//! - **client**: connection lifecycle over TCP/TLS

pub mod client;
pub mod framing;
pub mod handshake;
pub mod messages;
pub mod reconnect;
pub mod registry;

pub use client::{ClientError, GatewayClient, GatewayClientConfig};
pub use framing::{DEFAULT_MAX_FRAME_SIZE, FrameBuffer, FrameError, encode_frame};
pub use handshake::{Handshake, HandshakeAction, HandshakeError, InstrumentSelection};
pub use messages::*;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use registry::{InboundMessage, MessageKind, MessageRegistry, OutboundMessage, RegistryError};
