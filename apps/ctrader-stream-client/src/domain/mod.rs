//! Domain layer - Core protocol state and event types.

pub mod credentials;
pub mod events;
pub mod session;

pub use credentials::{Credentials, TokenGrant};
pub use events::{GatewayEvent, SymbolInfo};
pub use session::{HandshakeStage, Session};
