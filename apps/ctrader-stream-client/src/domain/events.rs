//! Events pushed outward to the presentation layer.
//!
//! The core never blocks on the consumer of these events: they are
//! delivered over a bounded channel and dropped (with a warning) when the
//! consumer falls behind.

use rust_decimal::Decimal;

use super::session::HandshakeStage;

/// A tradeable instrument as reported by the gateway's symbol list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Gateway-assigned symbol id used in subscription requests.
    pub id: i64,
    /// Human-readable symbol name (e.g. "EURUSD").
    pub name: String,
}

/// Events emitted by the gateway client.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// The handshake advanced to a new stage.
    StageChanged(HandshakeStage),
    /// Transport connection established (handshake not yet complete).
    Connected,
    /// Transport connection lost.
    Disconnected,
    /// Reconnecting after a backoff delay.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
    /// A decoded spot price tick.
    Spot {
        /// Symbol the tick belongs to.
        symbol_id: i64,
        /// Bid price, when present in the event.
        bid: Option<Decimal>,
        /// Ask price, when present in the event.
        ask: Option<Decimal>,
    },
    /// The full instrument list returned by the gateway.
    SymbolList(Vec<SymbolInfo>),
    /// Spot subscription confirmed for these symbols.
    Subscribed {
        /// Symbol ids covered by the confirmation.
        symbol_ids: Vec<i64>,
    },
    /// The gateway sent an error response.
    ProtocolError {
        /// Gateway error code.
        code: String,
        /// Optional human-readable detail.
        description: Option<String>,
    },
    /// The access/refresh token pair was renewed and persisted.
    CredentialsRefreshed,
}
