//! Per-connection session state.

/// Stage of the handshake sequence for one connection attempt.
///
/// Stages advance strictly in order; the bracketed account-list and
/// symbol-list stages are skipped when the account id (respectively the
/// numeric symbol ids) are already configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeStage {
    /// No connection, or the connection has dropped.
    #[default]
    Disconnected,
    /// Version request sent, waiting for the version acknowledgment.
    AwaitingVersionAck,
    /// Application auth request sent, waiting for the acknowledgment.
    AwaitingAppAuthAck,
    /// Account-list request sent (no account id configured).
    AwaitingAccountList,
    /// Account auth request sent, waiting for the acknowledgment.
    AwaitingAccountAuthAck,
    /// Symbol-list request sent (instrument selection still unresolved).
    AwaitingSymbolList,
    /// Spot subscription request sent, waiting for the confirmation.
    AwaitingSubscribeAck,
    /// Steady state: inbound spot events are forwarded outward.
    Streaming,
}

impl HandshakeStage {
    /// Stable name for logging and status events.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingVersionAck => "awaiting_version_ack",
            Self::AwaitingAppAuthAck => "awaiting_app_auth_ack",
            Self::AwaitingAccountList => "awaiting_account_list",
            Self::AwaitingAccountAuthAck => "awaiting_account_auth_ack",
            Self::AwaitingSymbolList => "awaiting_symbol_list",
            Self::AwaitingSubscribeAck => "awaiting_subscribe_ack",
            Self::Streaming => "streaming",
        }
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl std::fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one logical connection attempt.
///
/// A session is created fresh for every connection attempt and discarded
/// on disconnect; nothing in it is reused across reconnects.
#[derive(Debug)]
pub struct Session {
    /// Current handshake stage.
    pub stage: HandshakeStage,
    /// Trading account id, configured up front or adopted from discovery.
    pub account_id: Option<i64>,
    /// Snapshot of the access token this attempt authenticates with.
    pub access_token: String,
    /// Symbol ids subscribed (or about to be subscribed) for spots.
    pub subscribed: Vec<i64>,
}

impl Session {
    /// Start a fresh session for one connection attempt.
    #[must_use]
    pub const fn new(account_id: Option<i64>, access_token: String) -> Self {
        Self {
            stage: HandshakeStage::Disconnected,
            account_id,
            access_token,
            subscribed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_disconnected() {
        let session = Session::new(Some(7), "token".to_string());
        assert_eq!(session.stage, HandshakeStage::Disconnected);
        assert_eq!(session.account_id, Some(7));
        assert!(session.subscribed.is_empty());
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(HandshakeStage::Streaming.as_str(), "streaming");
        assert_eq!(
            HandshakeStage::AwaitingVersionAck.to_string(),
            "awaiting_version_ack"
        );
        assert!(HandshakeStage::Streaming.is_streaming());
        assert!(!HandshakeStage::AwaitingSubscribeAck.is_streaming());
    }
}
