//! Handshake state machine.
//!
//! Drives the ordered request/response sequence from a fresh connection
//! to steady-state streaming. The machine performs no I/O: every input
//! message yields a list of actions (messages to send, events to emit, a
//! credential-refresh request) that the connection manager executes.
//!
//! Ordering rules:
//! - Exactly one handshake request is in flight at a time; the request
//!   for the next stage is produced only by the matching response of the
//!   current one.
//! - Account discovery runs only when no account id is configured, and
//!   it runs before account authentication (the auth request needs the
//!   id). Symbol-list resolution is the analogous conditional step before
//!   the spot subscription.
//! - A recognized-but-unexpected message is logged and ignored (late
//!   confirmations do happen); an unrecognized discriminator likewise.
//! - An error response interrupts the sequence at any stage: expiry
//!   codes request a credential refresh, everything else is fatal for
//!   the session.

use thiserror::Error;

use crate::domain::{GatewayEvent, HandshakeStage, Session, SymbolInfo};

use super::messages::{
    AccountAuthReq, AccountListReq, ApplicationAuthReq, HeartbeatEvent, SubscribeSpotsReq,
    SymbolsListReq, VersionReq, price_from_fixed,
};
use super::registry::{InboundMessage, OutboundMessage};

/// Effects the connection manager must carry out after a message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeAction {
    /// Send this message to the gateway.
    Send(OutboundMessage),
    /// Push this event to the presentation layer.
    Emit(GatewayEvent),
    /// Tear the session down, refresh credentials once, reconnect.
    RefreshCredentials,
}

/// Fatal handshake failures: the session is torn down and the error
/// surfaced to the operator.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The gateway rejected a handshake step with a non-expiry code.
    #[error("gateway error {code}: {}", description.as_deref().unwrap_or("(no description)"))]
    Protocol {
        /// Gateway error code.
        code: String,
        /// Optional detail.
        description: Option<String>,
    },

    /// Account discovery returned no accounts for the access token.
    #[error("access token grants no trading accounts")]
    NoAccounts,

    /// Instrument resolution matched none of the configured symbols.
    #[error("none of the configured instruments exist on the account")]
    NoInstruments,
}

/// Instrument selection the handshake subscribes with.
#[derive(Debug, Clone, Default)]
pub struct InstrumentSelection {
    /// Numeric symbol ids, subscribed directly when non-empty.
    pub symbol_ids: Vec<i64>,
    /// Symbol names, resolved against the gateway's symbol list.
    pub symbol_names: Vec<String>,
}

impl InstrumentSelection {
    /// Whether subscription can proceed without fetching the symbol list.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.symbol_ids.is_empty()
    }
}

/// The handshake driver for one session.
#[derive(Debug)]
pub struct Handshake {
    session: Session,
    client_id: String,
    client_secret: String,
    instruments: InstrumentSelection,
}

impl Handshake {
    /// Build the machine for a fresh session.
    #[must_use]
    pub const fn new(
        session: Session,
        client_id: String,
        client_secret: String,
        instruments: InstrumentSelection,
    ) -> Self {
        Self {
            session,
            client_id,
            client_secret,
            instruments,
        }
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> HandshakeStage {
        self.session.stage
    }

    /// Session state (read-only inspection for status reporting).
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The transport connected: start the sequence with the version step.
    pub fn on_connected(&mut self) -> Vec<HandshakeAction> {
        let mut actions = vec![self.advance(HandshakeStage::AwaitingVersionAck)];
        actions.push(HandshakeAction::Send(OutboundMessage::VersionRequest(
            VersionReq {},
        )));
        actions
    }

    /// React to one decoded inbound message.
    ///
    /// # Errors
    ///
    /// Fatal protocol failures; the caller tears the session down.
    pub fn on_message(
        &mut self,
        message: InboundMessage,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        match message {
            InboundMessage::ErrorResponse(error) => {
                if error.is_credential_expired() {
                    tracing::warn!(code = %error.error_code, "access credential expired");
                    return Ok(vec![
                        HandshakeAction::Emit(GatewayEvent::ProtocolError {
                            code: error.error_code,
                            description: error.description,
                        }),
                        HandshakeAction::RefreshCredentials,
                    ]);
                }
                Err(HandshakeError::Protocol {
                    code: error.error_code,
                    description: error.description,
                })
            }

            InboundMessage::HeartbeatEvent(HeartbeatEvent {}) => {
                tracing::trace!("gateway heartbeat");
                Ok(Vec::new())
            }

            InboundMessage::Unrecognized(code) => {
                tracing::debug!(wire_code = code, "ignoring unrecognized message kind");
                Ok(Vec::new())
            }

            InboundMessage::VersionResponse(version)
                if self.session.stage == HandshakeStage::AwaitingVersionAck =>
            {
                tracing::info!(version = %version.version, "gateway version negotiated");
                let mut actions = vec![self.advance(HandshakeStage::AwaitingAppAuthAck)];
                actions.push(HandshakeAction::Send(
                    OutboundMessage::ApplicationAuthRequest(ApplicationAuthReq {
                        client_id: self.client_id.clone(),
                        client_secret: self.client_secret.clone(),
                    }),
                ));
                Ok(actions)
            }

            InboundMessage::ApplicationAuthResponse(_)
                if self.session.stage == HandshakeStage::AwaitingAppAuthAck =>
            {
                Ok(if self.session.account_id.is_some() {
                    self.request_account_auth()
                } else {
                    let mut actions = vec![self.advance(HandshakeStage::AwaitingAccountList)];
                    actions.push(HandshakeAction::Send(OutboundMessage::AccountListRequest(
                        AccountListReq {
                            access_token: self.session.access_token.clone(),
                        },
                    )));
                    actions
                })
            }

            InboundMessage::AccountListResponse(list)
                if self.session.stage == HandshakeStage::AwaitingAccountList =>
            {
                let adopted = list
                    .ctid_trader_account
                    .first()
                    .ok_or(HandshakeError::NoAccounts)?
                    .ctid_trader_account_id;
                tracing::info!(account_id = adopted, "adopted first discovered account");
                self.session.account_id = Some(adopted);
                Ok(self.request_account_auth())
            }

            InboundMessage::AccountAuthResponse(auth)
                if self.session.stage == HandshakeStage::AwaitingAccountAuthAck =>
            {
                tracing::info!(
                    account_id = auth.ctid_trader_account_id,
                    "account authenticated"
                );
                if self.instruments.is_resolved() {
                    Ok(self.request_subscription())
                } else {
                    let mut actions = vec![self.advance(HandshakeStage::AwaitingSymbolList)];
                    actions.push(HandshakeAction::Send(OutboundMessage::SymbolListRequest(
                        SymbolsListReq {
                            ctid_trader_account_id: self.session.account_id.unwrap_or_default(),
                            include_archived_symbols: Some(false),
                        },
                    )));
                    Ok(actions)
                }
            }

            InboundMessage::SymbolListResponse(list)
                if self.session.stage == HandshakeStage::AwaitingSymbolList =>
            {
                let catalog: Vec<SymbolInfo> = list
                    .symbol
                    .iter()
                    .map(|s| SymbolInfo {
                        id: s.symbol_id,
                        name: s.symbol_name.clone().unwrap_or_default(),
                    })
                    .collect();

                let resolved = Self::resolve_instruments(&catalog, &self.instruments)?;
                self.instruments.symbol_ids = resolved;

                let mut actions = vec![HandshakeAction::Emit(GatewayEvent::SymbolList(catalog))];
                actions.extend(self.request_subscription());
                Ok(actions)
            }

            InboundMessage::SubscribeSpotsResponse(_)
                if self.session.stage == HandshakeStage::AwaitingSubscribeAck =>
            {
                let mut actions = vec![self.advance(HandshakeStage::Streaming)];
                actions.push(HandshakeAction::Emit(GatewayEvent::Subscribed {
                    symbol_ids: self.session.subscribed.clone(),
                }));
                Ok(actions)
            }

            InboundMessage::SpotEvent(spot)
                if self.session.stage == HandshakeStage::Streaming =>
            {
                Ok(vec![HandshakeAction::Emit(GatewayEvent::Spot {
                    symbol_id: spot.symbol_id,
                    bid: spot.bid.map(price_from_fixed),
                    ask: spot.ask.map(price_from_fixed),
                })])
            }

            // Recognized but not expected in the current stage: the
            // gateway does deliver late confirmations and early ticks.
            other => {
                tracing::debug!(
                    stage = %self.session.stage,
                    message = ?message_name(&other),
                    "ignoring message not expected in this stage"
                );
                Ok(Vec::new())
            }
        }
    }

    fn advance(&mut self, stage: HandshakeStage) -> HandshakeAction {
        tracing::debug!(from = %self.session.stage, to = %stage, "handshake stage change");
        self.session.stage = stage;
        HandshakeAction::Emit(GatewayEvent::StageChanged(stage))
    }

    fn request_account_auth(&mut self) -> Vec<HandshakeAction> {
        let account_id = self.session.account_id.unwrap_or_default();
        let mut actions = vec![self.advance(HandshakeStage::AwaitingAccountAuthAck)];
        actions.push(HandshakeAction::Send(OutboundMessage::AccountAuthRequest(
            AccountAuthReq {
                ctid_trader_account_id: account_id,
                access_token: self.session.access_token.clone(),
            },
        )));
        actions
    }

    fn request_subscription(&mut self) -> Vec<HandshakeAction> {
        self.session.subscribed = self.instruments.symbol_ids.clone();
        let mut actions = vec![self.advance(HandshakeStage::AwaitingSubscribeAck)];
        actions.push(HandshakeAction::Send(
            OutboundMessage::SubscribeSpotsRequest(SubscribeSpotsReq {
                ctid_trader_account_id: self.session.account_id.unwrap_or_default(),
                symbol_id: self.session.subscribed.clone(),
            }),
        ));
        actions
    }

    /// Match configured names against the catalog; adopt the first listed
    /// symbol when nothing was configured at all.
    fn resolve_instruments(
        catalog: &[SymbolInfo],
        selection: &InstrumentSelection,
    ) -> Result<Vec<i64>, HandshakeError> {
        if selection.symbol_names.is_empty() {
            return catalog
                .first()
                .map(|s| vec![s.id])
                .ok_or(HandshakeError::NoInstruments);
        }

        let resolved: Vec<i64> = catalog
            .iter()
            .filter(|s| {
                selection
                    .symbol_names
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&s.name))
            })
            .map(|s| s.id)
            .collect();

        if resolved.is_empty() {
            return Err(HandshakeError::NoInstruments);
        }
        Ok(resolved)
    }
}

fn message_name(message: &InboundMessage) -> &'static str {
    match message {
        InboundMessage::VersionResponse(_) => "version_response",
        InboundMessage::ApplicationAuthResponse(_) => "application_auth_response",
        InboundMessage::AccountAuthResponse(_) => "account_auth_response",
        InboundMessage::AccountListResponse(_) => "account_list_response",
        InboundMessage::SymbolListResponse(_) => "symbol_list_response",
        InboundMessage::SubscribeSpotsResponse(_) => "subscribe_spots_response",
        InboundMessage::SpotEvent(_) => "spot_event",
        InboundMessage::HeartbeatEvent(_) => "heartbeat_event",
        InboundMessage::ErrorResponse(_) => "error_response",
        InboundMessage::Unrecognized(_) => "unrecognized",
    }
}
