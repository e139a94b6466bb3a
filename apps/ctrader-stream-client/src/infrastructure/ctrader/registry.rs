//! Message registry.
//!
//! Maps logical message kinds to their wire discriminators and carries
//! the encode/decode dispatch for both directions. The table is built
//! statically at startup from the current protocol schema and validated
//! for completeness; discriminators are never derived from type names.
//!
//! Decoding an unknown discriminator is not an error: the gateway may
//! introduce message kinds this client does not understand yet, and they
//! surface as [`InboundMessage::Unrecognized`] instead of crashing the
//! session.

use std::collections::HashMap;

use prost::Message;
use thiserror::Error;

use super::messages::{
    AccountAuthReq, AccountAuthRes, AccountListReq, AccountListRes, ApplicationAuthReq,
    ApplicationAuthRes, ErrorRes, HeartbeatEvent, ProtoMessage, SpotEvent, SubscribeSpotsReq,
    SubscribeSpotsRes, SymbolsListReq, SymbolsListRes, VersionReq, VersionRes, wire_code,
};

/// Logical identity of a protocol message, independent of its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Heartbeat event.
    HeartbeatEvent,
    /// Version negotiation request.
    VersionRequest,
    /// Version negotiation response.
    VersionResponse,
    /// Application authentication request.
    ApplicationAuthRequest,
    /// Application authentication response.
    ApplicationAuthResponse,
    /// Account authentication request.
    AccountAuthRequest,
    /// Account authentication response.
    AccountAuthResponse,
    /// Account list request.
    AccountListRequest,
    /// Account list response.
    AccountListResponse,
    /// Symbol list request.
    SymbolListRequest,
    /// Symbol list response.
    SymbolListResponse,
    /// Spot subscription request.
    SubscribeSpotsRequest,
    /// Spot subscription response.
    SubscribeSpotsResponse,
    /// Spot price event.
    SpotEvent,
    /// Error response.
    ErrorResponse,
}

impl MessageKind {
    /// Every kind the client sends or decodes.
    pub const ALL: [Self; 15] = [
        Self::HeartbeatEvent,
        Self::VersionRequest,
        Self::VersionResponse,
        Self::ApplicationAuthRequest,
        Self::ApplicationAuthResponse,
        Self::AccountAuthRequest,
        Self::AccountAuthResponse,
        Self::AccountListRequest,
        Self::AccountListResponse,
        Self::SymbolListRequest,
        Self::SymbolListResponse,
        Self::SubscribeSpotsRequest,
        Self::SubscribeSpotsResponse,
        Self::SpotEvent,
        Self::ErrorResponse,
    ];
}

/// The current protocol schema's kind → discriminator table.
const STANDARD_TABLE: [(MessageKind, u32); 15] = [
    (MessageKind::HeartbeatEvent, wire_code::HEARTBEAT_EVENT),
    (MessageKind::VersionRequest, wire_code::VERSION_REQ),
    (MessageKind::VersionResponse, wire_code::VERSION_RES),
    (
        MessageKind::ApplicationAuthRequest,
        wire_code::APPLICATION_AUTH_REQ,
    ),
    (
        MessageKind::ApplicationAuthResponse,
        wire_code::APPLICATION_AUTH_RES,
    ),
    (MessageKind::AccountAuthRequest, wire_code::ACCOUNT_AUTH_REQ),
    (MessageKind::AccountAuthResponse, wire_code::ACCOUNT_AUTH_RES),
    (MessageKind::AccountListRequest, wire_code::GET_ACCOUNT_LIST_REQ),
    (
        MessageKind::AccountListResponse,
        wire_code::GET_ACCOUNT_LIST_RES,
    ),
    (MessageKind::SymbolListRequest, wire_code::SYMBOLS_LIST_REQ),
    (MessageKind::SymbolListResponse, wire_code::SYMBOLS_LIST_RES),
    (
        MessageKind::SubscribeSpotsRequest,
        wire_code::SUBSCRIBE_SPOTS_REQ,
    ),
    (
        MessageKind::SubscribeSpotsResponse,
        wire_code::SUBSCRIBE_SPOTS_RES,
    ),
    (MessageKind::SpotEvent, wire_code::SPOT_EVENT),
    (MessageKind::ErrorResponse, wire_code::ERROR_RES),
];

/// A message the client sends to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Version negotiation request.
    VersionRequest(VersionReq),
    /// Application authentication request.
    ApplicationAuthRequest(ApplicationAuthReq),
    /// Account authentication request.
    AccountAuthRequest(AccountAuthReq),
    /// Account list request.
    AccountListRequest(AccountListReq),
    /// Symbol list request.
    SymbolListRequest(SymbolsListReq),
    /// Spot subscription request.
    SubscribeSpotsRequest(SubscribeSpotsReq),
    /// Heartbeat event.
    HeartbeatEvent(HeartbeatEvent),
}

impl OutboundMessage {
    /// Logical kind of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::VersionRequest(_) => MessageKind::VersionRequest,
            Self::ApplicationAuthRequest(_) => MessageKind::ApplicationAuthRequest,
            Self::AccountAuthRequest(_) => MessageKind::AccountAuthRequest,
            Self::AccountListRequest(_) => MessageKind::AccountListRequest,
            Self::SymbolListRequest(_) => MessageKind::SymbolListRequest,
            Self::SubscribeSpotsRequest(_) => MessageKind::SubscribeSpotsRequest,
            Self::HeartbeatEvent(_) => MessageKind::HeartbeatEvent,
        }
    }
}

/// A decoded message received from the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Version negotiation response.
    VersionResponse(VersionRes),
    /// Application authentication response.
    ApplicationAuthResponse(ApplicationAuthRes),
    /// Account authentication response.
    AccountAuthResponse(AccountAuthRes),
    /// Account list response.
    AccountListResponse(AccountListRes),
    /// Symbol list response.
    SymbolListResponse(SymbolsListRes),
    /// Spot subscription response.
    SubscribeSpotsResponse(SubscribeSpotsRes),
    /// Spot price event.
    SpotEvent(SpotEvent),
    /// Heartbeat event.
    HeartbeatEvent(HeartbeatEvent),
    /// Error response.
    ErrorResponse(ErrorRes),
    /// A wire discriminator this client has no decoder for.
    Unrecognized(u32),
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Attempt to send a message kind with no registered wire code.
    /// This is a programming error, not a recoverable condition.
    #[error("no wire code registered for message kind {0:?}")]
    UnknownKind(MessageKind),

    /// A kind was registered twice.
    #[error("message kind {0:?} registered twice")]
    DuplicateKind(MessageKind),

    /// Two kinds were registered under the same wire code.
    #[error("wire code {0} registered twice")]
    DuplicateWireCode(u32),

    /// The registry is missing a kind the client needs.
    #[error("registry incomplete: missing {0:?}")]
    Incomplete(MessageKind),

    /// A recognized payload failed to decode.
    #[error("payload for {kind:?} failed to decode: {source}")]
    Decode {
        /// Kind whose payload was malformed.
        kind: MessageKind,
        /// Underlying protobuf decode error.
        #[source]
        source: prost::DecodeError,
    },
}

/// Bidirectional kind ↔ wire-code table with typed encode/decode.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    by_kind: HashMap<MessageKind, u32>,
    by_code: HashMap<u32, MessageKind>,
}

impl MessageRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the current protocol schema's table.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (kind, code) in STANDARD_TABLE {
            // The standard table is unit-tested for uniqueness.
            registry.by_kind.insert(kind, code);
            registry.by_code.insert(code, kind);
        }
        registry
    }

    /// Register one kind under one wire code.
    ///
    /// # Errors
    ///
    /// Fails when the kind or the wire code is already taken.
    pub fn register(&mut self, kind: MessageKind, code: u32) -> Result<(), RegistryError> {
        if self.by_kind.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        if self.by_code.contains_key(&code) {
            return Err(RegistryError::DuplicateWireCode(code));
        }
        self.by_kind.insert(kind, code);
        self.by_code.insert(code, kind);
        Ok(())
    }

    /// Check that every kind the client uses is registered.
    ///
    /// # Errors
    ///
    /// Returns the first missing kind.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for kind in MessageKind::ALL {
            if !self.by_kind.contains_key(&kind) {
                return Err(RegistryError::Incomplete(kind));
            }
        }
        Ok(())
    }

    /// Wire code for a kind.
    ///
    /// # Errors
    ///
    /// `UnknownKind` when the kind was never registered.
    pub fn wire_code(&self, kind: MessageKind) -> Result<u32, RegistryError> {
        self.by_kind
            .get(&kind)
            .copied()
            .ok_or(RegistryError::UnknownKind(kind))
    }

    /// Kind registered for a wire code, if any.
    #[must_use]
    pub fn kind_for(&self, code: u32) -> Option<MessageKind> {
        self.by_code.get(&code).copied()
    }

    /// Encode an outbound message into a wire envelope.
    ///
    /// # Errors
    ///
    /// `UnknownKind` when the message's kind has no registered wire code.
    pub fn encode(&self, message: &OutboundMessage) -> Result<ProtoMessage, RegistryError> {
        let payload_type = self.wire_code(message.kind())?;
        let payload = match message {
            OutboundMessage::VersionRequest(m) => m.encode_to_vec(),
            OutboundMessage::ApplicationAuthRequest(m) => m.encode_to_vec(),
            OutboundMessage::AccountAuthRequest(m) => m.encode_to_vec(),
            OutboundMessage::AccountListRequest(m) => m.encode_to_vec(),
            OutboundMessage::SymbolListRequest(m) => m.encode_to_vec(),
            OutboundMessage::SubscribeSpotsRequest(m) => m.encode_to_vec(),
            OutboundMessage::HeartbeatEvent(m) => m.encode_to_vec(),
        };
        Ok(ProtoMessage {
            payload_type,
            payload: Some(payload),
            client_msg_id: None,
        })
    }

    /// Decode an inbound envelope into a typed message.
    ///
    /// Unknown discriminators yield `InboundMessage::Unrecognized` rather
    /// than an error; request kinds arriving inbound are treated the same
    /// way since no inbound decoder exists for them.
    ///
    /// # Errors
    ///
    /// `Decode` when a recognized payload's bytes are malformed.
    pub fn decode(&self, payload_type: u32, payload: &[u8]) -> Result<InboundMessage, RegistryError> {
        let Some(kind) = self.kind_for(payload_type) else {
            return Ok(InboundMessage::Unrecognized(payload_type));
        };

        let decode_err = |source| RegistryError::Decode { kind, source };
        let message = match kind {
            MessageKind::VersionResponse => {
                InboundMessage::VersionResponse(VersionRes::decode(payload).map_err(decode_err)?)
            }
            MessageKind::ApplicationAuthResponse => InboundMessage::ApplicationAuthResponse(
                ApplicationAuthRes::decode(payload).map_err(decode_err)?,
            ),
            MessageKind::AccountAuthResponse => InboundMessage::AccountAuthResponse(
                AccountAuthRes::decode(payload).map_err(decode_err)?,
            ),
            MessageKind::AccountListResponse => InboundMessage::AccountListResponse(
                AccountListRes::decode(payload).map_err(decode_err)?,
            ),
            MessageKind::SymbolListResponse => InboundMessage::SymbolListResponse(
                SymbolsListRes::decode(payload).map_err(decode_err)?,
            ),
            MessageKind::SubscribeSpotsResponse => InboundMessage::SubscribeSpotsResponse(
                SubscribeSpotsRes::decode(payload).map_err(decode_err)?,
            ),
            MessageKind::SpotEvent => {
                InboundMessage::SpotEvent(SpotEvent::decode(payload).map_err(decode_err)?)
            }
            MessageKind::HeartbeatEvent => {
                InboundMessage::HeartbeatEvent(HeartbeatEvent::decode(payload).map_err(decode_err)?)
            }
            MessageKind::ErrorResponse => {
                InboundMessage::ErrorResponse(ErrorRes::decode(payload).map_err(decode_err)?)
            }
            // Send-only kinds: a gateway echoing one back is treated as a
            // discriminator we have no decoder for.
            MessageKind::VersionRequest
            | MessageKind::ApplicationAuthRequest
            | MessageKind::AccountAuthRequest
            | MessageKind::AccountListRequest
            | MessageKind::SymbolListRequest
            | MessageKind::SubscribeSpotsRequest => InboundMessage::Unrecognized(payload_type),
        };
        Ok(message)
    }

    /// Decode a whole envelope.
    ///
    /// # Errors
    ///
    /// Same as [`Self::decode`].
    pub fn decode_envelope(&self, envelope: &ProtoMessage) -> Result<InboundMessage, RegistryError> {
        self.decode(
            envelope.payload_type,
            envelope.payload.as_deref().unwrap_or(&[]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_is_complete_and_unique() {
        let registry = MessageRegistry::standard();
        registry.validate().unwrap();

        // Uniqueness in both directions.
        let mut fresh = MessageRegistry::new();
        for (kind, code) in STANDARD_TABLE {
            fresh.register(kind, code).unwrap();
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = MessageRegistry::new();
        registry.register(MessageKind::SpotEvent, 2131).unwrap();

        assert!(matches!(
            registry.register(MessageKind::SpotEvent, 9000),
            Err(RegistryError::DuplicateKind(MessageKind::SpotEvent))
        ));
        assert!(matches!(
            registry.register(MessageKind::ErrorResponse, 2131),
            Err(RegistryError::DuplicateWireCode(2131))
        ));
    }

    #[test]
    fn incomplete_registry_fails_validation() {
        let mut registry = MessageRegistry::new();
        registry.register(MessageKind::HeartbeatEvent, 51).unwrap();
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::Incomplete(_))
        ));
    }

    #[test]
    fn encode_fails_for_unregistered_kind() {
        let registry = MessageRegistry::new();
        let result = registry.encode(&OutboundMessage::VersionRequest(VersionReq {}));
        assert!(matches!(
            result,
            Err(RegistryError::UnknownKind(MessageKind::VersionRequest))
        ));
    }

    #[test]
    fn unknown_discriminator_is_unrecognized_not_an_error() {
        let registry = MessageRegistry::standard();
        let decoded = registry.decode(9999, &[]).unwrap();
        assert_eq!(decoded, InboundMessage::Unrecognized(9999));
    }

    #[test]
    fn send_only_kind_inbound_is_unrecognized() {
        let registry = MessageRegistry::standard();
        let decoded = registry.decode(wire_code::VERSION_REQ, &[]).unwrap();
        assert_eq!(
            decoded,
            InboundMessage::Unrecognized(wire_code::VERSION_REQ)
        );
    }

    #[test]
    fn outbound_round_trips_through_envelope() {
        let registry = MessageRegistry::standard();
        let request = SubscribeSpotsReq {
            ctid_trader_account_id: 42,
            symbol_id: vec![1, 2, 3],
        };

        let envelope = registry
            .encode(&OutboundMessage::SubscribeSpotsRequest(request.clone()))
            .unwrap();
        assert_eq!(envelope.payload_type, wire_code::SUBSCRIBE_SPOTS_REQ);

        // The gateway-side decode of our request bytes reproduces the fields.
        use prost::Message as _;
        let decoded =
            SubscribeSpotsReq::decode(envelope.payload.as_deref().unwrap_or(&[])).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn heartbeat_envelope_carries_an_empty_payload() {
        let registry = MessageRegistry::standard();
        let envelope = registry
            .encode(&OutboundMessage::HeartbeatEvent(HeartbeatEvent {}))
            .unwrap();
        assert_eq!(envelope.payload_type, wire_code::HEARTBEAT_EVENT);
        assert_eq!(envelope.payload.as_deref(), Some(&[][..]));
    }

    #[test]
    fn inbound_decode_reproduces_fields() {
        use prost::Message as _;
        let registry = MessageRegistry::standard();
        let spot = SpotEvent {
            ctid_trader_account_id: 42,
            symbol_id: 1,
            bid: Some(108_550),
            ask: Some(108_560),
        };

        let decoded = registry
            .decode(wire_code::SPOT_EVENT, &spot.encode_to_vec())
            .unwrap();
        assert_eq!(decoded, InboundMessage::SpotEvent(spot));
    }

    #[test]
    fn malformed_recognized_payload_is_an_error() {
        let registry = MessageRegistry::standard();
        // Tag 2 declared as a length-delimited field with a bogus length.
        let malformed = [0x12, 0xFF];
        assert!(matches!(
            registry.decode(wire_code::VERSION_RES, &malformed),
            Err(RegistryError::Decode { .. })
        ));
    }
}
