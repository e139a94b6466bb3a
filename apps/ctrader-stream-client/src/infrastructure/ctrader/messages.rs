//! Open API wire message types.
//!
//! Protobuf payload structs for the subset of the gateway's published
//! schema this client speaks, plus the envelope every frame carries.
//! The structs are hand-derived with `prost`; fields and tags follow the
//! gateway's protocol-buffer definitions, trimmed to what the client
//! reads and writes. Unknown fields are skipped by prost, so trimmed
//! messages stay forward-compatible.
//!
//! # Wire format
//!
//! Every frame is a 4-byte unsigned big-endian length followed by a
//! `ProtoMessage` envelope: a numeric payload type (the wire
//! discriminator) and an opaque payload byte string.

use rust_decimal::Decimal;

/// Wire discriminators (`payload_type` values), taken from the current
/// protocol schema. This table is authoritative; see the registry for
/// the kind mapping built from it.
pub mod wire_code {
    /// Heartbeat event (both directions).
    pub const HEARTBEAT_EVENT: u32 = 51;
    /// Application authentication request.
    pub const APPLICATION_AUTH_REQ: u32 = 2100;
    /// Application authentication response.
    pub const APPLICATION_AUTH_RES: u32 = 2101;
    /// Account authentication request.
    pub const ACCOUNT_AUTH_REQ: u32 = 2102;
    /// Account authentication response.
    pub const ACCOUNT_AUTH_RES: u32 = 2103;
    /// Version negotiation request.
    pub const VERSION_REQ: u32 = 2104;
    /// Version negotiation response.
    pub const VERSION_RES: u32 = 2105;
    /// Symbol list request.
    pub const SYMBOLS_LIST_REQ: u32 = 2114;
    /// Symbol list response.
    pub const SYMBOLS_LIST_RES: u32 = 2115;
    /// Spot subscription request.
    pub const SUBSCRIBE_SPOTS_REQ: u32 = 2127;
    /// Spot subscription response.
    pub const SUBSCRIBE_SPOTS_RES: u32 = 2128;
    /// Spot price event.
    pub const SPOT_EVENT: u32 = 2131;
    /// Error response.
    pub const ERROR_RES: u32 = 2142;
    /// Account list (by access token) request.
    pub const GET_ACCOUNT_LIST_REQ: u32 = 2149;
    /// Account list (by access token) response.
    pub const GET_ACCOUNT_LIST_RES: u32 = 2150;
}

/// Spot prices are fixed-point integers with this many implied decimals.
pub const PRICE_SCALE: u32 = 5;

/// Convert a fixed-point wire price into a decimal.
#[must_use]
pub fn price_from_fixed(raw: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(raw), PRICE_SCALE)
}

/// The envelope wrapping every payload on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoMessage {
    /// Wire discriminator identifying the payload's message kind.
    #[prost(uint32, tag = "1")]
    pub payload_type: u32,
    /// Serialized payload bytes (absent for empty payloads).
    #[prost(bytes = "vec", optional, tag = "2")]
    pub payload: Option<Vec<u8>>,
    /// Client-assigned correlation id (unused by this client).
    #[prost(string, optional, tag = "3")]
    pub client_msg_id: Option<String>,
}

/// Version negotiation request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VersionReq {}

/// Version negotiation response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VersionRes {
    /// Protocol version string reported by the gateway.
    #[prost(string, tag = "2")]
    pub version: String,
}

/// Application (client app) authentication request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplicationAuthReq {
    /// OAuth application id.
    #[prost(string, tag = "2")]
    pub client_id: String,
    /// OAuth application secret.
    #[prost(string, tag = "3")]
    pub client_secret: String,
}

/// Application authentication response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplicationAuthRes {}

/// Trading account authentication request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountAuthReq {
    /// Trading account to authorize.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
    /// Access token granting access to the account.
    #[prost(string, tag = "3")]
    pub access_token: String,
}

/// Trading account authentication response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountAuthRes {
    /// Account the authorization applies to.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
}

/// Request for the accounts reachable with an access token.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountListReq {
    /// Access token to look accounts up for.
    #[prost(string, tag = "2")]
    pub access_token: String,
}

/// One trading account entry in the account list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CtidTraderAccount {
    /// Trading account id.
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    /// Whether the account is live (as opposed to demo).
    #[prost(bool, optional, tag = "2")]
    pub is_live: Option<bool>,
    /// Broker-side trader login.
    #[prost(int64, optional, tag = "3")]
    pub trader_login: Option<i64>,
}

/// Response carrying the accounts reachable with an access token.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountListRes {
    /// Token the lookup was performed with.
    #[prost(string, tag = "2")]
    pub access_token: String,
    /// Accounts the token grants access to.
    #[prost(message, repeated, tag = "5")]
    pub ctid_trader_account: Vec<CtidTraderAccount>,
}

/// Symbol list request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymbolsListReq {
    /// Account whose symbols are requested.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
    /// Include archived symbols in the response.
    #[prost(bool, optional, tag = "3")]
    pub include_archived_symbols: Option<bool>,
}

/// Compact symbol descriptor in the symbol list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LightSymbol {
    /// Gateway-assigned symbol id.
    #[prost(int64, tag = "1")]
    pub symbol_id: i64,
    /// Symbol name (e.g. "EURUSD").
    #[prost(string, optional, tag = "2")]
    pub symbol_name: Option<String>,
    /// Whether the symbol is currently enabled for trading.
    #[prost(bool, optional, tag = "3")]
    pub enabled: Option<bool>,
}

/// Symbol list response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymbolsListRes {
    /// Account the list belongs to.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
    /// The instruments available on the account.
    #[prost(message, repeated, tag = "3")]
    pub symbol: Vec<LightSymbol>,
}

/// Spot subscription request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeSpotsReq {
    /// Account to subscribe under.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
    /// Symbols to receive spot events for.
    #[prost(int64, repeated, tag = "3")]
    pub symbol_id: Vec<i64>,
}

/// Spot subscription response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeSpotsRes {
    /// Account the subscription applies to.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
}

/// Spot price event (steady-state market data).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpotEvent {
    /// Account the event was delivered for.
    #[prost(int64, tag = "2")]
    pub ctid_trader_account_id: i64,
    /// Symbol the tick belongs to.
    #[prost(int64, tag = "3")]
    pub symbol_id: i64,
    /// Bid price, fixed-point with [`PRICE_SCALE`] implied decimals.
    #[prost(uint64, optional, tag = "4")]
    pub bid: Option<u64>,
    /// Ask price, fixed-point with [`PRICE_SCALE`] implied decimals.
    #[prost(uint64, optional, tag = "5")]
    pub ask: Option<u64>,
}

/// Gateway error response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorRes {
    /// Gateway error code.
    #[prost(string, tag = "2")]
    pub error_code: String,
    /// Optional human-readable detail.
    #[prost(string, optional, tag = "3")]
    pub description: Option<String>,
}

/// Heartbeat event, sent periodically in both directions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeartbeatEvent {}

/// Error codes that indicate an expired or invalid access credential and
/// route to the refresh policy rather than tearing the session down.
pub const CREDENTIAL_EXPIRED_CODES: [&str; 2] =
    ["CH_ACCESS_TOKEN_INVALID", "ACCESS_TOKEN_EXPIRED"];

impl ErrorRes {
    /// Whether this error indicates an expired/invalid access credential.
    #[must_use]
    pub fn is_credential_expired(&self) -> bool {
        CREDENTIAL_EXPIRED_CODES.contains(&self.error_code.as_str())
    }
}
