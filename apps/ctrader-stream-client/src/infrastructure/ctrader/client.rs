//! Gateway client.
//!
//! Owns the full connection lifecycle: TCP/TLS connect, length-prefixed
//! envelope exchange, handshake progression, heartbeats, idle detection,
//! reconnection with exponential backoff, and the single-refresh credential
//! recovery path. Decoded events are pushed to the consumer over a bounded
//! channel and dropped (with a warning) when the consumer falls behind, so
//! the read loop never blocks on downstream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

use crate::application::{CredentialStore, RefreshError, RefreshPolicy, TokenExchange};
use crate::domain::{Credentials, GatewayEvent, Session};

use super::framing::{FrameBuffer, FrameError, encode_frame};
use super::handshake::{Handshake, HandshakeAction, HandshakeError, InstrumentSelection};
use super::messages::{HeartbeatEvent, ProtoMessage};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::registry::{InboundMessage, MessageRegistry, OutboundMessage, RegistryError};

/// Errors that can occur in the gateway client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// TCP connect or socket I/O failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured host is not a valid TLS server name.
    #[error("invalid TLS server name: {0}")]
    ServerName(#[from] tokio_rustls::rustls::pki_types::InvalidDnsNameError),

    /// Frame encode/extract failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Envelope encode/decode failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An envelope's bytes did not parse. The stream is never
    /// resynchronized; the connection is torn down instead.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] prost::DecodeError),

    /// The TCP connect did not complete within the configured window.
    #[error("connect timed out")]
    ConnectTimeout,

    /// The handshake failed fatally.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Credential refresh failed.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The gateway reported expired credentials again right after a
    /// refresh, before streaming was re-established.
    #[error("credentials reported expired immediately after a refresh")]
    RefreshIneffective,

    /// The gateway closed the connection.
    #[error("connection closed by gateway")]
    ConnectionClosed,

    /// Nothing arrived within the read idle window.
    #[error("no data received within the idle window")]
    ReadTimeout,

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

impl ClientError {
    /// Whether a fresh connection attempt can reasonably fix this.
    ///
    /// A corrupt stream (bad frame, bad envelope, bad payload) is torn
    /// down and reconnected rather than resynchronized in place.
    const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ConnectionClosed
                | Self::ConnectTimeout
                | Self::ReadTimeout
                | Self::MalformedFrame(_)
                | Self::Frame(FrameError::TooLarge { .. })
                | Self::Registry(RegistryError::Decode { .. })
        )
    }
}

/// Internal marker: the handshake asked for a credential refresh.
#[derive(Debug, thiserror::Error)]
#[error("credential refresh requested")]
struct RefreshRequested;

/// Configuration for the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayClientConfig {
    /// Gateway hostname.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Wrap the TCP stream in TLS. Disabled only for local test gateways.
    pub use_tls: bool,
    /// Reconnection pacing.
    pub reconnect: ReconnectConfig,
    /// Window for the TCP connect (and TLS handshake) to complete.
    pub connect_timeout: Duration,
    /// Interval between outbound heartbeats once connected.
    pub heartbeat_interval: Duration,
    /// Tear the connection down when nothing arrives for this long.
    pub read_idle_timeout: Duration,
    /// Upper bound on a single frame body.
    pub max_frame_size: u32,
    /// Instruments to subscribe to after authentication.
    pub instruments: InstrumentSelection,
}

impl GatewayClientConfig {
    /// Configuration with lifecycle defaults for a host and port.
    #[must_use]
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            use_tls: true,
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(30),
            max_frame_size: super::framing::DEFAULT_MAX_FRAME_SIZE,
            instruments: InstrumentSelection::default(),
        }
    }
}

/// Persistent gateway client.
///
/// Manages the connection lifecycle including:
/// - TLS transport
/// - Ordered authentication handshake
/// - Heartbeats and idle detection
/// - Automatic reconnection with exponential backoff
/// - Single-refresh credential recovery
pub struct GatewayClient<E, S> {
    config: GatewayClientConfig,
    registry: MessageRegistry,
    credentials: parking_lot::RwLock<Credentials>,
    refresh: RefreshPolicy<E, S>,
    event_tx: mpsc::Sender<GatewayEvent>,
    cancel: CancellationToken,
    reached_streaming: AtomicBool,
}

impl<E, S> GatewayClient<E, S>
where
    E: TokenExchange,
    S: CredentialStore,
{
    /// Create a new gateway client.
    #[must_use]
    pub fn new(
        config: GatewayClientConfig,
        credentials: Credentials,
        refresh: RefreshPolicy<E, S>,
        event_tx: mpsc::Sender<GatewayEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            registry: MessageRegistry::standard(),
            credentials: parking_lot::RwLock::new(credentials),
            refresh,
            event_tx,
            cancel,
            reached_streaming: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.credentials.read().clone()
    }

    /// Run the connection loop until cancelled or a fatal error.
    ///
    /// Transport-level failures reconnect with backoff; a credential
    /// expiry signal tears the session down, refreshes the token pair
    /// exactly once, and reconnects. Everything else is fatal.
    ///
    /// # Errors
    ///
    /// Fatal protocol or refresh failures, or an exhausted reconnect
    /// budget.
    pub async fn run(self: Arc<Self>) -> Result<(), ClientError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut just_refreshed = false;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("gateway client cancelled");
                return Ok(());
            }

            if self.credentials.read().is_expired(chrono::Utc::now()) {
                tracing::info!("access token past its expiry, refreshing before connect");
                self.refresh_credentials().await?;
            }

            let error = match self.connect_and_run(&mut policy).await {
                Ok(()) => {
                    tracing::info!("gateway connection closed gracefully");
                    return Ok(());
                }
                Err(e) => e,
            };

            // A streaming session since the last refresh proves the new
            // pair works; arm the refresh path again.
            if self.reached_streaming.swap(false, Ordering::Relaxed) {
                just_refreshed = false;
            }

            tracing::warn!(error = %error, "gateway connection error");
            self.emit(GatewayEvent::Disconnected);

            if refresh_was_requested(&error) {
                if just_refreshed {
                    return Err(ClientError::RefreshIneffective);
                }
                self.refresh_credentials().await?;
                just_refreshed = true;
                // Reconnect immediately; the old session is already gone.
                continue;
            }

            if !error.is_retryable() {
                return Err(error);
            }

            let Some(delay) = policy.next_delay() else {
                return Err(ClientError::MaxReconnectAttemptsExceeded);
            };
            let attempt = policy.attempts();
            tracing::info!(attempt, delay_ms = delay.as_millis(), "reconnecting to gateway");
            self.emit(GatewayEvent::Reconnecting { attempt });

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("gateway client cancelled during reconnect delay");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Swap the stored credential pair for a freshly exchanged one.
    async fn refresh_credentials(&self) -> Result<(), ClientError> {
        let current = self.credentials.read().clone();
        let renewed = self.refresh.refresh(current).await?;
        *self.credentials.write() = renewed;
        self.emit(GatewayEvent::CredentialsRefreshed);
        Ok(())
    }

    /// Connect, drive the handshake, and stream until error or cancel.
    async fn connect_and_run(&self, policy: &mut ReconnectPolicy) -> Result<(), ClientError> {
        let (account_id, access_token, client_id, client_secret) = {
            let creds = self.credentials.read();
            (
                creds.account_id,
                creds.access_token.clone(),
                creds.client_id.clone(),
                creds.client_secret.clone(),
            )
        };

        let mut handshake = Handshake::new(
            Session::new(account_id, access_token),
            client_id,
            client_secret,
            self.config.instruments.clone(),
        );

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            tls = self.config.use_tls,
            "connecting to gateway"
        );
        let stream = tokio::time::timeout(self.config.connect_timeout, self.connect_transport())
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        let (mut reader, mut writer) = tokio::io::split(stream);

        self.emit(GatewayEvent::Connected);
        let actions = handshake.on_connected();
        self.apply_actions(actions, &mut writer, policy).await?;

        let mut frames = FrameBuffer::new(self.config.max_frame_size);
        let mut chunk = vec![0u8; 8 * 1024];
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // The idle deadline only moves when bytes arrive; heartbeat
        // ticks must not extend it or a silent peer is never detected.
        let idle = tokio::time::sleep(self.config.read_idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Ok(());
                }
                () = idle.as_mut() => {
                    return Err(ClientError::ReadTimeout);
                }
                _ = heartbeat.tick() => {
                    self.send(
                        &OutboundMessage::HeartbeatEvent(HeartbeatEvent {}),
                        &mut writer,
                    ).await?;
                }
                read = reader.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        return Err(ClientError::ConnectionClosed);
                    }
                    idle.as_mut().reset(
                        tokio::time::Instant::now() + self.config.read_idle_timeout,
                    );

                    for body in frames.push(&chunk[..n])? {
                        let envelope = ProtoMessage::decode(body.as_ref())?;
                        let inbound = self.registry.decode_envelope(&envelope)?;
                        let actions = self.handshake_step(&mut handshake, inbound)?;
                        self.apply_actions(actions, &mut writer, policy).await?;
                    }
                }
            }
        }
    }

    /// Advance the handshake one message, reporting fatal protocol
    /// rejections as status events before they propagate.
    fn handshake_step(
        &self,
        handshake: &mut Handshake,
        inbound: InboundMessage,
    ) -> Result<Vec<HandshakeAction>, ClientError> {
        match handshake.on_message(inbound) {
            Ok(actions) => Ok(actions),
            Err(error) => {
                if let HandshakeError::Protocol { code, description } = &error {
                    self.emit(GatewayEvent::ProtocolError {
                        code: code.clone(),
                        description: description.clone(),
                    });
                }
                Err(error.into())
            }
        }
    }

    /// Execute the effects one handshake step produced.
    async fn apply_actions<W>(
        &self,
        actions: Vec<HandshakeAction>,
        writer: &mut W,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        for action in actions {
            match action {
                HandshakeAction::Send(message) => {
                    self.send(&message, writer).await?;
                }
                HandshakeAction::Emit(event) => {
                    if matches!(
                        event,
                        GatewayEvent::StageChanged(crate::domain::HandshakeStage::Streaming)
                    ) {
                        policy.reset();
                        self.reached_streaming.store(true, Ordering::Relaxed);
                    }
                    self.emit(event);
                }
                HandshakeAction::RefreshCredentials => {
                    // Surfaced through the I/O error channel so the outer
                    // loop tears this connection down first.
                    return Err(ClientError::Io(std::io::Error::other(RefreshRequested)));
                }
            }
        }
        Ok(())
    }

    /// Encode and write one framed envelope.
    async fn send<W>(&self, message: &OutboundMessage, writer: &mut W) -> Result<(), ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        let envelope = self.registry.encode(message)?;
        let frame = encode_frame(&envelope, self.config.max_frame_size)?;
        tracing::trace!(
            kind = ?message.kind(),
            frame_len = frame.len(),
            "sending envelope"
        );
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Push one event without ever blocking the read path.
    fn emit(&self, event: GatewayEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(event = ?event, "event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("event channel closed");
            }
        }
    }

    /// Open the TCP stream, wrapped in TLS when configured.
    async fn connect_transport(
        &self,
    ) -> Result<Box<dyn Transport>, ClientError> {
        let tcp = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        tcp.set_nodelay(true)?;

        if !self.config.use_tls {
            return Ok(Box::new(tcp));
        }

        let mut roots = tokio_rustls::rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = tokio_rustls::rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(tls_config));

        let server_name =
            tokio_rustls::rustls::pki_types::ServerName::try_from(self.config.host.clone())?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Box::new(tls))
    }
}

/// Object-safe transport bound for plain and TLS streams.
trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

fn refresh_was_requested(error: &ClientError) -> bool {
    matches!(error, ClientError::Io(io) if io.get_ref().is_some_and(|e| e.is::<RefreshRequested>()))
}
