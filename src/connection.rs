//! Connection driver
//!
//! One task per client: read the handshake and login, ask admission, wait
//! for the queue, run the verification session and report the outcome.
//! Works over any `AsyncRead + AsyncWrite` stream so tests can use
//! in-memory pipes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::admission::{Admitted, HandshakeGate, LoginRequest, Rejection};
use crate::fallback::Fallback;
use crate::messages::MessageKey;
use crate::protocol::frame::{decode_frame, encode_frame};
use crate::protocol::packets::{Clientbound, Disconnect, Serverbound};
use crate::protocol::registry::PacketCodec;
use crate::protocol::{Phase, ProtocolError, ProtocolVersion};
use crate::statistics::Statistics;
use crate::verification::{Outbound, Profile, Progress, Session, VerificationError};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("timed out while {0}")]
    Timeout(&'static str),

    #[error("connection closed")]
    Closed,

    #[error("expected {0}")]
    Unexpected(&'static str),

    #[error("sent {0} bytes while queued")]
    QueuedData(usize),
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rejected(Rejection),
    /// Let through without verification.
    Bypassed,
    /// Passed on an earlier connection.
    AlreadyVerified,
    Passed,
    Failed(String),
    /// Closed with a message but not counted as a failure.
    Disconnected(MessageKey),
    /// The client went away or stopped talking.
    Abandoned,
}

/// Framed, phase-aware packet stream.
struct Transport<S> {
    stream: S,
    codec: PacketCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    statistics: Arc<Statistics>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(stream: S, statistics: Arc<Statistics>) -> Self {
        Self {
            stream,
            // the handshake layout is the same in every version
            codec: PacketCodec::new(ProtocolVersion::OLDEST, Phase::Handshake),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            statistics,
        }
    }

    async fn fill(&mut self) -> Result<usize, ConnectionError> {
        let read = self.stream.read_buf(&mut self.read_buf).await?;
        if read == 0 {
            return Err(ConnectionError::Closed);
        }
        self.statistics.add_incoming(read);
        Ok(read)
    }

    async fn read_frame(
        &mut self,
        limit: Duration,
        during: &'static str,
    ) -> Result<Bytes, ConnectionError> {
        loop {
            if let Some(frame) = decode_frame(&mut self.read_buf)? {
                return Ok(frame);
            }
            timeout(limit, self.fill())
                .await
                .map_err(|_| ConnectionError::Timeout(during))??;
        }
    }

    /// Next packet the registry knows; unmapped ids are skipped.
    async fn read_packet(
        &mut self,
        limit: Duration,
        during: &'static str,
    ) -> Result<Serverbound, ConnectionError> {
        loop {
            let frame = self.read_frame(limit, during).await?;
            if let Some(packet) = self.codec.decode_serverbound(frame)? {
                return Ok(packet);
            }
        }
    }

    fn queue(&mut self, packet: &Clientbound) -> Result<(), ProtocolError> {
        let body = self.codec.encode_clientbound(packet)?;
        encode_frame(&mut self.write_buf, &body);
        Ok(())
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        self.statistics.add_outgoing(self.write_buf.len());
        self.write_buf.clear();
        Ok(())
    }

    /// Sends a disconnect in the current phase and closes the stream.
    /// Write errors are ignored; the client may already be gone.
    async fn disconnect(&mut self, text: &str) {
        if let Err(err) = self.queue(&Clientbound::Disconnect(Disconnect::new(text))) {
            tracing::debug!("[conn] disconnect not encodable: {}", err);
        }
        let _ = self.flush().await;
        let _ = self.stream.shutdown().await;
    }
}

/// The handshake and login as read, plus their raw frames for replay.
struct Login {
    request: LoginRequest,
    replay: Bytes,
}

/// Runs one client connection to completion. `bedrock` comes from the
/// host: set it only for connections a trusted Bedrock tunnel accepted.
pub async fn serve<S>(
    fallback: Arc<Fallback>,
    stream: S,
    addr: SocketAddr,
    bedrock: bool,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fallback.statistics.count_connection(Instant::now());
    let mut transport = Transport::new(stream, Arc::clone(&fallback.statistics));

    let login = match read_login(&fallback, &mut transport, addr, bedrock).await {
        Ok(Ok(login)) => login,
        Ok(Err(rejection)) => return reject(&fallback, &mut transport, addr, rejection).await,
        Err(err) => {
            tracing::debug!("[conn] [login] addr={} dropped: {}", addr, err);
            return Outcome::Abandoned;
        }
    };

    let (release, released) = oneshot::channel::<()>();
    let start = Box::new(move || {
        let _ = release.send(());
    });
    let admitted = fallback
        .admission
        .admit(&login.request, start, Instant::now());
    let guard = match admitted {
        Err(rejection) => return reject(&fallback, &mut transport, addr, rejection).await,
        Ok(Admitted::Bypass(guard)) => {
            let outcome = hand_off(&fallback, transport, login, Outcome::Bypassed).await;
            drop(guard);
            return outcome;
        }
        Ok(Admitted::Verified(guard)) => {
            let outcome = hand_off(&fallback, transport, login, Outcome::AlreadyVerified).await;
            drop(guard);
            return outcome;
        }
        Ok(Admitted::Queued(guard)) => guard,
    };

    let username = login.request.username;
    let profile = Profile {
        addr,
        version: transport.codec.version(),
        bedrock: login.request.bedrock,
        username,
    };

    let limit = fallback.ctx.config.queue_timeout();
    match timeout(limit, wait_for_release(&mut transport, released)).await {
        Ok(Ok(())) => {}
        Ok(Err(err @ ConnectionError::QueuedData(_))) => {
            let reason = err.to_string();
            fallback.fail(&profile, &reason);
            let text = fallback.ctx.messages.get(MessageKey::VerificationFailed).to_string();
            transport.disconnect(&text).await;
            return Outcome::Failed(reason);
        }
        Ok(Err(err)) => {
            tracing::debug!("[conn] [queue] addr={} left: {}", addr, err);
            return Outcome::Abandoned;
        }
        Err(_) => {
            tracing::debug!("[conn] [queue] addr={} timed out", addr);
            return Outcome::Abandoned;
        }
    }

    fallback.statistics.count_attempt();
    let outcome = verify(&fallback, &mut transport, profile).await;
    drop(guard);
    outcome
}

async fn read_login<S>(
    fallback: &Fallback,
    transport: &mut Transport<S>,
    addr: SocketAddr,
    bedrock: bool,
) -> Result<Result<Login, Rejection>, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = fallback.ctx.config.login_timeout();
    let mut gate = HandshakeGate::new();
    let mut replay = BytesMut::new();

    let frame = transport.read_frame(limit, "waiting for handshake").await?;
    encode_frame(&mut replay, &frame);
    let Some(Serverbound::Handshake(handshake)) = transport.codec.decode_serverbound(frame)? else {
        return Err(ConnectionError::Unexpected("handshake"));
    };
    if let Err(rejection) = gate.handshake(&handshake) {
        return Ok(Err(rejection));
    }

    let version = ProtocolVersion::from_id(handshake.protocol_version);
    // unknown versions are answered in the oldest dialect
    let dialect = if version.is_supported() {
        version
    } else {
        ProtocolVersion::OLDEST
    };
    transport.codec = PacketCodec::new(dialect, Phase::Login);

    let frame = transport.read_frame(limit, "waiting for login").await?;
    encode_frame(&mut replay, &frame);
    let login = match transport.codec.decode_serverbound(frame) {
        Ok(Some(Serverbound::LoginStart(login))) => login,
        // an unknown version may use a layout we cannot read
        _ if !version.is_supported() => {
            return Ok(Err(Rejection::UnsupportedVersion(handshake.protocol_version)))
        }
        Ok(_) => return Err(ConnectionError::Unexpected("login start")),
        Err(err) => return Err(err.into()),
    };
    let protocol = match gate.login(&login, chrono::Utc::now()) {
        Ok(protocol) => protocol,
        Err(rejection) => return Ok(Err(rejection)),
    };
    tracing::debug!(
        "[conn] [login] addr={} user={} version={}",
        addr,
        login.username,
        version
    );

    Ok(Ok(Login {
        request: LoginRequest {
            addr,
            protocol,
            username: login.username,
            bedrock,
        },
        replay: replay.freeze(),
    }))
}

async fn reject<S>(
    fallback: &Fallback,
    transport: &mut Transport<S>,
    addr: SocketAddr,
    rejection: Rejection,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!("[conn] [reject] addr={} {}", addr, rejection);
    let text = fallback.ctx.messages.get(rejection.message_key()).to_string();
    transport.disconnect(&text).await;
    Outcome::Rejected(rejection)
}

/// Waits for the queue tick while watching the socket. A client waiting
/// for LoginSuccess has nothing to say, so the first byte it sends ends
/// the wait.
async fn wait_for_release<S>(
    transport: &mut Transport<S>,
    mut released: oneshot::Receiver<()>,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !transport.read_buf.is_empty() {
        return Err(ConnectionError::QueuedData(transport.read_buf.len()));
    }
    tokio::select! {
        result = &mut released => result.map_err(|_| ConnectionError::Closed),
        result = transport.fill() => Err(ConnectionError::QueuedData(result?)),
    }
}

/// Sends a player that needs no verification to the backend, or tells it
/// to come back when there is none.
async fn hand_off<S>(
    fallback: &Fallback,
    mut transport: Transport<S>,
    login: Login,
    outcome: Outcome,
) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(backend) = fallback.ctx.config.backend.clone() else {
        let text = fallback.ctx.messages.get(MessageKey::VerificationSuccess).to_string();
        transport.disconnect(&text).await;
        return outcome;
    };
    let username = login.request.username.clone();
    match proxy(transport, login.replay, &backend).await {
        Ok((up, down)) => tracing::debug!(
            "[conn] [proxy] user={} closed up={} down={}",
            username,
            up,
            down
        ),
        Err(err) => tracing::warn!("[conn] [proxy] user={} backend={}: {}", username, backend, err),
    }
    outcome
}

async fn proxy<S>(
    transport: Transport<S>,
    replay: Bytes,
    backend: &str,
) -> Result<(u64, u64), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut upstream = TcpStream::connect(backend).await?;
    upstream.set_nodelay(true)?;
    upstream.write_all(&replay).await?;
    if !transport.read_buf.is_empty() {
        upstream.write_all(&transport.read_buf).await?;
    }
    let mut client = transport.stream;
    let copied = tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
    Ok(copied)
}

/// Runs the verification session until it passes, fails or is abandoned.
async fn verify<S>(fallback: &Fallback, transport: &mut Transport<S>, profile: Profile) -> Outcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = fallback.ctx.config.read_timeout();
    let mut session = Session::new(Arc::clone(&fallback.ctx), profile, Instant::now());
    let mut progress = session.start(Instant::now());

    loop {
        for out in session.drain_outbound() {
            let queued = match out {
                Outbound::Packet(packet) => transport.queue(&packet),
                Outbound::Phase(phase) => {
                    transport.codec.set_phase(phase);
                    Ok(())
                }
            };
            if let Err(err) = queued {
                tracing::warn!(
                    "[verify] [encode] user={} version={}: {}",
                    session.profile().username,
                    session.profile().version,
                    err
                );
                return Outcome::Abandoned;
            }
        }

        match progress {
            Ok(Progress::Continue) => {}
            Ok(Progress::Passed) => {
                fallback.finish(session.profile(), session.login_started());
                let text = fallback.ctx.messages.get(MessageKey::VerificationSuccess).to_string();
                transport.disconnect(&text).await;
                return Outcome::Passed;
            }
            Ok(Progress::Disconnect(key)) => {
                let text = fallback.ctx.messages.get(key).to_string();
                transport.disconnect(&text).await;
                return Outcome::Disconnected(key);
            }
            Err(err) => {
                let reason = err.to_string();
                fallback.fail(session.profile(), &reason);
                let text = fallback.ctx.messages.get(err.message_key()).to_string();
                transport.disconnect(&text).await;
                return Outcome::Failed(reason);
            }
        }

        if let Err(err) = transport.flush().await {
            tracing::debug!("[verify] user={} write failed: {}", session.profile().username, err);
            return Outcome::Abandoned;
        }

        progress = match transport.read_packet(limit, "verifying").await {
            Ok(packet) => session.handle(packet, Instant::now()),
            Err(ConnectionError::Protocol(err)) => {
                session.mark_failed();
                Err(VerificationError::Protocol(err))
            }
            Err(err) => {
                tracing::debug!(
                    "[verify] user={} phase={:?} abandoned: {}",
                    session.profile().username,
                    session.phase(),
                    err
                );
                return Outcome::Abandoned;
            }
        };
    }
}
