//! # Connection
//!
//! Purpose: One open socket to one cluster member, plus the per-socket
//! decoding state and bookkeeping the engine needs.
//!
//! ## Design Principles
//! 1. **Generic Transport**: any `AsyncRead + AsyncWrite` stream works, so
//!    tests can drive a connection over an in-memory duplex pipe.
//! 2. **Frames Stay In Order**: frames reassembled from one read are queued
//!    and handed out strictly in receipt order.
//! 3. **Broken Is Sticky**: after a transport, decode or timeout fault the
//!    connection is never reused.
//! 4. **Teardown Never Aborts**: close failures are logged, then cleanup
//!    continues.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use kvpb_common::{
    FrameDecoder, FrameEvent, KvError, KvResult, ServerError, WireFrame, DEFAULT_MAX_FRAME_LEN,
};

use crate::config::{ClientConfig, HostId};
use crate::resolver::Resolver;

const READ_BUF_CAPACITY: usize = 8 * 1024;

/// Byte stream a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Socket options applied when a connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub connect_timeout: Option<Duration>,
    pub nodelay: bool,
    pub max_frame_len: u32,
}

impl ConnectOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        ConnectOptions {
            connect_timeout: config.connect_timeout(),
            nodelay: config.nodelay,
            max_frame_len: config.max_frame_len,
        }
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            connect_timeout: None,
            nodelay: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// An open connection to one host.
pub struct Connection<T = TcpStream> {
    id: ConnectionId,
    host: HostId,
    addr: Option<SocketAddr>,
    stream: T,
    decoder: FrameDecoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    ready: VecDeque<WireFrame>,
    created_at: Instant,
    last_activity: Instant,
    last_server_error: Option<ServerError>,
    deferred_error: Option<KvError>,
    in_flight: bool,
    broken: bool,
    closed: bool,
}

impl Connection<TcpStream> {
    /// Resolves `host` and opens a TCP connection to it.
    ///
    /// Fails with `DnsResolution` or `Connect`; no partial connection is left
    /// behind.
    pub async fn connect(
        host: &HostId,
        resolver: &dyn Resolver,
        options: &ConnectOptions,
    ) -> KvResult<Self> {
        let addr = resolver.resolve(host.host(), host.port()).await?;

        let connect = TcpStream::connect(addr);
        let stream = match options.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                )),
            },
            None => connect.await,
        }
        .map_err(|source| KvError::Connect {
            addr: addr.to_string(),
            source,
        })?;

        if options.nodelay {
            if let Err(err) = stream.set_nodelay(true) {
                warn!(host = %host, error = %err, "failed to set TCP_NODELAY");
            }
        }

        let mut conn = Connection::from_stream(host.clone(), stream, options.max_frame_len);
        conn.addr = Some(addr);
        info!(conn = %conn.id, host = %host, addr = %addr, "connection opened");
        Ok(conn)
    }
}

impl<T: Transport> Connection<T> {
    /// Wraps an already-open stream.
    pub fn from_stream(host: HostId, stream: T, max_frame_len: u32) -> Self {
        let now = Instant::now();
        Connection {
            id: ConnectionId::next(),
            host,
            addr: None,
            stream,
            decoder: FrameDecoder::with_max_frame_len(max_frame_len),
            read_buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
            write_buf: BytesMut::new(),
            ready: VecDeque::new(),
            created_at: now,
            last_activity: now,
            last_server_error: None,
            deferred_error: None,
            in_flight: false,
            broken: false,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// Address the socket was connected to, when opened via `connect`.
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Most recent error frame received on this connection.
    pub fn last_server_error(&self) -> Option<&ServerError> {
        self.last_server_error.as_ref()
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True while a request is written but its response not fully read.
    ///
    /// Stays set when the exchange is abandoned midway, so the socket is
    /// never handed to another operation out of sync.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// True when the connection can carry another operation.
    pub fn is_usable(&self) -> bool {
        !self.broken && !self.closed && !self.in_flight
    }

    /// True when reassembled frames or partial bytes are still buffered.
    pub fn has_buffered_input(&self) -> bool {
        !self.ready.is_empty() || !self.decoder.is_idle()
    }

    pub(crate) fn record_server_error(&mut self, error: ServerError) {
        self.last_server_error = Some(error);
    }

    pub(crate) fn begin_exchange(&mut self) {
        self.in_flight = true;
    }

    pub(crate) fn end_exchange(&mut self) {
        self.in_flight = false;
    }

    pub(crate) fn mark_broken(&mut self) {
        if !self.broken {
            debug!(conn = %self.id, "connection marked broken");
        }
        self.broken = true;
    }

    /// Writes one frame and flushes it.
    ///
    /// `write_all` retries partial writes until the frame is flushed or the
    /// socket errors.
    pub async fn write_frame(&mut self, frame: &WireFrame) -> KvResult<()> {
        self.write_buf.clear();
        frame.encode_into(&mut self.write_buf)?;

        if let Err(err) = self.stream.write_all(&self.write_buf).await {
            self.mark_broken();
            return Err(KvError::Write(err));
        }
        if let Err(err) = self.stream.flush().await {
            self.mark_broken();
            return Err(KvError::Write(err));
        }

        self.last_activity = Instant::now();
        debug!(conn = %self.id, tag = frame.tag(), len = frame.payload().len(), "frame written");
        Ok(())
    }

    /// Returns the next complete frame, reading from the socket as needed.
    ///
    /// A zero-byte read while waiting is `ConnectionClosed`. A decode fault
    /// is reported only after the frames that preceded it are handed out.
    pub async fn read_frame(&mut self) -> KvResult<WireFrame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }
            if let Some(err) = self.deferred_error.take() {
                return Err(err);
            }

            self.read_buf.clear();
            let read = match self.stream.read_buf(&mut self.read_buf).await {
                Ok(read) => read,
                Err(err) => {
                    self.mark_broken();
                    return Err(KvError::Read(err));
                }
            };
            if read == 0 {
                self.mark_broken();
                return Err(KvError::ConnectionClosed);
            }
            self.last_activity = Instant::now();

            let mut events = Vec::new();
            let fed = self.decoder.feed_into(&self.read_buf[..read], &mut events);
            for event in events {
                match event {
                    FrameEvent::FrameReady(frame) => self.ready.push_back(frame),
                    FrameEvent::NeedMoreLength { have } => {
                        debug!(conn = %self.id, have, "awaiting frame length")
                    }
                    FrameEvent::NeedMoreBody { have, declared } => {
                        debug!(conn = %self.id, have, declared, "awaiting frame body")
                    }
                }
            }
            if let Err(err) = fed {
                self.mark_broken();
                self.deferred_error = Some(err);
            }
        }
    }

    /// Shuts the socket down and drops any buffered input.
    ///
    /// A shutdown failure is logged; teardown continues regardless.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.stream.shutdown().await {
            warn!(conn = %self.id, error = %err, "socket shutdown failed; continuing teardown");
        }
        self.release_buffers();
        info!(conn = %self.id, host = %self.host, "connection closed");
    }

    /// Drops the connection without an orderly shutdown.
    pub(crate) fn discard(mut self, reason: &str) {
        self.closed = true;
        self.release_buffers();
        if self.broken {
            error!(conn = %self.id, host = %self.host, reason, "discarding broken connection");
        } else {
            info!(conn = %self.id, host = %self.host, reason, "discarding connection");
        }
    }

    fn release_buffers(&mut self) {
        self.ready.clear();
        self.deferred_error = None;
        self.decoder.reset();
        self.read_buf = BytesMut::new();
        self.write_buf = BytesMut::new();
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("addr", &self.addr)
            .field("in_flight", &self.in_flight)
            .field("broken", &self.broken)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvpb_common::tags::{TAG_LIST_KEYS_RESP, TAG_PING_REQ, TAG_PING_RESP};
    use tokio::io::duplex;

    fn pair() -> (Connection<tokio::io::DuplexStream>, tokio::io::DuplexStream) {
        let (client, server) = duplex(1024);
        let conn = Connection::from_stream(HostId::new("test", 1), client, 1024);
        (conn, server)
    }

    #[tokio::test]
    async fn write_frame_emits_wire_bytes() {
        let (mut conn, mut server) = pair();
        conn.write_frame(&WireFrame::empty(TAG_PING_REQ)).await.unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0, 0, 0, 1, TAG_PING_REQ]);
    }

    #[tokio::test]
    async fn batched_frames_are_returned_in_order() {
        let (mut conn, mut server) = pair();
        let mut bytes = WireFrame::empty(TAG_PING_RESP).encode().unwrap().to_vec();
        bytes.extend_from_slice(&WireFrame::new(TAG_LIST_KEYS_RESP, vec![1u8]).encode().unwrap());
        server.write_all(&bytes).await.unwrap();

        assert_eq!(conn.read_frame().await.unwrap().tag(), TAG_PING_RESP);
        assert!(conn.has_buffered_input());
        assert_eq!(conn.read_frame().await.unwrap().tag(), TAG_LIST_KEYS_RESP);
        assert!(!conn.has_buffered_input());
    }

    #[tokio::test]
    async fn peer_close_is_connection_closed() {
        let (mut conn, server) = pair();
        drop(server);
        let err = conn.read_frame().await.unwrap_err();
        assert!(matches!(err, KvError::ConnectionClosed));
        assert!(conn.is_broken());
        assert!(!conn.is_usable());
    }

    #[tokio::test]
    async fn oversized_frame_breaks_connection() {
        let (mut conn, mut server) = pair();
        server.write_all(&[0, 0, 0x10, 0]).await.unwrap();
        let err = conn.read_frame().await.unwrap_err();
        assert!(matches!(err, KvError::MessageFormat(_)));
        assert!(conn.is_broken());
    }

    #[tokio::test]
    async fn frames_before_a_bad_prefix_are_still_delivered() {
        let (mut conn, mut server) = pair();
        server.write_all(&[0, 0, 0, 1, TAG_PING_RESP, 0, 0, 0, 0]).await.unwrap();

        assert_eq!(conn.read_frame().await.unwrap().tag(), TAG_PING_RESP);
        assert!(conn.is_broken());
        let err = conn.read_frame().await.unwrap_err();
        assert!(matches!(err, KvError::MessageFormat(_)));
    }

    #[test]
    fn abandoned_exchange_is_not_usable() {
        let (mut conn, _server) = pair();
        conn.begin_exchange();
        assert!(conn.is_in_flight());
        assert!(!conn.is_usable());
        conn.end_exchange();
        assert!(conn.is_usable());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut conn, _server) = pair();
        conn.close().await;
        conn.close().await;
        assert!(conn.is_closed());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
        assert_eq!(format!("{}", ConnectionId(7)), "conn-7");
    }
}
