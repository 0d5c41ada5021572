//! # Reactor Adapter
//!
//! Purpose: Bind an `Operation` to a `Connection` and drive it to a terminal
//! state on the tokio runtime.
//!
//! ## Design Principles
//! 1. **Errors Travel Through Callbacks**: faults found while driving are
//!    delivered to the operation's error callback, never returned to the
//!    caller of `drive`.
//! 2. **Suspension Points Only At I/O**: control returns to the runtime only
//!    while writing the request or waiting for more bytes.
//! 3. **Client-Side Deadline**: an optional timeout fails the operation with
//!    `Timeout` and marks the connection broken.
//!
//! ## Flow
//!
//! ```text
//! begin_send ─▶ write_frame ─▶ ┌─ read_frame ─▶ on_frame ─┐
//!                              └──────── Continue ◀───────┘
//!                                         │ Done / Failed
//!                                         ▼
//!                                  terminal callback
//! ```

use std::time::Duration;

use tracing::{debug, error, warn};

use kvpb_common::{KvError, KvResult};

use crate::connection::{Connection, Transport};
use crate::operation::{Operation, OperationState, Progress, ResponseHandler};

/// Drives operations over one borrowed connection.
pub struct OperationDriver<'c, T: Transport> {
    conn: &'c mut Connection<T>,
    timeout: Option<Duration>,
}

impl<'c, T: Transport> OperationDriver<'c, T> {
    pub fn new(conn: &'c mut Connection<T>) -> Self {
        OperationDriver {
            conn,
            timeout: None,
        }
    }

    /// Sets the client-side deadline for each driven operation.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `op` until it reaches `Done` or `Failed`.
    ///
    /// **Output**: the terminal state. `Err(AlreadyCompleted)` is returned,
    /// without any callback, when `op` was already terminal. Every other
    /// failure reaches the operation's error callback instead.
    pub async fn drive<H: ResponseHandler>(
        &mut self,
        op: &mut Operation<H>,
    ) -> KvResult<OperationState> {
        if op.is_terminal() {
            return Err(KvError::AlreadyCompleted);
        }
        if !self.conn.is_usable() {
            op.fail(KvError::EventRegistration(format!(
                "{} is not usable",
                self.conn.id()
            )));
            return Ok(op.state());
        }
        if self.conn.has_buffered_input() {
            // Bytes left over from an earlier exchange mean the stream is out of sync.
            warn!(conn = %self.conn.id(), "stale input before request; connection unusable");
            self.conn.mark_broken();
            op.fail(KvError::UnexpectedResponse);
            return Ok(op.state());
        }

        // Cleared only if this future runs to completion; a caller that drops
        // it mid-exchange leaves the connection flagged for the pool to discard.
        self.conn.begin_exchange();
        let outcome = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, exchange(&mut *self.conn, op)).await {
                    Ok(result) => result,
                    Err(_) => Err(KvError::Timeout),
                }
            }
            None => exchange(&mut *self.conn, op).await,
        };
        self.conn.end_exchange();

        if let Err(err) = outcome {
            if err.is_fatal_to_connection() {
                self.conn.mark_broken();
                error!(
                    conn = %self.conn.id(),
                    host = %self.conn.host(),
                    error = %err,
                    "operation aborted"
                );
            }
            op.fail(err);
        } else if self.conn.has_buffered_input() {
            warn!(conn = %self.conn.id(), "extra frames after terminal response");
            self.conn.mark_broken();
        }

        debug!(conn = %self.conn.id(), state = ?op.state(), "operation finished");
        Ok(op.state())
    }
}

async fn exchange<T: Transport, H: ResponseHandler>(
    conn: &mut Connection<T>,
    op: &mut Operation<H>,
) -> KvResult<()> {
    let request = op.begin_send()?;
    conn.write_frame(&request).await?;

    loop {
        let frame = conn.read_frame().await?;
        match op.on_frame(frame)? {
            Progress::Continue => continue,
            Progress::Done => return Ok(()),
            Progress::Failed(server_error) => {
                conn.record_server_error(server_error);
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use prost::Message;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use kvpb_common::messages::ListKeysResp;
    use kvpb_common::tags::{TAG_ERROR_RESP, TAG_LIST_KEYS_RESP, TAG_PING_RESP};
    use kvpb_common::WireFrame;

    use crate::accumulator::Delivery;
    use crate::config::HostId;
    use crate::error_frame::encode_error;
    use crate::operation::callbacks;
    use crate::request::Request;
    use crate::response::Response;

    type Outcome = Arc<Mutex<Vec<Result<(Response, bool), KvError>>>>;

    fn collecting() -> (impl ResponseHandler, Outcome) {
        let out: Outcome = Arc::new(Mutex::new(Vec::new()));
        let ok = out.clone();
        let err = out.clone();
        let handler = callbacks(
            move |resp, done| ok.lock().unwrap().push(Ok((resp, done))),
            move |e| err.lock().unwrap().push(Err(e)),
        );
        (handler, out)
    }

    fn pair() -> (Connection<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(4096);
        (Connection::from_stream(HostId::new("test", 1), client, 1 << 20), server)
    }

    fn keys_frame(keys: &[&'static str], done: bool) -> Vec<u8> {
        let body = ListKeysResp {
            keys: keys.iter().map(|k| Bytes::from_static(k.as_bytes())).collect(),
            done: Some(done),
        }
        .encode_to_vec();
        WireFrame::new(TAG_LIST_KEYS_RESP, body).encode().unwrap().to_vec()
    }

    async fn consume_request(server: &mut DuplexStream) -> u8 {
        let mut head = [0u8; 5];
        server.read_exact(&mut head).await.unwrap();
        let len = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
        let mut rest = vec![0u8; len - 1];
        server.read_exact(&mut rest).await.unwrap();
        head[4]
    }

    #[tokio::test]
    async fn ping_completes() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::Ping, handler);

        let srv = tokio::spawn(async move {
            assert_eq!(consume_request(&mut server).await, 1);
            server.write_all(&[0, 0, 0, 1, TAG_PING_RESP]).await.unwrap();
            server
        });

        let state = OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        assert_eq!(state, OperationState::Done);
        assert!(matches!(out.lock().unwrap().as_slice(), [Ok((Response::Pong, true))]));
        assert!(conn.is_usable());
        srv.await.unwrap();

        // Driving a finished operation again is a defined error.
        let again = OperationDriver::new(&mut conn).drive(&mut op).await;
        assert!(matches!(again, Err(KvError::AlreadyCompleted)));
        assert_eq!(out.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_error_is_recorded_on_connection() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::get("b", "k"), handler);

        tokio::spawn(async move {
            consume_request(&mut server).await;
            let frame = WireFrame::new(TAG_ERROR_RESP, encode_error(5, "not_found"));
            server.write_all(&frame.encode().unwrap()).await.unwrap();
            server
        });

        let state = OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        assert_eq!(state, OperationState::Failed);
        assert_eq!(conn.last_server_error().map(|e| e.code()), Some(5));
        assert!(conn.is_usable());
        let out = out.lock().unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Err(KvError::Server(e)) if e.message() == b"not_found"));
    }

    #[tokio::test]
    async fn fragmented_stream_merges_once() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::list_keys("b"), handler);

        tokio::spawn(async move {
            consume_request(&mut server).await;
            let mut bytes = keys_frame(&["a", "b"], false);
            bytes.extend(keys_frame(&[], false));
            bytes.extend(keys_frame(&["c"], true));
            for chunk in bytes.chunks(3) {
                server.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
            server
        });

        OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        let out = out.lock().unwrap();
        assert_eq!(out.len(), 1);
        match &out[0] {
            Ok((Response::Keys(keys), true)) => assert_eq!(keys, &vec!["a", "b", "c"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn per_fragment_stream_delivers_each_frame() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op =
            Operation::with_delivery(&Request::list_keys("b"), Delivery::PerFragment, handler);

        tokio::spawn(async move {
            consume_request(&mut server).await;
            let mut bytes = keys_frame(&["a"], false);
            bytes.extend(keys_frame(&["b"], false));
            bytes.extend(keys_frame(&["c"], true));
            server.write_all(&bytes).await.unwrap();
            server
        });

        OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        assert_eq!(out.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn peer_close_mid_stream_fails_once() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::list_keys("b"), handler);

        tokio::spawn(async move {
            consume_request(&mut server).await;
            server.write_all(&keys_frame(&["a"], false)).await.unwrap();
            drop(server);
        });

        let state = OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        assert_eq!(state, OperationState::Failed);
        assert!(conn.is_broken());
        assert!(matches!(out.lock().unwrap().as_slice(), [Err(KvError::ConnectionClosed)]));
    }

    #[tokio::test]
    async fn stalled_peer_times_out() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::Ping, handler);

        let _srv = tokio::spawn(async move {
            consume_request(&mut server).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            server
        });

        let state = OperationDriver::new(&mut conn)
            .with_timeout(Some(Duration::from_millis(50)))
            .drive(&mut op)
            .await
            .unwrap();
        assert_eq!(state, OperationState::Failed);
        assert!(conn.is_broken());
        assert!(matches!(out.lock().unwrap().as_slice(), [Err(KvError::Timeout)]));
    }

    #[tokio::test]
    async fn cancelled_drive_leaves_connection_unusable() {
        let (mut conn, mut server) = pair();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::Ping, handler);

        let _srv = tokio::spawn(async move {
            consume_request(&mut server).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            server
        });

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            OperationDriver::new(&mut conn).drive(&mut op),
        )
        .await;
        assert!(cancelled.is_err());
        drop(op);

        assert!(conn.is_in_flight());
        assert!(!conn.is_usable());
        assert!(matches!(out.lock().unwrap().as_slice(), [Err(KvError::ConnectionClosed)]));

        let (handler, out) = collecting();
        let mut next = Operation::new(&Request::Ping, handler);
        let state = OperationDriver::new(&mut conn).drive(&mut next).await.unwrap();
        assert_eq!(state, OperationState::Failed);
        assert!(matches!(
            out.lock().unwrap().as_slice(),
            [Err(KvError::EventRegistration(_))]
        ));
    }

    #[tokio::test]
    async fn broken_connection_refuses_binding() {
        let (mut conn, _server) = pair();
        conn.mark_broken();
        let (handler, out) = collecting();
        let mut op = Operation::new(&Request::Ping, handler);

        let state = OperationDriver::new(&mut conn).drive(&mut op).await.unwrap();
        assert_eq!(state, OperationState::Failed);
        assert!(matches!(
            out.lock().unwrap().as_slice(),
            [Err(KvError::EventRegistration(_))]
        ));
    }
}
