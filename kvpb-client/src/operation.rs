//! # Operation Lifecycle
//!
//! Purpose: Model one request/response exchange as a state machine that
//! fires exactly one terminal callback, however it ends.
//!
//! ## State Machine
//!
//! ```text
//! Built ──encode──▶ Encoded ──begin_send──▶ Sent ──frame──▶ Receiving
//!                                                              │
//!                              ┌──── fragment, !done ◀─────────┤
//!                              ▼                               │
//!                          Streaming ──frame, done──▶ Done     │
//!                              │                               │
//!                              └──error frame / fault──▶ Failed ◀┘
//! ```
//!
//! ## Design Principles
//! 1. **Decoder Bound At Encode**: an `Operation` only exists once a request
//!    has been encoded, so it can never be sent without a decoder.
//! 2. **Exactly Once**: the handler sits in an `Option` and is taken on the
//!    terminal transition; nothing can call it afterwards.
//! 3. **No Socket Knowledge**: the operation consumes frames and reports
//!    progress; the reactor driver owns the I/O.

use tracing::debug;

use kvpb_common::{KvError, KvResult, ServerError, WireFrame};

use crate::accumulator::{Delivery, StreamingAccumulator};
use crate::error_frame;
use crate::request::{EncodedRequest, Request};
use crate::response::{Response, ResponseKind};

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    Built,
    Encoded,
    Sent,
    Receiving,
    Streaming,
    Done,
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationState::Done | OperationState::Failed)
    }
}

/// Receiver of an operation's outcome.
///
/// `on_response` is called once with `done = true` for merged delivery, or
/// once per fragment for per-fragment delivery. `on_error` is called at most
/// once, and never after a `done = true` response.
pub trait ResponseHandler: Send {
    fn on_response(&mut self, response: Response, done: bool);
    fn on_error(&mut self, error: KvError);
}

impl<H: ResponseHandler + ?Sized> ResponseHandler for Box<H> {
    fn on_response(&mut self, response: Response, done: bool) {
        (**self).on_response(response, done)
    }

    fn on_error(&mut self, error: KvError) {
        (**self).on_error(error)
    }
}

/// Closure pair implementing `ResponseHandler`.
pub struct Callbacks<R, E> {
    on_response: R,
    on_error: Option<E>,
}

/// Builds a handler from a response closure and an error closure.
pub fn callbacks<R, E>(on_response: R, on_error: E) -> Callbacks<R, E>
where
    R: FnMut(Response, bool) + Send,
    E: FnOnce(KvError) + Send,
{
    Callbacks {
        on_response,
        on_error: Some(on_error),
    }
}

impl<R, E> ResponseHandler for Callbacks<R, E>
where
    R: FnMut(Response, bool) + Send,
    E: FnOnce(KvError) + Send,
{
    fn on_response(&mut self, response: Response, done: bool) {
        (self.on_response)(response, done)
    }

    fn on_error(&mut self, error: KvError) {
        if let Some(on_error) = self.on_error.take() {
            on_error(error)
        }
    }
}

/// What the driver should do after feeding a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// More frames are expected.
    Continue,
    /// The response callback fired with the final value.
    Done,
    /// The server rejected the request; the error callback fired.
    Failed(ServerError),
}

/// An operation before a request kind has been chosen.
pub struct OperationBuilder<H> {
    handler: H,
    delivery: Delivery,
}

impl<H: ResponseHandler> OperationBuilder<H> {
    pub fn new(handler: H) -> Self {
        OperationBuilder {
            handler,
            delivery: Delivery::Merged,
        }
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn state(&self) -> OperationState {
        OperationState::Built
    }

    /// Encodes `request` and registers its decoder in one step.
    pub fn encode(self, request: &Request) -> Operation<H> {
        Operation {
            state: OperationState::Encoded,
            request: request.encode(),
            accumulator: StreamingAccumulator::new(self.delivery),
            handler: Some(self.handler),
            frames: 0,
        }
    }
}

/// One in-flight request/response exchange.
pub struct Operation<H: ResponseHandler> {
    state: OperationState,
    request: EncodedRequest,
    accumulator: StreamingAccumulator,
    handler: Option<H>,
    frames: usize,
}

impl<H: ResponseHandler> Operation<H> {
    /// Encoded operation with merged delivery.
    pub fn new(request: &Request, handler: H) -> Self {
        OperationBuilder::new(handler).encode(request)
    }

    pub fn with_delivery(request: &Request, delivery: Delivery, handler: H) -> Self {
        OperationBuilder::new(handler).delivery(delivery).encode(request)
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn response_kind(&self) -> ResponseKind {
        self.request.decoder
    }

    pub fn delivery(&self) -> Delivery {
        self.accumulator.delivery()
    }

    pub fn request(&self) -> &EncodedRequest {
        &self.request
    }

    /// Frames consumed so far.
    pub fn frames_received(&self) -> usize {
        self.frames
    }

    /// Moves `Encoded -> Sent` and returns the frame to write.
    pub fn begin_send(&mut self) -> KvResult<WireFrame> {
        match self.state {
            OperationState::Encoded => {
                self.state = OperationState::Sent;
                Ok(self.request.frame())
            }
            state if state.is_terminal() => Err(KvError::AlreadyCompleted),
            _ => Err(KvError::EventRegistration(
                "operation is already bound to a connection".to_string(),
            )),
        }
    }

    /// Consumes one reassembled frame.
    ///
    /// **Logic**:
    /// 1. Error frames are translated and fail the operation.
    /// 2. Other frames go through the registered decoder and the accumulator.
    /// 3. The terminal fragment fires the response callback for the last time.
    ///
    /// An `Err` means the frame could not be processed; the caller must fail
    /// the operation with it.
    pub fn on_frame(&mut self, frame: WireFrame) -> KvResult<Progress> {
        match self.state {
            OperationState::Sent | OperationState::Receiving | OperationState::Streaming => {}
            state if state.is_terminal() => return Err(KvError::AlreadyCompleted),
            _ => return Err(KvError::Uninitialized("operation has not been sent")),
        }

        self.frames += 1;
        if self.state == OperationState::Sent {
            self.state = OperationState::Receiving;
        }

        if let Some(translated) = error_frame::translate_frame(&frame) {
            let server_error = translated?;
            self.fail(KvError::Server(server_error.clone()));
            return Ok(Progress::Failed(server_error));
        }

        let (response, done) = self.request.decoder.decode(frame.tag(), frame.payload())?;
        let ready = self.accumulator.push(response, done)?;

        if done {
            self.state = OperationState::Done;
            if let (Some(value), Some(mut handler)) = (ready, self.handler.take()) {
                handler.on_response(value, true);
            }
            debug!(
                kind = ?self.request.decoder,
                frames = self.frames,
                elements = self.accumulator.elements(),
                "operation done"
            );
            return Ok(Progress::Done);
        }

        self.state = OperationState::Streaming;
        if let (Some(value), Some(handler)) = (ready, self.handler.as_mut()) {
            handler.on_response(value, false);
        }
        Ok(Progress::Continue)
    }

    /// Fails the operation, firing the error callback if it has not fired.
    ///
    /// Returns `false` when the operation was already terminal.
    pub fn fail(&mut self, error: KvError) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = OperationState::Failed;
        debug!(kind = ?self.request.decoder, error = %error, "operation failed");
        if let Some(mut handler) = self.handler.take() {
            handler.on_error(error);
        }
        true
    }
}

impl<H: ResponseHandler> Drop for Operation<H> {
    fn drop(&mut self) {
        // An exchange abandoned mid-flight still owes its caller an outcome.
        if matches!(
            self.state,
            OperationState::Sent | OperationState::Receiving | OperationState::Streaming
        ) {
            self.fail(KvError::ConnectionClosed);
        }
    }
}

impl<H: ResponseHandler> std::fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("state", &self.state)
            .field("kind", &self.request.decoder)
            .field("delivery", &self.accumulator.delivery())
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use prost::Message;

    use kvpb_common::messages::ListKeysResp;
    use kvpb_common::tags::{TAG_ERROR_RESP, TAG_LIST_KEYS_RESP, TAG_PING_RESP};

    #[derive(Default)]
    struct Log {
        responses: Vec<(Response, bool)>,
        errors: Vec<KvError>,
    }

    struct Recorder(Arc<Mutex<Log>>);

    impl ResponseHandler for Recorder {
        fn on_response(&mut self, response: Response, done: bool) {
            self.0.lock().unwrap().responses.push((response, done));
        }

        fn on_error(&mut self, error: KvError) {
            self.0.lock().unwrap().errors.push(error);
        }
    }

    fn recorder() -> (Recorder, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        (Recorder(log.clone()), log)
    }

    fn keys_frame(keys: &[&'static str], done: bool) -> WireFrame {
        let body = ListKeysResp {
            keys: keys.iter().map(|k| Bytes::from_static(k.as_bytes())).collect(),
            done: if done { Some(true) } else { None },
        }
        .encode_to_vec();
        WireFrame::new(TAG_LIST_KEYS_RESP, body)
    }

    fn error_frame(code: u32, msg: &'static str) -> WireFrame {
        WireFrame::new(TAG_ERROR_RESP, error_frame::encode_error(code, msg))
    }

    #[test]
    fn ping_walks_sent_receiving_done() {
        let (handler, log) = recorder();
        let builder = OperationBuilder::new(handler);
        assert_eq!(builder.state(), OperationState::Built);

        let mut op = builder.encode(&Request::Ping);
        assert_eq!(op.state(), OperationState::Encoded);
        op.begin_send().unwrap();
        assert_eq!(op.state(), OperationState::Sent);

        let progress = op.on_frame(WireFrame::empty(TAG_PING_RESP)).unwrap();
        assert_eq!(progress, Progress::Done);
        assert_eq!(op.state(), OperationState::Done);

        let log = log.lock().unwrap();
        assert_eq!(log.responses, vec![(Response::Pong, true)]);
        assert!(log.errors.is_empty());
    }

    #[test]
    fn error_frame_fails_once_with_server_error() {
        let (handler, log) = recorder();
        let mut op = Operation::new(&Request::get("b", "k"), handler);
        op.begin_send().unwrap();

        let progress = op.on_frame(error_frame(5, "not_found")).unwrap();
        match progress {
            Progress::Failed(err) => assert_eq!(err.code(), 5),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(op.state(), OperationState::Failed);

        // A second drive attempt is a defined error, not a second callback.
        assert!(matches!(
            op.on_frame(WireFrame::empty(TAG_PING_RESP)),
            Err(KvError::AlreadyCompleted)
        ));
        assert!(!op.fail(KvError::Timeout));
        assert!(matches!(op.begin_send(), Err(KvError::AlreadyCompleted)));

        let log = log.lock().unwrap();
        assert!(log.responses.is_empty());
        assert_eq!(log.errors.len(), 1);
        assert_eq!(log.errors[0].server_error().map(|e| e.code()), Some(5));
    }

    #[test]
    fn merged_streaming_calls_back_once() {
        let (handler, log) = recorder();
        let mut op = Operation::new(&Request::list_keys("b"), handler);
        op.begin_send().unwrap();

        assert_eq!(op.on_frame(keys_frame(&["a"], false)).unwrap(), Progress::Continue);
        assert_eq!(op.state(), OperationState::Streaming);
        assert_eq!(op.on_frame(keys_frame(&[], false)).unwrap(), Progress::Continue);
        assert_eq!(op.on_frame(keys_frame(&["b", "c"], true)).unwrap(), Progress::Done);

        let log = log.lock().unwrap();
        assert_eq!(log.responses.len(), 1);
        let (merged, done) = &log.responses[0];
        assert!(*done);
        assert_eq!(merged.len(), 3);
        assert_eq!(op.frames_received(), 3);
    }

    #[test]
    fn per_fragment_streaming_calls_back_per_frame() {
        let (handler, log) = recorder();
        let mut op = Operation::with_delivery(&Request::list_keys("b"), Delivery::PerFragment, handler);
        op.begin_send().unwrap();

        op.on_frame(keys_frame(&["a"], false)).unwrap();
        op.on_frame(keys_frame(&["b"], false)).unwrap();
        op.on_frame(keys_frame(&["c"], true)).unwrap();

        let log = log.lock().unwrap();
        let flags: Vec<bool> = log.responses.iter().map(|(_, done)| *done).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn wrong_tag_is_reported_to_driver() {
        let (handler, log) = recorder();
        let mut op = Operation::new(&Request::Ping, handler);
        op.begin_send().unwrap();

        let err = op.on_frame(keys_frame(&[], true)).unwrap_err();
        assert!(matches!(err, KvError::MessageFormat(_)));
        assert!(op.fail(err));
        assert_eq!(log.lock().unwrap().errors.len(), 1);
    }

    #[test]
    fn frames_before_send_are_rejected() {
        let (handler, _log) = recorder();
        let mut op = Operation::new(&Request::Ping, handler);
        assert!(matches!(
            op.on_frame(WireFrame::empty(TAG_PING_RESP)),
            Err(KvError::Uninitialized(_))
        ));
    }

    #[test]
    fn dropping_in_flight_operation_reports_error() {
        let (handler, log) = recorder();
        {
            let mut op = Operation::new(&Request::list_keys("b"), handler);
            op.begin_send().unwrap();
            op.on_frame(keys_frame(&["a"], false)).unwrap();
        }
        let log = log.lock().unwrap();
        assert!(log.responses.is_empty());
        assert!(matches!(log.errors.as_slice(), [KvError::ConnectionClosed]));
    }

    #[test]
    fn closure_handlers_work() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let mut op = Operation::new(
            &Request::Ping,
            callbacks(
                move |resp, done| *sink.lock().unwrap() = Some((resp, done)),
                |err| panic!("unexpected error {}", err),
            ),
        );
        op.begin_send().unwrap();
        op.on_frame(WireFrame::empty(TAG_PING_RESP)).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some((Response::Pong, true)));
    }
}
