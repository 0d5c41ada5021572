//! # Incremental Frame Reassembly
//!
//! Purpose: Turn a byte stream that arrives fragmented or batched across
//! arbitrary read events into complete `WireFrame`s, without ever blocking
//! for more input.
//!
//! ## Design Principles
//! 1. **Resumable State Machine**: partial length prefixes and partial bodies
//!    are persisted between calls; a short read is backpressure, not an error.
//! 2. **One Frame In Flight**: only the frame currently being read is
//!    buffered; completed frames are handed out immediately.
//! 3. **Batch Friendly**: a single `feed` may yield many frames.
//! 4. **Bounded Allocation**: declared lengths are checked against a limit
//!    and reserved fallibly before any body byte is copied.
//!
//! ## State Overview
//!
//! ```text
//!   length_known = false            length_known = true
//!   ┌──────────────────┐  4 bytes   ┌──────────────────────┐
//!   │ len_buf[offset..]│ ─────────▶ │ body[offset..declared]│
//!   └──────────────────┘            └──────────────────────┘
//!            ▲                                  │ offset == declared
//!            └──────────── FrameReady ◀─────────┘
//! ```

use bytes::Bytes;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::frame::{WireFrame, DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_SIZE, TAG_SIZE};

/// Progress report emitted by `FrameDecoder::feed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The length prefix is incomplete; `have` of 4 bytes are buffered.
    NeedMoreLength { have: usize },
    /// The body is incomplete; `have` of `declared` bytes are buffered.
    NeedMoreBody { have: usize, declared: usize },
    /// A complete frame was reassembled.
    FrameReady(WireFrame),
}

impl FrameEvent {
    /// Returns the frame when this event carries one.
    pub fn into_frame(self) -> Option<WireFrame> {
        match self {
            FrameEvent::FrameReady(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Resumable decoder for the length-prefixed frame format.
#[derive(Debug)]
pub struct FrameDecoder {
    /// True once all four prefix bytes have been read.
    length_known: bool,
    /// Declared length of the current frame (tag + payload).
    declared_len: usize,
    /// Bytes of the current prefix or body already buffered.
    offset: usize,
    /// Partial length prefix.
    len_buf: [u8; LENGTH_PREFIX_SIZE],
    /// Body of the frame in flight (tag + payload).
    body: Vec<u8>,
    /// Declared lengths above this are rejected.
    max_frame_len: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a decoder that rejects frames declaring more than `max` bytes.
    pub fn with_max_frame_len(max: u32) -> Self {
        FrameDecoder {
            length_known: false,
            declared_len: 0,
            offset: 0,
            len_buf: [0u8; LENGTH_PREFIX_SIZE],
            body: Vec::new(),
            max_frame_len: max as usize,
        }
    }

    /// Consumes `input` and returns every event it produced.
    ///
    /// **Input**: raw bytes from one socket read (any size, including 0).
    /// **Output**: zero or more `FrameReady` events in receipt order, always
    /// followed by exactly one `NeedMoreLength`/`NeedMoreBody` describing
    /// what the decoder is waiting for next.
    ///
    /// **Logic**:
    /// 1. While the prefix is incomplete, copy up to the missing prefix bytes.
    /// 2. On a complete prefix, validate and fallibly reserve the body.
    /// 3. Copy up to `declared - offset` body bytes.
    /// 4. On a complete body, emit `FrameReady` and reset for the next frame.
    pub fn feed(&mut self, input: &[u8]) -> KvResult<Vec<FrameEvent>> {
        let mut events = Vec::new();
        self.feed_into(input, &mut events)?;
        Ok(events)
    }

    /// Same as `feed`, appending to a caller-owned event buffer.
    pub fn feed_into(&mut self, mut input: &[u8], events: &mut Vec<FrameEvent>) -> KvResult<()> {
        loop {
            if !self.length_known {
                let wanted = LENGTH_PREFIX_SIZE - self.offset;
                let take = wanted.min(input.len());
                self.len_buf[self.offset..self.offset + take].copy_from_slice(&input[..take]);
                self.offset += take;
                input = &input[take..];

                if self.offset < LENGTH_PREFIX_SIZE {
                    events.push(FrameEvent::NeedMoreLength { have: self.offset });
                    return Ok(());
                }
                self.begin_body()?;
            }

            let wanted = self.declared_len - self.offset;
            let take = wanted.min(input.len());
            self.body.extend_from_slice(&input[..take]);
            self.offset += take;
            input = &input[take..];

            if self.offset < self.declared_len {
                events.push(FrameEvent::NeedMoreBody {
                    have: self.offset,
                    declared: self.declared_len,
                });
                return Ok(());
            }

            events.push(FrameEvent::FrameReady(self.finish_frame()));
            if input.is_empty() {
                events.push(FrameEvent::NeedMoreLength { have: 0 });
                return Ok(());
            }
        }
    }

    /// True when no partial prefix or body is buffered.
    pub fn is_idle(&self) -> bool {
        !self.length_known && self.offset == 0
    }

    /// Number of bytes still missing from the frame in flight, if known.
    pub fn remaining(&self) -> Option<usize> {
        if self.length_known {
            Some(self.declared_len - self.offset)
        } else {
            None
        }
    }

    /// Discards any partial frame.
    pub fn reset(&mut self) {
        self.length_known = false;
        self.declared_len = 0;
        self.offset = 0;
        self.len_buf = [0u8; LENGTH_PREFIX_SIZE];
        self.body = Vec::new();
    }

    fn begin_body(&mut self) -> KvResult<()> {
        let declared = u32::from_be_bytes(self.len_buf) as usize;
        if declared < TAG_SIZE {
            self.reset();
            return Err(KvError::MessageFormat(
                "declared frame length 0 leaves no room for a tag".to_string(),
            ));
        }
        if declared > self.max_frame_len {
            self.reset();
            return Err(KvError::MessageFormat(format!(
                "declared frame length {} exceeds maximum {}",
                declared, self.max_frame_len
            )));
        }

        let mut body = Vec::new();
        if body.try_reserve_exact(declared).is_err() {
            self.reset();
            return Err(KvError::OutOfMemory(format!(
                "could not allocate {} byte frame buffer",
                declared
            )));
        }

        debug!(len = declared, "read frame length");
        self.body = body;
        self.declared_len = declared;
        self.offset = 0;
        self.length_known = true;
        Ok(())
    }

    fn finish_frame(&mut self) -> WireFrame {
        let body = Bytes::from(std::mem::take(&mut self.body));
        self.length_known = false;
        self.declared_len = 0;
        self.offset = 0;
        self.len_buf = [0u8; LENGTH_PREFIX_SIZE];

        let tag = body[0];
        WireFrame::new(tag, body.slice(TAG_SIZE..))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
