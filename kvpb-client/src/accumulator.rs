//! # Streaming Accumulator
//!
//! Purpose: Collect the fragments of a multi-frame response until the
//! terminal `done` marker, and decide what the caller sees along the way.
//!
//! ## Delivery Policy
//! - `Delivery::Merged`: fragments are folded silently; the merged value is
//!   released exactly once, on `done`.
//! - `Delivery::PerFragment`: every fragment is released as it arrives, with
//!   its `done` flag.
//!
//! A fragment with no elements and `done = false` is valid and does not end
//! the stream. Merging uses `Vec::extend`, so growth is amortized.

use kvpb_common::{KvError, KvResult};

use crate::response::Response;

/// How a streaming response is handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// One callback with the merged value once the stream ends.
    #[default]
    Merged,
    /// One callback per fragment.
    PerFragment,
}

/// Per-operation fragment collector.
#[derive(Debug)]
pub struct StreamingAccumulator {
    delivery: Delivery,
    merged: Option<Response>,
    fragments: usize,
    elements: usize,
    done: bool,
}

impl StreamingAccumulator {
    pub fn new(delivery: Delivery) -> Self {
        StreamingAccumulator {
            delivery,
            merged: None,
            fragments: 0,
            elements: 0,
            done: false,
        }
    }

    /// Accepts one decoded fragment.
    ///
    /// **Output**: `Some(value)` when something must be delivered now:
    /// every fragment under `PerFragment`, the merged value on `done` under
    /// `Merged`. Fragments after `done` are rejected with `MessageFormat`.
    pub fn push(&mut self, fragment: Response, done: bool) -> KvResult<Option<Response>> {
        if self.done {
            return Err(KvError::MessageFormat(
                "fragment received after stream completed".to_string(),
            ));
        }

        self.fragments += 1;
        self.elements += fragment.len();
        self.done = done;

        match self.delivery {
            Delivery::PerFragment => Ok(Some(fragment)),
            Delivery::Merged => {
                match self.merged.as_mut() {
                    Some(acc) => acc.merge(fragment)?,
                    None => self.merged = Some(fragment),
                }
                if done {
                    Ok(self.merged.take())
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fragments accepted so far.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Elements accepted so far, across all fragments.
    pub fn elements(&self) -> usize {
        self.elements
    }
}
