//! # kvpb Client Engine
//!
//! Purpose: Talk to a clustered key/value database over its length-prefixed,
//! tagged protocol-buffer protocol, with pooled connections and exactly-once
//! completion for every request.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: reuse TCP connections across requests.
//! 2. **State Machine Per Request**: `Operation` owns the lifecycle and the
//!    callback contract; the reactor driver owns the I/O.
//! 3. **Closed Decoder Set**: every encoded request carries its decoder.
//! 4. **Async First**: tokio drives sockets; `SyncClient` blocks on top.

mod accumulator;
mod client;
mod config;
mod connection;
mod error_frame;
mod operation;
mod pool;
mod reactor;
mod request;
mod resolver;
mod response;
mod sync_client;

pub use accumulator::{Delivery, StreamingAccumulator};
pub use client::Client;
pub use config::{ClientConfig, HostConfig, HostId, DEFAULT_PORT};
pub use connection::{ConnectOptions, Connection, ConnectionId, Transport};
pub use error_frame::{encode_error, translate as translate_error_frame};
pub use operation::{
    callbacks, Callbacks, Operation, OperationBuilder, OperationState, Progress, ResponseHandler,
};
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use reactor::OperationDriver;
pub use request::{EncodedRequest, Request};
pub use resolver::{Resolver, StaticResolver, SystemResolver};
pub use response::{Fragment, IndexResults, MapReducePhase, Response, ResponseKind, ServerInfo};
pub use sync_client::SyncClient;

pub use kvpb_common::{messages, ErrorKind, KvError, KvResult, ServerError, WireFrame};
