//! # Error Taxonomy
//!
//! Purpose: Give every failure the engine can observe a specific, matchable
//! classification so callers can tell "preconditions not satisfiable" apart
//! from "the database rejected the request" and "the network failed".
//!
//! ## Design Principles
//! 1. **Closed Taxonomy**: `KvError` variants map 1:1 onto `ErrorKind` codes.
//! 2. **Server vs Local**: `ServerError` is data returned by the peer and is
//!    kept separate from locally classified transport failures.
//! 3. **No Bare Booleans**: every fallible entry point returns `KvResult`.

use std::fmt;
use std::io;

use bytes::Bytes;
use thiserror::Error;

/// Result type shared by all kvpb crates.
pub type KvResult<T> = Result<T, KvError>;

/// Structured error returned by the remote peer in an error frame.
///
/// A `ServerError` is owned by the connection that received it until a newer
/// one supersedes it or the connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    code: u32,
    message: Bytes,
}

impl ServerError {
    /// Builds a server error from the decoded error frame fields.
    pub fn new(code: u32, message: impl Into<Bytes>) -> Self {
        ServerError {
            code,
            message: message.into(),
        }
    }

    /// Numeric error code reported by the server.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Raw message bytes reported by the server.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Message decoded as UTF-8, replacing invalid sequences.
    pub fn message_lossy(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERR #{} - {}",
            self.code,
            String::from_utf8_lossy(&self.message)
        )
    }
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum KvError {
    /// Host name or port could not be resolved to an address.
    #[error("could not resolve {host}:{port}: {reason}")]
    DnsResolution {
        host: String,
        port: u16,
        reason: String,
    },

    /// Socket could not be opened or connected.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A buffer could not be allocated.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Reading from the socket failed.
    #[error("read error: {0}")]
    Read(#[source] io::Error),

    /// Writing to the socket failed.
    #[error("write error: {0}")]
    Write(#[source] io::Error),

    /// The peer closed the socket while a response was still expected.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The operation could not be bound to the event reactor.
    #[error("event registration failed: {0}")]
    EventRegistration(String),

    /// The database rejected the request.
    #[error("server error: {0}")]
    Server(ServerError),

    /// A frame or payload could not be decoded.
    #[error("malformed message: {0}")]
    MessageFormat(String),

    /// The pool has no available connection and no remaining capacity.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The named host is not part of the pool configuration.
    #[error("host {host}:{port} not found")]
    NotFound { host: String, port: u16 },

    /// Index-style accessor was used outside its bounds.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Operation used before its required setup.
    #[error("uninitialized: {0}")]
    Uninitialized(&'static str),

    /// The client-side deadline elapsed before the operation finished.
    #[error("operation timed out")]
    Timeout,

    /// The operation already reached a terminal state.
    #[error("operation already completed")]
    AlreadyCompleted,

    /// Response kind did not match the issued request.
    #[error("unexpected response")]
    UnexpectedResponse,

    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Fieldless classification of a `KvError`, with stable numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DnsResolution,
    Connect,
    OutOfMemory,
    Read,
    Write,
    ConnectionClosed,
    EventRegistration,
    ServerError,
    MessageFormat,
    PoolExhausted,
    NotFound,
    OutOfRange,
    Uninitialized,
    Timeout,
    AlreadyCompleted,
    UnexpectedResponse,
    Configuration,
}

impl ErrorKind {
    /// Stable numeric code (0 is reserved for "no error").
    pub const fn code(self) -> u16 {
        match self {
            ErrorKind::DnsResolution => 1,
            ErrorKind::Connect => 2,
            ErrorKind::OutOfMemory => 3,
            ErrorKind::Read => 4,
            ErrorKind::Write => 5,
            ErrorKind::ConnectionClosed => 6,
            ErrorKind::EventRegistration => 7,
            ErrorKind::ServerError => 8,
            ErrorKind::MessageFormat => 9,
            ErrorKind::PoolExhausted => 10,
            ErrorKind::NotFound => 11,
            ErrorKind::OutOfRange => 12,
            ErrorKind::Uninitialized => 13,
            ErrorKind::Timeout => 14,
            ErrorKind::AlreadyCompleted => 15,
            ErrorKind::UnexpectedResponse => 16,
            ErrorKind::Configuration => 17,
        }
    }

    /// Short human-readable description.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DnsResolution => "Problems resolving host name/port number",
            ErrorKind::Connect => "Could not connect",
            ErrorKind::OutOfMemory => "Out of memory",
            ErrorKind::Read => "Read error",
            ErrorKind::Write => "Write error",
            ErrorKind::ConnectionClosed => "Connection closed",
            ErrorKind::EventRegistration => "Event registration error",
            ErrorKind::ServerError => "Server error",
            ErrorKind::MessageFormat => "Malformed message",
            ErrorKind::PoolExhausted => "Connection pool exhausted",
            ErrorKind::NotFound => "Not found",
            ErrorKind::OutOfRange => "Out of range",
            ErrorKind::Uninitialized => "Uninitialized",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::AlreadyCompleted => "Operation already completed",
            ErrorKind::UnexpectedResponse => "Unexpected response",
            ErrorKind::Configuration => "Configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KvError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::DnsResolution { .. } => ErrorKind::DnsResolution,
            KvError::Connect { .. } => ErrorKind::Connect,
            KvError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            KvError::Read(_) => ErrorKind::Read,
            KvError::Write(_) => ErrorKind::Write,
            KvError::ConnectionClosed => ErrorKind::ConnectionClosed,
            KvError::EventRegistration(_) => ErrorKind::EventRegistration,
            KvError::Server(_) => ErrorKind::ServerError,
            KvError::MessageFormat(_) => ErrorKind::MessageFormat,
            KvError::PoolExhausted => ErrorKind::PoolExhausted,
            KvError::NotFound { .. } => ErrorKind::NotFound,
            KvError::OutOfRange { .. } => ErrorKind::OutOfRange,
            KvError::Uninitialized(_) => ErrorKind::Uninitialized,
            KvError::Timeout => ErrorKind::Timeout,
            KvError::AlreadyCompleted => ErrorKind::AlreadyCompleted,
            KvError::UnexpectedResponse => ErrorKind::UnexpectedResponse,
            KvError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns the server error carried by this error, if any.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            KvError::Server(err) => Some(err),
            _ => None,
        }
    }

    /// True when the failure leaves the connection unusable.
    ///
    /// Server errors and caller misuse leave the byte stream in sync; every
    /// transport or decode fault does not.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            KvError::Read(_)
                | KvError::Write(_)
                | KvError::ConnectionClosed
                | KvError::MessageFormat(_)
                | KvError::OutOfMemory(_)
                | KvError::Timeout
                | KvError::UnexpectedResponse
        )
    }
}

impl From<ServerError> for KvError {
    fn from(err: ServerError) -> Self {
        KvError::Server(err)
    }
}

impl From<prost::DecodeError> for KvError {
    fn from(err: prost::DecodeError) -> Self {
        KvError::MessageFormat(err.to_string())
    }
}
