// kvpb-common - Shared wire types for the kvpb client engine
//
// This crate owns everything that can be tested without a socket: message
// tags, frame encoding, incremental frame reassembly, payload schemas and the
// error taxonomy shared by every layer of the client.

pub mod codec;
pub mod error;
pub mod frame;
pub mod messages;
pub mod tags;

// Re-export for convenience
pub use codec::*;
pub use error::*;
pub use frame::*;
pub use tags::MessageTag;
