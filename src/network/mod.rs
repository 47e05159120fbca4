//! Network Module Implementation
//!
//! Everything that touches the stream connection lives here:
//!
//! - `frame`: the wire unit, a native-endian `i32` length prefix followed by
//!   exactly that many payload bytes
//! - `connection`: `FrameReader` / `FrameWriter`, one per direction of a
//!   duplex connection
//! - `establish`: binding, listening and accepting one peer (server role) or
//!   resolving and connecting (client role)
//!
//! The reader and writer are generic over tokio's `AsyncRead` / `AsyncWrite`
//! so they run over a TCP half in production and an in-memory pipe in tests.

pub use connection::{FrameReader, FrameWriter};
pub use establish::{Establisher, PendingListener, Role};
pub use frame::{decode_length, encode_length, DEFAULT_MAX_MESSAGE_LEN, LENGTH_PREFIX_SIZE};
mod connection;
mod establish;
mod frame;
