//! Byte-stream transport abstraction for SLIP links.
//!
//! A [`Transport`] is anything that can write one already-framed buffer and
//! hand raw byte chunks to a single registered receiver. Serial lines, PTYs,
//! sockets and in-memory pipes all fit.
//!
//! [`StreamTransport`] adapts any caller-opened `Read`/`Write` pair.

pub mod error;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use stream::{StreamConfig, StreamTransport, DEFAULT_READ_CHUNK_SIZE};
pub use traits::{ChunkReceiver, Transport};
