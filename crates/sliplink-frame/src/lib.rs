//! SLIP (RFC 1055 style) byte-stuffing for datagrams over byte streams.
//!
//! Every datagram travels as a frame:
//! - A leading `END` byte (0xC0)
//! - The payload, with `END` escaped as `ESC ESC_END` and `ESC` as `ESC ESC_ESC`
//! - A trailing `END` byte
//!
//! [`encode`] produces frames; [`Deframer`] rebuilds datagrams from chunks
//! of any size, in any alignment.

pub mod codec;
pub mod deframer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::SlipCodec;
pub use codec::{encode, encode_into, encoded_len, END, ESC, ESC_END, ESC_ESC};
pub use deframer::{Deframer, DeframerStats};
