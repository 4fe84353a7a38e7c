use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::encode_into;
use crate::deframer::{Deframer, DeframerStats};

/// SLIP framing for `tokio_util::codec::Framed*`.
///
/// Decoding runs the same [`Deframer`] as the blocking path; input is
/// consumed only up to the byte that completes a frame, and escape state is
/// kept across calls.
#[derive(Debug, Default)]
pub struct SlipCodec {
    deframer: Deframer,
}

impl SlipCodec {
    /// Create a codec with an idle deframer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the underlying deframer.
    pub fn stats(&self) -> DeframerStats {
        self.deframer.stats()
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut consumed = 0usize;
        let mut datagram = None;
        for &byte in src.iter() {
            consumed += 1;
            if let Some(done) = self.deframer.push(byte) {
                datagram = Some(done);
                break;
            }
        }
        src.advance(consumed);
        Ok(datagram)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let datagram = self.decode(src)?;
        if datagram.is_none() && !self.deframer.is_idle() {
            debug!(
                pending = self.deframer.pending_len(),
                "stream ended mid-frame, partial datagram dropped"
            );
            self.deframer.reset();
        }
        Ok(datagram)
    }
}

impl<'a> Encoder<&'a [u8]> for SlipCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(item, dst);
        Ok(())
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(&item, dst);
        Ok(())
    }
}
