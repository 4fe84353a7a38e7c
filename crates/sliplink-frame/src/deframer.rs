use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::codec::{END, ESC, ESC_END, ESC_ESC};

/// Counters kept by a [`Deframer`] over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeframerStats {
    /// Raw bytes consumed.
    pub bytes_in: u64,
    /// Datagrams completed.
    pub frames: u64,
    /// Escape markers followed by something other than `ESC_END`/`ESC_ESC`.
    pub invalid_escapes: u64,
}

/// Streaming SLIP deframer.
///
/// Consumes raw bytes in arrival order, with no assumption about how chunks
/// line up with frames, and yields each completed datagram once.
///
/// Rules, applied per byte:
/// - After `ESC`, the next byte is always consumed by the escape: `ESC_END`
///   and `ESC_ESC` append `END`/`ESC`, anything else (even `END`) is dropped
///   and the current frame continues.
/// - `END` closes a non-empty frame; with nothing buffered it is ignored, so
///   leading or repeated boundaries never produce empty datagrams.
///
/// A frame that never sees its closing `END` keeps growing the buffer. The
/// deframer enforces no size limit; callers that need one must check
/// [`pending_len`](Self::pending_len) themselves.
///
/// One deframer serves one byte stream and must not be fed concurrently.
#[derive(Debug, Default)]
pub struct Deframer {
    buf: BytesMut,
    escaping: bool,
    stats: DeframerStats,
}

impl Deframer {
    /// Create an idle deframer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one byte, returning the datagram it completes, if any.
    ///
    /// The returned datagram is detached from the internal buffer, which is
    /// already empty when this returns.
    pub fn push(&mut self, byte: u8) -> Option<Bytes> {
        self.stats.bytes_in += 1;

        if self.escaping {
            self.escaping = false;
            match byte {
                ESC_END => self.buf.extend_from_slice(&[END]),
                ESC_ESC => self.buf.extend_from_slice(&[ESC]),
                other => {
                    self.stats.invalid_escapes += 1;
                    debug!(
                        byte = other,
                        pending = self.buf.len(),
                        "invalid escape sequence, byte discarded"
                    );
                }
            }
            return None;
        }

        match byte {
            ESC => {
                self.escaping = true;
                None
            }
            END if self.buf.is_empty() => None,
            END => {
                self.stats.frames += 1;
                Some(self.buf.split().freeze())
            }
            other => {
                self.buf.extend_from_slice(&[other]);
                None
            }
        }
    }

    /// Process a chunk left to right, calling `on_datagram` for every frame
    /// it completes.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_datagram: F)
    where
        F: FnMut(Bytes),
    {
        for &byte in chunk {
            if let Some(datagram) = self.push(byte) {
                on_datagram(datagram);
            }
        }
    }

    /// Process a chunk and collect the datagrams it completes.
    pub fn feed_collect(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut out = Vec::new();
        self.feed(chunk, |datagram| out.push(datagram));
        out
    }

    /// Drop any partial frame and pending escape.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escaping = false;
    }

    /// Number of unescaped bytes buffered for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the last byte was an escape marker awaiting its value.
    pub fn is_escaping(&self) -> bool {
        self.escaping
    }

    /// Whether no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && !self.escaping
    }

    /// Lifetime counters.
    pub fn stats(&self) -> DeframerStats {
        self.stats
    }
}
