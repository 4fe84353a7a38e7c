use crate::error::Result;

/// Callback receiving raw byte chunks, strictly in arrival order.
///
/// Chunks carry no alignment guarantee: a chunk may hold part of a frame,
/// several frames, or split an escape sequence.
pub type ChunkReceiver = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// A byte-stream transport a link writes frames to and reads chunks from.
///
/// Implementations must keep each `send` frame-atomic: the bytes of two
/// concurrent `send` calls on one instance never interleave. The registered
/// receiver is owned by the transport and called through exclusive access,
/// so chunks for one receiver are never delivered concurrently.
pub trait Transport: Send + Sync {
    /// Write one complete, already-framed buffer.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Subscribe to raw byte chunks, replacing any previous receiver.
    fn register_receiver(&self, receiver: ChunkReceiver);
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn register_receiver(&self, receiver: ChunkReceiver) {
        (**self).register_receiver(receiver)
    }
}
