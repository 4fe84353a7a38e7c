use std::sync::{Arc, Mutex};

use sliplink_transport::{ChunkReceiver, Transport, TransportError};

/// In-memory transport recording written frames and letting tests inject
/// raw chunks.
#[derive(Default)]
pub(crate) struct MockTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    receiver: Mutex<Option<ChunkReceiver>>,
    pending: Mutex<Option<Vec<u8>>>,
    fail_sends: bool,
}

impl MockTransport {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_sends: true,
            ..Self::default()
        })
    }

    /// A transport with `chunk` already buffered; it is delivered from
    /// inside `register_receiver`, the way a reader thread may race ahead.
    pub(crate) fn preloaded(chunk: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Some(chunk.to_vec())),
            ..Self::default()
        })
    }

    /// Deliver one raw chunk as if it arrived from the wire.
    pub(crate) fn inject(&self, chunk: &[u8]) {
        let mut receiver = self.receiver.lock().unwrap();
        let deliver = receiver.as_mut().expect("no receiver registered");
        deliver(chunk);
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn has_receiver(&self) -> bool {
        self.receiver.lock().unwrap().is_some()
    }
}

impl Transport for MockTransport {
    fn send(&self, frame: &[u8]) -> sliplink_transport::Result<()> {
        if self.fail_sends {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }

    fn register_receiver(&self, mut receiver: ChunkReceiver) {
        if let Some(chunk) = self.pending.lock().unwrap().take() {
            receiver(&chunk);
        }
        *self.receiver.lock().unwrap() = Some(receiver);
    }
}
