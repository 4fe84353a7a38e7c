use std::sync::Arc;

use sliplink_frame::{encode, Deframer};
use sliplink_transport::Transport;

use crate::address::NeighborAddress;
use crate::error::Result;
use crate::receiver::FanIn;

/// One SLIP link: a neighbor address bound to one transport.
///
/// The receive side lives in the chunk receiver registered with the
/// transport, which owns this link's [`Deframer`] outright. The transport
/// calls it through exclusive access, so the framing state needs no lock and
/// chunks of one link are always processed one at a time, in order.
pub struct Link {
    address: NeighborAddress,
    transport: Box<dyn Transport>,
}

impl Link {
    pub(crate) fn attach(
        address: NeighborAddress,
        transport: Box<dyn Transport>,
        fan_in: Arc<FanIn>,
    ) -> Self {
        let from = address.clone();
        let mut deframer = Deframer::new();
        transport.register_receiver(Box::new(move |chunk: &[u8]| {
            deframer.feed(chunk, |datagram| fan_in.dispatch(&from, datagram));
        }));

        Self { address, transport }
    }

    /// The neighbor this link reaches.
    pub fn address(&self) -> &NeighborAddress {
        &self.address
    }

    /// Frame `datagram` and write it with a single transport send.
    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        let frame = encode(datagram);
        self.transport.send(&frame)?;
        Ok(())
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
