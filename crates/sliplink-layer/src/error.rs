use crate::address::NeighborAddress;

/// Errors surfaced by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No link is configured for the requested neighbor.
    #[error("no link configured for neighbor {0}")]
    UnknownNeighbor(NeighborAddress),

    /// The transport failed to write the frame.
    #[error("transport error: {0}")]
    Transport(#[from] sliplink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, LinkError>;
