//! SLIP framing over byte streams, multiplexed by neighbor address.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transport trait and `Read`/`Write` adapter
//! - [`frame`]: SLIP encoder and streaming deframer
//! - [`layer`]: Links and the neighbor-addressed link layer

/// Re-export transport types.
pub mod transport {
    pub use sliplink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sliplink_frame::*;
}

/// Re-export link layer types.
pub mod layer {
    pub use sliplink_layer::*;
}

pub use sliplink_layer::{LinkError, LinkLayer, NeighborAddress};
