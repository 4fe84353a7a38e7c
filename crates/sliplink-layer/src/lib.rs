//! SLIP links multiplexed by neighbor address.
//!
//! A [`Link`] frames datagrams onto one transport and rebuilds the datagrams
//! arriving from it. A [`LinkLayer`] owns one link per directly connected
//! neighbor, routes sends by address and merges everything received into a
//! single upward receiver.

pub mod address;
pub mod error;
pub mod layer;
pub mod link;
pub mod receiver;

#[cfg(test)]
pub(crate) mod mock;

pub use address::NeighborAddress;
pub use error::{LinkError, Result};
pub use layer::LinkLayer;
pub use link::Link;
pub use receiver::{BoxError, ReceiverError, ReceiverOutcome};
