use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Key of a directly connected neighbor, usually its IPv4 address in
/// dotted form (`"10.0.0.2"`).
///
/// Opaque: only compared and hashed, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborAddress(String);

impl NeighborAddress {
    /// Wrap an address string as-is.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as given at construction.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NeighborAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NeighborAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NeighborAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NeighborAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for NeighborAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&NeighborAddress> for NeighborAddress {
    fn from(address: &NeighborAddress) -> Self {
        address.clone()
    }
}

impl From<Ipv4Addr> for NeighborAddress {
    fn from(address: Ipv4Addr) -> Self {
        Self(address.to_string())
    }
}

impl FromStr for NeighborAddress {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
