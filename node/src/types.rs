//! Ring-level value types shared across the protocol, transport, and node modules.

use std::fmt;

use crate::hash::hash_address;
use crate::ids::Identifier;

/// A peer's network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// The canonical `host:port` form, the exact bytes that are hashed into a node id.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// A peer's identity on the ring: its id and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeInfo {
    pub id: Identifier,
    pub address: NodeAddress,
}

impl NodeInfo {
    pub fn new(address: NodeAddress) -> Self {
        let id = hash_address(&address.canonical());
        Self { id, address }
    }

    /// True when `id` actually matches the hash of `address`, the check the
    /// id-verification security module performs before trusting a peer.
    pub fn is_self_consistent(&self) -> bool {
        self.id == hash_address(&self.address.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_colon_separated() {
        let addr = NodeAddress::new("10.0.0.1", 9000);
        assert_eq!(addr.canonical(), "10.0.0.1:9000");
    }

    #[test]
    fn node_info_is_self_consistent_by_construction() {
        let info = NodeInfo::new(NodeAddress::new("localhost", 1234));
        assert!(info.is_self_consistent());
    }

    #[test]
    fn tampered_id_fails_consistency_check() {
        let mut info = NodeInfo::new(NodeAddress::new("localhost", 1234));
        info.id ^= 1;
        assert!(!info.is_self_consistent());
    }
}
