//! A small synchronous client used only for the lookup validator's
//! confirmatory query.
//!
//! [`crate::security::SecurityModule`] hooks are plain synchronous functions
//! — admission and message checks run on the hot accept path and must never
//! block on network I/O. Lookup validation is different: it runs once,
//! after a lookup has already completed, and a brief blocking round trip
//! there is an acceptable trade against threading an async runtime handle
//! through the security trait.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::ids::Identifier;
use crate::protocol::Message;
use crate::types::{NodeAddress, NodeInfo};

pub fn blocking_find_successor(
    target: &NodeAddress,
    id: Identifier,
    rpc_timeout: Duration,
) -> Option<NodeInfo> {
    let mut stream = TcpStream::connect((target.host.as_str(), target.port)).ok()?;
    stream.set_read_timeout(Some(rpc_timeout)).ok()?;
    stream.set_write_timeout(Some(rpc_timeout)).ok()?;

    let request = Message::FindSuccessorRequest { id };
    stream.write_all(&request.encode()).ok()?;
    stream.shutdown(std::net::Shutdown::Write).ok()?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).ok()?;

    match Message::decode(&response).ok()? {
        Message::FindSuccessorResponse { found } => found,
        _ => None,
    }
}
