//! Connection-per-request TCP client. Every call opens a fresh connection,
//! writes one request, reads one response, and closes.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{NodeError, TransportError};
use crate::ids::Identifier;
use crate::protocol::Message;
use crate::types::{NodeAddress, NodeInfo};

/// Open a connection, send `request` in full, and read the reply until the
/// peer closes its write half or `rpc_timeout` elapses.
pub async fn send_request(
    target: &NodeAddress,
    request: &Message,
    rpc_timeout: Duration,
) -> Result<Message, NodeError> {
    let bytes = timeout(rpc_timeout, async {
        let mut stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(TransportError::Connect)?;
        stream.write_all(&request.encode()).await.map_err(TransportError::Io)?;
        stream.shutdown().await.map_err(TransportError::Io)?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.map_err(TransportError::Io)?;
        Ok::<Vec<u8>, TransportError>(response)
    })
    .await
    .map_err(|_| TransportError::Timeout)??;

    Ok(Message::decode(&bytes)?)
}

/// Decode failure or a transport error are both reported as "no answer";
/// the caller never distinguishes a lying peer from an unreachable one here.
async fn rpc(
    target: &NodeAddress,
    request: Message,
    rpc_timeout: Duration,
) -> Option<Message> {
    send_request(target, &request, rpc_timeout).await.ok()
}

pub async fn find_successor(
    target: &NodeAddress,
    id: Identifier,
    rpc_timeout: Duration,
) -> Option<NodeInfo> {
    match rpc(target, Message::FindSuccessorRequest { id }, rpc_timeout).await {
        Some(Message::FindSuccessorResponse { found }) => found,
        _ => None,
    }
}

pub async fn get_predecessor(target: &NodeAddress, rpc_timeout: Duration) -> Option<NodeInfo> {
    match rpc(target, Message::GetPredecessorRequest, rpc_timeout).await {
        Some(Message::GetPredecessorResponse { predecessor }) => predecessor,
        _ => None,
    }
}

pub async fn notify(target: &NodeAddress, candidate: NodeInfo, rpc_timeout: Duration) -> bool {
    matches!(
        rpc(target, Message::Notify { candidate }, rpc_timeout).await,
        Some(Message::NotifyAck { accepted: true })
    )
}

pub async fn ping(target: &NodeAddress, ping_timeout: Duration) -> bool {
    matches!(rpc(target, Message::Ping, ping_timeout).await, Some(Message::Pong))
}

pub async fn get(target: &NodeAddress, key: String, rpc_timeout: Duration) -> Option<String> {
    match rpc(target, Message::GetRequest { key }, rpc_timeout).await {
        Some(Message::GetResponse { value }) => value,
        _ => None,
    }
}

pub async fn put(
    target: &NodeAddress,
    key: String,
    value: String,
    rpc_timeout: Duration,
) -> bool {
    matches!(
        rpc(target, Message::PutRequest { key, value }, rpc_timeout).await,
        Some(Message::PutResponse { success: true })
    )
}

pub async fn transfer_keys(
    target: &NodeAddress,
    start: Identifier,
    end: Identifier,
    rpc_timeout: Duration,
) -> Option<Vec<(String, String)>> {
    match rpc(target, Message::TransferKeysRequest { start, end }, rpc_timeout).await {
        Some(Message::TransferKeysResponse { items }) => Some(items),
        _ => None,
    }
}
