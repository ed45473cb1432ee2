//! Accept-loop TCP server. One task accepts connections; each accepted
//! connection is handled in its own spawned task under a per-request
//! timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::NodeError;
use crate::protocol::Message;
use crate::types::NodeAddress;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Decides whether an inbound message from `from` carrying tag `tag` may be
/// processed at all, ahead of decoding its body.
pub type AllowMessageFn = Arc<dyn Fn(&NodeAddress, u8) -> bool + Send + Sync>;

/// Turns a decoded request plus its sender address into a response message.
pub type ProcessFn = Arc<dyn Fn(NodeAddress, Message) -> BoxFuture<Message> + Send + Sync>;

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    pub async fn bind(ip: &str, port: u16) -> Result<Self, NodeError> {
        let listener =
            TcpListener::bind((ip, port)).await.map_err(NodeError::BindFailed)?;
        let local_addr = listener.local_addr().map_err(NodeError::BindFailed)?;
        Ok(Self { listener, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawn the accept loop. Returns a handle the caller can `.abort()` on
    /// shutdown, since the loop is parked inside `accept()` with no other
    /// way to observe a stop signal.
    pub fn spawn(
        self,
        allow_message: AllowMessageFn,
        process: ProcessFn,
        request_timeout: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, peer)) => {
                        let allow_message = allow_message.clone();
                        let process = process.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(
                                stream,
                                peer,
                                allow_message,
                                process,
                                request_timeout,
                            )
                            .await
                            {
                                debug!("connection from {peer} ended: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("accept() failed: {e}");
                    }
                }
            }
        })
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    allow_message: AllowMessageFn,
    process: ProcessFn,
    request_timeout: Duration,
) -> Result<(), NodeError> {
    let read = timeout(request_timeout, async {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;
        Ok::<Vec<u8>, std::io::Error>(buf)
    })
    .await;

    let bytes = match read {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(_)) | Err(_) => return Ok(()),
    };

    let message = match Message::decode(&bytes) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    let sender = NodeAddress::new(peer.ip().to_string(), peer.port());
    if !allow_message(&sender, message.tag()) {
        return Ok(());
    }

    let response = process(sender, message).await;
    let out = response.encode();
    stream.write_all(&out).await.map_err(crate::error::TransportError::Io)?;
    let _ = stream.shutdown().await;
    Ok(())
}
