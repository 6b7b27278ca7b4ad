use crate::config::TransportConfig;
use crate::protocol::{self, HandlerState};
use crate::TransportError;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A transport endpoint. Listens for one-line connections and dials out per message.
///
/// Inbound connections are accepted concurrently; the lines they carry
/// are funneled into a single channel so the consumer sees them one at
/// a time.
pub struct TcpNode {
    local_addr: SocketAddr,
    incoming_rx: mpsc::Receiver<Vec<u8>>,
    accept_task: JoinHandle<()>,
    config: TransportConfig,
}

impl TcpNode {
    /// Bind a listener on `listen_addr` and start accepting connections.
    pub async fn bind(listen_addr: &str, config: TransportConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: listen_addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: listen_addr.to_string(),
            source,
        })?;

        let (incoming_tx, incoming_rx) = mpsc::channel(config.recv_buffer);
        let state = Arc::new(HandlerState {
            incoming_tx,
            max_message_size: config.max_message_size,
            read_timeout: config.read_timeout,
        });

        let accept_task = tokio::spawn(protocol::accept_loop(listener, state));
        tracing::debug!("listening on {local_addr}");

        Ok(Self {
            local_addr,
            incoming_rx,
            accept_task,
            config,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Open a connection to `addr`, write one line, close.
    pub async fn send_raw(&self, addr: &str, data: &[u8]) -> Result<(), TransportError> {
        self.sender().send_raw(addr, data).await
    }

    /// A cloneable outbound half sharing this node's timeouts and limits.
    pub fn sender(&self) -> TcpSender {
        TcpSender::new(self.config.clone())
    }

    /// Receive the next inbound line. Blocks until one arrives.
    pub async fn recv_raw(&mut self) -> Result<Vec<u8>, TransportError> {
        self.incoming_rx.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Stop accepting connections. Lines already queued stay readable.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for TcpNode {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Outbound half of the transport: one connection per message.
///
/// Fire-and-forget: success only means the bytes were handed to the
/// peer's TCP stack. There is no acknowledgement and no retry.
#[derive(Debug, Clone)]
pub struct TcpSender {
    config: TransportConfig,
}

impl TcpSender {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Dial `addr`, write one line, close.
    pub async fn send_raw(&self, addr: &str, data: &[u8]) -> Result<(), TransportError> {
        let config = &self.config;
        // write_line appends the LF when it is missing.
        let wire_len = data.len() + usize::from(data.last() != Some(&b'\n'));
        if wire_len > config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: wire_len,
                max: config.max_message_size,
            });
        }

        let mut stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                addr: addr.to_string(),
                timeout: config.connect_timeout,
            })?
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;

        protocol::write_line(&mut stream, data)
            .await
            .map_err(|source| TransportError::Send {
                addr: addr.to_string(),
                source,
            })
    }
}
