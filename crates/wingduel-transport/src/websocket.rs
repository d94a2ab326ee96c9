//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each socket is split into a sink and a stream half behind separate
//! locks: the handler's reader parks in `recv` on the stream while the
//! writer task pushes outbound events through the sink.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Frame, Incoming, Transport, TransportError};

/// How long a freshly accepted TCP peer gets to finish the upgrade before
/// the upgrade is abandoned.
pub const DEFAULT_UPGRADE_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type Socket = WebSocketStream<TcpStream>;

/// Listens for TCP clients and upgrades them to WebSocket.
pub struct WebSocketTransport {
    listener: TcpListener,
    addr: String,
    upgrade_timeout: Duration,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Listener {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "listening for websocket clients");
        Ok(Self {
            listener,
            addr: addr.to_string(),
            upgrade_timeout: DEFAULT_UPGRADE_TIMEOUT,
        })
    }

    /// Overrides [`DEFAULT_UPGRADE_TIMEOUT`].
    pub fn with_upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Incoming = PendingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<PendingWebSocket, TransportError> {
        let (tcp, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        tracing::trace!(%peer, "tcp peer accepted");
        Ok(PendingWebSocket {
            tcp,
            peer,
            timeout: self.upgrade_timeout,
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|source| TransportError::Listener {
                addr: self.addr.clone(),
                source,
            })
    }
}

/// A TCP peer waiting for its WebSocket handshake.
pub struct PendingWebSocket {
    tcp: TcpStream,
    peer: SocketAddr,
    timeout: Duration,
}

impl PendingWebSocket {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Incoming for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let Self { tcp, peer, timeout } = self;
        let socket = tokio::time::timeout(timeout, tokio_tungstenite::accept_async(tcp))
            .await
            .map_err(|_| TransportError::Upgrade {
                peer,
                reason: "timed out".into(),
            })?
            .map_err(|e| TransportError::Upgrade {
                peer,
                reason: e.to_string(),
            })?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(connection = %id, %peer, "websocket upgraded");

        let (sink, stream) = socket.split();
        Ok(WebSocketConnection {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// One upgraded client socket.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<Socket, Message>>,
    stream: Mutex<SplitStream<Socket>>,
}

impl WebSocketConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn send_error(&self, e: impl ToString) -> TransportError {
        TransportError::Send {
            connection: self.id,
            reason: e.to_string(),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// JSON goes out as a text frame, which is what browser clients
    /// expect; non-UTF-8 bytes go out as binary.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let frame = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| self.send_error(e))
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(Frame::Data(text.as_bytes().to_vec()))),
                Ok(Message::Binary(data)) => return Ok(Some(Frame::Data(data.to_vec()))),
                // tungstenite queues the pong reply to a ping on its own.
                Ok(Message::Ping(_) | Message::Pong(_)) => return Ok(Some(Frame::Heartbeat)),
                Ok(Message::Close(_)) => return Ok(None),
                Ok(Message::Frame(_)) => continue,
                Err(e) => {
                    return Err(TransportError::Receive {
                        connection: self.id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(None)
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| self.send_error(e))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| self.send_error(e))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
