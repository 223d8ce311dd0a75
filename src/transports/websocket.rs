//! WebSocket transport using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries one connection lifetime; [`WebSocketConnector`]
//! dials a fresh one for every lifetime the client starts. Both `ws://` and
//! `wss://` URLs work, TLS being handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! Only available with the `transport-websocket` feature (on by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), drinkingames_client::PartyError> {
//! use drinkingames_client::{Connector, Transport, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("ws://localhost:3001/ws");
//! let mut transport = connector.connect().await?;
//! transport.send(r#"{"event":"games:list","data":{},"ack":0}"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = transport.recv().await {
//!     println!("server said: {frame}");
//! }
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::PartyError;
use crate::transport::{Connector, Transport};

/// Default limit for a single dial attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over one WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future never loses
/// a frame, so it can sit inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Dial `url` and complete the WebSocket handshake.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::Io`] if the URL is invalid or the server cannot be
    /// reached. I/O error kinds are preserved; anything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, PartyError> {
        debug!(url = %url, "dialing WebSocket server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            PartyError::Io(std::io::Error::new(kind, e))
        })?;

        info!(url = %url, "WebSocket connection established");
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect), but gives up with
    /// [`PartyError::Timeout`] after `timeout`.
    ///
    /// # Errors
    ///
    /// [`PartyError::Timeout`], or anything [`connect`](Self::connect) returns.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, PartyError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| PartyError::Timeout)?
    }

    /// Wrap a stream established elsewhere (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), PartyError> {
        if self.closed {
            return Err(PartyError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| PartyError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PartyError>> {
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server sent close frame");
                    return None;
                }
                // tungstenite answers pings itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Binary(bytes)) => {
                    warn!(len = bytes.len(), "skipping binary WebSocket frame");
                }
                Err(e) => return Some(Err(PartyError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), PartyError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| PartyError::TransportSend(e.to_string()))
    }
}

/// Dials a new [`WebSocketTransport`] for each connection lifetime.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Limit for a single dial attempt. Defaults to [`DEFAULT_CONNECT_TIMEOUT`].
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self) -> Result<WebSocketTransport, PartyError> {
        WebSocketTransport::connect_with_timeout(&self.url, self.connect_timeout).await
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one WebSocket connection on a local port and hand it to `server`.
    async fn serve_once<F, Fut>(server: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            server(ws).await;
        });
        format!("ws://{addr}")
    }

    #[test]
    fn transport_and_connector_are_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send::<WebSocketTransport>();
        assert_send_sync::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn invalid_url_is_an_io_error() {
        let err = WebSocketTransport::connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, PartyError::Io(_)));
    }

    #[tokio::test]
    async fn connector_times_out_on_unroutable_host() {
        let connector = WebSocketConnector::new("ws://192.0.2.1:1")
            .with_connect_timeout(Duration::from_millis(50));
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, PartyError::Timeout | PartyError::Io(_)));
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let url = serve_once(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2].into())).await.unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketConnector::new(url).connect().await.unwrap();
        transport
            .send(r#"{"event":"games:list","data":{},"ack":0}"#.to_string())
            .await
            .unwrap();
        // The binary frame is skipped; the echo comes through.
        let echoed = transport.recv().await.unwrap().unwrap();
        assert!(echoed.contains("games:list"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_sends() {
        let url = serve_once(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, PartyError::TransportClosed));
    }
}
