//! Transport abstraction for the Drinkingames client.
//!
//! The [`Transport`] trait defines one physical, bidirectional text message
//! channel to the server. Every transport implementation handles message
//! framing internally (WebSocket frames, length-prefixed TCP, in-process
//! channels in tests).
//!
//! Because the client re-establishes the channel after every drop, it does
//! not take a transport directly: it takes a [`Connector`] that can produce a
//! fresh transport for each connection lifetime.
//!
//! # Implementing a Custom Transport
//!
//! An in-process transport over a pair of channels, the same shape the
//! crate's own tests use:
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use drinkingames_client::error::PartyError;
//! use drinkingames_client::transport::{Connector, Transport};
//! use tokio::sync::mpsc;
//!
//! struct ChannelTransport {
//!     to_server: mpsc::UnboundedSender<String>,
//!     from_server: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, message: String) -> Result<(), PartyError> {
//!         self.to_server
//!             .send(message)
//!             .map_err(|e| PartyError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, PartyError>> {
//!         // `mpsc::UnboundedReceiver::recv` is cancel-safe.
//!         self.from_server.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PartyError> {
//!         self.from_server.close();
//!         Ok(())
//!     }
//! }
//!
//! /// Hands each new connection's server half to a server task.
//! struct ChannelConnector {
//!     accept: mpsc::UnboundedSender<(mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<String>)>,
//! }
//!
//! #[async_trait]
//! impl Connector for ChannelConnector {
//!     type Transport = ChannelTransport;
//!
//!     async fn connect(&self) -> Result<ChannelTransport, PartyError> {
//!         let (to_server, server_rx) = mpsc::unbounded_channel();
//!         let (server_tx, from_server) = mpsc::unbounded_channel();
//!         self.accept
//!             .send((server_rx, server_tx))
//!             .map_err(|_| PartyError::TransportClosed)?;
//!         Ok(ChannelTransport { to_server, from_server })
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PartyError;

/// One live text channel to the server.
///
/// `send` writes exactly one serialized frame and `recv` yields exactly one.
/// The client calls `recv` from inside `tokio::select!`, so it must be
/// cancel-safe: a cancelled `recv` may not consume a frame. Wrapping an
/// `mpsc::Receiver` satisfies this for free.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame.
    ///
    /// # Errors
    ///
    /// [`PartyError::TransportSend`] when the frame cannot be written.
    async fn send(&mut self, message: String) -> Result<(), PartyError>;

    /// Next frame from the server.
    ///
    /// `None` means the server closed the channel cleanly; `Some(Err(_))`
    /// is a transport fault. Either one ends the connection lifetime.
    async fn recv(&mut self) -> Option<Result<String, PartyError>>;

    /// Close the channel. Must release resources even when the close
    /// handshake itself fails.
    ///
    /// # Errors
    ///
    /// Returns the handshake failure, if any.
    async fn close(&mut self) -> Result<(), PartyError>;
}

/// Dials the server. The client asks for a fresh [`Transport`] at the start
/// of every connection lifetime and handles retries itself, so a single
/// call should make a single attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// # Errors
    ///
    /// Returns why this attempt failed.
    async fn connect(&self) -> Result<Self::Transport, PartyError>;
}
