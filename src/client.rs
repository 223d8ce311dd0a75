//! Async client for the Drinkingames party-game server.
//!
//! [`PartyClient`] is a thin handle that talks to a background supervisor task
//! over an unbounded MPSC channel. The supervisor owns every piece of synced
//! state and is its only writer. It runs connection lifetimes back to back:
//!
//! 1. connect with a fixed retry budget ([`RetryPolicy`](crate::connection::RetryPolicy));
//! 2. resume the stored session, if any, with one `player:reconnect`;
//! 3. multiplex pushes into the lobby and game reducers and settle
//!    acknowledgments until the transport drops;
//! 4. release every pending acknowledgment and start over.
//!
//! Notifications arrive on a bounded channel ([`tokio::sync::mpsc::Receiver<ClientEvent>`])
//! returned from [`PartyClient::start`]; state is read through the handle's
//! accessors, which return consistent snapshots.
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = WebSocketConnector::new(server_url_from_env());
//! let store = FileSessionStore::in_dir(".");
//! let (client, mut events) = PartyClient::start(connector, store, ClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Resumed { restored: false } => {
//!             client.create_lobby("alice").await?;
//!         }
//!         ClientEvent::PhaseChanged { phase, .. } => { /* … */ }
//!         ClientEvent::ConnectionFailed { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::connection::{connect_with_retry, ConnectionState};
use crate::error::{PartyError, Result};
use crate::event::ClientEvent;
use crate::game::GameSession;
use crate::protocol::{
    ClientAction, GameInfo, GamesListResponse, IncomingFrame, Lobby, LobbyJoined, Player,
};
use crate::reconnect::{ResumeOutcome, ResumeState, Resumption};
use crate::rpc::{settle, AckHook, PendingAck, PendingAcks, Reply};
use crate::session::{SessionRecord, SessionStore};
use crate::state::SyncState;
use crate::transport::{Connector, Transport};

/// Minimum username length, in characters, after trimming.
pub const MIN_USERNAME_LEN: usize = 4;

/// Maximum username length, in characters, after trimming.
pub const MAX_USERNAME_LEN: usize = 20;

/// Exact lobby code length.
pub const LOBBY_CODE_LEN: usize = 4;

/// User-facing message recorded when the server cannot be reached.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to server";

// ── Input validation ────────────────────────────────────────────────

/// Trim and check a username.
///
/// # Errors
///
/// Returns [`PartyError::InvalidInput`] if the trimmed name is shorter than
/// [`MIN_USERNAME_LEN`] or longer than [`MAX_USERNAME_LEN`] characters.
pub fn validate_username(username: &str) -> Result<String> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(PartyError::InvalidInput(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if len > MAX_USERNAME_LEN {
        return Err(PartyError::InvalidInput(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Upper-case and check a lobby code.
///
/// # Errors
///
/// Returns [`PartyError::InvalidInput`] unless the code is exactly
/// [`LOBBY_CODE_LEN`] ASCII letters.
pub fn normalize_lobby_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != LOBBY_CODE_LEN || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(PartyError::InvalidInput(format!(
            "lobby code must be {LOBBY_CODE_LEN} letters"
        )));
    }
    Ok(code)
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the supervisor.
struct Shared {
    connected: AtomicBool,
    /// Number of the current connection lifetime (1-based, 0 before the first).
    lifetime: AtomicU64,
    state: RwLock<SyncState>,
}

/// A queued action, stamped with the lifetime it was issued in.
struct Command {
    lifetime: u64,
    action: ClientAction,
    reply: Reply,
}

impl Command {
    fn reject(self) {
        let _ = self.reply.send(Err(PartyError::NotConnected));
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the Drinkingames server.
///
/// Created via [`PartyClient::start`], which spawns the background supervisor
/// and returns this handle together with an event receiver.
pub struct PartyClient {
    /// Sender half of the command channel to the supervisor.
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// State owned by the supervisor.
    shared: Arc<Shared>,
    /// Handle to the supervisor task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the supervisor to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
    action_timeout: Option<Duration>,
}

impl PartyClient {
    /// Start the supervisor and return a handle plus event receiver.
    ///
    /// The supervisor immediately begins the first connect phase using
    /// `connector`, and consults `store` at the start of every connection
    /// lifetime to decide whether to resume.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C, S>(
        connector: C,
        store: S,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>)
    where
        C: Connector,
        S: SessionStore,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            lifetime: AtomicU64::new(0),
            state: RwLock::new(SyncState::new(config.list_merge)),
        });

        let shutdown_timeout = config.shutdown_timeout;
        let action_timeout = config.action_timeout;
        let supervisor = Supervisor {
            connector,
            store,
            config,
            shared: Arc::clone(&shared),
            event_tx,
            cmd_rx,
        };
        let task = tokio::spawn(supervisor.run(shutdown_rx));

        let client = Self {
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
            action_timeout,
        };
        (client, event_rx)
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Send an action and wait for its acknowledgment.
    ///
    /// Settles exactly once. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`PartyError::NotConnected`] if there is no live connection (nothing
    ///   is transmitted) or the connection drops before the acknowledgment.
    /// - [`PartyError::Action`] if the acknowledgment carries an error.
    /// - [`PartyError::Timeout`] if the configured action timeout elapses.
    /// - [`PartyError::InvalidInput`] for `player:reconnect`, which only the
    ///   client itself may issue.
    pub async fn call(&self, action: ClientAction) -> Result<Value> {
        if matches!(action, ClientAction::PlayerReconnect { .. }) {
            return Err(PartyError::InvalidInput(
                "player:reconnect is issued by the client itself".into(),
            ));
        }
        if !self.is_connected() {
            return Err(PartyError::NotConnected);
        }
        let (reply, rx) = oneshot::channel();
        let command = Command {
            lifetime: self.shared.lifetime.load(Ordering::Acquire),
            action,
            reply,
        };
        self.cmd_tx
            .send(command)
            .map_err(|_| PartyError::NotConnected)?;

        let settled = match self.action_timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| PartyError::Timeout)?,
            None => rx.await,
        };
        settled.map_err(|_| PartyError::NotConnected)?
    }

    /// Create a new lobby hosted by this player.
    ///
    /// On success the session record is saved and the lobby is adopted.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call); also [`PartyError::InvalidInput`] for a bad username.
    pub async fn create_lobby(&self, username: &str) -> Result<LobbyJoined> {
        let username = validate_username(username)?;
        let body = self.call(ClientAction::LobbyCreate { username }).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Join an existing lobby by code.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call); also [`PartyError::InvalidInput`] for a bad
    /// username or lobby code.
    pub async fn join_lobby(&self, username: &str, lobby_code: &str) -> Result<LobbyJoined> {
        let username = validate_username(username)?;
        let lobby_code = normalize_lobby_code(lobby_code)?;
        let body = self
            .call(ClientAction::LobbyJoin {
                username,
                lobby_code,
            })
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Leave the current lobby. Identity and session record are cleared once
    /// the server acknowledges.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn leave_lobby(&self) -> Result<()> {
        self.call(ClientAction::LobbyLeave).await.map(|_| ())
    }

    /// Fetch the game catalogue.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn list_games(&self) -> Result<Vec<GameInfo>> {
        let body = self.call(ClientAction::GamesList).await?;
        let response: GamesListResponse = serde_json::from_value(body)?;
        Ok(response.games)
    }

    /// Ask the server to start a game. The game begins locally when the
    /// `game:started` push arrives.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn start_game(&self, game_id: impl Into<String>) -> Result<Value> {
        self.call(ClientAction::GameStart {
            game_id: game_id.into(),
        })
        .await
    }

    /// Submit an in-game action (move, word, drawing, vote, score, solution).
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn send_game_action(&self, action: impl Into<String>, data: Value) -> Result<Value> {
        self.call(ClientAction::GameAction {
            action: action.into(),
            data,
        })
        .await
    }

    /// Ask the server to end the current game.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn end_game(&self) -> Result<Value> {
        self.call(ClientAction::GameEnd).await
    }

    /// Shut down the client, closing the transport and stopping the background task.
    ///
    /// After calling this method, the event receiver will yield `None` once the
    /// supervisor exits.
    pub async fn shutdown(&mut self) {
        debug!("PartyClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the supervisor with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("supervisor terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("supervisor did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("supervisor aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while a connection lifetime is live.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// A consistent copy of all synced state.
    pub async fn snapshot(&self) -> SyncState {
        self.shared.state.read().await.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.shared.state.read().await.connection
    }

    pub async fn resume_state(&self) -> ResumeState {
        self.shared.state.read().await.resume
    }

    /// This client's player, once identified.
    pub async fn me(&self) -> Option<Player> {
        self.shared.state.read().await.me.clone()
    }

    pub async fn lobby(&self) -> Option<Lobby> {
        self.shared.state.read().await.lobby().cloned()
    }

    /// Returns `true` if this client's player hosts the current lobby.
    pub async fn is_host(&self) -> bool {
        self.shared.state.read().await.is_host()
    }

    /// The active game, if any.
    pub async fn game(&self) -> Option<GameSession> {
        self.shared.state.read().await.game().cloned()
    }

    /// The cached game catalogue.
    pub async fn available_games(&self) -> Vec<GameInfo> {
        self.shared.state.read().await.games.clone()
    }

    /// Last user-facing error, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.shared.state.read().await.last_error.clone()
    }
}

impl std::fmt::Debug for PartyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyClient")
            .field("connected", &self.is_connected())
            .field("lifetime", &self.shared.lifetime.load(Ordering::Acquire))
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PartyClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown; abort
        // the supervisor, which drops the transport immediately.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

/// Why a connection lifetime ended.
enum LifetimeEnd {
    Dropped(Option<String>),
    Shutdown,
}

/// Background task owning the connector, session store and all synced state.
struct Supervisor<C, S> {
    connector: C,
    store: S,
    config: ClientConfig,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<ClientEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl<C: Connector, S: SessionStore> Supervisor<C, S> {
    /// Run connect phases and connection lifetimes until shutdown, until the
    /// retry budget is exhausted, or (without auto-reconnect) until the
    /// first drop.
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        debug!("supervisor started");

        loop {
            let phase = if self.shared.lifetime.load(Ordering::Acquire) == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };
            self.shared.state.write().await.connection = phase;

            let connected = tokio::select! {
                _ = &mut shutdown_rx => None,
                result = connect_with_retry(&self.connector, &self.config.retry) => Some(result),
            };
            let Some(connected) = connected else {
                debug!("shutdown requested while connecting");
                self.shared.state.write().await.connection = ConnectionState::Disconnected;
                self.reject_queued();
                self.emit_final(ClientEvent::Disconnected {
                    reason: Some("client shut down".into()),
                })
                .await;
                break;
            };

            let transport = match connected {
                Ok(transport) => transport,
                Err(e) => {
                    error!("server unreachable: {e}");
                    let attempts = match e {
                        PartyError::ConnectFailed { attempts } => attempts,
                        _ => self.config.retry.max_attempts,
                    };
                    {
                        let mut state = self.shared.state.write().await;
                        state.connection = ConnectionState::Errored;
                        state.last_error = Some(CONNECT_FAILED_MESSAGE.into());
                    }
                    self.reject_queued();
                    self.emit_final(ClientEvent::ConnectionFailed { attempts })
                        .await;
                    break;
                }
            };

            match self.run_lifetime(transport, &mut shutdown_rx).await {
                LifetimeEnd::Shutdown => break,
                LifetimeEnd::Dropped(_) if self.config.auto_reconnect => {
                    info!("connection dropped, reconnecting");
                }
                LifetimeEnd::Dropped(_) => break,
            }
        }

        debug!("supervisor exited");
    }

    /// Drive one connection lifetime to its end.
    async fn run_lifetime(
        &mut self,
        mut transport: C::Transport,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> LifetimeEnd {
        let lifetime = self.shared.lifetime.fetch_add(1, Ordering::AcqRel) + 1;
        let mut pending = PendingAcks::new();
        let mut resumption = Resumption::new();

        {
            let mut state = self.shared.state.write().await;
            state.connection = ConnectionState::Connected;
            state.resume = ResumeState::Idle;
            state.last_error = None;
        }
        self.shared.connected.store(true, Ordering::Release);
        info!(lifetime, "connection lifetime started");
        self.emit(ClientEvent::Connected);

        let end = match self
            .open_lifetime(&mut transport, &mut pending, &mut resumption)
            .await
        {
            Err(e) => {
                error!("transport send error: {e}");
                LifetimeEnd::Dropped(Some(format!("transport send error: {e}")))
            }
            Ok(()) => {
                self.serve(
                    lifetime,
                    &mut transport,
                    &mut pending,
                    &mut resumption,
                    shutdown_rx,
                )
                .await
            }
        };

        // Release everything registered during this lifetime as a unit.
        self.shared.connected.store(false, Ordering::Release);
        pending.release_all();
        self.reject_queued();
        {
            let mut state = self.shared.state.write().await;
            state.connection = ConnectionState::Disconnected;
            if state.resume == ResumeState::AttemptingResume {
                state.resume = ResumeState::Idle;
            }
        }

        match &end {
            LifetimeEnd::Shutdown => {
                info!(lifetime, "connection lifetime ended: client shut down");
                self.emit_final(ClientEvent::Disconnected {
                    reason: Some("client shut down".into()),
                })
                .await;
            }
            LifetimeEnd::Dropped(reason) => {
                info!(lifetime, ?reason, "connection lifetime ended");
                let event = ClientEvent::Disconnected {
                    reason: reason.clone(),
                };
                if self.config.auto_reconnect {
                    self.emit(event);
                } else {
                    self.emit_final(event).await;
                }
            }
        }
        end
    }

    /// Issue the lifetime's opening actions: the single resume attempt and
    /// the optional catalogue fetch.
    async fn open_lifetime(
        &mut self,
        transport: &mut C::Transport,
        pending: &mut PendingAcks,
        resumption: &mut Resumption,
    ) -> Result<()> {
        let record = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("could not read session record: {e}");
                None
            }
        };
        let resume_action = resumption.begin(record.as_ref());
        self.shared.state.write().await.resume = resumption.state();

        match resume_action {
            Some(action) => transmit(transport, pending, action, AckHook::Resume, None).await?,
            None => self.emit(ClientEvent::Resumed { restored: false }),
        }
        if self.config.fetch_games_on_connect {
            transmit(
                transport,
                pending,
                ClientAction::GamesList,
                AckHook::GamesList,
                None,
            )
            .await?;
        }
        Ok(())
    }

    /// Multiplex commands, shutdown and inbound frames until the lifetime ends.
    async fn serve(
        &mut self,
        lifetime: u64,
        transport: &mut C::Transport,
        pending: &mut PendingAcks,
        resumption: &mut Resumption,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> LifetimeEnd {
        let resume_timeout = self.config.action_timeout;
        let resume_deadline = tokio::time::sleep(resume_timeout.unwrap_or_default());
        tokio::pin!(resume_deadline);

        loop {
            tokio::select! {
                // Branch 1: outgoing action from the client handle
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) if cmd.lifetime != lifetime => {
                            debug!(action = cmd.action.name(), "action issued in an earlier lifetime, rejecting");
                            cmd.reject();
                        }
                        Some(Command { action, reply, .. }) => {
                            let hook = AckHook::for_action(&action);
                            if let Err(e) = transmit(transport, pending, action, hook, Some(reply)).await {
                                error!("transport send error: {e}");
                                return LifetimeEnd::Dropped(Some(format!("transport send error: {e}")));
                            }
                        }
                        // Command channel closed: the handle was dropped.
                        None => {
                            debug!("command channel closed, closing connection");
                            let _ = transport.close().await;
                            return LifetimeEnd::Shutdown;
                        }
                    }
                }

                // Branch 2: shutdown signal
                _ = &mut *shutdown_rx => {
                    debug!("shutdown signal received");
                    let _ = transport.close().await;
                    return LifetimeEnd::Shutdown;
                }

                // Branch 3: incoming frame from the server
                incoming = transport.recv() => {
                    match incoming {
                        Some(Ok(text)) => self.handle_frame(&text, pending, resumption).await,
                        Some(Err(e)) => {
                            error!("transport receive error: {e}");
                            return LifetimeEnd::Dropped(Some(format!("transport receive error: {e}")));
                        }
                        // Transport closed cleanly.
                        None => {
                            debug!("transport closed by server");
                            return LifetimeEnd::Dropped(None);
                        }
                    }
                }

                // Branch 4: the resume attempt went unanswered
                () = &mut resume_deadline,
                    if resume_timeout.is_some() && resumption.state() == ResumeState::AttemptingResume =>
                {
                    if let Some(outcome) = resumption.expire() {
                        warn!("no acknowledgment for player:reconnect, giving up on resume");
                        self.finish_resume(outcome).await;
                    }
                }
            }
        }
    }

    async fn handle_frame(
        &mut self,
        text: &str,
        pending: &mut PendingAcks,
        resumption: &mut Resumption,
    ) {
        let frame = match IncomingFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to decode server frame: {e}; raw: {text}");
                return;
            }
        };
        match frame {
            IncomingFrame::Push(event) => {
                debug!(event = event.name(), "push received");
                let events = self.shared.state.write().await.apply_push(&event);
                self.emit_all(events);
            }
            IncomingFrame::Ack { id, data } => match pending.take(id) {
                Some(entry) => self.handle_ack(entry, data, resumption).await,
                None => warn!(ack = id, "acknowledgment for unknown action, ignoring"),
            },
        }
    }

    async fn handle_ack(&mut self, entry: PendingAck, body: Value, resumption: &mut Resumption) {
        debug!(action = entry.action, "acknowledgment received");
        match entry.hook {
            AckHook::Resume => {
                if resumption.state() == ResumeState::AttemptingResume {
                    self.finish_resume(resumption.finish(body)).await;
                } else {
                    debug!(state = ?resumption.state(), "late reconnect acknowledgment, ignoring");
                }
                entry.resolve(Ok(Value::Null));
            }
            AckHook::EnterLobby => {
                let joined = settle(body).and_then(|body| {
                    let joined: LobbyJoined = serde_json::from_value(body.clone())?;
                    Ok((joined, body))
                });
                match joined {
                    Ok((joined, body)) => {
                        let record = SessionRecord {
                            player_id: joined.player.id.clone(),
                            username: joined.player.username.clone(),
                            lobby_code: joined.lobby.code.clone(),
                        };
                        if let Err(e) = self.store.save(&record) {
                            warn!("could not save session record: {e}");
                        }
                        let events = self.shared.state.write().await.enter_lobby(joined);
                        self.emit_all(events);
                        entry.resolve(Ok(body));
                    }
                    Err(e) => {
                        if let Some(message) = e.action_message() {
                            self.shared.state.write().await.last_error = Some(message.to_string());
                        }
                        entry.resolve(Err(e));
                    }
                }
            }
            AckHook::LeaveLobby => {
                if let Err(e) = self.store.clear() {
                    warn!("could not clear session record: {e}");
                }
                self.shared.state.write().await.forget_identity();
                self.emit(ClientEvent::LobbyLeft);
                entry.resolve(settle(body));
            }
            AckHook::GamesList => {
                let listed = settle(body).and_then(|body| {
                    let response: GamesListResponse = serde_json::from_value(body.clone())?;
                    Ok((response, body))
                });
                match listed {
                    Ok((response, body)) => {
                        self.shared.state.write().await.games = response.games.clone();
                        self.emit(ClientEvent::GamesListed(response.games));
                        entry.resolve(Ok(body));
                    }
                    Err(e) => {
                        warn!("games:list failed: {e}");
                        entry.resolve(Err(e));
                    }
                }
            }
            AckHook::None => entry.resolve(settle(body)),
        }
    }

    async fn finish_resume(&mut self, outcome: ResumeOutcome) {
        match &outcome {
            ResumeOutcome::Restored { player, .. } => {
                info!(player_id = %player.id, "session resumed");
            }
            ResumeOutcome::Rejected { reason } => {
                warn!("session resume failed: {reason}");
                if let Err(e) = self.store.clear() {
                    warn!("could not clear session record: {e}");
                }
            }
        }
        let events = self.shared.state.write().await.apply_resume(outcome);
        self.emit_all(events);
    }

    /// Reject every action still queued for the supervisor.
    fn reject_queued(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            cmd.reject();
        }
    }

    /// Emit an event. If the channel is full, log a warning and drop the
    /// event to avoid blocking the connection.
    fn emit(&self, event: ClientEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!("event channel full, dropping event: {dropped:?}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    fn emit_all(&self, events: Vec<ClientEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Emit the last event of the supervisor's life.
    ///
    /// Uses `send().await` instead of `try_send` because the final event must
    /// never be silently dropped.
    async fn emit_final(&self, event: ClientEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Register `action` in the lifetime's ack table and transmit it.
///
/// # Errors
///
/// Returns the transport error if the frame could not be sent; the entry then
/// stays registered and is released with the lifetime.
async fn transmit<T: Transport>(
    transport: &mut T,
    pending: &mut PendingAcks,
    action: ClientAction,
    hook: AckHook,
    reply: Option<Reply>,
) -> Result<()> {
    let id = pending.register(&action, hook, reply);
    let frame = match action.encode(id) {
        Ok(frame) => frame,
        Err(e) => {
            // Serialization errors are programming bugs; settle the caller
            // and keep the connection.
            error!(action = action.name(), "failed to encode action: {e}");
            if let Some(entry) = pending.take(id) {
                entry.resolve(Err(e));
            }
            return Ok(());
        }
    };
    debug!(action = action.name(), ack = id, "sending action");
    transport.send(frame).await
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

    #[test]
    fn usernames_are_trimmed_and_bounded() {
        assert_eq!(validate_username("  alice  ").unwrap(), "alice");
        assert!(matches!(
            validate_username("bob"),
            Err(PartyError::InvalidInput(_))
        ));
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN)).is_ok());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn lobby_codes_are_four_letters() {
        assert_eq!(normalize_lobby_code("abcd").unwrap(), "ABCD");
        assert_eq!(normalize_lobby_code(" WxYz ").unwrap(), "WXYZ");
        assert!(normalize_lobby_code("ABC").is_err());
        assert!(normalize_lobby_code("AB1D").is_err());
        assert!(normalize_lobby_code("ABCDE").is_err());
    }
}
