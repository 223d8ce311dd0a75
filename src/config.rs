//! Client configuration.

use std::time::Duration;

use crate::connection::RetryPolicy;
use crate::game::ListMerge;

/// Environment variable naming the server URL.
pub const SERVER_URL_ENV: &str = "DRINKINGAMES_SERVER_URL";

/// Server URL used when [`SERVER_URL_ENV`] is not set.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3001/ws";

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time an action waits for its acknowledgment.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the server URL from the environment, falling back to
/// [`DEFAULT_SERVER_URL`].
pub fn server_url_from_env() -> String {
    std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string())
}

/// Configuration for a [`PartyClient`](crate::client::PartyClient).
///
/// # Example
///
/// ```
/// use drinkingames_client::config::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new()
///     .with_event_channel_capacity(512)
///     .with_action_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.retry.max_attempts, 5);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retry budget for each connect phase.
    pub retry: RetryPolicy,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) to avoid blocking the connection task. Terminal events are
    /// always delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the background task
    /// immediately without waiting for graceful shutdown.
    pub shutdown_timeout: Duration,
    /// How long an action waits for its acknowledgment. `None` waits until
    /// the connection lifetime ends.
    ///
    /// Defaults to **10 seconds**.
    pub action_timeout: Option<Duration>,
    /// Start a new connection lifetime after a drop. Defaults to `true`.
    pub auto_reconnect: bool,
    /// Request the game catalogue at the start of every lifetime.
    /// Defaults to `true`.
    pub fetch_games_on_connect: bool,
    /// Growth rule for list-valued game data. Defaults to [`ListMerge::Append`].
    pub list_merge: ListMerge,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            action_timeout: Some(DEFAULT_ACTION_TIMEOUT),
            auto_reconnect: true,
            fetch_games_on_connect: true,
            list_merge: ListMerge::Append,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the capacity of the bounded event channel (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn with_fetch_games_on_connect(mut self, enabled: bool) -> Self {
        self.fetch_games_on_connect = enabled;
        self
    }

    #[must_use]
    pub fn with_list_merge(mut self, list_merge: ListMerge) -> Self {
        self.list_merge = list_merge;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.action_timeout, Some(Duration::from_secs(10)));
        assert!(config.auto_reconnect);
        assert!(config.fetch_games_on_connect);
        assert_eq!(config.list_merge, ListMerge::Append);
    }

    #[test]
    fn builder_methods() {
        let config = ClientConfig::new()
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10)))
            .with_event_channel_capacity(0)
            .with_action_timeout(None)
            .with_auto_reconnect(false)
            .with_fetch_games_on_connect(false)
            .with_list_merge(ListMerge::DedupByPlayer);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.event_channel_capacity, 1);
        assert!(config.action_timeout.is_none());
        assert!(!config.auto_reconnect);
        assert!(!config.fetch_games_on_connect);
        assert_eq!(config.list_merge, ListMerge::DedupByPlayer);
    }
}
