//! Connection lifecycle.
//!
//! [`ConnectionState`] is owned by the client supervisor; everything else
//! observes it. Establishing a connection uses a fixed retry budget with a
//! fixed delay between attempts ([`RetryPolicy`]). Exhausting the budget is
//! reported as [`PartyError::ConnectFailed`](crate::error::PartyError::ConnectFailed) and never touches the stored
//! session record.

use std::time::Duration;

#[cfg(feature = "tokio-runtime")]
use tracing::{debug, info, warn};

#[cfg(feature = "tokio-runtime")]
use crate::error::{PartyError, Result};
#[cfg(feature = "tokio-runtime")]
use crate::transport::Connector;

/// Default number of connect attempts per connect phase.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between connect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Lifecycle of the physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// First connect phase in progress.
    Connecting,
    Connected,
    /// Connect phase after a drop.
    Reconnecting,
    /// Retry budget exhausted; the server is unreachable.
    Errored,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Fixed-budget, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per connect phase. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Run one connect phase: up to `policy.max_attempts` attempts, sleeping
/// `policy.delay` between them.
///
/// # Errors
///
/// Returns [`PartyError::ConnectFailed`] once every attempt has failed.
#[cfg(feature = "tokio-runtime")]
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    policy: &RetryPolicy,
) -> Result<C::Transport> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        debug!(attempt, max_attempts = attempts, "connecting");
        match connector.connect().await {
            Ok(transport) => {
                info!(attempt, "connected to server");
                return Ok(transport);
            }
            Err(e) => {
                warn!(attempt, max_attempts = attempts, "connect attempt failed: {e}");
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
    Err(PartyError::ConnectFailed { attempts })
}

#[cfg(test)]
#[cfg(feature = "tokio-runtime")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), PartyError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PartyError>> {
            None
        }

        async fn close(&mut self) -> std::result::Result<(), PartyError> {
            Ok(())
        }
    }

    /// Fails until attempt number `succeed_on` (1-based); never succeeds if 0.
    struct FlakyConnector {
        succeed_on: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Transport = NullTransport;

        async fn connect(&self) -> std::result::Result<NullTransport, PartyError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.succeed_on != 0 && n >= self.succeed_on {
                Ok(NullTransport)
            } else {
                Err(PartyError::TransportClosed)
            }
        }
    }

    #[test]
    fn default_policy_matches_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let connector = FlakyConnector {
            succeed_on: 0,
            attempts: AtomicU32::new(0),
        };
        let started = tokio::time::Instant::now();
        let err = connect_with_retry(&connector, &RetryPolicy::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, PartyError::ConnectFailed { attempts: 5 }));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 5);
        // Four pauses between five attempts, none after the last.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let connector = FlakyConnector {
            succeed_on: 3,
            attempts: AtomicU32::new(0),
        };
        let result = connect_with_retry(&connector, &RetryPolicy::default()).await;
        assert!(result.is_ok());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
    }
}
