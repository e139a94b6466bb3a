//! Credential refresh policy.
//!
//! Runs the exchange against the token authority with a bounded retry
//! budget, then persists the renewed pair before handing it back. The
//! access and refresh tokens are replaced as a unit; a grant is never
//! applied half-way.

use std::time::Duration;

use chrono::Utc;

use crate::domain::Credentials;

use super::ports::{CredentialStore, RefreshError, TokenExchange};

/// Retry budget and pacing for refresh exchanges.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum exchange attempts per refresh request.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap on the between-attempt delay.
    pub max_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Orchestrates one credential refresh: exchange, apply, persist.
pub struct RefreshPolicy<E, S> {
    exchange: E,
    store: S,
    config: RefreshConfig,
}

impl<E, S> RefreshPolicy<E, S>
where
    E: TokenExchange,
    S: CredentialStore,
{
    /// Build the policy around an exchange and a store.
    pub const fn new(exchange: E, store: S, config: RefreshConfig) -> Self {
        Self {
            exchange,
            store,
            config,
        }
    }

    /// Access to the underlying store (for the initial load at startup).
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Refresh the credential pair.
    ///
    /// Transport failures are retried up to the configured budget with a
    /// doubling delay; a rejection from the authority is terminal because
    /// retrying a bad refresh token only burns the budget. The renewed
    /// pair is persisted before it is returned, so a crash after this
    /// call never loses the rotation.
    ///
    /// # Errors
    ///
    /// `Rejected` on a terminal refusal, `Exhausted` when the budget runs
    /// out, `Store` when persisting the renewed pair fails.
    pub async fn refresh(&self, credentials: Credentials) -> Result<Credentials, RefreshError> {
        let mut delay = self.config.initial_delay;
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(self.config.max_delay);
            }

            match self.exchange.exchange(&credentials).await {
                Ok(grant) => {
                    let renewed = credentials.with_grant(grant, Utc::now());
                    self.store.persist(&renewed).await?;
                    tracing::info!(attempt, "credential pair refreshed and persisted");
                    return Ok(renewed);
                }
                Err(rejected @ RefreshError::Rejected { .. }) => {
                    tracing::error!(attempt, error = %rejected, "token authority rejected the refresh");
                    return Err(rejected);
                }
                Err(error) => {
                    tracing::warn!(attempt, error = %error, "token exchange attempt failed");
                    last_error = error.to_string();
                }
            }
        }

        Err(RefreshError::Exhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockCredentialStore, MockTokenExchange};
    use crate::domain::TokenGrant;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "app".to_string(),
            client_secret: "secret".to_string(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            account_id: Some(42),
            expires_at: None,
        }
    }

    fn grant() -> TokenGrant {
        TokenGrant {
            access_token: "access-2".to_string(),
            refresh_token: "refresh-2".to_string(),
            expires_in: Some(Duration::from_secs(3600)),
        }
    }

    fn fast_config() -> RefreshConfig {
        RefreshConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn successful_refresh_persists_before_returning() {
        let mut exchange = MockTokenExchange::new();
        exchange.expect_exchange().times(1).returning(|_| Ok(grant()));

        let mut store = MockCredentialStore::new();
        store
            .expect_persist()
            .times(1)
            .withf(|c| c.access_token == "access-2" && c.refresh_token == "refresh-2")
            .returning(|_| Ok(()));

        let policy = RefreshPolicy::new(exchange, store, fast_config());
        let renewed = policy.refresh(credentials()).await.unwrap();
        assert_eq!(renewed.access_token, "access-2");
        assert_eq!(renewed.refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn transport_failures_are_retried_within_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();

        let mut exchange = MockTokenExchange::new();
        exchange.expect_exchange().times(3).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RefreshError::Transport("connection reset".to_string()))
            } else {
                Ok(grant())
            }
        });

        let mut store = MockCredentialStore::new();
        store.expect_persist().times(1).returning(|_| Ok(()));

        let policy = RefreshPolicy::new(exchange, store, fast_config());
        let renewed = policy.refresh(credentials()).await.unwrap();
        assert_eq!(renewed.access_token, "access-2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejection_is_terminal_without_retry() {
        let mut exchange = MockTokenExchange::new();
        exchange.expect_exchange().times(1).returning(|_| {
            Err(RefreshError::Rejected {
                status: 400,
                message: "invalid_grant".to_string(),
            })
        });

        let mut store = MockCredentialStore::new();
        store.expect_persist().times(0);

        let policy = RefreshPolicy::new(exchange, store, fast_config());
        assert!(matches!(
            policy.refresh(credentials()).await,
            Err(RefreshError::Rejected { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn exhausted_budget_reports_the_last_error() {
        let mut exchange = MockTokenExchange::new();
        exchange
            .expect_exchange()
            .times(3)
            .returning(|_| Err(RefreshError::Transport("dns failure".to_string())));

        let mut store = MockCredentialStore::new();
        store.expect_persist().times(0);

        let policy = RefreshPolicy::new(exchange, store, fast_config());
        match policy.refresh(credentials()).await {
            Err(RefreshError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("dns failure"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn persist_failure_surfaces_as_store_error() {
        let mut exchange = MockTokenExchange::new();
        exchange.expect_exchange().times(1).returning(|_| Ok(grant()));

        let mut store = MockCredentialStore::new();
        store.expect_persist().times(1).returning(|_| {
            Err(crate::application::ports::StoreError::Io(
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs"),
            ))
        });

        let policy = RefreshPolicy::new(exchange, store, fast_config());
        assert!(matches!(
            policy.refresh(credentials()).await,
            Err(RefreshError::Store(_))
        ));
    }
}
