//! Gateway credentials.
//!
//! The credential set is owned by the refresh policy and replaced as a
//! whole on every successful refresh exchange. Sessions only ever see a
//! snapshot of the access token, taken when the connection attempt starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full credential set for one gateway application + trading account.
///
/// `Debug` redacts everything secret so the struct can be logged safely.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth application (client) identifier.
    pub client_id: String,
    /// OAuth application secret.
    pub client_secret: String,
    /// Current access token presented during account authentication.
    pub access_token: String,
    /// Refresh token exchanged for a new access token on expiry.
    pub refresh_token: String,
    /// Trading account identifier, if already known.
    pub account_id: Option<i64>,
    /// Locally known expiry of the access token.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A fresh access/refresh token pair returned by the token authority.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// New access token.
    pub access_token: String,
    /// New refresh token (authorities rotate these on every exchange).
    pub refresh_token: String,
    /// Lifetime of the access token, when reported.
    pub expires_in: Option<std::time::Duration>,
}

impl Credentials {
    /// Whether the locally known expiry has passed.
    ///
    /// Credentials without an expiry timestamp are assumed valid until
    /// the gateway says otherwise.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Apply a token grant, replacing the access/refresh pair as a unit.
    #[must_use]
    pub fn with_grant(mut self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        self.access_token = grant.access_token;
        self.refresh_token = grant.refresh_token;
        self.expires_at = grant
            .expires_in
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl);
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Credentials {
        Credentials {
            client_id: "app-1".to_string(),
            client_secret: "hush".to_string(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            account_id: Some(42),
            expires_at: None,
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("app-1"));
        assert!(!debug.contains("hush"));
        assert!(!debug.contains("access-1"));
        assert!(!debug.contains("refresh-1"));
    }

    #[test]
    fn expiry_check() {
        let now = Utc::now();
        let mut creds = sample();
        assert!(!creds.is_expired(now));

        creds.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(creds.is_expired(now));

        creds.expires_at = Some(now + chrono::Duration::seconds(60));
        assert!(!creds.is_expired(now));
    }

    #[test]
    fn grant_replaces_pair_and_sets_expiry() {
        let now = Utc::now();
        let updated = sample().with_grant(
            TokenGrant {
                access_token: "access-2".to_string(),
                refresh_token: "refresh-2".to_string(),
                expires_in: Some(Duration::from_secs(3600)),
            },
            now,
        );

        assert_eq!(updated.access_token, "access-2");
        assert_eq!(updated.refresh_token, "refresh-2");
        assert_eq!(updated.expires_at, Some(now + chrono::Duration::seconds(3600)));
        // Untouched fields survive.
        assert_eq!(updated.client_id, "app-1");
        assert_eq!(updated.account_id, Some(42));
    }
}
