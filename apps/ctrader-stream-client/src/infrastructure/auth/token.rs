//! HTTP token exchange adapter.
//!
//! Implements the refresh-token grant against the OAuth token endpoint.
//! Retry pacing lives in the application-level refresh policy; this
//! adapter performs exactly one exchange per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::application::{RefreshError, TokenExchange};
use crate::domain::{Credentials, TokenGrant};

/// Wire shape of a successful token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<u64>,
}

/// Token exchange over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    client: Client,
    token_url: String,
}

impl HttpTokenExchange {
    /// Build the adapter for a token endpoint URL.
    ///
    /// # Errors
    ///
    /// `Transport` when the underlying HTTP client cannot be built.
    pub fn new(token_url: String, timeout: Duration) -> Result<Self, RefreshError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        Ok(Self { client, token_url })
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<TokenGrant, RefreshError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            // 4xx means the grant itself is bad; retrying cannot help.
            // 5xx and everything else goes through the transport path so
            // the policy's retry budget applies.
            if status.is_client_error() {
                return Err(RefreshError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(RefreshError::Transport(format!(
                "token endpoint returned {status}: {message}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(format!("malformed token response: {e}")))?;

        Ok(TokenGrant {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_parses_with_and_without_expiry() {
        let full: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":2628000}"#,
        )
        .unwrap();
        assert_eq!(full.access_token, "a");
        assert_eq!(full.expires_in, Some(2_628_000));

        let bare: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r"}"#).unwrap();
        assert_eq!(bare.expires_in, None);
    }
}
