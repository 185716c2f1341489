//! OAuth2 client-credentials tokens for Microsoft Graph.

use std::fmt;
use std::future::Future;

use reqwest::Client;
use serde::Deserialize;

use super::{api_error, RemoteError, RemoteResult};
use crate::config::GraphConfig;
use crate::util::unix_timestamp_now;

const EXPIRY_SKEW_SECONDS: i64 = 60;
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: i64,
}

impl AccessToken {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for the remote store.
pub trait TokenProvider: Send + Sync {
    fn fetch_token(&self) -> impl Future<Output = RemoteResult<AccessToken>> + Send;
}

#[derive(Clone)]
pub struct ClientCredentialsAuth {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for ClientCredentialsAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientCredentialsAuth")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsAuth {
    pub fn new(config: &GraphConfig) -> RemoteResult<Self> {
        Ok(Self {
            client: Client::builder().timeout(config.http_timeout).build()?,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

impl TokenProvider for ClientCredentialsAuth {
    async fn fetch_token(&self) -> RemoteResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];
        let response = self.client.post(&self.token_url).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(api_error(status, &body).to_string()));
        }

        let payload = response
            .json::<TokenResponse>()
            .await
            .map_err(|error| RemoteError::Auth(format!("token response parse failed: {error}")))?;
        payload.into_token()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self) -> RemoteResult<AccessToken> {
        let token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RemoteError::Auth("token response did not include a token".into()))?;
        let expires_in = self.expires_in.unwrap_or(3_600);
        Ok(AccessToken {
            token,
            expires_at: unix_timestamp_now().saturating_add(expires_in),
        })
    }
}
