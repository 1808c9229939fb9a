use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::UpstreamError;
use crate::config::AuthConfig;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client-credentials token source with an in-process cache.
pub struct TokenProvider {
    client: reqwest::Client,
    config: AuthConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(client: reqwest::Client, config: AuthConfig) -> Self {
        Self {
            client,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, reusing the cached one until it expires.
    pub async fn token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, UpstreamError> {
        let (url, client_id, client_secret) = match (
            self.config.token_url.as_deref(),
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) {
            (Some(url), Some(id), Some(secret)) => (url, id, secret),
            _ => {
                return Err(UpstreamError::Auth(
                    "AUTH0_URL, AUTH0_CLIENT_ID and AUTH0_CLIENT_SECRET must be set".to_string(),
                ))
            }
        };

        debug!(%url, "requesting machine token");
        let response = self
            .client
            .post(url)
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id,
                client_secret,
                audience: &self.config.audience,
            })
            .send()
            .await
            .map_err(|source| UpstreamError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|source| UpstreamError::Decode {
                url: url.to_string(),
                source,
            })?;

        let lifetime = token_lifetime(body.expires_in, self.config.token_cache_time);
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

fn token_lifetime(expires_in: Option<u64>, cap: Duration) -> Duration {
    expires_in
        .map(Duration::from_secs)
        .map_or(cap, |issued| issued.min(cap))
}
