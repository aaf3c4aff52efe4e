//! Upstream access tokens via caller cache or OAuth token exchange

use crate::forwarder::join_path;
use mcp_core::{ProxyError, Result, ServerDescriptor};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
pub const PROXY_CLIENT_ID: &str = "mcp_default";

/// Where a token handed to the forwarder came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    /// Presented by the caller; used unchanged, no expiry check
    Cached,
    /// Minted in this request; must be reported back to the caller
    Exchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub source: TokenSource,
}

impl TokenGrant {
    pub fn is_fresh(&self) -> bool {
        self.source == TokenSource::Exchanged
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Why a token exchange produced no token
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token endpoint returned an unusable body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("token endpoint returned an empty access_token")]
    EmptyToken,
}

/// Resolves the upstream access token for one request.
///
/// Holds no tokens itself; the cache lives in the caller's cookies.
#[derive(Clone)]
pub struct TokenBroker {
    client: reqwest::Client,
}

impl TokenBroker {
    /// Create a broker whose exchange calls are bounded by `timeout`
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Obtain a token for `server`.
    ///
    /// `Ok(None)` for servers without auth. Otherwise the cached token wins,
    /// then a token exchange with the identity token, then `ProxyError::Auth`.
    pub async fn obtain_token(
        &self,
        server: &ServerDescriptor,
        identity_token: Option<&str>,
        cached_token: Option<&str>,
    ) -> Result<Option<TokenGrant>> {
        if !server.auth_required() {
            return Ok(None);
        }

        if let Some(token) = cached_token {
            debug!("Using cached access token for server {}", server.id);
            return Ok(Some(TokenGrant {
                token: token.to_string(),
                source: TokenSource::Cached,
            }));
        }

        if let Some(identity) = identity_token {
            match self.exchange(server, identity).await {
                Ok(token) => {
                    debug!("Token exchange succeeded for server {}", server.id);
                    return Ok(Some(TokenGrant {
                        token,
                        source: TokenSource::Exchanged,
                    }));
                }
                Err(e) => warn!("Token exchange failed for server {}: {}", server.id, e),
            }
        } else {
            debug!("No identity token available for server {}", server.id);
        }

        Err(ProxyError::Auth(server.id.to_string()))
    }

    /// Perform one token-exchange grant against `<url>/oauth/token`
    pub async fn exchange(
        &self,
        server: &ServerDescriptor,
        identity_token: &str,
    ) -> std::result::Result<String, ExchangeError> {
        let endpoint = join_path(&server.url, "oauth/token");
        debug!("Exchanging identity token at {}", endpoint);

        let response = self
            .client
            .post(endpoint)
            .form(&Self::exchange_form(server, identity_token))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        if parsed.access_token.trim().is_empty() {
            return Err(ExchangeError::EmptyToken);
        }
        Ok(parsed.access_token)
    }

    /// Form fields of the exchange request, in wire order
    pub fn exchange_form(server: &ServerDescriptor, identity_token: &str) -> Vec<(&'static str, String)> {
        vec![
            ("client_id", PROXY_CLIENT_ID.to_string()),
            ("subject_token", identity_token.to_string()),
            ("grant_type", TOKEN_EXCHANGE_GRANT_TYPE.to_string()),
            ("resource", join_path(&server.url, "mcp").to_string()),
            ("subject_token_type", ACCESS_TOKEN_TYPE.to_string()),
        ]
    }
}
