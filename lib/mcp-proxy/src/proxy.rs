//! The authenticated proxy pipeline
//!
//! One request flows through: route, token resolution, forward, rehydrate.
//! A freshly exchanged token is handed back to the caller as a cookie.

use crate::cookies::CredentialCookie;
use crate::forwarder::{ForwardRequest, RequestForwarder};
use crate::identity::{CookieIdentityProvider, IdentityProvider, NoIdentityProvider};
use crate::rehydrate::rehydrate;
use crate::responder::{ErrorResponder, ProxyResponse};
use crate::router::RequestRouter;
use crate::token_broker::TokenBroker;
use hyper::body::Bytes;
use hyper::header::SET_COOKIE;
use hyper::Request;
use mcp_core::{ProxyConfig, Result, ServerRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stateless request handler shared by all connections
#[derive(Clone)]
pub struct McpProxy {
    config: Arc<ProxyConfig>,
    registry: Arc<ServerRegistry>,
    router: RequestRouter,
    broker: TokenBroker,
    forwarder: RequestForwarder,
    identity: Arc<dyn IdentityProvider>,
    credentials: CredentialCookie,
}

impl McpProxy {
    /// Build the pipeline with an explicit identity source
    pub fn new(
        config: ProxyConfig,
        registry: ServerRegistry,
        identity: Arc<dyn IdentityProvider>,
    ) -> anyhow::Result<Self> {
        let router = RequestRouter::new(config.proxy_prefix.clone());
        let broker = TokenBroker::new(config.token_exchange_timeout)?;
        let forwarder = RequestForwarder::new(config.upstream_timeout)?;
        let credentials = CredentialCookie::new(config.cookie_prefix.clone(), config.is_production());

        info!(
            "MCP proxy ready: {} server(s) under {} (identity: {})",
            registry.len(),
            router.prefix(),
            identity.name()
        );

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            router,
            broker,
            forwarder,
            identity,
            credentials,
        })
    }

    /// Build a proxy whose identity source follows `MCP_IDENTITY_COOKIE`
    pub fn from_config(config: ProxyConfig, registry: ServerRegistry) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityProvider> = match &config.identity_cookie {
            Some(name) => Arc::new(CookieIdentityProvider::new(name.clone())),
            None => {
                warn!("MCP_IDENTITY_COOKIE not set; token exchange is disabled");
                Arc::new(NoIdentityProvider)
            }
        };
        Self::new(config, registry, identity)
    }

    /// Configuration the proxy was built from
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Registered servers
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Proxy one request, turning every failure into its JSON error response
    pub async fn handle(&self, req: Request<Bytes>) -> ProxyResponse {
        match self.proxy(req).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Proxy request failed: {}", e);
                ErrorResponder::respond(&e)
            }
        }
    }

    /// Proxy one request, returning the failure class on error
    pub async fn proxy(&self, req: Request<Bytes>) -> Result<ProxyResponse> {
        let (mut parts, body) = req.into_parts();
        let uri = parts.uri.clone();

        let (server, rest) = self.router.route(&self.registry, uri.path())?;
        let server_id = server.id_string();

        let cached = self.credentials.cached_token(&parts.headers, &server_id);

        let identity = if server.auth_required() && cached.is_none() {
            self.identity.identity_token(&parts.headers).await
        } else {
            None
        };

        let grant = self
            .broker
            .obtain_token(server, identity.as_deref(), cached.as_deref())
            .await?;

        self.identity.strip(&mut parts.headers);

        let upstream = self
            .forwarder
            .forward(
                server,
                ForwardRequest {
                    method: &parts.method,
                    rest,
                    query: uri.query(),
                    headers: &parts.headers,
                    body,
                },
                grant.as_ref().map(|g| g.token.as_str()),
            )
            .await?;

        let mut response = rehydrate(upstream);

        if let Some(grant) = grant.filter(|g| g.is_fresh()) {
            match self.credentials.set_cookie(&server_id, &grant.token) {
                Ok(cookie) => {
                    debug!("Issuing credential cookie for server {}", server_id);
                    response.headers_mut().append(SET_COOKIE, cookie);
                }
                Err(e) => warn!("Exchanged token for server {} is not cookie-safe: {}", server_id, e),
            }
        }

        Ok(response)
    }
}
