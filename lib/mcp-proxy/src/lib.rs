//! Authenticated reverse proxy for MCP servers
//!
//! Requests under the proxy prefix are routed by server id, authorized with
//! a cached or exchanged access token, forwarded, and rehydrated for the
//! client.
pub mod cookies;
pub mod forwarder;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod rehydrate;
pub mod responder;
pub mod router;
pub mod token_broker;

pub use cookies::CredentialCookie;
pub use forwarder::{ForwardRequest, RequestForwarder, UpstreamResponse};
pub use identity::{CookieIdentityProvider, IdentityProvider, NoIdentityProvider};
pub use metrics::{MetricsCollector, MetricsMiddleware};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareContext};
pub use proxy::McpProxy;
pub use rehydrate::rehydrate;
pub use responder::{ErrorResponder, ProxyResponse};
pub use router::RequestRouter;
pub use token_broker::{TokenBroker, TokenGrant, TokenSource};
