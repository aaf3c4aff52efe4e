//! Outbound forwarding of proxied requests to MCP servers

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, HOST};
use hyper::{Method, StatusCode};
use mcp_core::{ProxyError, Result, ServerDescriptor};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Accept header sent upstream; MCP servers answer with JSON or an event stream
pub const UPSTREAM_ACCEPT: &str = "application/json, text/event-stream";

/// The parts of an inbound request that travel upstream
#[derive(Debug)]
pub struct ForwardRequest<'a> {
    pub method: &'a Method,
    /// Subpath after the server id
    pub rest: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
}

/// Upstream answer, fully read
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Join `rest` onto the path of `base` with exactly one separating slash.
///
/// An empty `rest` leaves the base path untouched.
pub fn join_path(base: &Url, rest: &str) -> Url {
    let mut url = base.clone();
    let rest = rest.trim_start_matches('/');
    if !rest.is_empty() {
        let path = format!("{}/{}", base.path().trim_end_matches('/'), rest);
        url.set_path(&path);
    }
    url
}

/// Request forwarder with connection pooling and a bounded timeout.
///
/// One attempt per client request; failures are never retried.
#[derive(Clone)]
pub struct RequestForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl RequestForwarder {
    /// Create a forwarder whose upstream calls are bounded by `timeout`
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<server.url>/<rest>?<query>`, query appended verbatim
    pub fn target_url(server: &ServerDescriptor, rest: &str, query: Option<&str>) -> Url {
        let mut url = join_path(&server.url, rest);
        url.set_query(query.filter(|q| !q.is_empty()));
        url.set_fragment(None);
        url
    }

    /// Headers for the upstream request.
    ///
    /// Every inbound header except hop-by-hop ones; `Authorization` replaced
    /// when a token is present; `Accept` always set.
    pub fn upstream_headers(inbound: &HeaderMap, access_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(inbound.len() + 2);
        for (name, value) in inbound {
            if !Self::is_hop_by_hop_header(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        if let Some(token) = access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ProxyError::Upstream("access token is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(ACCEPT, HeaderValue::from_static(UPSTREAM_ACCEPT));
        Ok(headers)
    }

    /// Forward a request to `server` and read the full upstream response
    pub async fn forward(
        &self,
        server: &ServerDescriptor,
        request: ForwardRequest<'_>,
        access_token: Option<&str>,
    ) -> Result<UpstreamResponse> {
        let ForwardRequest {
            method,
            rest,
            query,
            headers: inbound_headers,
            body,
        } = request;
        let target = Self::target_url(server, rest, query);
        let headers = Self::upstream_headers(inbound_headers, access_token)?;

        debug!(
            "Forwarding {} to {} (headers: {}, authorized: {})",
            method,
            target,
            headers.len(),
            access_token.is_some()
        );

        let mut request = self.client.request(method.clone(), target).headers(headers);
        if Self::sends_body(method) {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| self.upstream_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.upstream_error(e))?;

        debug!("Upstream responded with {} ({} bytes)", status, body.len());

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn upstream_error(&self, e: reqwest::Error) -> ProxyError {
        if e.is_timeout() {
            warn!("Upstream request timeout after {}s", self.timeout.as_secs());
            ProxyError::Upstream(format!("upstream timed out after {}s", self.timeout.as_secs()))
        } else {
            warn!("Upstream request error: {}", e);
            ProxyError::Upstream(e.to_string())
        }
    }

    /// GET and HEAD carry no body upstream
    fn sends_body(method: &Method) -> bool {
        !matches!(*method, Method::GET | Method::HEAD)
    }

    /// Headers that belong to a single connection and are not forwarded
    pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
        *name == HOST
            || *name == CONTENT_LENGTH
            || matches!(
                name.as_str(),
                "connection"
                    | "keep-alive"
                    | "proxy-authenticate"
                    | "proxy-authorization"
                    | "te"
                    | "trailer"
                    | "trailers"
                    | "transfer-encoding"
                    | "upgrade"
            )
    }
}
