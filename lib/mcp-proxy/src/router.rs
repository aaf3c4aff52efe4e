//! Resolution of inbound proxy paths to registered servers

use mcp_core::{parse_server_id, ProxyError, Result, ServerDescriptor, ServerRegistry};
use tracing::debug;

/// Server id segment and remaining subpath of a proxy path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutedPath<'a> {
    pub server_id: &'a str,
    /// Everything after the id segment, without its leading slash
    pub rest: &'a str,
}

/// Router for `<prefix>/<id>[/<rest>]` request paths
#[derive(Clone, Debug)]
pub struct RequestRouter {
    prefix: String,
}

impl RequestRouter {
    /// `prefix` is a path such as `/api/oap_mcp/proxy`
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = format!("/{}", prefix.trim_matches('/'));
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Split a request path into server id and rest.
    ///
    /// Returns `None` when the path is not under the prefix or has no id segment.
    /// The id is not validated here.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<RoutedPath<'a>> {
        let tail = path.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;

        let (server_id, rest) = match tail.split_once('/') {
            Some((id, rest)) => (id, rest),
            None => (tail, ""),
        };

        if server_id.is_empty() {
            return None;
        }
        Some(RoutedPath { server_id, rest })
    }

    /// Full resolution sequence: registry check, path parse, id syntax, lookup
    pub fn route<'r, 'p>(
        &self,
        registry: &'r ServerRegistry,
        path: &'p str,
    ) -> Result<(&'r ServerDescriptor, &'p str)> {
        if registry.is_empty() {
            return Err(ProxyError::Config("server registry is empty".to_string()));
        }

        let routed = self.resolve(path).ok_or(ProxyError::MissingId)?;

        let id = parse_server_id(routed.server_id)
            .ok_or_else(|| ProxyError::InvalidId(routed.server_id.to_string()))?;

        let server = registry
            .find(&id)
            .ok_or_else(|| ProxyError::NotFound(id.to_string()))?;

        if routed.rest.split(['/', '\\']).any(is_dot_segment) {
            return Err(ProxyError::InvalidRequest(
                "dot segments are not allowed in the proxied path".to_string(),
            ));
        }

        debug!("Routed {} to server {} (rest: {:?})", path, server.id, routed.rest);
        Ok((server, routed.rest))
    }
}

/// `.` or `..`, in plain or percent-encoded spelling.
///
/// URL joining resolves these, which would move the target outside the
/// server's base path.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
