use crate::descriptor::RecordError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Failure classes a proxied request can end in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Empty or invalid registry; process-level misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path carries no server id segment
    #[error("Missing MCP server ID")]
    MissingId,

    /// Server id segment is not a UUID
    #[error("Invalid MCP server ID: {0}")]
    InvalidId(String),

    /// Request is unusable: unreadable body or a path escaping the server base
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Well-formed id that is not registered
    #[error("MCP server not found: {0}")]
    NotFound(String),

    /// Neither a cached nor an exchanged token is available
    #[error("No token source available for server {0}")]
    Auth(String),

    /// Transport failure or timeout talking to the target server
    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl ProxyError {
    /// HTTP status the failure is reported with
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::Config(_) => 500,
            ProxyError::MissingId | ProxyError::InvalidId(_) | ProxyError::InvalidRequest(_) => 400,
            ProxyError::NotFound(_) => 404,
            ProxyError::Auth(_) => 401,
            ProxyError::Upstream(_) => 502,
        }
    }

    /// Message shown to the client
    pub fn client_message(&self) -> &'static str {
        match self {
            ProxyError::Config(_) => {
                "No MCP servers configured. Please set the MCP_SERVERS environment variable."
            }
            ProxyError::MissingId => "Missing MCP server ID.",
            ProxyError::InvalidId(_) => "Invalid MCP server ID.",
            ProxyError::InvalidRequest(_) => "Invalid request.",
            ProxyError::NotFound(_) => "MCP server not found.",
            ProxyError::Auth(_) => "Failed to obtain access token from any source.",
            ProxyError::Upstream(_) => "Proxy request failed",
        }
    }

    /// Underlying cause exposed in the `error` field, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            ProxyError::Upstream(cause) | ProxyError::InvalidRequest(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Fatal errors while loading the server list at startup
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Server list is not a valid JSON array of records: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid MCP server config: {0}")]
    InvalidRecord(#[from] RecordError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ProxyError::Config("empty".into()).status_code(), 500);
        assert_eq!(ProxyError::MissingId.status_code(), 400);
        assert_eq!(ProxyError::InvalidId("x".into()).status_code(), 400);
        assert_eq!(ProxyError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ProxyError::Auth("x".into()).status_code(), 401);
        assert_eq!(ProxyError::Upstream("refused".into()).status_code(), 502);
    }

    #[test]
    fn test_detail_only_for_upstream_and_request() {
        assert_eq!(ProxyError::Upstream("refused".into()).detail(), Some("refused"));
        assert_eq!(ProxyError::NotFound("x".into()).detail(), None);
    }
}
