//! Process configuration read once at startup

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PROXY_PREFIX: &str = "/api/oap_mcp/proxy";
pub const DEFAULT_COOKIE_PREFIX: &str = "MCP";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Deployment environment; controls the `Secure` cookie attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Proxy configuration, constructed once and shared by reference
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Raw JSON server list (`MCP_SERVERS`)
    pub servers_json: Option<String>,
    pub proxy_prefix: String,
    pub cookie_prefix: String,
    /// Request cookie carrying the caller's identity token
    pub identity_cookie: Option<String>,
    pub environment: Environment,
    pub listen_addr: SocketAddr,
    pub upstream_timeout: Duration,
    pub token_exchange_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            servers_json: None,
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            cookie_prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            identity_cookie: None,
            environment: Environment::Development,
            listen_addr: ([0, 0, 0, 0], 8080).into(),
            upstream_timeout: Duration::from_secs(30),
            token_exchange_timeout: Duration::from_secs(10),
        }
    }
}

impl ProxyConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let proxy_prefix = non_empty("MCP_PROXY_PREFIX")
            .map(|p| normalize_prefix(&p))
            .unwrap_or(defaults.proxy_prefix);

        let environment = match non_empty("MCP_PROXY_ENV").as_deref() {
            Some(env) if env.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        let listen_addr = match non_empty("MCP_PROXY_LISTEN") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "MCP_PROXY_LISTEN",
                    value,
                })?,
            None => defaults.listen_addr,
        };

        Ok(Self {
            servers_json: lookup("MCP_SERVERS"),
            proxy_prefix,
            cookie_prefix: non_empty("MCP_COOKIE_PREFIX").unwrap_or(defaults.cookie_prefix),
            identity_cookie: non_empty("MCP_IDENTITY_COOKIE"),
            environment,
            listen_addr,
            upstream_timeout: seconds(
                "MCP_UPSTREAM_TIMEOUT_SECS",
                non_empty("MCP_UPSTREAM_TIMEOUT_SECS"),
                defaults.upstream_timeout,
            )?,
            token_exchange_timeout: seconds(
                "MCP_TOKEN_EXCHANGE_TIMEOUT_SECS",
                non_empty("MCP_TOKEN_EXCHANGE_TIMEOUT_SECS"),
                defaults.token_exchange_timeout,
            )?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn seconds(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
    }
}

/// Leading slash, no trailing slash
fn normalize_prefix(prefix: &str) -> String {
    format!("/{}", prefix.trim().trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.proxy_prefix, DEFAULT_PROXY_PREFIX);
        assert_eq!(config.cookie_prefix, "MCP");
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert!(config.servers_json.is_none());
        assert!(config.identity_cookie.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = ProxyConfig::from_lookup(lookup(&[
            ("MCP_PROXY_PREFIX", "proxy/"),
            ("MCP_PROXY_ENV", "production"),
            ("MCP_PROXY_LISTEN", "127.0.0.1:9000"),
            ("MCP_IDENTITY_COOKIE", "session-token"),
            ("MCP_TOKEN_EXCHANGE_TIMEOUT_SECS", "3"),
            ("MCP_SERVERS", "[]"),
        ]))
        .unwrap();

        assert_eq!(config.proxy_prefix, "/proxy");
        assert!(config.is_production());
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.identity_cookie.as_deref(), Some("session-token"));
        assert_eq!(config.token_exchange_timeout, Duration::from_secs(3));
        assert_eq!(config.servers_json.as_deref(), Some("[]"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(ProxyConfig::from_lookup(lookup(&[("MCP_UPSTREAM_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[("MCP_UPSTREAM_TIMEOUT_SECS", "0")])).is_err());
        assert!(ProxyConfig::from_lookup(lookup(&[("MCP_PROXY_LISTEN", "nowhere")])).is_err());
    }
}
