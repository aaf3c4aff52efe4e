//! Sources of the caller's identity token
//!
//! The identity token is the subject of a token exchange and is never
//! forwarded to a target server as a bearer credential.

use crate::cookies::{cookie_value, remove_cookie};
use hyper::HeaderMap;

/// Supplies the calling user's identity token from an inbound request
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &'static str {
        "UnnamedIdentityProvider"
    }

    async fn identity_token(&self, headers: &HeaderMap) -> Option<String>;

    /// Remove the identity token from headers bound for an upstream server
    fn strip(&self, _headers: &mut HeaderMap) {}
}

/// Reads the identity token from a named request cookie
pub struct CookieIdentityProvider {
    cookie_name: String,
}

impl CookieIdentityProvider {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for CookieIdentityProvider {
    fn name(&self) -> &'static str {
        "CookieIdentityProvider"
    }

    async fn identity_token(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.cookie_name)
    }

    fn strip(&self, headers: &mut HeaderMap) {
        remove_cookie(headers, &self.cookie_name);
    }
}

/// No identity source configured; token exchange is never attempted
pub struct NoIdentityProvider;

#[async_trait::async_trait]
impl IdentityProvider for NoIdentityProvider {
    fn name(&self) -> &'static str {
        "NoIdentityProvider"
    }

    async fn identity_token(&self, _headers: &HeaderMap) -> Option<String> {
        None
    }
}
