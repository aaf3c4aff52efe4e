//! Client-held credential cookies
//!
//! The access token minted for a server travels back to the client in a
//! cookie scoped to that server id. The proxy never stores it.

use hyper::header::{HeaderMap, HeaderValue, InvalidHeaderValue, COOKIE};

/// Validity window of a minted credential
pub const CREDENTIAL_MAX_AGE_SECS: u64 = 3600;

/// Find a cookie value by name across all `Cookie` headers.
///
/// Values are percent-decoded; a value that does not decode is returned raw.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(|value| match urlencoding::decode(value) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => value.to_string(),
        })
}

/// Drop one cookie from every `Cookie` header, removing headers left empty
pub fn remove_cookie(headers: &mut HeaderMap, name: &str) {
    let remaining: Vec<String> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .filter(|pair| pair.split_once('=').map_or(true, |(key, _)| key != name))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter(|value| !value.is_empty())
        .collect();

    headers.remove(COOKIE);
    for value in remaining {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.append(COOKIE, value);
        }
    }
}

/// Naming and attributes of the per-server credential cookie
#[derive(Clone, Debug)]
pub struct CredentialCookie {
    prefix: String,
    secure: bool,
}

impl CredentialCookie {
    pub fn new(prefix: impl Into<String>, secure: bool) -> Self {
        Self {
            prefix: prefix.into(),
            secure,
        }
    }

    /// `X-<Prefix>-Access-Token-<serverId>`
    pub fn name(&self, server_id: &str) -> String {
        format!("X-{}-Access-Token-{}", self.prefix, server_id)
    }

    /// Cached token presented by the caller for this server
    pub fn cached_token(&self, headers: &HeaderMap, server_id: &str) -> Option<String> {
        cookie_value(headers, &self.name(server_id))
    }

    /// `Set-Cookie` value carrying a freshly minted token.
    ///
    /// Readable by client-side code (no `HttpOnly`), `SameSite=Lax`, one hour.
    /// The token is percent-encoded so it cannot break out of the value.
    pub fn set_cookie(&self, server_id: &str, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            self.name(server_id),
            urlencoding::encode(token),
            CREDENTIAL_MAX_AGE_SECS
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}
