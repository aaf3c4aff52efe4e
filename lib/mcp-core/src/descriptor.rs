//! Backend server descriptors and per-record validation

use serde::Deserialize;
use thiserror::Error;
use url::Url;
use uuid::{Uuid, Variant};

/// A backend MCP server the proxy may forward to.
///
/// Built once from configuration and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Unique server id, the routing key
    pub id: Uuid,
    /// Display name, only used by the UI
    pub name: String,
    /// Absolute http(s) base URL; proxied subpaths are joined onto it
    pub url: Url,
    /// Auth endpoint; presence alone marks the server as requiring a token
    pub auth_url: Option<String>,
}

impl ServerDescriptor {
    /// True iff an auth endpoint is configured
    pub fn auth_required(&self) -> bool {
        self.auth_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Canonical textual id (lowercase, hyphenated)
    pub fn id_string(&self) -> String {
        self.id.hyphenated().to_string()
    }
}

/// Raw configuration record as it appears in the server list
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "authUrl")]
    pub auth_url: Option<String>,
}

/// Why a single configuration record was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index}: field `{field}` is empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("record {index}: `{value}` is not a valid UUID")]
    InvalidId { index: usize, value: String },

    #[error("record {index}: `{value}` is not an absolute http(s) URL")]
    InvalidUrl { index: usize, value: String },

    #[error("record {index}: duplicate server id {id}")]
    DuplicateId { index: usize, id: Uuid },
}

/// Parse a server id in canonical hyphenated form.
///
/// Accepts versions 1-8 with the RFC 4122 variant, plus the nil and max UUIDs.
/// Braced, URN and unhyphenated spellings are rejected.
pub fn parse_server_id(value: &str) -> Option<Uuid> {
    if value.len() != 36 {
        return None;
    }
    let id = Uuid::try_parse(value).ok()?;

    if id.is_nil() || id.as_bytes().iter().all(|b| *b == 0xff) {
        return Some(id);
    }

    let version = id.get_version_num();
    if (1..=8).contains(&version) && id.get_variant() == Variant::RFC4122 {
        Some(id)
    } else {
        None
    }
}

fn required(
    index: usize,
    field: &'static str,
    value: Option<String>,
) -> Result<String, RecordError> {
    match value {
        None => Err(RecordError::MissingField { index, field }),
        Some(v) if v.trim().is_empty() => Err(RecordError::EmptyField { index, field }),
        Some(v) => Ok(v),
    }
}

/// Validate one record into a descriptor
pub fn validate_record(index: usize, record: ServerRecord) -> Result<ServerDescriptor, RecordError> {
    let raw_id = required(index, "id", record.id)?;
    let id = parse_server_id(&raw_id).ok_or(RecordError::InvalidId {
        index,
        value: raw_id.clone(),
    })?;

    let name = required(index, "name", record.name)?;

    let raw_url = required(index, "url", record.url)?;
    let url = match Url::parse(&raw_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => url,
        _ => {
            return Err(RecordError::InvalidUrl {
                index,
                value: raw_url,
            })
        }
    };

    Ok(ServerDescriptor {
        id,
        name,
        url,
        auth_url: record.auth_url,
    })
}
