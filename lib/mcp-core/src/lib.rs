//! Core types for the MCP proxy
//!
//! This library provides:
//! - Server descriptors and typed validation of configuration records
//! - The immutable server registry
//! - Proxy configuration and the request failure taxonomy

pub mod config;
pub mod descriptor;
pub mod error;
pub mod registry;

pub use config::{ConfigError, Environment, ProxyConfig};
pub use descriptor::{parse_server_id, validate_record, RecordError, ServerDescriptor, ServerRecord};
pub use error::{ProxyError, RegistryError, Result};
pub use registry::ServerRegistry;
