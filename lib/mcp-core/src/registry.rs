//! Registry of backend MCP servers

use crate::descriptor::{validate_record, RecordError, ServerDescriptor, ServerRecord};
use crate::error::RegistryError;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// ServerRegistry holds the validated server list for the process lifetime.
///
/// It is immutable after construction, so concurrent readers need no locking.
#[derive(Clone, Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<ServerDescriptor>,
    by_id: HashMap<Uuid, usize>,
}

impl ServerRegistry {
    /// Build a registry from already-validated descriptors.
    ///
    /// Fails on duplicate ids.
    pub fn new(servers: Vec<ServerDescriptor>) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::with_capacity(servers.len());
        for (index, server) in servers.iter().enumerate() {
            if by_id.insert(server.id, index).is_some() {
                return Err(RecordError::DuplicateId {
                    index,
                    id: server.id,
                }
                .into());
            }
        }
        Ok(Self { servers, by_id })
    }

    /// Parse and validate a JSON array of `{id, name, url, authUrl?}` records
    pub fn from_json(source: &str) -> Result<Self, RegistryError> {
        let records: Vec<ServerRecord> = serde_json::from_str(source)?;
        let servers = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| validate_record(index, record))
            .collect::<Result<Vec<_>, _>>()?;

        let registry = Self::new(servers)?;
        for server in &registry.servers {
            debug!(
                "Registered MCP server {} ({}) auth_required={}",
                server.id,
                server.url,
                server.auth_required()
            );
        }
        Ok(registry)
    }

    /// Load the registry from an optional source.
    ///
    /// An absent or blank source yields an empty registry; every proxied
    /// request then fails with a configuration error.
    pub fn load(source: Option<&str>) -> Result<Self, RegistryError> {
        match source.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(json) => {
                let registry = Self::from_json(json)?;
                info!("Loaded {} MCP server(s)", registry.len());
                Ok(registry)
            }
        }
    }

    /// Look up a server by id
    pub fn find(&self, id: &Uuid) -> Option<&ServerDescriptor> {
        self.by_id.get(id).map(|&index| &self.servers[index])
    }

    /// All servers, in configuration order
    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str = r#"[{"id":"11111111-1111-4111-8111-111111111111","name":"A","url":"https://a.example","authUrl":"https://a.example/auth"}]"#;

    #[test]
    fn test_from_json() {
        let registry = ServerRegistry::from_json(ONE).expect("valid registry");
        assert_eq!(registry.len(), 1);

        let id = Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap();
        let server = registry.find(&id).expect("server registered");
        assert_eq!(server.name, "A");
        assert!(server.auth_required());

        let other = Uuid::parse_str("22222222-2222-4222-8222-222222222222").unwrap();
        assert!(registry.find(&other).is_none());
    }

    #[test]
    fn test_load_absent_or_empty() {
        assert!(ServerRegistry::load(None).unwrap().is_empty());
        assert!(ServerRegistry::load(Some("  ")).unwrap().is_empty());
        assert!(ServerRegistry::load(Some("[]")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ServerRegistry::load(Some("{not json")),
            Err(RegistryError::Malformed(_))
        ));
        assert!(matches!(
            ServerRegistry::load(Some(r#"{"id":"x"}"#)),
            Err(RegistryError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_record_rejects_whole_list() {
        let source = r#"[
            {"id":"11111111-1111-4111-8111-111111111111","name":"A","url":"https://a.example"},
            {"id":"nope","name":"B","url":"https://b.example"}
        ]"#;
        match ServerRegistry::from_json(source) {
            Err(RegistryError::InvalidRecord(RecordError::InvalidId { index, .. })) => {
                assert_eq!(index, 1)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids() {
        let source = r#"[
            {"id":"11111111-1111-4111-8111-111111111111","name":"A","url":"https://a.example"},
            {"id":"11111111-1111-4111-8111-111111111111","name":"B","url":"https://b.example"}
        ]"#;
        assert!(matches!(
            ServerRegistry::from_json(source),
            Err(RegistryError::InvalidRecord(RecordError::DuplicateId { index: 1, .. }))
        ));
    }
}
