//! Mapping between Terraform values and settings documents

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tfplug::types::{AttributePath, Dynamic, DynamicValue, PrivateStateData};
use tfplug::{jsontypes, TfplugError};

use super::block::{Document, SettingsBlock};
use super::domain::{Domain, DOMAIN_ORDER};
use super::error::SettingsError;

/// Private state key holding `ManagedKeys`
pub const MANAGED_KEYS: &str = "managed_keys";

/// Blocks present in configuration, still encoded
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsConfig {
    pub project_ref: String,
    pub documents: BTreeMap<Domain, String>,
}

impl SettingsConfig {
    pub fn from_dynamic(config: &DynamicValue) -> tfplug::Result<Self> {
        let project_ref = config.get_string(&AttributePath::new("project_ref"))?;

        let documents = DOMAIN_ORDER
            .iter()
            .filter_map(|domain| match config.get(&domain.path()) {
                Some(Dynamic::String(document)) => Some((*domain, document.clone())),
                _ => None,
            })
            .collect();

        Ok(Self {
            project_ref,
            documents,
        })
    }
}

/// Tracked state: one document per domain the API returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsState {
    pub project_ref: String,
    pub blocks: BTreeMap<Domain, Document>,
}

impl SettingsState {
    pub fn new(project_ref: impl Into<String>) -> Self {
        Self {
            project_ref: project_ref.into(),
            blocks: BTreeMap::new(),
        }
    }

    /// Reads prior state; blocks that are not JSON objects count as absent
    pub fn from_dynamic(state: &DynamicValue) -> tfplug::Result<Self> {
        let project_ref = state.get_string(&AttributePath::new("project_ref"))?;

        let mut blocks = BTreeMap::new();
        for domain in DOMAIN_ORDER {
            if let Some(Dynamic::String(document)) = state.get(&domain.path()) {
                if let Ok(Value::Object(document)) = jsontypes::parse(document) {
                    blocks.insert(domain, document);
                }
            }
        }

        Ok(Self {
            project_ref,
            blocks,
        })
    }

    pub fn to_dynamic(&self) -> tfplug::Result<DynamicValue> {
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new("id"), self.project_ref.clone())?;
        state.set_string(&AttributePath::new("project_ref"), self.project_ref.clone())?;

        for domain in DOMAIN_ORDER {
            match self.blocks.get(&domain) {
                Some(document) => {
                    // serde_json maps are sorted, so this is the normalized form
                    let encoded = serde_json::to_string(document).map_err(|e| {
                        TfplugError::EncodingError(format!("{} settings: {}", domain, e))
                    })?;
                    state.set_string(&domain.path(), encoded)?;
                }
                None => state.set_null(&domain.path())?,
            }
        }

        Ok(state)
    }

    /// Network restrictions as last tracked, used to keep the user's order
    pub fn restrictions(&self) -> Option<Vec<String>> {
        let list = self.blocks.get(&Domain::Network)?.get("restrictions")?.as_array()?;
        list.iter()
            .map(|entry| entry.as_str().map(str::to_string))
            .collect()
    }
}

/// Top-level keys the user configured per domain at the last apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagedKeys(BTreeMap<Domain, BTreeSet<String>>);

impl ManagedKeys {
    pub fn from_blocks(blocks: &BTreeMap<Domain, SettingsBlock>) -> Result<Self, SettingsError> {
        let mut managed = BTreeMap::new();
        for (domain, block) in blocks {
            let keys = block.to_document()?.keys().cloned().collect();
            managed.insert(*domain, keys);
        }
        Ok(Self(managed))
    }

    pub fn get(&self, domain: Domain) -> Option<&BTreeSet<String>> {
        self.0.get(&domain)
    }

    /// An unmanaged domain whose tracked document already holds every
    /// configured key with an equal value. Imported domains start out this
    /// way and stay unmanaged until their configuration diverges. Domains
    /// whose writes replace the document are never adopted from a subset:
    /// writing the block would reset the keys it leaves out.
    pub fn adopts(&self, domain: Domain, tracked: &Document, desired: &Document) -> bool {
        !domain.replaces_on_write()
            && !self.0.contains_key(&domain)
            && jsontypes::contains(
                &Value::Object(tracked.clone()),
                &Value::Object(desired.clone()),
            )
    }

    pub fn release(&mut self, domain: Domain) {
        self.0.remove(&domain);
    }

    /// Keys managed before but missing from `document`
    pub fn removed(&self, domain: Domain, document: &Document) -> Vec<String> {
        self.0
            .get(&domain)
            .map(|keys| {
                keys.iter()
                    .filter(|key| !document.contains_key(*key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn load(private: &[u8]) -> tfplug::Result<Self> {
        let data = PrivateStateData::decode(private)?;
        Ok(data.get_json(MANAGED_KEYS)?.unwrap_or_default())
    }

    pub fn store(&self) -> tfplug::Result<Vec<u8>> {
        let mut data = PrivateStateData::new();
        data.set_json(MANAGED_KEYS, self)?;
        data.encode()
    }
}

/// Restricts a remote document to `keys`
pub fn project(document: Document, keys: &BTreeSet<String>) -> Document {
    document
        .into_iter()
        .filter(|(key, _)| keys.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Document {
        match value {
            Value::Object(document) => document,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn config_collects_set_blocks_only() {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("project_ref"), "mayuaycdtijbctgqbycg".to_string())
            .unwrap();
        config
            .set_string(&AttributePath::new("auth"), r#"{"jwt_exp":1800}"#.to_string())
            .unwrap();
        config.set_null(&AttributePath::new("database")).unwrap();

        let parsed = SettingsConfig::from_dynamic(&config).unwrap();
        assert_eq!(parsed.project_ref, "mayuaycdtijbctgqbycg");
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.documents[&Domain::Auth], r#"{"jwt_exp":1800}"#);
    }

    #[test]
    fn state_round_trips_through_dynamic_value() {
        let mut state = SettingsState::new("mayuaycdtijbctgqbycg");
        state
            .blocks
            .insert(Domain::Api, object(json!({"max_rows": 1000, "db_schema": "public"})));

        let value = state.to_dynamic().unwrap();
        assert_eq!(
            value.get_string(&AttributePath::new("id")).unwrap(),
            "mayuaycdtijbctgqbycg"
        );
        assert_eq!(
            value.get_string(&AttributePath::new("api")).unwrap(),
            r#"{"db_schema":"public","max_rows":1000}"#
        );
        assert!(value.get(&AttributePath::new("auth")).unwrap().is_null());

        assert_eq!(SettingsState::from_dynamic(&value).unwrap(), state);
    }

    #[test]
    fn managed_keys_survive_private_state_encoding() {
        let mut blocks = BTreeMap::new();
        blocks.insert(
            Domain::Auth,
            SettingsBlock::decode(Domain::Auth, r#"{"site_url":"x","jwt_exp":1800}"#).unwrap(),
        );
        let managed = ManagedKeys::from_blocks(&blocks).unwrap();

        let restored = ManagedKeys::load(&managed.store().unwrap()).unwrap();
        assert_eq!(restored, managed);
        assert_eq!(
            restored.removed(Domain::Auth, &object(json!({"site_url": "x"}))),
            vec!["jwt_exp".to_string()]
        );
        assert!(restored
            .removed(Domain::Database, &object(json!({})))
            .is_empty());
    }

    #[test]
    fn only_unmanaged_domains_are_adopted() {
        let tracked = object(json!({
            "db_schema": "public,storage,graphql_public",
            "db_extra_search_path": "public,extensions",
            "max_rows": 1000
        }));
        let desired = object(json!({"max_rows": 1000}));

        let mut managed = ManagedKeys::default();
        assert!(managed.adopts(Domain::Api, &tracked, &desired));
        assert!(!managed.adopts(Domain::Api, &tracked, &object(json!({"max_rows": 100}))));

        managed
            .0
            .insert(Domain::Api, ["max_rows".to_string()].into_iter().collect());
        assert!(!managed.adopts(Domain::Api, &tracked, &desired));

        managed.release(Domain::Api);
        assert!(managed.adopts(Domain::Api, &tracked, &desired));

        let postgres = object(json!({"statement_timeout": "10s", "max_connections": 60}));
        let timeout = object(json!({"statement_timeout": "10s"}));
        assert!(!managed.adopts(Domain::Database, &postgres, &timeout));
    }

    #[test]
    fn empty_private_state_manages_nothing() {
        assert_eq!(ManagedKeys::load(&[]).unwrap(), ManagedKeys::default());
    }

    #[test]
    fn projection_keeps_only_listed_keys() {
        let keys = ["site_url".to_string()].into_iter().collect();
        let projected = project(
            object(json!({"site_url": "x", "jwt_exp": 3600})),
            &keys,
        );
        assert_eq!(Value::Object(projected), json!({"site_url": "x"}));
    }

    #[test]
    fn tracked_restrictions_are_extracted() {
        let mut state = SettingsState::new("p");
        state.blocks.insert(
            Domain::Network,
            object(json!({"restrictions": ["::/0", "0.0.0.0/0"]})),
        );
        assert_eq!(
            state.restrictions(),
            Some(vec!["::/0".to_string(), "0.0.0.0/0".to_string()])
        );
    }
}
