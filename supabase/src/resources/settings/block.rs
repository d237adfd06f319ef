//! Typed settings blocks
//!
//! Each domain's JSON document is decoded into the matching API model (or
//! `NetworkBlock` for the user-facing network shape) before anything is sent.
//! Database, network and api accept only the fields they know; auth, pooler
//! and storage carry unknown fields through `extra`.

use crate::api::projects::settings::{
    AuthConfig, NetworkRestrictions, NetworkRestrictionsRequest, PgbouncerConfig,
    PostgresConfig, PostgrestConfig, StorageConfig,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;

use super::domain::Domain;
use super::error::SettingsError;

pub type Document = Map<String, Value>;

pub const ALLOW_ALL_V4: &str = "0.0.0.0/0";
pub const ALLOW_ALL_V6: &str = "::/0";

pub trait DomainBlock: Serialize + DeserializeOwned + Sized {
    const DOMAIN: Domain;

    /// Rejects documents that parse but do not fit the domain
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Makes the next write reset `key` to its platform default
    fn reset_field(&mut self, _key: &str) {}

    fn decode(document: &str) -> Result<Self, SettingsError> {
        let block: Self = serde_json::from_str(document)
            .map_err(|e| SettingsError::decode(Self::DOMAIN, e.to_string()))?;
        block
            .validate()
            .map_err(|message| SettingsError::decode(Self::DOMAIN, message))?;
        Ok(block)
    }

    fn to_document(&self) -> Result<Document, SettingsError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(other) => Err(SettingsError::decode(
                Self::DOMAIN,
                format!("expected a JSON object, got {}", other),
            )),
            Err(e) => Err(SettingsError::decode(Self::DOMAIN, e.to_string())),
        }
    }
}

fn reject_unknown(extra: &Document) -> Result<(), String> {
    match extra.keys().next() {
        Some(key) => Err(format!("unknown field `{}`", key)),
        None => Ok(()),
    }
}

impl DomainBlock for PostgresConfig {
    const DOMAIN: Domain = Domain::Database;

    fn validate(&self) -> Result<(), String> {
        reject_unknown(&self.extra)
    }
}

impl DomainBlock for PostgrestConfig {
    const DOMAIN: Domain = Domain::Api;

    fn validate(&self) -> Result<(), String> {
        reject_unknown(&self.extra)
    }

    fn reset_field(&mut self, key: &str) {
        match key {
            "db_schema" => self.db_schema = Some("public,graphql_public".to_string()),
            "db_extra_search_path" => {
                self.db_extra_search_path = Some("public,extensions".to_string())
            }
            "max_rows" => self.max_rows = Some(1000),
            // db_pool has no fixed default, null lets the platform size it
            other => {
                self.extra.insert(other.to_string(), Value::Null);
            }
        }
    }
}

impl DomainBlock for AuthConfig {
    const DOMAIN: Domain = Domain::Auth;

    fn reset_field(&mut self, key: &str) {
        match key {
            "site_url" => self.site_url = Some("http://localhost:3000".to_string()),
            "jwt_exp" => self.jwt_exp = Some(3600),
            "disable_signup" => self.disable_signup = Some(false),
            "uri_allow_list" => self.uri_allow_list = Some(String::new()),
            "external_email_enabled" => self.external_email_enabled = Some(true),
            "external_phone_enabled" => self.external_phone_enabled = Some(false),
            "mailer_autoconfirm" => self.mailer_autoconfirm = Some(false),
            "mailer_secure_email_change_enabled" => {
                self.mailer_secure_email_change_enabled = Some(true)
            }
            "password_min_length" => self.password_min_length = Some(6),
            "refresh_token_rotation_enabled" => self.refresh_token_rotation_enabled = Some(true),
            "security_refresh_token_reuse_interval" => {
                self.security_refresh_token_reuse_interval = Some(10)
            }
            other => {
                self.extra.insert(other.to_string(), Value::Null);
            }
        }
    }
}

impl DomainBlock for PgbouncerConfig {
    const DOMAIN: Domain = Domain::Pooler;
}

impl DomainBlock for StorageConfig {
    const DOMAIN: Domain = Domain::Storage;
}

/// Network restrictions as users write them: one list, both address families
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<String>>,
}

impl DomainBlock for NetworkBlock {
    const DOMAIN: Domain = Domain::Network;

    fn validate(&self) -> Result<(), String> {
        for cidr in self.restrictions.iter().flatten() {
            parse_cidr(cidr)?;
        }
        Ok(())
    }
}

impl NetworkBlock {
    /// Splits restrictions by address family; no list means allow all
    pub fn to_request(&self) -> Result<NetworkRestrictionsRequest, SettingsError> {
        let Some(restrictions) = &self.restrictions else {
            return Ok(NetworkRestrictionsRequest {
                db_allowed_cidrs: Some(vec![ALLOW_ALL_V4.to_string()]),
                db_allowed_cidrs_v6: Some(vec![ALLOW_ALL_V6.to_string()]),
            });
        };

        let mut v4 = vec![];
        let mut v6 = vec![];
        for cidr in restrictions {
            match parse_cidr(cidr).map_err(|e| SettingsError::decode(Domain::Network, e))? {
                IpAddr::V4(_) => v4.push(cidr.clone()),
                IpAddr::V6(_) => v6.push(cidr.clone()),
            }
        }

        Ok(NetworkRestrictionsRequest {
            db_allowed_cidrs: Some(v4),
            db_allowed_cidrs_v6: Some(v6),
        })
    }

    /// Merges the remote lists, IPv4 first, keeping `order` when it holds the
    /// same entries
    pub fn from_remote(remote: &NetworkRestrictions, order: Option<&[String]>) -> Self {
        let mut merged: Vec<String> = remote
            .config
            .db_allowed_cidrs
            .iter()
            .flatten()
            .chain(remote.config.db_allowed_cidrs_v6.iter().flatten())
            .cloned()
            .collect();

        if let Some(order) = order {
            let mut wanted = order.to_vec();
            let mut actual = merged.clone();
            wanted.sort();
            actual.sort();
            if wanted == actual {
                merged = order.to_vec();
            }
        }

        Self {
            restrictions: Some(merged),
        }
    }
}

fn parse_cidr(cidr: &str) -> Result<IpAddr, String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("`{}` is not in CIDR notation", cidr))?;
    let address: IpAddr = address
        .parse()
        .map_err(|_| format!("`{}` has an invalid address", cidr))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("`{}` has an invalid prefix length", cidr))?;

    let max = if address.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("`{}` prefix length exceeds {}", cidr, max));
    }
    Ok(address)
}

/// A decoded block of any domain
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsBlock {
    Database(PostgresConfig),
    Network(NetworkBlock),
    Api(PostgrestConfig),
    Auth(AuthConfig),
    Pooler(PgbouncerConfig),
    Storage(StorageConfig),
}

impl SettingsBlock {
    pub fn decode(domain: Domain, document: &str) -> Result<Self, SettingsError> {
        Ok(match domain {
            Domain::Database => SettingsBlock::Database(PostgresConfig::decode(document)?),
            Domain::Network => SettingsBlock::Network(NetworkBlock::decode(document)?),
            Domain::Api => SettingsBlock::Api(PostgrestConfig::decode(document)?),
            Domain::Auth => SettingsBlock::Auth(AuthConfig::decode(document)?),
            Domain::Pooler => SettingsBlock::Pooler(PgbouncerConfig::decode(document)?),
            Domain::Storage => SettingsBlock::Storage(StorageConfig::decode(document)?),
        })
    }

    pub fn domain(&self) -> Domain {
        match self {
            SettingsBlock::Database(_) => Domain::Database,
            SettingsBlock::Network(_) => Domain::Network,
            SettingsBlock::Api(_) => Domain::Api,
            SettingsBlock::Auth(_) => Domain::Auth,
            SettingsBlock::Pooler(_) => Domain::Pooler,
            SettingsBlock::Storage(_) => Domain::Storage,
        }
    }

    pub fn to_document(&self) -> Result<Document, SettingsError> {
        match self {
            SettingsBlock::Database(block) => block.to_document(),
            SettingsBlock::Network(block) => block.to_document(),
            SettingsBlock::Api(block) => block.to_document(),
            SettingsBlock::Auth(block) => block.to_document(),
            SettingsBlock::Pooler(block) => block.to_document(),
            SettingsBlock::Storage(block) => block.to_document(),
        }
    }

    pub fn reset_field(&mut self, key: &str) {
        match self {
            SettingsBlock::Database(block) => block.reset_field(key),
            SettingsBlock::Network(block) => block.reset_field(key),
            SettingsBlock::Api(block) => block.reset_field(key),
            SettingsBlock::Auth(block) => block.reset_field(key),
            SettingsBlock::Pooler(block) => block.reset_field(key),
            SettingsBlock::Storage(block) => block.reset_field(key),
        }
    }
}

/// Decodes every configured document; the first failure wins
pub fn decode_blocks(
    documents: &BTreeMap<Domain, String>,
) -> Result<BTreeMap<Domain, SettingsBlock>, SettingsError> {
    documents
        .iter()
        .map(|(domain, document)| {
            SettingsBlock::decode(*domain, document).map(|block| (*domain, block))
        })
        .collect()
}
