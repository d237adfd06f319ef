//! Settings domains and their dispatch table

use crate::api::projects::settings::{
    AUTH_PATH, NETWORK_RESTRICTIONS_APPLY_PATH, NETWORK_RESTRICTIONS_PATH, PGBOUNCER_PATH,
    POSTGREST_PATH, POSTGRES_PATH, STORAGE_PATH,
};
use crate::api::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tfplug::types::AttributePath;

/// One independently addressable configuration area of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Database,
    Network,
    Api,
    Auth,
    Pooler,
    Storage,
}

/// Order in which domains are written and read
pub const DOMAIN_ORDER: [Domain; 6] = [
    Domain::Database,
    Domain::Network,
    Domain::Api,
    Domain::Auth,
    Domain::Pooler,
    Domain::Storage,
];

impl Domain {
    /// Attribute holding the domain's block
    pub fn attribute(self) -> &'static str {
        match self {
            Domain::Database => "database",
            Domain::Network => "network",
            Domain::Api => "api",
            Domain::Auth => "auth",
            Domain::Pooler => "pooler",
            Domain::Storage => "storage",
        }
    }

    pub fn path(self) -> AttributePath {
        AttributePath::new(self.attribute())
    }

    /// Path below `/v1/projects/{ref}` the block is read from
    pub fn read_path(self) -> &'static str {
        match self {
            Domain::Database => POSTGRES_PATH,
            Domain::Network => NETWORK_RESTRICTIONS_PATH,
            Domain::Api => POSTGREST_PATH,
            Domain::Auth => AUTH_PATH,
            Domain::Pooler => PGBOUNCER_PATH,
            Domain::Storage => STORAGE_PATH,
        }
    }

    /// Verb and path used to write the block, `None` for read-only domains
    pub fn write(self) -> Option<(Method, &'static str)> {
        match self {
            Domain::Database => Some((Method::Put, POSTGRES_PATH)),
            Domain::Network => Some((Method::Post, NETWORK_RESTRICTIONS_APPLY_PATH)),
            Domain::Api => Some((Method::Patch, POSTGREST_PATH)),
            Domain::Auth => Some((Method::Patch, AUTH_PATH)),
            Domain::Pooler | Domain::Storage => None,
        }
    }

    pub fn is_read_only(self) -> bool {
        self.write().is_none()
    }

    /// Writes replace the whole document, so keys left out are reset
    pub fn replaces_on_write(self) -> bool {
        matches!(self.write(), Some((Method::Put | Method::Post, _)))
    }

    pub fn description(self) -> &'static str {
        match self {
            Domain::Database => "Postgres configuration as a JSON encoded object",
            Domain::Network => {
                "Network restrictions as a JSON encoded object: {\"restrictions\": [<cidr>, ...]}"
            }
            Domain::Api => "PostgREST configuration as a JSON encoded object",
            Domain::Auth => "Auth configuration as a JSON encoded object",
            Domain::Pooler => "Connection pooler configuration as a JSON encoded object (read-only)",
            Domain::Storage => "Storage configuration as a JSON encoded object (read-only)",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}
