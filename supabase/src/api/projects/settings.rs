//! Project configuration endpoints
//!
//! Every model keeps fields it does not know about in `extra`, so a GET
//! followed by serialization reproduces the document the API sent.

use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const POSTGRES_PATH: &str = "/config/database/postgres";
pub const NETWORK_RESTRICTIONS_PATH: &str = "/network-restrictions";
pub const NETWORK_RESTRICTIONS_APPLY_PATH: &str = "/network-restrictions/apply";
pub const POSTGREST_PATH: &str = "/postgrest";
pub const AUTH_PATH: &str = "/config/auth";
pub const PGBOUNCER_PATH: &str = "/config/database/pgbouncer";
pub const STORAGE_PATH: &str = "/config/storage";

/// Postgres parameters, `PUT` replaces the whole set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_cache_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_work_mem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_locks_per_transaction: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_maintenance_workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_workers_per_gather: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_standby_archive_delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_standby_streaming_delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wal_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_worker_processes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_replication_role: Option<SessionReplicationRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_buffers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_commit_timestamp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wal_keep_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_mem: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Values the API does not document yet are kept as sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionReplicationRole {
    Origin,
    Replica,
    Local,
    #[serde(untagged)]
    Other(String),
}

/// `GET /network-restrictions` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRestrictions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlement: Option<String>,
    #[serde(default)]
    pub config: NetworkRestrictionsRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Allowed CIDRs, split by address family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRestrictionsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_allowed_cidrs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_allowed_cidrs_v6: Option<Vec<String>>,
}

/// PostgREST settings, `PATCH` merges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostgrestConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_extra_search_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_pool: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Auth (GoTrue) settings, `PATCH` merges
///
/// Only commonly managed fields are typed; the API exposes many more and
/// those travel through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_exp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_signup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_allow_list: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_email_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_phone_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailer_autoconfirm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailer_secure_email_change_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_rotation_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_refresh_token_reuse_interval: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Connection pooler settings, read-only here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PgbouncerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_startup_parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_client_conn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_mode: Option<PoolMode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Transaction,
    Session,
    Statement,
    #[serde(untagged)]
    Other(String),
}

/// Storage settings, read-only here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bytes, or a size such as `"50MB"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_limit: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings API for a single project
pub struct SettingsApi<'a> {
    client: &'a Client,
    base_path: String,
}

impl<'a> SettingsApi<'a> {
    pub fn new(client: &'a Client, base_path: String) -> Self {
        Self { client, base_path }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.base_path, suffix)
    }

    pub async fn postgres(&self) -> Result<PostgresConfig, ApiError> {
        self.client.get(&self.path(POSTGRES_PATH)).await
    }

    pub async fn update_postgres(&self, config: &PostgresConfig) -> Result<(), ApiError> {
        self.client
            .put::<Value, _>(&self.path(POSTGRES_PATH), config)
            .await
            .map(|_| ())
    }

    pub async fn network_restrictions(&self) -> Result<NetworkRestrictions, ApiError> {
        self.client.get(&self.path(NETWORK_RESTRICTIONS_PATH)).await
    }

    pub async fn apply_network_restrictions(
        &self,
        request: &NetworkRestrictionsRequest,
    ) -> Result<(), ApiError> {
        self.client
            .post::<Value, _>(&self.path(NETWORK_RESTRICTIONS_APPLY_PATH), request)
            .await
            .map(|_| ())
    }

    pub async fn postgrest(&self) -> Result<PostgrestConfig, ApiError> {
        self.client.get(&self.path(POSTGREST_PATH)).await
    }

    pub async fn update_postgrest(&self, config: &PostgrestConfig) -> Result<(), ApiError> {
        self.client
            .patch::<Value, _>(&self.path(POSTGREST_PATH), config)
            .await
            .map(|_| ())
    }

    pub async fn auth(&self) -> Result<AuthConfig, ApiError> {
        self.client.get(&self.path(AUTH_PATH)).await
    }

    pub async fn update_auth(&self, config: &AuthConfig) -> Result<(), ApiError> {
        self.client
            .patch::<Value, _>(&self.path(AUTH_PATH), config)
            .await
            .map(|_| ())
    }

    pub async fn pgbouncer(&self) -> Result<PgbouncerConfig, ApiError> {
        self.client.get(&self.path(PGBOUNCER_PATH)).await
    }

    pub async fn storage(&self) -> Result<StorageConfig, ApiError> {
        self.client.get(&self.path(STORAGE_PATH)).await
    }
}
