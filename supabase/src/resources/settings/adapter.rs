//! Composite settings adapter
//!
//! Splits one settings resource into per-domain API calls and folds the
//! responses back into a single tracked state. Domains are always visited in
//! `DOMAIN_ORDER`, one call at a time:
//!
//! - create writes every configured block, then reads every domain
//! - update writes only the blocks that differ from tracked state, adding
//!   resets for keys the user stopped managing, then reads every domain.
//!   Imported blocks the configuration agrees with stay unmanaged.
//! - read reads every domain
//!
//! Writes are never rolled back: the first failure aborts the sequence and
//! earlier domains stay applied.

use crate::api::projects::settings::SettingsApi;
use crate::api::{ApiError, Client};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tfplug::context::Context;
use tfplug::jsontypes;

use super::block::{Document, NetworkBlock, SettingsBlock};
use super::domain::{Domain, DOMAIN_ORDER};
use super::error::SettingsError;
use super::state::{project, ManagedKeys, SettingsState};

pub struct SettingsAdapter<'a> {
    client: &'a Client,
    settings: SettingsApi<'a>,
    project_ref: &'a str,
    ctx: &'a Context,
}

impl<'a> SettingsAdapter<'a> {
    pub fn new(client: &'a Client, project_ref: &'a str, ctx: &'a Context) -> Self {
        Self {
            client,
            settings: client.projects().settings(project_ref),
            project_ref,
            ctx,
        }
    }

    pub async fn create(
        &self,
        desired: &BTreeMap<Domain, SettingsBlock>,
    ) -> Result<SettingsState, SettingsError> {
        tracing::info!("Creating settings for project {}", self.project_ref);

        for domain in DOMAIN_ORDER {
            if let Some(block) = desired.get(&domain) {
                self.check_cancelled(domain)?;
                self.write(block).await?;
            }
        }

        let managed = ManagedKeys::from_blocks(desired)?;
        self.refresh(&managed, configured_restrictions(desired)).await
    }

    pub async fn read(
        &self,
        prior: &SettingsState,
        managed: &ManagedKeys,
    ) -> Result<SettingsState, SettingsError> {
        tracing::debug!("Reading settings for project {}", self.project_ref);
        self.refresh(managed, prior.restrictions()).await
    }

    pub async fn update(
        &self,
        prior: &SettingsState,
        desired: &BTreeMap<Domain, SettingsBlock>,
        managed: &ManagedKeys,
    ) -> Result<(SettingsState, ManagedKeys), SettingsError> {
        tracing::info!("Updating settings for project {}", self.project_ref);

        let mut next = ManagedKeys::from_blocks(desired)?;
        for domain in DOMAIN_ORDER {
            let Some(block) = desired.get(&domain) else {
                continue;
            };
            self.check_cancelled(domain)?;

            let document = block.to_document()?;
            let tracked = prior.blocks.get(&domain);
            if tracked.is_some_and(|tracked| managed.adopts(domain, tracked, &document)) {
                tracing::debug!("{} settings match the imported document, skipping write", domain);
                next.release(domain);
                continue;
            }

            let unchanged = tracked.is_some_and(|tracked| {
                jsontypes::semantically_equal(
                    &Value::Object(tracked.clone()),
                    &Value::Object(document.clone()),
                )
            });
            if unchanged {
                tracing::debug!("{} settings unchanged, skipping write", domain);
                continue;
            }

            let mut block = block.clone();
            for key in managed.removed(domain, &document) {
                tracing::debug!("Resetting {}.{} to its default", domain, key);
                block.reset_field(&key);
            }
            self.write(&block).await?;
        }

        let state = self.refresh(&next, configured_restrictions(desired)).await?;
        Ok((state, next))
    }

    fn check_cancelled(&self, domain: Domain) -> Result<(), SettingsError> {
        if self.ctx.is_cancelled() {
            tracing::warn!("Cancelled before {} settings", domain);
            return Err(SettingsError::Cancelled(domain));
        }
        Ok(())
    }

    async fn write(&self, block: &SettingsBlock) -> Result<(), SettingsError> {
        let domain = block.domain();
        let Some((method, path)) = domain.write() else {
            tracing::debug!("{} settings are read-only, not writing", domain);
            return Ok(());
        };
        tracing::info!(
            "Writing {} settings for project {}: {} {}",
            domain,
            self.project_ref,
            method,
            path
        );

        let result = match block {
            SettingsBlock::Database(config) => self.settings.update_postgres(config).await,
            SettingsBlock::Network(network) => {
                let request = network.to_request()?;
                self.settings.apply_network_restrictions(&request).await
            }
            SettingsBlock::Api(config) => self.settings.update_postgrest(config).await,
            SettingsBlock::Auth(config) => self.settings.update_auth(config).await,
            SettingsBlock::Pooler(_) | SettingsBlock::Storage(_) => Ok(()),
        };

        result.map_err(|e| SettingsError::from_write(domain, e))
    }

    /// Reads every domain; managed domains are projected onto their keys
    async fn refresh(
        &self,
        managed: &ManagedKeys,
        restrictions: Option<Vec<String>>,
    ) -> Result<SettingsState, SettingsError> {
        let mut state = SettingsState::new(self.project_ref);

        for domain in DOMAIN_ORDER {
            self.check_cancelled(domain)?;

            match self.read_domain(domain, restrictions.as_deref()).await {
                Ok(document) => {
                    let document = match managed.get(domain) {
                        Some(keys) => project(document, keys),
                        None => document,
                    };
                    state.blocks.insert(domain, document);
                }
                Err(e) if e.is_not_found() => {
                    self.ensure_project_exists(domain).await?;
                    tracing::info!(
                        "{} settings not found for project {}, clearing block",
                        domain,
                        self.project_ref
                    );
                }
                Err(e) => return Err(SettingsError::from_read(domain, e)),
            }
        }

        Ok(state)
    }

    async fn read_domain(
        &self,
        domain: Domain,
        restrictions: Option<&[String]>,
    ) -> Result<Document, ApiError> {
        tracing::debug!("Reading {} settings: GET {}", domain, domain.read_path());

        match domain {
            Domain::Database => to_document(&self.settings.postgres().await?),
            Domain::Network => {
                let remote = self.settings.network_restrictions().await?;
                to_document(&NetworkBlock::from_remote(&remote, restrictions))
            }
            Domain::Api => to_document(&self.settings.postgrest().await?),
            Domain::Auth => to_document(&self.settings.auth().await?),
            Domain::Pooler => to_document(&self.settings.pgbouncer().await?),
            Domain::Storage => to_document(&self.settings.storage().await?),
        }
    }

    /// A domain 404 only means "absent" while the project itself exists
    async fn ensure_project_exists(&self, domain: Domain) -> Result<(), SettingsError> {
        match self.client.projects().get(self.project_ref).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Project {} no longer exists", self.project_ref);
                Err(SettingsError::ResourceNotFound(self.project_ref.to_string()))
            }
            Err(e) => Err(SettingsError::from_read(domain, e)),
        }
    }
}

fn configured_restrictions(desired: &BTreeMap<Domain, SettingsBlock>) -> Option<Vec<String>> {
    match desired.get(&Domain::Network) {
        Some(SettingsBlock::Network(network)) => network.restrictions.clone(),
        _ => None,
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, ApiError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(ApiError::ParseError(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(ApiError::ParseError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTransport;
    use crate::api::Method;
    use serde_json::json;
    use std::sync::Arc;

    const REF: &str = "mayuaycdtijbctgqbycg";

    fn path(suffix: &str) -> String {
        format!("/v1/projects/{}{}", REF, suffix)
    }

    fn seeded() -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new()
                .with_document(&path(""), json!({"id": REF, "name": "production"}))
                .with_document(
                    &path("/config/database/postgres"),
                    json!({"statement_timeout": "10s", "max_connections": 60}),
                )
                .with_document(
                    &path("/network-restrictions"),
                    json!({"config": {"db_allowed_cidrs": ["0.0.0.0/0"], "db_allowed_cidrs_v6": ["::/0"]}}),
                )
                .with_document(
                    &path("/postgrest"),
                    json!({"db_schema": "public", "db_extra_search_path": "public,extensions", "max_rows": 1000}),
                )
                .with_document(
                    &path("/config/auth"),
                    json!({"site_url": "http://localhost:3000", "jwt_exp": 3600}),
                )
                .with_document(
                    &path("/config/database/pgbouncer"),
                    json!({"default_pool_size": 15, "pool_mode": "transaction"}),
                )
                .with_document(&path("/config/storage"), json!({"file_size_limit": 52428800})),
        )
    }

    fn desired(blocks: &[(Domain, Value)]) -> BTreeMap<Domain, SettingsBlock> {
        blocks
            .iter()
            .map(|(domain, document)| {
                (
                    *domain,
                    SettingsBlock::decode(*domain, &document.to_string()).unwrap(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn create_writes_in_domain_order_then_reads_everything() {
        let mock = seeded();
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let state = adapter
            .create(&desired(&[
                (Domain::Auth, json!({"jwt_exp": 1800})),
                (Domain::Database, json!({"statement_timeout": "20s"})),
            ]))
            .await
            .unwrap();

        let calls: Vec<_> = mock
            .calls()
            .into_iter()
            .map(|c| format!("{} {}", c.method, c.path.trim_start_matches(&path(""))))
            .collect();
        assert_eq!(
            calls,
            vec![
                "PUT /config/database/postgres",
                "PATCH /config/auth",
                "GET /config/database/postgres",
                "GET /network-restrictions",
                "GET /postgrest",
                "GET /config/auth",
                "GET /config/database/pgbouncer",
                "GET /config/storage",
            ]
        );

        assert_eq!(
            Value::Object(state.blocks[&Domain::Auth].clone()),
            json!({"jwt_exp": 1800})
        );
        assert_eq!(
            Value::Object(state.blocks[&Domain::Database].clone()),
            json!({"statement_timeout": "20s"})
        );
        // unconfigured domains are tracked in full
        assert_eq!(
            Value::Object(state.blocks[&Domain::Network].clone()),
            json!({"restrictions": ["0.0.0.0/0", "::/0"]})
        );
    }

    #[tokio::test]
    async fn update_skips_unchanged_blocks_and_resets_removed_keys() {
        let mock = seeded();
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let first = desired(&[
            (Domain::Database, json!({"statement_timeout": "10s"})),
            (Domain::Auth, json!({"site_url": "http://localhost:3000", "jwt_exp": 1800})),
        ]);
        let prior = adapter.create(&first).await.unwrap();
        let managed = ManagedKeys::from_blocks(&first).unwrap();
        mock.clear_calls();

        let second = desired(&[
            (Domain::Database, json!({"statement_timeout": "10s"})),
            (Domain::Auth, json!({"site_url": "http://localhost:3000"})),
        ]);
        adapter.update(&prior, &second, &managed).await.unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Patch);
        assert_eq!(
            writes[0].body,
            Some(json!({"site_url": "http://localhost:3000", "jwt_exp": 3600}))
        );
    }

    #[tokio::test]
    async fn update_after_import_leaves_matching_blocks_unmanaged() {
        let mock = seeded();
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let imported = adapter
            .read(&SettingsState::new(REF), &ManagedKeys::default())
            .await
            .unwrap();
        mock.clear_calls();

        let (state, managed) = adapter
            .update(
                &imported,
                &desired(&[
                    (Domain::Database, json!({"statement_timeout": "20s"})),
                    (Domain::Api, json!({"max_rows": 1000})),
                ]),
                &ManagedKeys::default(),
            )
            .await
            .unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].method, Method::Put);
        assert!(managed.get(Domain::Database).is_some());
        assert!(managed.get(Domain::Api).is_none());
        assert_eq!(state.blocks[&Domain::Api], imported.blocks[&Domain::Api]);
        assert_eq!(
            Value::Object(state.blocks[&Domain::Database].clone()),
            json!({"statement_timeout": "20s"})
        );
    }

    #[tokio::test]
    async fn write_failure_aborts_remaining_domains() {
        let mock = seeded();
        mock.respond(
            Method::Post,
            &path("/network-restrictions/apply"),
            400,
            json!({"message": "invalid cidr"}),
        );
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let err = adapter
            .create(&desired(&[
                (Domain::Database, json!({"statement_timeout": "20s"})),
                (Domain::Network, json!({"restrictions": ["10.0.0.0/8"]})),
                (Domain::Api, json!({"max_rows": 10})),
            ]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::RemoteWrite { domain: Domain::Network, status: 400, .. }
        ));
        // database stays applied, api is never attempted
        assert_eq!(mock.writes().len(), 2);
        assert_eq!(
            mock.document(&path("/config/database/postgres")),
            Some(json!({"statement_timeout": "20s"}))
        );
    }

    #[tokio::test]
    async fn missing_domain_is_cleared_while_project_exists() {
        let mock = seeded();
        mock.remove_document(&path("/config/storage"));
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let state = adapter
            .read(&SettingsState::new(REF), &ManagedKeys::default())
            .await
            .unwrap();

        assert!(!state.blocks.contains_key(&Domain::Storage));
        assert!(state.blocks.contains_key(&Domain::Pooler));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let mock = Arc::new(MockTransport::new());
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let err = adapter
            .read(&SettingsState::new(REF), &ManagedKeys::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SettingsError::ResourceNotFound(ref r) if r == REF));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn other_read_failures_are_reported() {
        let mock = seeded();
        mock.respond(Method::Get, &path("/postgrest"), 503, json!({"message": "unavailable"}));
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let err = adapter
            .read(&SettingsState::new(REF), &ManagedKeys::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::RemoteRead { domain: Domain::Api, status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_context_stops_before_any_call() {
        let mock = seeded();
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        ctx.cancel();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let err = adapter
            .create(&desired(&[(Domain::Database, json!({"statement_timeout": "20s"}))]))
            .await
            .unwrap_err();

        assert!(matches!(err, SettingsError::Cancelled(Domain::Database)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn read_keeps_tracked_restriction_order() {
        let mock = seeded();
        let client = Client::with_transport(mock.clone());
        let ctx = Context::new();
        let adapter = SettingsAdapter::new(&client, REF, &ctx);

        let mut prior = SettingsState::new(REF);
        prior.blocks.insert(
            Domain::Network,
            match json!({"restrictions": ["::/0", "0.0.0.0/0"]}) {
                Value::Object(document) => document,
                _ => unreachable!(),
            },
        );

        let state = adapter.read(&prior, &ManagedKeys::default()).await.unwrap();
        assert_eq!(
            state.restrictions(),
            Some(vec!["::/0".to_string(), "0.0.0.0/0".to_string()])
        );
    }
}
