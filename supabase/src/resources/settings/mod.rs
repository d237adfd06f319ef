//! `supabase_settings` resource
//!
//! One resource per project holding every settings domain as a JSON encoded
//! attribute. The resource never owns the project: create and update push the
//! configured blocks, delete only forgets them.

pub mod adapter;
pub mod block;
pub mod domain;
pub mod error;
pub mod modifier;
pub mod state;

use async_trait::async_trait;
use regex::Regex;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{JsonObjectValidator, StringPatternValidator};

use crate::api::Client;
use crate::SupabaseProviderData;
use adapter::SettingsAdapter;
use block::decode_blocks;
use domain::DOMAIN_ORDER;
use error::SettingsError;
use modifier::KeepAdoptedDocument;
use state::{ManagedKeys, SettingsConfig, SettingsState};

pub const PROJECT_REF_PATTERN: &str = "^[a-z]{20}$";

#[derive(Default)]
pub struct SettingsResource {
    provider_data: Option<SupabaseProviderData>,
}

impl SettingsResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&Client, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| &data.client)
            .ok_or_else(|| {
                Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                )
            })
    }
}

fn framework_error(summary: &str, error: tfplug::TfplugError) -> Diagnostic {
    Diagnostic::error(summary, error.to_string())
}

fn encode(
    state: &SettingsState,
    managed: &ManagedKeys,
) -> Result<(DynamicValue, Vec<u8>), Diagnostic> {
    let value = state
        .to_dynamic()
        .map_err(|e| framework_error("Failed to encode state", e))?;
    let private = managed
        .store()
        .map_err(|e| framework_error("Failed to encode private state", e))?;
    Ok((value, private))
}

#[async_trait]
impl Resource for SettingsResource {
    fn type_name(&self) -> &str {
        "supabase_settings"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let mut diagnostics = vec![];

        let mut project_ref = AttributeBuilder::new("project_ref", AttributeType::String)
            .description("Reference of the project the settings belong to")
            .required()
            .plan_modifier(RequiresReplace::create());
        match Regex::new(PROJECT_REF_PATTERN) {
            Ok(pattern) => {
                project_ref = project_ref.validator(StringPatternValidator::new(
                    pattern,
                    "a 20 character lowercase project reference",
                ));
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                "Invalid schema",
                format!("project_ref pattern: {}", e),
            )),
        }

        let mut schema = SchemaBuilder::new()
            .version(0)
            .description("Manages the settings of a Supabase project")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Same as project_ref")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(project_ref.build());

        for domain in DOMAIN_ORDER {
            schema = schema.attribute(
                AttributeBuilder::new(domain.attribute(), AttributeType::String)
                    .description(domain.description())
                    .optional()
                    .computed()
                    .normalized_json()
                    .validator(JsonObjectValidator::create())
                    .plan_modifier(KeepAdoptedDocument::create(domain))
                    .build(),
            );
        }

        ResourceSchemaResponse {
            schema: schema.build(),
            diagnostics,
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        // Unknown project_ref is fine at validation time
        let Ok(config) = SettingsConfig::from_dynamic(&request.config) else {
            return ValidateResourceConfigResponse { diagnostics };
        };

        for (domain, document) in &config.documents {
            if let Err(e) = block::SettingsBlock::decode(*domain, document) {
                diagnostics.push(e.to_diagnostic());
                continue;
            }
            if domain.is_read_only() {
                diagnostics.push(
                    Diagnostic::warning(
                        format!("{} settings are read-only", domain),
                        format!(
                            "The {} block is tracked but never written; changes must be made outside Terraform",
                            domain
                        ),
                    )
                    .with_attribute(domain.path()),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let config = match SettingsConfig::from_dynamic(&request.config) {
            Ok(config) => config,
            Err(e) => {
                diagnostics.push(framework_error("Invalid configuration", e));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let outcome = async {
            let desired = decode_blocks(&config.documents)?;
            let adapter = SettingsAdapter::new(client, &config.project_ref, &ctx);
            let state = adapter.create(&desired).await?;
            Ok::<_, SettingsError>((state, ManagedKeys::from_blocks(&desired)?))
        }
        .await;

        let encoded = outcome
            .map_err(|e| e.to_diagnostic())
            .and_then(|(state, managed)| encode(&state, &managed));
        match encoded {
            Ok((new_state, private)) => {
                tracing::info!("Created settings for project {}", config.project_ref);
                CreateResourceResponse {
                    new_state,
                    private,
                    diagnostics,
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let prior = match SettingsState::from_dynamic(&request.current_state) {
            Ok(prior) => prior,
            Err(_) => {
                // Without a project_ref there is nothing to read back
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: vec![],
                };
            }
        };

        let managed = match ManagedKeys::load(&request.private) {
            Ok(managed) => managed,
            Err(e) => {
                tracing::warn!("Ignoring unreadable private state: {}", e);
                ManagedKeys::default()
            }
        };

        let adapter = SettingsAdapter::new(client, &prior.project_ref, &ctx);
        match adapter.read(&prior, &managed).await {
            Ok(state) => match encode(&state, &managed) {
                Ok((new_state, private)) => ReadResourceResponse {
                    new_state: Some(new_state),
                    diagnostics,
                    private,
                },
                Err(diag) => {
                    diagnostics.push(diag);
                    ReadResourceResponse {
                        new_state: Some(request.current_state),
                        diagnostics,
                        private: request.private,
                    }
                }
            },
            Err(SettingsError::ResourceNotFound(project_ref)) => {
                tracing::info!("Project {} is gone, removing settings from state", project_ref);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: vec![],
                }
            }
            Err(e) => {
                diagnostics.push(e.to_diagnostic());
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: request.planned_private,
                    diagnostics,
                };
            }
        };

        let parsed = SettingsConfig::from_dynamic(&request.config)
            .and_then(|config| Ok((config, SettingsState::from_dynamic(&request.prior_state)?)));
        let (config, prior) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                diagnostics.push(framework_error("Invalid configuration", e));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: request.planned_private,
                    diagnostics,
                };
            }
        };

        let managed = ManagedKeys::load(&request.planned_private).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable private state: {}", e);
            ManagedKeys::default()
        });

        let outcome = async {
            let desired = decode_blocks(&config.documents)?;
            let adapter = SettingsAdapter::new(client, &config.project_ref, &ctx);
            adapter.update(&prior, &desired, &managed).await
        }
        .await;

        let encoded = outcome
            .map_err(|e| e.to_diagnostic())
            .and_then(|(state, managed)| encode(&state, &managed));
        match encoded {
            Ok((new_state, private)) => {
                tracing::info!("Updated settings for project {}", config.project_ref);
                UpdateResourceResponse {
                    new_state,
                    private,
                    diagnostics,
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: request.planned_private,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        // Settings cannot be deleted, only forgotten
        let project_ref = request
            .prior_state
            .get_string(&AttributePath::new("project_ref"))
            .unwrap_or_default();
        tracing::info!(
            "Removing settings for project {} from state, remote settings are left as they are",
            project_ref
        );

        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }

    fn as_import(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for SettingsResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            match data.downcast_ref::<SupabaseProviderData>() {
                Some(provider_data) => self.provider_data = Some(provider_data.clone()),
                None => diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Expected SupabaseProviderData",
                )),
            }
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for SettingsResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
        };
        import_state_passthrough_id(&ctx, AttributePath::new("project_ref"), &request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTransport;
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const REF: &str = "mayuaycdtijbctgqbycg";

    fn configured(mock: Arc<MockTransport>) -> SettingsResource {
        SettingsResource {
            provider_data: Some(SupabaseProviderData::new(Client::with_transport(mock))),
        }
    }

    fn config(blocks: &[(&str, &str)]) -> DynamicValue {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("project_ref"), REF.to_string())
            .unwrap();
        for (name, document) in blocks {
            config
                .set_string(&AttributePath::new(name), document.to_string())
                .unwrap();
        }
        config
    }

    async fn validate(config: DynamicValue) -> Vec<Diagnostic> {
        SettingsResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: "supabase_settings".to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
            .diagnostics
    }

    #[tokio::test]
    async fn schema_declares_every_domain() {
        let response = SettingsResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await;
        assert!(response.diagnostics.is_empty());

        let schema = response.schema;
        assert!(schema.attribute("id").unwrap().computed);
        assert!(schema.attribute("project_ref").unwrap().required);
        for domain in DOMAIN_ORDER {
            let attr = schema.attribute(domain.attribute()).unwrap();
            assert!(attr.optional && attr.computed);
        }
    }

    #[tokio::test]
    async fn validate_reports_undecodable_blocks() {
        let diagnostics = validate(config(&[("database", r#"{"max_connections": "many"}"#)])).await;
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].attribute, Some(AttributePath::new("database")));
    }

    #[tokio::test]
    async fn validate_warns_about_read_only_blocks() {
        let diagnostics = validate(config(&[("pooler", r#"{"default_pool_size": 20}"#)])).await;
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[tokio::test]
    async fn create_without_provider_data_fails() {
        let response = SettingsResource::new()
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "supabase_settings".to_string(),
                    planned_state: config(&[]),
                    config: config(&[]),
                    planned_private: vec![],
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn delete_makes_no_requests() {
        let mock = Arc::new(MockTransport::new());
        let resource = configured(mock.clone());

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "supabase_settings".to_string(),
                    prior_state: config(&[("auth", r#"{"jwt_exp":1800}"#)]),
                    planned_private: vec![],
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn read_drops_state_when_project_is_gone() {
        let mock = Arc::new(MockTransport::new());
        let resource = configured(mock);

        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "supabase_settings".to_string(),
                    current_state: config(&[]),
                    private: vec![],
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn import_sets_project_ref_only() {
        let response = SettingsResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "supabase_settings".to_string(),
                    id: REF.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("project_ref")).unwrap(), REF);
        assert!(state.get(&AttributePath::new("auth")).is_none());
    }
}
