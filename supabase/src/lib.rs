//! Terraform provider for Supabase project settings
//!
//! Exposes a single resource, `supabase_settings`, backed by the Supabase
//! Management API.

pub mod api;
pub mod provider_data;
pub mod resources;

pub use provider_data::SupabaseProviderData;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderMetadataRequest,
    ProviderMetadataResponse, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
    ValidateProviderConfigRequest, ValidateProviderConfigResponse,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue, ServerCapabilities};

pub const ENDPOINT_ENV: &str = "SUPABASE_API_ENDPOINT";
pub const ACCESS_TOKEN_ENV: &str = "SUPABASE_ACCESS_TOKEN";

pub struct SupabaseProvider {
    // Replaces HTTP when set, so tests can run against an in-memory API
    transport: Option<Arc<dyn api::Transport>>,
    provider_data: Option<SupabaseProviderData>,
}

impl Default for SupabaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SupabaseProvider {
    pub fn new() -> Self {
        Self {
            transport: None,
            provider_data: None,
        }
    }

    pub fn with_transport(transport: Arc<dyn api::Transport>) -> Self {
        Self {
            transport: Some(transport),
            provider_data: None,
        }
    }

    fn client(&self, config: &api::ClientConfig) -> Result<api::Client, api::ApiError> {
        match &self.transport {
            Some(transport) => Ok(api::Client::with_transport(transport.clone())),
            None => api::Client::new(config),
        }
    }
}

/// Configured value, then the environment variable
fn setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(name))
        .ok()
        .flatten()
        .filter(|value| !value.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|value| !value.is_empty()))
}

#[async_trait]
impl Provider for SupabaseProvider {
    fn type_name(&self) -> &str {
        "supabase"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
            server_capabilities: ServerCapabilities::default(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages Supabase project settings through the Management API")
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description(
                        "Management API endpoint, defaults to SUPABASE_API_ENDPOINT or https://api.supabase.com",
                    )
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_token", AttributeType::String)
                    .description("Personal access token, defaults to SUPABASE_ACCESS_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = vec![];

        let endpoint = setting(&request.config, "endpoint", ENDPOINT_ENV)
            .unwrap_or_else(|| api::DEFAULT_ENDPOINT.to_string());
        let access_token = setting(&request.config, "access_token", ACCESS_TOKEN_ENV);

        let Some(access_token) = access_token else {
            diagnostics.push(
                Diagnostic::error(
                    "Missing access token",
                    format!(
                        "access_token is required (set in provider config or {} env var)",
                        ACCESS_TOKEN_ENV
                    ),
                )
                .with_attribute(AttributePath::new("access_token")),
            );
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        };

        tracing::debug!("Configuring Supabase client for {}", endpoint);
        let config = api::ClientConfig::new(endpoint, access_token);
        match self.client(&config) {
            Ok(client) => {
                let data = SupabaseProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(data) as Arc<dyn Any + Send + Sync>),
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = vec![];

        if let Some(Dynamic::String(endpoint)) = request.config.get(&AttributePath::new("endpoint"))
        {
            if let Err(e) = url::Url::parse(endpoint) {
                diagnostics.push(
                    Diagnostic::error("Invalid endpoint", format!("'{}': {}", endpoint, e))
                        .with_attribute(AttributePath::new("endpoint")),
                );
            }
        }

        ValidateProviderConfigResponse { diagnostics }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "supabase_settings".to_string(),
            Box::new(|| {
                Box::new(resources::SettingsResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        resources
    }
}
