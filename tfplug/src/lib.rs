//! tfplug - Terraform Plugin Framework for Rust
//!
//! Provider and resource traits, schema building, value handling and an
//! in-process acceptance test harness for Terraform providers written in
//! Rust.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod jsontypes;
pub mod plan_modifier;
pub mod validator;

pub mod testing;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{Provider, ProviderMetadataRequest, ProviderMetadataResponse, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder, ValueSemantics};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue, PrivateStateData};
