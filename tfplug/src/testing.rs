//! In-process acceptance testing for providers
//!
//! `Harness` plays the part of Terraform core for a single resource: it
//! validates configuration against the schema, plans, applies, refreshes,
//! imports and destroys, persisting state as msgpack between operations the
//! way the real host does. `TestCase` strings harness operations together
//! into steps, mirroring terraform-plugin-testing's `resource.Test`:
//!
//! - an apply step plans and applies a configuration, then requires the
//!   follow-up plan to be empty
//! - an import step imports by ID and can verify the imported state matches
//!   the current one
//! - once all steps pass the resource is destroyed

use crate::context::Context;
use crate::error::TfplugError;
use crate::jsontypes;
use crate::provider::{ConfigureProviderRequest, Provider, ValidateProviderConfigRequest};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{Attribute, PlanModifierRequest, Schema, ValidatorRequest};
use crate::types::{
    has_errors, AttributePath, ClientCapabilities, Diagnostic, Dynamic, DynamicValue,
};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("{operation} returned errors: {}", join(.diagnostics))]
    Diagnostics {
        operation: &'static str,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("resource does not support import")]
    ImportNotSupported,

    #[error("no resource in state")]
    NoState,

    #[error("provider produced inconsistent result for {attribute}: planned {planned}, got {actual}")]
    Inconsistent {
        attribute: String,
        planned: String,
        actual: String,
    },

    #[error("after applying this step the plan was not empty, changed: {}", .0.join(", "))]
    NonEmptyPlan(Vec<String>),

    #[error("imported state differs for {attribute}: expected {expected}, got {actual}")]
    ImportMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("check failed: {0}")]
    Check(String),

    #[error(transparent)]
    Framework(#[from] TfplugError),
}

fn join(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// What applying a plan will do to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    NoOp,
    Create,
    Update,
    Replace,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub action: PlanAction,
    pub planned_state: DynamicValue,
    /// Attributes whose planned value differs from prior state
    pub changed: Vec<String>,
    pub requires_replace: Vec<AttributePath>,
}

/// Drives a single resource instance through its lifecycle
pub struct Harness {
    resource_type: String,
    resource: Box<dyn ResourceWithConfigure>,
    schema: Schema,
    // msgpack-encoded, as Terraform stores them
    state: Vec<u8>,
    private: Vec<u8>,
}

impl Harness {
    /// Configures the provider and instantiates `resource_type` from its
    /// factory
    pub async fn new<P: Provider>(
        provider: &mut P,
        provider_config: DynamicValue,
        resource_type: &str,
    ) -> Result<Self, TestError> {
        let validated = provider
            .validate(
                Context::new(),
                ValidateProviderConfigRequest {
                    config: provider_config.clone(),
                },
            )
            .await;
        ensure_ok("ValidateProviderConfig", validated.diagnostics)?;

        let configured = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config: provider_config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        ensure_ok("ConfigureProvider", configured.diagnostics)?;

        let factories = provider.resources();
        let factory = factories
            .get(resource_type)
            .ok_or_else(|| TestError::UnknownResource(resource_type.to_string()))?;

        Self::from_factory(resource_type, factory(), configured.provider_data).await
    }

    async fn from_factory(
        resource_type: &str,
        mut resource: Box<dyn ResourceWithConfigure>,
        provider_data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Self, TestError> {
        let configured = resource
            .configure(Context::new(), ConfigureResourceRequest { provider_data })
            .await;
        ensure_ok("ConfigureResource", configured.diagnostics)?;

        let schema = resource
            .schema(Context::new(), ResourceSchemaRequest)
            .await;
        ensure_ok("GetResourceSchema", schema.diagnostics)?;

        Ok(Self {
            resource_type: resource_type.to_string(),
            resource,
            schema: schema.schema,
            state: Vec::new(),
            private: Vec::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current state, `None` when nothing is tracked
    pub fn state(&self) -> Result<Option<DynamicValue>, TestError> {
        let state = DynamicValue::decode_msgpack(&self.state)?;
        Ok((!state.is_null()).then_some(state))
    }

    pub fn private(&self) -> &[u8] {
        &self.private
    }

    fn store(&mut self, state: Option<&DynamicValue>, private: Vec<u8>) -> Result<(), TestError> {
        match state {
            Some(state) => {
                self.state = state.encode_msgpack()?;
                self.private = private;
            }
            None => {
                self.state.clear();
                self.private.clear();
            }
        }
        Ok(())
    }

    /// Checks configuration against the schema and the resource's own
    /// validation
    pub async fn validate(&self, config: &DynamicValue) -> Result<(), TestError> {
        let mut diagnostics = vec![];

        if let Dynamic::Map(values) = &config.value {
            for name in values.keys() {
                if self.schema.attribute(name).is_none() {
                    diagnostics.push(
                        Diagnostic::error(
                            "Unsupported argument",
                            format!("An argument named '{}' is not expected here", name),
                        )
                        .with_attribute(AttributePath::new(name)),
                    );
                }
            }
        }

        for attr in &self.schema.block.attributes {
            let path = AttributePath::new(&attr.name);
            let value = config.get(&path).cloned().unwrap_or(Dynamic::Null);

            if value.is_null() {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument '{}' is required", attr.name),
                        )
                        .with_attribute(path),
                    );
                }
                continue;
            }
            if attr.computed && !attr.optional && !attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid configuration",
                        format!("'{}' is computed and cannot be set", attr.name),
                    )
                    .with_attribute(path),
                );
                continue;
            }
            if value.is_unknown() {
                continue;
            }
            for validator in &attr.validators {
                let response = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(value.clone()),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
            }
        }
        ensure_ok("ValidateConfig", diagnostics)?;

        let response = self
            .resource
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: self.resource_type.clone(),
                    config: config.clone(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        ensure_ok("ValidateResourceConfig", response.diagnostics)
    }

    /// Computes the planned state for `config` against current state
    pub fn plan(&self, config: &DynamicValue) -> Result<Plan, TestError> {
        let prior = self.state()?;
        Ok(plan_against(&self.schema, prior.as_ref(), &self.private, config))
    }

    /// Re-reads current state; a resource reported gone is dropped
    pub async fn refresh(&mut self) -> Result<(), TestError> {
        let Some(current) = self.state()? else {
            return Ok(());
        };

        let response = self
            .resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: self.resource_type.clone(),
                    current_state: current,
                    private: self.private.clone(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        ensure_ok("ReadResource", response.diagnostics)?;
        self.store(response.new_state.as_ref(), response.private)
    }

    /// Plans `config` and applies the plan, returning what was done
    pub async fn apply(&mut self, config: &DynamicValue) -> Result<PlanAction, TestError> {
        self.validate(config).await?;
        let plan = self.plan(config)?;

        match plan.action {
            PlanAction::NoOp => {}
            PlanAction::Create => self.create(config, &plan).await?,
            PlanAction::Update => self.update(config, &plan).await?,
            PlanAction::Replace => {
                self.destroy().await?;
                let plan = self.plan(config)?;
                self.create(config, &plan).await?;
            }
        }

        Ok(plan.action)
    }

    async fn create(&mut self, config: &DynamicValue, plan: &Plan) -> Result<(), TestError> {
        let response = self
            .resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: self.resource_type.clone(),
                    planned_state: plan.planned_state.clone(),
                    config: config.clone(),
                    planned_private: Vec::new(),
                },
            )
            .await;
        ensure_ok("ApplyResourceChange(create)", response.diagnostics)?;
        ensure_consistent(&self.schema, &plan.planned_state, &response.new_state)?;
        self.store(Some(&response.new_state), response.private)
    }

    async fn update(&mut self, config: &DynamicValue, plan: &Plan) -> Result<(), TestError> {
        let prior = self.state()?.ok_or(TestError::NoState)?;
        let response = self
            .resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: self.resource_type.clone(),
                    prior_state: prior,
                    planned_state: plan.planned_state.clone(),
                    config: config.clone(),
                    planned_private: self.private.clone(),
                },
            )
            .await;
        ensure_ok("ApplyResourceChange(update)", response.diagnostics)?;
        ensure_consistent(&self.schema, &plan.planned_state, &response.new_state)?;
        self.store(Some(&response.new_state), response.private)
    }

    /// Deletes the resource and forgets its state
    pub async fn destroy(&mut self) -> Result<(), TestError> {
        let Some(prior) = self.state()? else {
            return Ok(());
        };

        let response = self
            .resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: self.resource_type.clone(),
                    prior_state: prior,
                    planned_private: self.private.clone(),
                },
            )
            .await;
        ensure_ok("ApplyResourceChange(delete)", response.diagnostics)?;
        self.store(None, Vec::new())
    }

    /// Imports `id` and reads it, without touching the tracked state
    pub async fn import(&self, id: &str) -> Result<DynamicValue, TestError> {
        Ok(self.import_and_read(id).await?.0)
    }

    /// Imports `id` into tracked state, as `terraform import` does
    pub async fn adopt(&mut self, id: &str) -> Result<(), TestError> {
        let (state, private) = self.import_and_read(id).await?;
        self.store(Some(&state), private)
    }

    async fn import_and_read(&self, id: &str) -> Result<(DynamicValue, Vec<u8>), TestError> {
        let importer = self.resource.as_import().ok_or(TestError::ImportNotSupported)?;

        let response = importer
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: self.resource_type.clone(),
                    id: id.to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        ensure_ok("ImportResourceState", response.diagnostics)?;

        let imported = response
            .imported_resources
            .into_iter()
            .next()
            .ok_or(TestError::NoState)?;

        let read = self
            .resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: self.resource_type.clone(),
                    current_state: imported.state,
                    private: imported.private,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        ensure_ok("ReadResource(import)", read.diagnostics)?;
        let state = read.new_state.ok_or(TestError::NoState)?;
        Ok((state, read.private))
    }
}

/// Terraform's planning rules, reduced to flat attribute schemas
pub fn plan_against(
    schema: &Schema,
    prior: Option<&DynamicValue>,
    private: &[u8],
    config: &DynamicValue,
) -> Plan {
    let mut planned = HashMap::new();

    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let config_value = config.get(&path).cloned().unwrap_or(Dynamic::Null);
        let prior_value = prior
            .and_then(|p| p.get(&path).cloned())
            .unwrap_or(Dynamic::Null);

        let proposed = if !config_value.is_null() || !attr.computed {
            config_value
        } else if prior.is_some() {
            prior_value
        } else {
            Dynamic::Unknown
        };
        planned.insert(attr.name.clone(), proposed);
    }

    let differs = |planned: &HashMap<String, Dynamic>| -> Vec<String> {
        schema
            .block
            .attributes
            .iter()
            .filter(|attr| {
                let prior_value = prior
                    .and_then(|p| p.get(&AttributePath::new(&attr.name)))
                    .unwrap_or(&Dynamic::Null);
                let planned_value = planned.get(&attr.name).unwrap_or(&Dynamic::Null);
                planned_value.is_unknown()
                    || !jsontypes::values_equal(planned_value, prior_value, attr.semantics)
            })
            .map(|attr| attr.name.clone())
            .collect()
    };

    let mut requires_replace = vec![];
    let modifiers = Modifiers {
        prior,
        private,
        config,
    };
    modifiers.run(&schema.block.attributes, &mut planned, &mut requires_replace);

    let changed = differs(&planned);

    // Computed values the configuration leaves unset may change on update,
    // unless a modifier settles them again
    if prior.is_some() && !changed.is_empty() {
        let unset: Vec<Attribute> = schema
            .block
            .attributes
            .iter()
            .filter(|attr| {
                let config_value = config.get(&AttributePath::new(&attr.name));
                attr.computed && config_value.map_or(true, Dynamic::is_null)
            })
            .cloned()
            .collect();
        for attr in &unset {
            planned.insert(attr.name.clone(), Dynamic::Unknown);
        }
        modifiers.run(&unset, &mut planned, &mut requires_replace);
    }

    let changed = if prior.is_some() { changed } else { differs(&planned) };
    let action = match (prior, changed.is_empty(), requires_replace.is_empty()) {
        (None, _, _) => PlanAction::Create,
        (Some(_), true, _) => PlanAction::NoOp,
        (Some(_), false, true) => PlanAction::Update,
        (Some(_), false, false) => PlanAction::Replace,
    };

    Plan {
        action,
        planned_state: DynamicValue::new(Dynamic::Map(planned)),
        changed,
        requires_replace,
    }
}

struct Modifiers<'a> {
    prior: Option<&'a DynamicValue>,
    private: &'a [u8],
    config: &'a DynamicValue,
}

impl Modifiers<'_> {
    fn run(
        &self,
        attributes: &[Attribute],
        planned: &mut HashMap<String, Dynamic>,
        requires_replace: &mut Vec<AttributePath>,
    ) {
        for attr in attributes {
            let path = AttributePath::new(&attr.name);
            for modifier in &attr.plan_modifiers {
                let plan_value = planned.remove(&attr.name).unwrap_or(Dynamic::Null);
                let response = modifier.modify(PlanModifierRequest {
                    config_value: DynamicValue::new(
                        self.config.get(&path).cloned().unwrap_or(Dynamic::Null),
                    ),
                    state_value: DynamicValue::new(
                        self.prior
                            .and_then(|p| p.get(&path).cloned())
                            .unwrap_or(Dynamic::Null),
                    ),
                    plan_value: DynamicValue::new(plan_value),
                    path: path.clone(),
                    semantics: attr.semantics,
                    private: self.private.to_vec(),
                });
                if response.requires_replace && !requires_replace.contains(&path) {
                    requires_replace.push(path.clone());
                }
                planned.insert(attr.name.clone(), response.plan_value.value);
            }
        }
    }
}

fn ensure_ok(operation: &'static str, diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    if has_errors(&diagnostics) {
        return Err(TestError::Diagnostics {
            operation,
            diagnostics: diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
        });
    }
    for warning in diagnostics {
        tracing::warn!("{} warning: {}", operation, warning);
    }
    Ok(())
}

/// Every known planned value must survive apply unchanged
fn ensure_consistent(
    schema: &Schema,
    planned: &DynamicValue,
    actual: &DynamicValue,
) -> Result<(), TestError> {
    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let planned_value = planned.get(&path).unwrap_or(&Dynamic::Null);
        let actual_value = actual.get(&path).unwrap_or(&Dynamic::Null);

        if !planned_value.is_unknown()
            && !jsontypes::values_equal(planned_value, actual_value, attr.semantics)
        {
            return Err(TestError::Inconsistent {
                attribute: attr.name.clone(),
                planned: Shown(planned_value).to_string(),
                actual: Shown(actual_value).to_string(),
            });
        }
    }
    Ok(())
}

struct Shown<'a>(&'a Dynamic);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Dynamic::String(s) => write!(f, "{:?}", s),
            Dynamic::Unknown => write!(f, "(known after apply)"),
            other => match serde_json::to_string(other) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "{:?}", other),
            },
        }
    }
}

/// Assertion run against state after an apply step
pub type StateCheck = Box<dyn Fn(&DynamicValue) -> Result<(), String> + Send + Sync>;

pub enum TestStep {
    Apply {
        config: DynamicValue,
        check: Option<StateCheck>,
    },
    Import {
        /// Defaults to the `id` attribute of current state
        id: Option<String>,
        verify: bool,
    },
}

impl TestStep {
    pub fn apply(config: DynamicValue) -> Self {
        TestStep::Apply {
            config,
            check: None,
        }
    }

    pub fn import() -> Self {
        TestStep::Import {
            id: None,
            verify: false,
        }
    }

    pub fn check<F>(self, f: F) -> Self
    where
        F: Fn(&DynamicValue) -> Result<(), String> + Send + Sync + 'static,
    {
        match self {
            TestStep::Apply { config, .. } => TestStep::Apply {
                config,
                check: Some(Box::new(f)),
            },
            other => other,
        }
    }

    pub fn with_id(self, import_id: impl Into<String>) -> Self {
        match self {
            TestStep::Import { verify, .. } => TestStep::Import {
                id: Some(import_id.into()),
                verify,
            },
            other => other,
        }
    }

    pub fn verify(self) -> Self {
        match self {
            TestStep::Import { id, .. } => TestStep::Import { id, verify: true },
            other => other,
        }
    }
}

/// A sequence of steps run against one resource, destroyed at the end
pub struct TestCase {
    pub resource_type: String,
    pub provider_config: DynamicValue,
    pub steps: Vec<TestStep>,
}

impl TestCase {
    pub async fn run<P: Provider>(self, provider: &mut P) -> Result<(), TestError> {
        let mut harness = Harness::new(provider, self.provider_config, &self.resource_type).await?;

        let outcome = run_steps(&mut harness, self.steps).await;
        let destroyed = harness.destroy().await;

        outcome.and(destroyed)
    }
}

async fn run_steps(harness: &mut Harness, steps: Vec<TestStep>) -> Result<(), TestError> {
    for (number, step) in steps.into_iter().enumerate() {
        tracing::debug!("running test step {}", number + 1);
        match step {
            TestStep::Apply { config, check } => {
                harness.refresh().await?;
                harness.apply(&config).await?;
                harness.refresh().await?;

                let plan = harness.plan(&config)?;
                if plan.action != PlanAction::NoOp {
                    return Err(TestError::NonEmptyPlan(plan.changed));
                }

                if let Some(check) = check {
                    let state = harness.state()?.ok_or(TestError::NoState)?;
                    check(&state).map_err(TestError::Check)?;
                }
            }
            TestStep::Import { id, verify } => {
                let current = harness.state()?.ok_or(TestError::NoState)?;
                let id = match id {
                    Some(id) => id,
                    None => current.get_string(&AttributePath::new("id"))?,
                };

                let imported = harness.import(&id).await?;
                if verify {
                    verify_import(harness.schema(), &current, &imported)?;
                }
            }
        }
    }
    Ok(())
}

/// Imported state must reproduce applied state. Import cannot know which
/// keys of a JSON document were configured, so it may hold more of them.
fn verify_import(
    schema: &Schema,
    expected: &DynamicValue,
    actual: &DynamicValue,
) -> Result<(), TestError> {
    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let expected_value = expected.get(&path).unwrap_or(&Dynamic::Null);
        let actual_value = actual.get(&path).unwrap_or(&Dynamic::Null);

        if !jsontypes::values_contain(actual_value, expected_value, attr.semantics) {
            return Err(TestError::ImportMismatch {
                attribute: attr.name.clone(),
                expected: Shown(expected_value).to_string(),
                actual: Shown(actual_value).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::schema::{
        AttributeBuilder, AttributeType, PlanModifier, PlanModifierResponse, SchemaBuilder,
    };

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("settings", AttributeType::String)
                    .optional()
                    .computed()
                    .normalized_json()
                    .build(),
            )
            .build()
    }

    fn value(pairs: &[(&str, &str)]) -> DynamicValue {
        let mut v = DynamicValue::object();
        for (k, s) in pairs {
            v.set_string(&AttributePath::new(k), s.to_string()).unwrap();
        }
        v
    }

    #[test]
    fn plan_without_prior_state_creates() {
        let plan = plan_against(&schema(), None, &[], &value(&[("name", "a")]));

        assert_eq!(plan.action, PlanAction::Create);
        assert!(plan
            .planned_state
            .get(&AttributePath::new("id"))
            .unwrap()
            .is_unknown());
        assert!(plan
            .planned_state
            .get(&AttributePath::new("settings"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn reformatted_json_is_not_a_change() {
        let prior = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1,"y":2}"#)]);
        let config = value(&[("name", "a"), ("settings", "{ \"y\": 2.0, \"x\": 1 }")]);

        let plan = plan_against(&schema(), Some(&prior), &[], &config);
        assert_eq!(plan.action, PlanAction::NoOp);
    }

    #[test]
    fn unset_computed_attribute_keeps_prior_value() {
        let prior = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1}"#)]);
        let config = value(&[("name", "a")]);

        let plan = plan_against(&schema(), Some(&prior), &[], &config);
        assert_eq!(plan.action, PlanAction::NoOp);
    }

    #[test]
    fn changed_setting_updates_and_keeps_id() {
        let prior = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1}"#)]);
        let config = value(&[("name", "a"), ("settings", r#"{"x":2}"#)]);

        let plan = plan_against(&schema(), Some(&prior), &[], &config);
        assert_eq!(plan.action, PlanAction::Update);
        assert_eq!(plan.changed, vec!["settings".to_string()]);
        assert_eq!(
            plan.planned_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "a"
        );
    }

    #[test]
    fn changed_name_replaces() {
        let prior = value(&[("id", "a"), ("name", "a")]);
        let config = value(&[("name", "b")]);

        let plan = plan_against(&schema(), Some(&prior), &[], &config);
        assert_eq!(plan.action, PlanAction::Replace);
        assert_eq!(plan.requires_replace, vec![AttributePath::new("name")]);
    }

    #[test]
    fn inconsistent_results_are_reported() {
        let planned = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1}"#)]);
        let actual = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":3}"#)]);

        let err = ensure_consistent(&schema(), &planned, &actual).unwrap_err();
        assert!(matches!(err, TestError::Inconsistent { ref attribute, .. } if attribute == "settings"));
    }

    #[test]
    fn import_verification_compares_semantically() {
        let expected = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1}"#)]);
        let reformatted = value(&[("id", "a"), ("name", "a"), ("settings", r#"{ "x": 1.0 }"#)]);
        let wider = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":1,"y":2}"#)]);
        let changed = value(&[("id", "a"), ("name", "a"), ("settings", r#"{"x":9}"#)]);

        assert!(verify_import(&schema(), &expected, &reformatted).is_ok());
        assert!(verify_import(&schema(), &expected, &wider).is_ok());
        assert!(verify_import(&schema(), &wider, &expected).is_err());
        let err = verify_import(&schema(), &expected, &changed).unwrap_err();
        assert!(matches!(err, TestError::ImportMismatch { ref attribute, .. } if attribute == "settings"));
    }

    struct KeepStateWhenPrivate;

    impl PlanModifier for KeepStateWhenPrivate {
        fn description(&self) -> String {
            "keeps state when private state is set".to_string()
        }

        fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
            let plan_value = if request.private.is_empty() || request.state_value.is_null() {
                request.plan_value
            } else {
                request.state_value
            };
            PlanModifierResponse {
                plan_value,
                requires_replace: false,
                diagnostics: vec![],
            }
        }
    }

    #[test]
    fn modifiers_settle_values_before_changes_are_detected() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("settings", AttributeType::String)
                    .optional()
                    .computed()
                    .normalized_json()
                    .plan_modifier(Arc::new(KeepStateWhenPrivate))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("extra", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .build();
        let prior = value(&[("id", "a"), ("settings", r#"{"x":1,"y":2}"#), ("extra", "e")]);
        let config = value(&[("settings", r#"{"x":1}"#)]);

        let plan = plan_against(&schema, Some(&prior), b"adopted", &config);
        assert_eq!(plan.action, PlanAction::NoOp);
        assert_eq!(
            plan.planned_state.get_string(&AttributePath::new("extra")).unwrap(),
            "e"
        );

        let plan = plan_against(&schema, Some(&prior), &[], &config);
        assert_eq!(plan.action, PlanAction::Update);
        assert!(plan
            .planned_state
            .get(&AttributePath::new("extra"))
            .unwrap()
            .is_unknown());
        assert_eq!(
            plan.planned_state.get_string(&AttributePath::new("id")).unwrap(),
            "a"
        );
    }
}
