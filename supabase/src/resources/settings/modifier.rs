//! Plan modifier for settings blocks taken over by import
//!
//! An imported block tracks the whole remote document because import cannot
//! know which keys the configuration will set. Planning a partial block
//! against it would report every extra key as a change, so while the domain
//! is unmanaged and the configuration agrees with the tracked document, the
//! tracked document is planned instead.

use serde_json::Value;
use std::sync::Arc;
use tfplug::jsontypes;
use tfplug::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use tfplug::types::Dynamic;

use super::domain::Domain;
use super::state::ManagedKeys;

pub struct KeepAdoptedDocument {
    domain: Domain,
}

impl KeepAdoptedDocument {
    pub fn create(domain: Domain) -> Arc<dyn PlanModifier> {
        Arc::new(Self { domain })
    }

    fn adopted(&self, request: &PlanModifierRequest) -> bool {
        let (Dynamic::String(config), Dynamic::String(state)) =
            (&request.config_value.value, &request.state_value.value)
        else {
            return false;
        };
        let (Ok(Value::Object(config)), Ok(Value::Object(state))) =
            (jsontypes::parse(config), jsontypes::parse(state))
        else {
            return false;
        };

        match ManagedKeys::load(&request.private) {
            Ok(managed) => managed.adopts(self.domain, &state, &config),
            Err(e) => {
                tracing::warn!("Ignoring unreadable private state: {}", e);
                false
            }
        }
    }
}

impl PlanModifier for KeepAdoptedDocument {
    fn description(&self) -> String {
        "an imported block keeps its tracked document while every configured key matches"
            .to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if self.adopted(&request) {
            tracing::debug!("{} settings match the imported document", self.domain);
            request.state_value
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}
