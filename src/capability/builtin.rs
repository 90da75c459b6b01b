use std::sync::Arc;

use serde_json::Value;

use super::{Capability, CapabilityBinding, CapabilityProvider, MutationCapability, MUTATION, TYPE};
use crate::object::Model;

/// Exposes the model's `type` as a stable, shared value.
pub struct TypeCapabilityProvider;

impl CapabilityProvider for TypeCapabilityProvider {
    fn capabilities(&self, model: &Model) -> Vec<(String, CapabilityBinding)> {
        let type_name = model
            .type_name()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null);
        vec![(
            TYPE.to_string(),
            CapabilityBinding::Value(Capability::Value(type_name)),
        )]
    }
}

/// One `MutationCapability` per object, built on first use.
pub struct MutationCapabilityProvider;

impl CapabilityProvider for MutationCapabilityProvider {
    fn capabilities(&self, _model: &Model) -> Vec<(String, CapabilityBinding)> {
        vec![(
            MUTATION.to_string(),
            CapabilityBinding::cached(|object| {
                Ok(Capability::Mutation(Arc::new(MutationCapability::new(object))))
            }),
        )]
    }
}
