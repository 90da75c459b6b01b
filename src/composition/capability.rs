use std::sync::{Arc, Weak};

use super::CompositionRegistry;
use crate::capability::{
    Capability, CapabilityBinding, CapabilityError, CapabilityProvider, COMPOSITION,
};
use crate::object::Model;

/// Binds a fresh composition collection on every access, for models some
/// registered provider serves.
///
/// Holds the registry weakly: the registry reaches objects through the
/// object service, which owns this provider.
pub struct CompositionCapabilityProvider {
    registry: Weak<CompositionRegistry>,
}

impl CompositionCapabilityProvider {
    pub fn new(registry: &Arc<CompositionRegistry>) -> Self {
        CompositionCapabilityProvider {
            registry: Arc::downgrade(registry),
        }
    }
}

impl CapabilityProvider for CompositionCapabilityProvider {
    fn applies_to(&self, model: &Model) -> bool {
        self.registry
            .upgrade()
            .map_or(false, |registry| registry.serves(model))
    }

    fn capabilities(&self, _model: &Model) -> Vec<(String, CapabilityBinding)> {
        let registry = Weak::clone(&self.registry);
        vec![(
            COMPOSITION.to_string(),
            CapabilityBinding::dynamic(move |object| {
                let registry = registry
                    .upgrade()
                    .ok_or_else(|| construction("composition registry dropped"))?;
                registry
                    .composition(object)
                    .map(Capability::Composition)
                    .ok_or_else(|| construction("no composition provider applies"))
            }),
        )]
    }
}

fn construction(message: &str) -> CapabilityError {
    CapabilityError::Construction {
        name: COMPOSITION.to_string(),
        message: message.to_string(),
    }
}
