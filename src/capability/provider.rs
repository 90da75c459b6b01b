use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::CapabilityBinding;
use crate::object::Model;

/// Contributes capability bindings for models it applies to.
pub trait CapabilityProvider: Send + Sync {
    fn applies_to(&self, _model: &Model) -> bool {
        true
    }

    fn capabilities(&self, model: &Model) -> Vec<(String, CapabilityBinding)>;
}

/// Rewraps bindings after all providers have contributed.
///
/// Decorators see every binding by name and return either the binding
/// unchanged or a wrapped one (see [`CapabilityBinding::wrap`]).
pub trait CapabilityDecorator: Send + Sync {
    fn decorate(&self, name: &str, binding: CapabilityBinding) -> CapabilityBinding;
}

/// Ordered provider chain plus decorator chain.
///
/// Providers run in registration order and a later provider's binding
/// replaces an earlier one of the same name. Decorators run in registration
/// order too, so the last registered decorator is the outermost wrapper.
#[derive(Default)]
pub struct CapabilityRegistry {
    providers: RwLock<Vec<Arc<dyn CapabilityProvider>>>,
    decorators: RwLock<Vec<Arc<dyn CapabilityDecorator>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_provider(&self, provider: Arc<dyn CapabilityProvider>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    pub fn register_decorator(&self, decorator: Arc<dyn CapabilityDecorator>) {
        self.decorators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decorator);
    }

    /// Compute the capability set for a model.
    pub fn resolve(&self, model: &Model) -> HashMap<String, CapabilityBinding> {
        let mut bindings = HashMap::new();

        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        for provider in providers.iter().filter(|p| p.applies_to(model)) {
            bindings.extend(provider.capabilities(model));
        }
        drop(providers);

        let decorators = self.decorators.read().unwrap_or_else(PoisonError::into_inner);
        decorators.iter().fold(bindings, |bindings, decorator| {
            bindings
                .into_iter()
                .map(|(name, binding)| {
                    let decorated = decorator.decorate(&name, binding);
                    (name, decorated)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use serde_json::{json, Value};

    struct Fixed(&'static str, &'static str);

    impl CapabilityProvider for Fixed {
        fn capabilities(&self, _model: &Model) -> Vec<(String, CapabilityBinding)> {
            vec![(
                self.0.to_string(),
                CapabilityBinding::Value(Capability::Value(json!(self.1))),
            )]
        }
    }

    struct OnlyFolders;

    impl CapabilityProvider for OnlyFolders {
        fn applies_to(&self, model: &Model) -> bool {
            model.type_name() == Some("folder")
        }

        fn capabilities(&self, _model: &Model) -> Vec<(String, CapabilityBinding)> {
            vec![(
                "folder-only".to_string(),
                CapabilityBinding::Value(Capability::Value(Value::Bool(true))),
            )]
        }
    }

    fn value_of(binding: &CapabilityBinding) -> Value {
        match binding {
            CapabilityBinding::Value(Capability::Value(v)) => v.clone(),
            _ => panic!("expected a value binding"),
        }
    }

    #[test]
    fn later_provider_overrides_earlier() {
        let registry = CapabilityRegistry::new();
        registry.register_provider(Arc::new(Fixed("view", "default")));
        registry.register_provider(Arc::new(Fixed("view", "custom")));

        let bindings = registry.resolve(&Model::new());
        assert_eq!(value_of(&bindings["view"]), json!("custom"));
    }

    #[test]
    fn applies_to_filters_providers() {
        let registry = CapabilityRegistry::new();
        registry.register_provider(Arc::new(OnlyFolders));

        let clock = Model::from_value(json!({ "type": "clock" }));
        let folder = Model::from_value(json!({ "type": "folder" }));
        assert!(registry.resolve(&clock).is_empty());
        assert!(registry.resolve(&folder).contains_key("folder-only"));
    }
}
