use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::info;

use super::{ActionHandler, DispatchContext, DispatchError};
use crate::bindings::{Action, ActionBinding};

/// Adapta un closure a `ActionHandler`
pub struct FnHandler<F>(F);

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&ActionBinding, &DispatchContext) -> Result<String, DispatchError> + Send + Sync,
{
    fn handle(&self, binding: &ActionBinding, ctx: &DispatchContext) -> Result<String, DispatchError> {
        (self.0)(binding, ctx)
    }
}

/// Registro abierto de manejadores para acciones `plugin`, por nombre
#[derive(Default)]
pub struct PluginRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un manejador; devuelve el anterior con ese nombre, si lo había
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        let name = name.into();
        info!(plugin = %name, "plugin registrado");
        self.handlers.write().insert(name, handler)
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, f: F) -> Option<Arc<dyn ActionHandler>>
    where
        F: Fn(&ActionBinding, &DispatchContext) -> Result<String, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(FnHandler(f)))
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ActionHandler for PluginRegistry {
    fn handle(&self, binding: &ActionBinding, ctx: &DispatchContext) -> Result<String, DispatchError> {
        let Action::Plugin(name) = &binding.action else {
            return Err(DispatchError::KindMismatch {
                expected: "plugin",
                group: binding.group.to_string(),
            });
        };

        // Se clona el Arc para no mantener el lock durante la ejecución
        let handler = self
            .handlers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownPlugin(name.clone()))?;

        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(binding, ctx))) {
            Ok(result) => result,
            Err(_) => Err(DispatchError::PluginPanicked(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::ActionKind;
    use std::collections::BTreeMap;

    fn plugin_binding(name: &str) -> ActionBinding {
        ActionBinding::new("thumb_group", ActionKind::Plugin, name, BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_registered_plugin_receives_context() {
        let registry = PluginRegistry::new();
        registry.register_fn("echo", |binding, ctx| {
            Ok(format!("{} {} {:.1}", binding.group, ctx.gesture, ctx.confidence))
        });

        let ctx = DispatchContext {
            gesture: "thumb".to_string(),
            confidence: 0.8,
        };
        let detail = registry.handle(&plugin_binding("echo"), &ctx).unwrap();
        assert_eq!(detail, "thumb_group thumb 0.8");
    }

    #[test]
    fn test_unknown_plugin() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.handle(&plugin_binding("ghost"), &DispatchContext::default()),
            Err(DispatchError::UnknownPlugin(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_plugin_failures_are_contained() {
        let registry = PluginRegistry::new();
        registry.register_fn("fails", |_, _| Err(DispatchError::Plugin("sin luz".to_string())));
        registry.register_fn("panics", |_, _| panic!("boom"));

        let ctx = DispatchContext::default();
        assert!(matches!(
            registry.handle(&plugin_binding("fails"), &ctx),
            Err(DispatchError::Plugin(_))
        ));
        assert!(matches!(
            registry.handle(&plugin_binding("panics"), &ctx),
            Err(DispatchError::PluginPanicked(_))
        ));
    }

    #[test]
    fn test_register_replace_and_unregister() {
        let registry = PluginRegistry::new();
        assert!(registry.register_fn("a", |_, _| Ok("1".into())).is_none());
        assert!(registry.register_fn("a", |_, _| Ok("2".into())).is_some());
        registry.register_fn("b", |_, _| Ok("3".into()));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a").is_some());
        assert!(!registry.contains("a"));
    }
}
