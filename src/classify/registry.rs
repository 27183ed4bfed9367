use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::GestureClassifier;

type ClassifierFactory = Box<dyn Fn() -> Result<Box<dyn GestureClassifier>> + Send + Sync>;

/// Registry of named classifier factories.
///
/// A session owns its classifier exclusively, so the registry hands out freshly loaded
/// instances instead of shared ones.
pub struct ClassifierRegistry {
    factories: HashMap<String, ClassifierFactory>,
    default_name: Option<String>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a factory. The first registered factory becomes the default.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn GestureClassifier>> + Send + Sync + 'static,
    {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Set default classifier by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.factories.contains_key(name) {
            return Err(anyhow!("classifier '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// List registered classifier names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load a classifier by name, or the default when `name` is `None`.
    pub fn load(&self, name: Option<&str>) -> Result<Box<dyn GestureClassifier>> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_name
                .as_deref()
                .ok_or_else(|| anyhow!("no classifier registered"))?,
        };
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("classifier '{}' not registered", name))?;
        let classifier = factory()?;
        log::info!("classifier '{}' loaded", classifier.name());
        Ok(classifier)
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ScriptedClassifier;

    #[test]
    fn first_registered_is_default() {
        let mut registry = ClassifierRegistry::new();
        registry.register("scripted", || Ok(Box::new(ScriptedClassifier::new())));
        registry.register("broken", || Err(anyhow!("model file missing")));

        assert_eq!(registry.load(None).unwrap().name(), "scripted");
        assert_eq!(registry.list(), vec!["broken", "scripted"]);
    }

    #[test]
    fn load_surfaces_factory_errors() {
        let mut registry = ClassifierRegistry::new();
        registry.register("broken", || Err(anyhow!("model file missing")));

        let err = registry.load(Some("broken")).err().unwrap();
        assert!(err.to_string().contains("model file missing"));
        assert!(registry.load(Some("absent")).is_err());
        assert!(registry.set_default("absent").is_err());
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = ClassifierRegistry::default();
        assert!(registry.load(None).is_err());
    }
}
