//! Preset catalog: the names a caller may pass to the pipeline and the
//! metadata types each one affects.

use crate::error::Result;
use crate::registry::MetadataRegistry;

/// A resolved preset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub affected_types: Vec<String>,
}

/// Read-only lookup of presets over a registry
#[derive(Clone, Copy)]
pub struct PresetCatalog<'a> {
    registry: &'a dyn MetadataRegistry,
}

impl<'a> PresetCatalog<'a> {
    pub fn new(registry: &'a dyn MetadataRegistry) -> Self {
        Self { registry }
    }

    /// Valid preset names in registry order.
    pub fn list(&self) -> Vec<String> {
        self.registry.list_preset_names()
    }

    /// Affected type names for `name`, or `PresetNotFound`.
    pub fn resolve(&self, name: &str) -> Result<Vec<String>> {
        self.registry.preset_definition(name)
    }

    pub fn load(&self, name: &str) -> Result<Preset> {
        Ok(Preset {
            name: name.to_string(),
            affected_types: self.resolve(name)?,
        })
    }
}
