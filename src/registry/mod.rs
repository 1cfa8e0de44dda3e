//! # Metadata Registry
//!
//! The registry describes every metadata type the tool understands: where
//! its files live, how they are named, and how a composite type is split
//! into child files on disk (its *strategy*). It also defines the presets,
//! named bundles of strategy overrides.
//!
//! ## Key Components
//!
//! - **`MetadataRegistry`**: The narrow capability the pipeline consumes.
//!   It lists presets, resolves a preset to its affected types, and hands
//!   out a `RegistryView` for a given project root.
//! - **`RegistryView`**: An immutable snapshot of the type table with the
//!   project's applied presets layered on top. The pipeline fetches one view
//!   before it updates the ledger and a fresh one after, so compose and
//!   decompose see different rules without any shared mutable state.
//! - **`Registry`**: The shipped implementation, loaded from a YAML document.
//!   The built-in document is embedded in the binary; a custom document can
//!   be loaded from disk.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::project;

const BUILTIN_REGISTRY: &str = include_str!("builtin.yaml");

/// How a type's components are laid out in source format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// One file per component
    #[default]
    Standard,
    /// One composite file holding every child
    NonDecomposed,
    /// A folder per component with a parent file and one file per child
    Decomposed,
    /// One flat file per child and no parent file
    DecomposedLabels,
}

/// Extra files that belong to a component besides its xml
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    None,
    /// A sibling file named `<fullName>.<suffix>`
    File,
    /// A sibling directory named `<fullName>`
    Directory,
}

/// A metadata type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataType {
    pub name: String,
    /// Directory the type's files live in, e.g. `labels`
    pub directory_name: String,
    /// File suffix, e.g. `labels` for `CustomLabels.labels-meta.xml`
    pub suffix: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub content: ContentKind,
    /// Child xml element name -> child type name
    #[serde(default)]
    pub children: BTreeMap<String, String>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Element holding a child's name inside its parent document
    #[serde(default = "default_unique_id_element")]
    pub unique_id_element: String,
}

fn default_unique_id_element() -> String {
    "fullName".to_string()
}

impl MetadataType {
    /// Whether this is the non-decomposed placeholder form of a composite
    /// type: a single component standing in for every child.
    pub fn is_placeholder(&self) -> bool {
        self.strategy == Strategy::NonDecomposed
    }
}

/// A partial type definition applied by a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOverride {
    pub name: String,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub directory_name: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub content: Option<ContentKind>,
    #[serde(default)]
    pub children: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub unique_id_element: Option<String>,
}

impl TypeOverride {
    fn apply_to(&self, ty: &mut MetadataType) {
        if let Some(strategy) = self.strategy {
            ty.strategy = strategy;
        }
        if let Some(directory_name) = &self.directory_name {
            ty.directory_name = directory_name.clone();
        }
        if let Some(suffix) = &self.suffix {
            ty.suffix = suffix.clone();
        }
        if let Some(content) = self.content {
            ty.content = content;
        }
        if let Some(children) = &self.children {
            ty.children = children.clone();
        }
        if let Some(parent) = &self.parent {
            ty.parent = Some(parent.clone());
        }
        if let Some(unique_id_element) = &self.unique_id_element {
            ty.unique_id_element = unique_id_element.clone();
        }
    }

    /// Build a complete type from an override that introduces a new type.
    fn into_new_type(self) -> Option<MetadataType> {
        let mut ty = MetadataType {
            name: self.name.clone(),
            directory_name: self.directory_name.clone()?,
            suffix: self.suffix.clone()?,
            strategy: Strategy::default(),
            content: ContentKind::default(),
            children: BTreeMap::new(),
            parent: None,
            unique_id_element: default_unique_id_element(),
        };
        self.apply_to(&mut ty);
        Some(ty)
    }
}

/// A named bundle of type overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDefinition {
    pub name: String,
    pub types: Vec<TypeOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDocument {
    api_version: String,
    xml_namespace: String,
    types: Vec<MetadataType>,
    #[serde(default)]
    presets: Vec<PresetDefinition>,
}

/// Capability interface over the metadata registry.
pub trait MetadataRegistry: Send + Sync {
    /// Valid preset names, in declaration order.
    fn list_preset_names(&self) -> Vec<String>;

    /// Type names affected by a preset. Fails with `PresetNotFound`.
    fn preset_definition(&self, name: &str) -> Result<Vec<String>>;

    /// A fresh view reflecting the presets currently applied to the project.
    fn view(&self, project_root: &Path) -> Result<RegistryView>;
}

/// Registry loaded from a YAML document
#[derive(Debug, Clone)]
pub struct Registry {
    document: RegistryDocument,
}

impl Registry {
    /// The registry embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_REGISTRY)
    }

    /// Load a registry document from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a registry document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: RegistryDocument = serde_yaml::from_str(yaml)?;
        let registry = Self { document };
        registry.base_view().validate()?;

        let mut seen = HashSet::new();
        for preset in &registry.document.presets {
            if !seen.insert(preset.name.as_str()) {
                return Err(Error::Registry {
                    message: format!("duplicate preset '{}'", preset.name),
                });
            }
            // Each preset must also produce a consistent table on its own
            registry.view_with_presets(std::slice::from_ref(&preset.name))?;
        }

        Ok(registry)
    }

    /// The type table with no presets applied.
    pub fn base_view(&self) -> RegistryView {
        RegistryView {
            api_version: self.document.api_version.clone(),
            xml_namespace: self.document.xml_namespace.clone(),
            types: self
                .document
                .types
                .iter()
                .map(|ty| (ty.name.clone(), ty.clone()))
                .collect(),
            applied: Vec::new(),
        }
    }

    /// The type table with the given presets layered on in order.
    pub fn view_with_presets(&self, applied: &[String]) -> Result<RegistryView> {
        let mut view = self.base_view();

        for name in applied {
            let preset = self.find_preset(name)?;
            for over in &preset.types {
                match view.types.get_mut(&over.name) {
                    Some(ty) => over.apply_to(ty),
                    None => {
                        let ty = over.clone().into_new_type().ok_or_else(|| Error::Registry {
                            message: format!(
                                "preset '{}' introduces type '{}' without directoryName and suffix",
                                preset.name, over.name
                            ),
                        })?;
                        view.types.insert(ty.name.clone(), ty);
                    }
                }
            }
            view.applied.push(name.clone());
        }

        view.validate()?;
        Ok(view)
    }

    fn find_preset(&self, name: &str) -> Result<&PresetDefinition> {
        self.document
            .presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::PresetNotFound {
                name: name.to_string(),
                available: self.list_preset_names(),
            })
    }
}

impl MetadataRegistry for Registry {
    fn list_preset_names(&self) -> Vec<String> {
        self.document
            .presets
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn preset_definition(&self, name: &str) -> Result<Vec<String>> {
        let preset = self.find_preset(name)?;
        Ok(preset.types.iter().map(|t| t.name.clone()).collect())
    }

    fn view(&self, project_root: &Path) -> Result<RegistryView> {
        let applied = project::applied_presets(project_root)?;
        self.view_with_presets(&applied)
    }
}

/// Snapshot of the type table under a fixed set of applied presets
#[derive(Debug, Clone)]
pub struct RegistryView {
    api_version: String,
    xml_namespace: String,
    types: BTreeMap<String, MetadataType>,
    applied: Vec<String>,
}

impl RegistryView {
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn xml_namespace(&self) -> &str {
        &self.xml_namespace
    }

    /// Presets layered into this view, in application order.
    pub fn applied_presets(&self) -> &[String] {
        &self.applied
    }

    pub fn get_type(&self, name: &str) -> Option<&MetadataType> {
        self.types.get(name)
    }

    /// Look up a type, failing with a registry error when it is unknown.
    pub fn require_type(&self, name: &str) -> Result<&MetadataType> {
        self.get_type(name).ok_or_else(|| Error::Registry {
            message: format!("unknown metadata type '{}'", name),
        })
    }

    pub fn type_by_suffix(&self, suffix: &str) -> Option<&MetadataType> {
        self.types.values().find(|ty| ty.suffix == suffix)
    }

    pub fn parent_of(&self, ty: &MetadataType) -> Option<&MetadataType> {
        ty.parent.as_deref().and_then(|p| self.get_type(p))
    }

    /// The child type stored under `element` inside a `parent` document.
    pub fn child_type_for_element(&self, parent: &MetadataType, element: &str) -> Option<&MetadataType> {
        parent.children.get(element).and_then(|c| self.get_type(c))
    }

    /// The element name a child type is stored under in its parent document.
    pub fn child_element_name<'a>(&self, parent: &'a MetadataType, child: &str) -> Option<&'a str> {
        parent
            .children
            .iter()
            .find(|(_, ty)| ty.as_str() == child)
            .map(|(element, _)| element.as_str())
    }

    /// Child types of `parent`, in element-name order.
    pub fn children_of(&self, parent: &MetadataType) -> Vec<&MetadataType> {
        parent
            .children
            .values()
            .filter_map(|c| self.get_type(c))
            .collect()
    }

    pub fn is_placeholder(&self, type_name: &str) -> bool {
        self.get_type(type_name).is_some_and(MetadataType::is_placeholder)
    }

    fn validate(&self) -> Result<()> {
        let mut suffixes = HashSet::new();
        for ty in self.types.values() {
            if !suffixes.insert(ty.suffix.as_str()) {
                return Err(Error::Registry {
                    message: format!("suffix '{}' is used by more than one type", ty.suffix),
                });
            }
            for child in ty.children.values() {
                let child_ty = self.get_type(child).ok_or_else(|| Error::Registry {
                    message: format!("type '{}' lists unknown child '{}'", ty.name, child),
                })?;
                if child_ty.parent.as_deref() != Some(ty.name.as_str()) {
                    return Err(Error::Registry {
                        message: format!("child '{}' does not name '{}' as its parent", child, ty.name),
                    });
                }
            }
            if let Some(parent) = &ty.parent {
                if self.get_type(parent).is_none() {
                    return Err(Error::Registry {
                        message: format!("type '{}' names unknown parent '{}'", ty.name, parent),
                    });
                }
            }
        }
        Ok(())
    }
}
