//! # Manifest Generation
//!
//! Renders the `package.xml` manifest that accompanies metadata-format
//! output, and filters out composite placeholders before doing so.
//!
//! A non-decomposed composite type (such as a labels container) is a
//! placeholder that stands for *every* child. When a set contains that
//! placeholder together with specific children, listing the placeholder
//! would widen the manifest to all children, so it is dropped. Whether a
//! type is a placeholder is read from its registry strategy, never from its
//! name, so custom registries behave the same way.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::components::ComponentSet;
use crate::convert::xml::{self, XmlElement};
use crate::error::Result;
use crate::registry::RegistryView;

/// File name of the manifest written next to metadata-format output
pub const PACKAGE_MANIFEST: &str = "package.xml";

/// Remove placeholder components that have at least one child in the set.
///
/// A placeholder present without any of its children is kept. The returned
/// set carries the same api version and project root as `set`.
pub fn filter_placeholders(set: &ComponentSet, registry: &RegistryView) -> ComponentSet {
    let parents_with_children: HashSet<&str> = set
        .components()
        .iter()
        .filter_map(|c| registry.get_type(&c.type_name))
        .filter_map(|ty| registry.parent_of(ty))
        .filter(|parent| parent.is_placeholder())
        .map(|parent| parent.name.as_str())
        .collect();

    if parents_with_children.is_empty() {
        return set.clone();
    }

    set.filter(|c| !parents_with_children.contains(c.type_name.as_str()))
}

/// Render `package.xml` for a set. Types and members are sorted.
pub fn render_package_xml(set: &ComponentSet, namespace: &str) -> String {
    package_element(set).to_document(namespace)
}

/// Filter `set` and write its manifest to `path`.
pub fn write_package_xml(set: &ComponentSet, registry: &RegistryView, path: &Path) -> Result<()> {
    let filtered = filter_placeholders(set, registry);
    xml::write_document(path, &package_element(&filtered), registry.xml_namespace())
}

fn package_element(set: &ComponentSet) -> XmlElement {
    let mut members: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for c in set.components() {
        members
            .entry(c.type_name.as_str())
            .or_default()
            .insert(c.full_name.as_str());
    }

    let mut package = XmlElement::new("Package");
    for (type_name, names) in members {
        let mut types = XmlElement::new("types");
        for name in names {
            types.push_element(XmlElement::with_text("members", name));
        }
        types.push_element(XmlElement::with_text("name", type_name));
        package.push_element(types);
    }
    package.push_element(XmlElement::with_text("version", set.api_version()));
    package
}
