//! # Format Conversion
//!
//! Converts component sets between the two on-disk forms:
//!
//! - **source format**: what lives in package directories. Composite types
//!   may be split into one file per child depending on their strategy.
//! - **metadata format**: the canonical form. Every composite is a single
//!   file and the output directory carries a `package.xml` manifest.
//!
//! The pipeline only sees the `FormatConverter` capability. The request is a
//! tagged variant: metadata output always goes to a directory, source output
//! goes either to an isolated directory or is merged into an existing tree
//! next to the components it already holds.
//!
//! `LocalConverter` is the shipped implementation. Which layout it writes is
//! decided entirely by the `RegistryView` it is given, so the same converter
//! recomposes under the old rules and decomposes under the new ones.

pub mod xml;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::components::{ComponentSet, SourceComponent};
use crate::defaults::DEFAULT_PACKAGE_ROOT;
use crate::error::{Error, Result};
use crate::manifest::{self, PACKAGE_MANIFEST};
use crate::registry::{ContentKind, MetadataType, RegistryView, Strategy};
use xml::XmlElement;

/// Where source-format output goes
#[derive(Debug, Clone, Copy)]
pub enum SourceOutput<'a> {
    /// Write a fresh tree under `<dir>/main/default`
    Directory(&'a Path),
    /// Write next to matching components of `set`, or under
    /// `<default_directory>/main/default` when there is no match
    MergeWith {
        set: &'a ComponentSet,
        default_directory: &'a Path,
    },
}

/// A conversion request
#[derive(Debug, Clone, Copy)]
pub enum ConvertRequest<'a> {
    Metadata { output_directory: &'a Path },
    Source { output: SourceOutput<'a> },
}

/// Components written by a conversion, with their new paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertResult {
    pub converted: Vec<SourceComponent>,
}

impl ConvertResult {
    /// Every file written, content directories included as-is.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.converted
            .iter()
            .flat_map(|c| c.xml_path.iter().chain(c.content_paths.iter()))
            .cloned()
            .collect()
    }
}

/// Capability interface for format conversion
pub trait FormatConverter: Send + Sync {
    fn convert(
        &self,
        set: &ComponentSet,
        registry: &RegistryView,
        request: ConvertRequest<'_>,
    ) -> Result<ConvertResult>;
}

/// Converter working directly on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConverter;

impl FormatConverter for LocalConverter {
    fn convert(
        &self,
        set: &ComponentSet,
        registry: &RegistryView,
        request: ConvertRequest<'_>,
    ) -> Result<ConvertResult> {
        match request {
            ConvertRequest::Metadata { output_directory } => {
                to_metadata(set, registry, output_directory)
            }
            ConvertRequest::Source { output } => to_source(set, registry, output),
        }
    }
}

// ============================================================================
// Source -> metadata
// ============================================================================

fn to_metadata(set: &ComponentSet, registry: &RegistryView, out: &Path) -> Result<ConvertResult> {
    let mut result = ConvertResult::default();
    // Flat children are gathered into their parent's single document
    let mut flat_children: BTreeMap<String, Vec<&SourceComponent>> = BTreeMap::new();
    // Same-named composites from different files share one output document
    let mut groups: Vec<Vec<&SourceComponent>> = Vec::new();
    let mut group_index: BTreeMap<(&str, &str), usize> = BTreeMap::new();

    for component in set.components() {
        let ty = registry.require_type(&component.type_name)?;
        if let Some(parent) = registry
            .parent_of(ty)
            .filter(|p| p.strategy == Strategy::DecomposedLabels)
        {
            flat_children
                .entry(parent.name.clone())
                .or_default()
                .push(component);
            continue;
        }
        let key = (component.type_name.as_str(), component.full_name.as_str());
        match group_index.get(&key) {
            Some(&i) if ty.content == ContentKind::None => groups[i].push(component),
            _ => {
                group_index.insert(key, groups.len());
                groups.push(vec![component]);
            }
        }
    }

    for group in groups {
        let ty = registry.require_type(&group[0].type_name)?;
        let converted = match group.as_slice() {
            [single] => compose_component(single, ty, registry, out)?,
            _ => compose_merged(&group, ty, registry, out)?,
        };
        result.converted.push(converted);
    }

    for (parent_name, children) in flat_children {
        let parent = registry.require_type(&parent_name)?;
        result
            .converted
            .push(compose_flat_children(parent, &children, registry, out)?);
    }

    if !set.is_empty() {
        manifest::write_package_xml(set, registry, &out.join(PACKAGE_MANIFEST))?;
    }

    Ok(result)
}

fn compose_component(
    component: &SourceComponent,
    ty: &MetadataType,
    registry: &RegistryView,
    out: &Path,
) -> Result<SourceComponent> {
    let type_dir = out.join(&ty.directory_name);
    let full = &component.full_name;
    let converted = SourceComponent::new(&ty.name, full);

    match ty.content {
        ContentKind::File | ContentKind::Directory => {
            return copy_with_content(component, ty, &type_dir);
        }
        ContentKind::None => {}
    }

    let target = type_dir.join(format!("{}.{}", full, ty.suffix));

    if ty.strategy == Strategy::Decomposed && !component.content_paths.is_empty() {
        let document = recompose_folder(component, ty, registry)?;
        xml::write_document(&target, &document, registry.xml_namespace())?;
        return Ok(converted.with_xml(target));
    }

    let source = require_xml(component)?;
    copy_file(source, &target)?;
    Ok(converted.with_xml(target))
}

/// Compose several files of one component into a single document.
///
/// The first document is kept whole; later ones contribute only their child
/// elements.
fn compose_merged(
    group: &[&SourceComponent],
    ty: &MetadataType,
    registry: &RegistryView,
    out: &Path,
) -> Result<SourceComponent> {
    let mut merged: Option<XmlElement> = None;

    for component in group {
        let folder = ty.strategy == Strategy::Decomposed && !component.content_paths.is_empty();
        let document = if folder {
            recompose_folder(component, ty, registry)?
        } else {
            xml::read_document(require_xml(component)?)?
        };
        match merged.as_mut() {
            None => merged = Some(document),
            Some(base) => {
                for child in document.child_elements() {
                    if ty.children.contains_key(&child.name) {
                        base.push_element(child.clone());
                    }
                }
            }
        }
    }

    let full = &group[0].full_name;
    let mut document = merged.unwrap_or_else(|| XmlElement::new(&ty.name));
    document.name = ty.name.clone();
    let target = out
        .join(&ty.directory_name)
        .join(format!("{}.{}", full, ty.suffix));
    xml::write_document(&target, &document, registry.xml_namespace())?;
    log::debug!("Merged {} files into {}", group.len(), target.display());

    Ok(SourceComponent::new(&ty.name, full).with_xml(target))
}

/// Rebuild a composite document from a decomposed folder.
fn recompose_folder(
    component: &SourceComponent,
    ty: &MetadataType,
    registry: &RegistryView,
) -> Result<XmlElement> {
    let mut document = match &component.xml_path {
        Some(path) => xml::read_document(path)?,
        None => XmlElement::new(&ty.name),
    };
    document.name = ty.name.clone();

    // element name -> child documents, in registry order
    let mut by_element: BTreeMap<&str, Vec<XmlElement>> = BTreeMap::new();

    for folder in &component.content_paths {
        for entry in WalkDir::new(folder).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Filesystem {
                message: format!("Failed to walk '{}': {}", folder.display(), e),
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || Some(path) == component.xml_path.as_deref() {
                continue;
            }
            let Some(child_ty) = child_type_of_file(path, registry) else {
                continue;
            };
            let Some(element) = registry.child_element_name(ty, &child_ty.name) else {
                continue;
            };
            let mut child = xml::read_document(path)?;
            child.name = element.to_string();
            by_element.entry(element).or_default().push(child);
        }
    }

    for element in ty.children.keys() {
        if let Some(children) = by_element.remove(element.as_str()) {
            for child in children {
                document.push_element(child);
            }
        }
    }

    Ok(document)
}

fn compose_flat_children(
    parent: &MetadataType,
    children: &[&SourceComponent],
    registry: &RegistryView,
    out: &Path,
) -> Result<SourceComponent> {
    let mut document = XmlElement::new(&parent.name);

    for child in children {
        let element = registry
            .child_element_name(parent, &child.type_name)
            .ok_or_else(|| Error::Conversion {
                component: format!("{}:{}", child.type_name, child.full_name),
                message: format!("'{}' is not a child of '{}'", child.type_name, parent.name),
            })?;
        let mut body = xml::read_document(require_xml(child)?)?;
        body.name = element.to_string();
        document.push_element(body);
    }

    let target = out
        .join(&parent.directory_name)
        .join(format!("{}.{}", parent.name, parent.suffix));
    xml::write_document(&target, &document, registry.xml_namespace())?;

    Ok(SourceComponent::new(&parent.name, &parent.name).with_xml(target))
}

// ============================================================================
// Metadata -> source
// ============================================================================

fn to_source(
    set: &ComponentSet,
    registry: &RegistryView,
    output: SourceOutput<'_>,
) -> Result<ConvertResult> {
    let locator = Locator::new(output, registry);
    let mut result = ConvertResult::default();

    for component in set.components() {
        let ty = registry.require_type(&component.type_name)?;

        match (ty.content, ty.strategy) {
            (ContentKind::File | ContentKind::Directory, _) => {
                let type_dir = locator.type_dir(ty, &component.full_name);
                result
                    .converted
                    .push(copy_with_content(component, ty, &type_dir)?);
            }
            (ContentKind::None, Strategy::DecomposedLabels) => {
                result
                    .converted
                    .extend(decompose_flat(component, ty, registry, &locator)?);
            }
            (ContentKind::None, Strategy::Decomposed) => {
                result
                    .converted
                    .push(decompose_folder(component, ty, registry, &locator)?);
            }
            (ContentKind::None, _) => {
                let target = locator
                    .type_dir(ty, &component.full_name)
                    .join(source_file_name(&component.full_name, ty));
                copy_file(require_xml(component)?, &target)?;
                result
                    .converted
                    .push(SourceComponent::new(&ty.name, &component.full_name).with_xml(target));
            }
        }
    }

    Ok(result)
}

/// Split a composite into one flat file per child; the parent is dropped.
fn decompose_flat(
    component: &SourceComponent,
    ty: &MetadataType,
    registry: &RegistryView,
    locator: &Locator<'_>,
) -> Result<Vec<SourceComponent>> {
    let document = xml::read_document(require_xml(component)?)?;
    let mut converted = Vec::new();

    for element in document.child_elements() {
        let Some(child_ty) = registry.child_type_for_element(ty, &element.name) else {
            continue;
        };
        let full = child_name(element, child_ty, component)?;
        let target = locator
            .type_dir(child_ty, &full)
            .join(source_file_name(&full, child_ty));

        let mut body = element.clone();
        body.name = child_ty.name.clone();
        xml::write_document(&target, &body, registry.xml_namespace())?;
        converted.push(SourceComponent::new(&child_ty.name, full).with_xml(target));
    }

    Ok(converted)
}

/// Split a composite into `<Name>/` holding the parent file and child files.
fn decompose_folder(
    component: &SourceComponent,
    ty: &MetadataType,
    registry: &RegistryView,
    locator: &Locator<'_>,
) -> Result<SourceComponent> {
    let document = xml::read_document(require_xml(component)?)?;
    let full = &component.full_name;
    let folder = locator.type_dir(ty, full).join(full);

    let mut parent = XmlElement::new(&ty.name);
    let mut child_files = Vec::new();

    for element in document.child_elements() {
        match registry.child_type_for_element(ty, &element.name) {
            Some(child_ty) => {
                let child_full = child_name(element, child_ty, component)?;
                let target = folder.join(source_file_name(&child_full, child_ty));
                let mut body = element.clone();
                body.name = child_ty.name.clone();
                xml::write_document(&target, &body, registry.xml_namespace())?;
                child_files.push(target);
            }
            None => parent.push_element(element.clone()),
        }
    }

    let parent_path = folder.join(source_file_name(full, ty));
    xml::write_document(&parent_path, &parent, registry.xml_namespace())?;

    let mut converted = SourceComponent::new(&ty.name, full).with_xml(parent_path);
    converted.content_paths = child_files;
    Ok(converted)
}

/// Chooses the type directory a component is written to
struct Locator<'a> {
    default_root: PathBuf,
    merge_with: Option<&'a ComponentSet>,
    registry: &'a RegistryView,
}

impl<'a> Locator<'a> {
    fn new(output: SourceOutput<'a>, registry: &'a RegistryView) -> Self {
        match output {
            SourceOutput::Directory(dir) => Self {
                default_root: dir.join(DEFAULT_PACKAGE_ROOT),
                merge_with: None,
                registry,
            },
            SourceOutput::MergeWith {
                set,
                default_directory,
            } => Self {
                default_root: default_directory.join(DEFAULT_PACKAGE_ROOT),
                merge_with: Some(set),
                registry,
            },
        }
    }

    fn type_dir(&self, ty: &MetadataType, full_name: &str) -> PathBuf {
        self.existing_type_dir(ty, full_name)
            .unwrap_or_else(|| self.default_root.join(&ty.directory_name))
    }

    /// The type directory of a matching component in the merge set.
    fn existing_type_dir(&self, ty: &MetadataType, full_name: &str) -> Option<PathBuf> {
        let existing = self.merge_with?.find(&ty.name, full_name)?;
        let xml = existing.xml_path.as_deref();
        let in_own_folder = self
            .registry
            .get_type(&ty.name)
            .is_some_and(|t| t.strategy == Strategy::Decomposed)
            && existing
                .content_paths
                .iter()
                .any(|c| xml.is_some_and(|x| x.parent() == Some(c.as_path())));

        if in_own_folder {
            xml?.parent()?.parent().map(Path::to_path_buf)
        } else {
            xml?.parent().map(Path::to_path_buf)
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn source_file_name(full_name: &str, ty: &MetadataType) -> String {
    format!("{}.{}-meta.xml", full_name, ty.suffix)
}

fn require_xml(component: &SourceComponent) -> Result<&Path> {
    component.xml_path.as_deref().ok_or_else(|| Error::Conversion {
        component: format!("{}:{}", component.type_name, component.full_name),
        message: "component has no xml file".to_string(),
    })
}

fn child_name(element: &XmlElement, child_ty: &MetadataType, parent: &SourceComponent) -> Result<String> {
    element
        .text_of(&child_ty.unique_id_element)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::Conversion {
            component: format!("{}:{}", parent.type_name, parent.full_name),
            message: format!(
                "<{}> entry has no <{}>",
                element.name, child_ty.unique_id_element
            ),
        })
}

fn child_type_of_file<'r>(path: &Path, registry: &'r RegistryView) -> Option<&'r MetadataType> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix("-meta.xml")?;
    let (_, suffix) = stem.rsplit_once('.')?;
    registry.type_by_suffix(suffix)
}

/// Copy a content-bearing component into `type_dir`, keeping its file names.
fn copy_with_content(
    component: &SourceComponent,
    ty: &MetadataType,
    type_dir: &Path,
) -> Result<SourceComponent> {
    let full = &component.full_name;
    let meta_target = type_dir.join(source_file_name(full, ty));
    copy_file(require_xml(component)?, &meta_target)?;

    let mut converted = SourceComponent::new(&ty.name, full).with_xml(meta_target);
    for content in &component.content_paths {
        let Some(name) = content.file_name() else {
            continue;
        };
        let target = type_dir.join(name);
        if content.is_dir() {
            converted.content_paths.extend(copy_dir(content, &target)?);
        } else {
            copy_file(content, &target)?;
            converted.content_paths.push(target);
        }
    }
    Ok(converted)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }
    fs::copy(from, to).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to copy '{}' to '{}': {}",
            from.display(),
            to.display(),
            e
        ),
    })?;
    Ok(())
}

/// Copy a directory tree, returning every file written.
fn copy_dir(from: &Path, to: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Filesystem {
            message: format!("Failed to walk '{}': {}", from.display(), e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(from).map_err(|e| Error::Filesystem {
            message: format!("Failed to relativize '{}': {}", entry.path().display(), e),
        })?;
        let target = to.join(relative);
        copy_file(entry.path(), &target)?;
        written.push(target);
    }
    Ok(written)
}
