//! # Component Sets
//!
//! A `ComponentSet` is the unit the converter works on: the metadata
//! components found under some directories, scoped to a set of types. Each
//! component knows its xml file and any content (a sibling file, a sibling
//! directory, or the folder of a decomposed component).
//!
//! The pipeline obtains sets through the `ComponentSetBuilder` capability.
//! `SourceTreeBuilder` is the shipped implementation: it walks the
//! directories and resolves files by suffix against a `RegistryView`, so the
//! same tree can resolve differently before and after a preset is applied.
//!
//! Both source format (`Name.suffix-meta.xml`) and metadata format
//! (`Name.suffix`) files are recognised.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use glob::Pattern;
use regex::Regex;
use walkdir::WalkDir;

use crate::defaults::DRY_RUN_DIR;
use crate::error::{Error, Result};
use crate::registry::{ContentKind, RegistryView, Strategy};

/// Name of the optional ignore file at the project root
pub const IGNORE_FILE: &str = ".decomposerignore";

/// A single metadata component and the files that make it up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceComponent {
    pub type_name: String,
    pub full_name: String,
    pub xml_path: Option<PathBuf>,
    /// Content files or directories; directories are walked on enumeration
    pub content_paths: Vec<PathBuf>,
}

impl SourceComponent {
    pub fn new(type_name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            full_name: full_name.into(),
            xml_path: None,
            content_paths: Vec::new(),
        }
    }

    pub fn with_xml(mut self, path: impl Into<PathBuf>) -> Self {
        self.xml_path = Some(path.into());
        self
    }

    pub fn with_content(mut self, path: impl Into<PathBuf>) -> Self {
        self.content_paths.push(path.into());
        self
    }
}

/// The files referenced by one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFiles {
    pub xml_path: Option<PathBuf>,
    pub content_paths: Vec<PathBuf>,
}

/// Components scoped by types and directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSet {
    components: Vec<SourceComponent>,
    api_version: String,
    project_root: PathBuf,
}

impl ComponentSet {
    pub fn new(api_version: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            components: Vec::new(),
            api_version: api_version.into(),
            project_root: project_root.into(),
        }
    }

    pub fn add(&mut self, component: SourceComponent) {
        self.components.push(component);
    }

    pub fn size(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[SourceComponent] {
        &self.components
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn find(&self, type_name: &str, full_name: &str) -> Option<&SourceComponent> {
        self.components
            .iter()
            .find(|c| c.type_name == type_name && c.full_name == full_name)
    }

    /// The files of every component, one entry per component.
    pub fn enumerate_files(&self) -> Vec<ComponentFiles> {
        self.components
            .iter()
            .map(|c| ComponentFiles {
                xml_path: c.xml_path.clone(),
                content_paths: c.content_paths.clone(),
            })
            .collect()
    }

    /// A new set with only the matching components; attributes are kept.
    pub fn filter<F>(&self, keep: F) -> ComponentSet
    where
        F: Fn(&SourceComponent) -> bool,
    {
        ComponentSet {
            components: self.components.iter().filter(|c| keep(c)).cloned().collect(),
            api_version: self.api_version.clone(),
            project_root: self.project_root.clone(),
        }
    }
}

/// Parameters of a build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Type names to keep; empty keeps everything
    pub types: Vec<String>,
    pub directories: Vec<PathBuf>,
    pub project_root: PathBuf,
    /// Overrides the registry's api version
    pub api_version: Option<String>,
}

/// Capability interface for building component sets
pub trait ComponentSetBuilder: Send + Sync {
    fn build(&self, request: &BuildRequest, registry: &RegistryView) -> Result<ComponentSet>;
}

/// Builds component sets by walking directories on disk
#[derive(Debug, Clone, Default)]
pub struct SourceTreeBuilder {
    ignore: Vec<Pattern>,
}

fn source_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<name>.+)\.(?P<suffix>[^.]+)-meta\.xml$").unwrap())
}

fn metadata_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<name>.+)\.(?P<suffix>[^.]+)$").unwrap())
}

/// A file that resolved to a type, before grouping
struct Resolved {
    type_name: String,
    full_name: String,
    xml_path: PathBuf,
}

impl SourceTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip files whose project-relative path matches any pattern.
    pub fn with_ignore_patterns(mut self, patterns: Vec<Pattern>) -> Self {
        self.ignore = patterns;
        self
    }

    /// A builder honouring the project's ignore file, if it has one.
    pub fn for_project(root: &Path) -> Result<Self> {
        let path = root.join(IGNORE_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(&path)?;
        let mut patterns = Vec::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pattern = Pattern::new(line).map_err(|e| Error::Filesystem {
                message: format!("Invalid pattern '{}' in {}: {}", line, path.display(), e),
            })?;
            patterns.push(pattern);
        }
        Ok(Self::new().with_ignore_patterns(patterns))
    }

    fn is_ignored(&self, path: &Path, project_root: &Path) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(project_root).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.ignore.iter().any(|p| p.matches(&relative))
    }

    /// Resolve every file under `dir` that names a known type.
    fn resolve_files(
        &self,
        dir: &Path,
        project_root: &Path,
        registry: &RegistryView,
    ) -> Result<Vec<Resolved>> {
        let mut resolved = Vec::new();
        let dry_run_root = project_root.join(DRY_RUN_DIR);
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.path() != dry_run_root);

        for entry in walker {
            let entry = entry.map_err(|e| Error::Filesystem {
                message: format!("Failed to walk '{}': {}", dir.display(), e),
            })?;
            if !entry.file_type().is_file() || self.is_ignored(entry.path(), project_root) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();

            if let Some(caps) = source_file_regex().captures(&file_name) {
                if let Some(ty) = registry.type_by_suffix(&caps["suffix"]) {
                    resolved.push(Resolved {
                        type_name: ty.name.clone(),
                        full_name: caps["name"].to_string(),
                        xml_path: entry.path().to_path_buf(),
                    });
                }
                continue;
            }

            if let Some(caps) = metadata_file_regex().captures(&file_name) {
                // Content files are picked up through their -meta.xml
                if let Some(ty) = registry.type_by_suffix(&caps["suffix"]) {
                    if ty.content == ContentKind::None {
                        resolved.push(Resolved {
                            type_name: ty.name.clone(),
                            full_name: caps["name"].to_string(),
                            xml_path: entry.path().to_path_buf(),
                        });
                    }
                }
            }
        }

        Ok(resolved)
    }
}

impl ComponentSetBuilder for SourceTreeBuilder {
    fn build(&self, request: &BuildRequest, registry: &RegistryView) -> Result<ComponentSet> {
        let api_version = request
            .api_version
            .clone()
            .unwrap_or_else(|| registry.api_version().to_string());
        let mut set = ComponentSet::new(api_version, request.project_root.clone());

        for dir in &request.directories {
            if !dir.is_dir() {
                log::debug!("Skipping missing directory {}", dir.display());
                continue;
            }

            let resolved = self.resolve_files(dir, &request.project_root, registry)?;

            // Directories owned by content-directory components
            let content_dirs: Vec<PathBuf> = resolved
                .iter()
                .filter(|r| {
                    registry
                        .get_type(&r.type_name)
                        .is_some_and(|ty| ty.content == ContentKind::Directory)
                })
                .filter_map(|r| r.xml_path.parent().map(|p| p.join(&r.full_name)))
                .collect();

            let mut components: Vec<SourceComponent> = Vec::new();
            let mut index: HashMap<(String, String, PathBuf), usize> = HashMap::new();

            for r in resolved {
                if content_dirs.iter().any(|d| r.xml_path.starts_with(d)) {
                    continue;
                }
                let ty = registry.require_type(&r.type_name)?;
                let folder = r.xml_path.parent().map(Path::to_path_buf);
                let folder_name = folder
                    .as_ref()
                    .and_then(|f| f.file_name())
                    .map(|n| n.to_string_lossy().to_string());

                // A child file inside a decomposed parent's folder
                let decomposed_parent = registry
                    .parent_of(ty)
                    .filter(|p| p.strategy == Strategy::Decomposed);
                if let (Some(parent), Some(folder), Some(folder_name)) =
                    (decomposed_parent, &folder, &folder_name)
                {
                    let key = (parent.name.clone(), folder_name.clone(), folder.clone());
                    if !index.contains_key(&key) {
                        index.insert(key, components.len());
                        components.push(
                            SourceComponent::new(parent.name.clone(), folder_name.clone())
                                .with_content(folder.clone()),
                        );
                    }
                    continue;
                }

                let in_own_folder = folder_name.as_deref() == Some(r.full_name.as_str());
                // Same-named files elsewhere in the directory stay separate components
                let location = match (&folder, ty.strategy) {
                    (Some(folder), Strategy::Decomposed) if in_own_folder => folder.clone(),
                    _ => r.xml_path.clone(),
                };
                let key = (ty.name.clone(), r.full_name.clone(), location);
                let i = match index.get(&key) {
                    Some(&i) => i,
                    None => {
                        let i = components.len();
                        index.insert(key, i);
                        components.push(SourceComponent::new(ty.name.clone(), r.full_name.clone()));
                        i
                    }
                };
                let component = &mut components[i];
                component.xml_path = Some(r.xml_path.clone());

                match (ty.content, ty.strategy) {
                    (ContentKind::File, _) => {
                        let content = r.xml_path.with_file_name(format!("{}.{}", r.full_name, ty.suffix));
                        if content.is_file() {
                            component.content_paths.push(content);
                        }
                    }
                    (ContentKind::Directory, _) => {
                        let content = r.xml_path.with_file_name(&r.full_name);
                        if content.is_dir() {
                            component.content_paths.push(content);
                        }
                    }
                    (ContentKind::None, Strategy::Decomposed) if in_own_folder => {
                        if let Some(folder) = folder {
                            if !component.content_paths.contains(&folder) {
                                component.content_paths.push(folder);
                            }
                        }
                    }
                    _ => {}
                }
            }

            for component in components {
                if in_scope(&request.types, &component.type_name, registry) {
                    set.add(component);
                }
            }
        }

        Ok(set)
    }
}

fn in_scope(types: &[String], type_name: &str, registry: &RegistryView) -> bool {
    if types.is_empty() || types.iter().any(|t| t == type_name) {
        return true;
    }
    registry
        .get_type(type_name)
        .and_then(|ty| ty.parent.as_deref())
        .is_some_and(|parent| types.iter().any(|t| t == parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn request(root: &Path, types: &[&str]) -> BuildRequest {
        BuildRequest {
            types: types.iter().map(|t| t.to_string()).collect(),
            directories: vec![root.join("pkg")],
            project_root: root.to_path_buf(),
            api_version: None,
        }
    }

    #[test]
    fn test_build_resolves_source_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/main/default/labels/CustomLabels.labels-meta.xml", "<x/>");
        write(root, "pkg/main/default/classes/Foo.cls-meta.xml", "<x/>");
        write(root, "pkg/main/default/classes/Foo.cls", "class Foo {}");
        write(root, "pkg/main/default/README.md", "ignored");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &[]), &view)
            .unwrap();

        assert_eq!(set.size(), 2);
        let class = set.find("ApexClass", "Foo").unwrap();
        assert_eq!(
            class.content_paths,
            vec![root.join("pkg/main/default/classes/Foo.cls")]
        );
        assert!(set.find("CustomLabels", "CustomLabels").is_some());
        assert_eq!(set.api_version(), "61.0");
        assert_eq!(set.project_root(), root);
    }

    #[test]
    fn test_build_filters_by_type() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/main/default/labels/CustomLabels.labels-meta.xml", "<x/>");
        write(root, "pkg/main/default/classes/Foo.cls-meta.xml", "<x/>");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &["CustomLabels", "CustomLabel"]), &view)
            .unwrap();

        assert_eq!(set.size(), 1);
        assert_eq!(set.components()[0].type_name, "CustomLabels");
    }

    #[test]
    fn test_build_static_resource_directory_content() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/main/default/staticresources/site.resource-meta.xml", "<x/>");
        write(root, "pkg/main/default/staticresources/site/css/app.css", "body {}");
        write(root, "pkg/main/default/staticresources/site/Inner.cls-meta.xml", "<x/>");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &[]), &view)
            .unwrap();

        assert_eq!(set.size(), 1);
        let resource = set.find("StaticResource", "site").unwrap();
        assert_eq!(
            resource.content_paths,
            vec![root.join("pkg/main/default/staticresources/site")]
        );
    }

    #[test]
    fn test_build_groups_decomposed_folder() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let base = "pkg/main/default/workflows/Account";
        write(root, &format!("{base}/Account.workflow-meta.xml"), "<x/>");
        write(root, &format!("{base}/Notify.workflowAlert-meta.xml"), "<x/>");
        write(root, &format!("{base}/Close.workflowRule-meta.xml"), "<x/>");

        let view = Registry::builtin()
            .unwrap()
            .view_with_presets(&["decomposeWorkflowBeta".to_string()])
            .unwrap();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &["Workflow"]), &view)
            .unwrap();

        assert_eq!(set.size(), 1);
        let workflow = set.find("Workflow", "Account").unwrap();
        assert_eq!(
            workflow.xml_path.as_deref(),
            Some(root.join(base).join("Account.workflow-meta.xml").as_path())
        );
        assert_eq!(workflow.content_paths, vec![root.join(base)]);
    }

    #[test]
    fn test_build_keeps_same_named_files_apart() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/main/default/labels/CustomLabels.labels-meta.xml", "<x/>");
        write(root, "pkg/app/labels/CustomLabels.labels-meta.xml", "<x/>");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &["CustomLabels"]), &view)
            .unwrap();

        assert_eq!(set.size(), 2);
        let mut xml_paths: Vec<_> = set
            .enumerate_files()
            .into_iter()
            .filter_map(|f| f.xml_path)
            .collect();
        xml_paths.sort();
        assert_eq!(
            xml_paths,
            vec![
                root.join("pkg/app/labels/CustomLabels.labels-meta.xml"),
                root.join("pkg/main/default/labels/CustomLabels.labels-meta.xml"),
            ]
        );
    }

    #[test]
    fn test_build_skips_dry_run_output() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "main/default/labels/CustomLabels.labels-meta.xml", "<x/>");
        write(root, "DRY_RUN_OUTPUT/main/default/labels/Greeting.label-meta.xml", "<x/>");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(
                &BuildRequest {
                    types: Vec::new(),
                    directories: vec![root.join(".")],
                    project_root: root.to_path_buf(),
                    api_version: None,
                },
                &view,
            )
            .unwrap();

        assert_eq!(set.size(), 1);
        assert!(set.find("CustomLabels", "CustomLabels").is_some());
    }

    #[test]
    fn test_build_resolves_metadata_format() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/labels/CustomLabels.labels", "<x/>");
        write(root, "pkg/package.xml", "<Package/>");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(root, &[]), &view)
            .unwrap();

        assert_eq!(set.size(), 1);
        assert_eq!(
            set.components()[0].xml_path.as_deref(),
            Some(root.join("pkg/labels/CustomLabels.labels").as_path())
        );
    }

    #[test]
    fn test_build_honours_ignore_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "pkg/main/default/classes/Foo.cls-meta.xml", "<x/>");
        write(root, "pkg/main/default/classes/Bar.cls-meta.xml", "<x/>");
        write(root, IGNORE_FILE, "# comment\npkg/**/Bar.*\n");

        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::for_project(root)
            .unwrap()
            .build(&request(root, &[]), &view)
            .unwrap();

        assert_eq!(set.size(), 1);
        assert!(set.find("ApexClass", "Foo").is_some());
    }

    #[test]
    fn test_missing_directory_yields_empty_set() {
        let temp = TempDir::new().unwrap();
        let view = Registry::builtin().unwrap().base_view();
        let set = SourceTreeBuilder::new()
            .build(&request(temp.path(), &[]), &view)
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_filter_preserves_attributes() {
        let mut set = ComponentSet::new("58.0", "/proj");
        set.add(SourceComponent::new("A", "one"));
        set.add(SourceComponent::new("B", "two"));

        let filtered = set.filter(|c| c.type_name == "B");
        assert_eq!(filtered.size(), 1);
        assert_eq!(filtered.api_version(), "58.0");
        assert_eq!(filtered.project_root(), Path::new("/proj"));
    }
}
