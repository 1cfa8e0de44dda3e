//! Shared test utilities for integration and E2E tests.
//!
//! This module provides project fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_manifest(manifests::SINGLE_PKG)
//!         .with_file(paths::LABELS, fixtures::LABELS);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{fixtures, manifests, paths, snapshot_tree, TestFixture};
}

/// Project manifest snippets.
#[allow(dead_code)]
pub mod manifests {
    /// One package directory.
    pub const SINGLE_PKG: &str = r#"{
  "packageDirectories": [{ "path": "pkg", "default": true }],
  "sourceApiVersion": "61.0"
}
"#;

    /// `pkg`, plus `other` which holds nothing a labels preset targets.
    pub const PKG_AND_OTHER: &str = r#"{
  "packageDirectories": [
    { "path": "pkg", "default": true },
    { "path": "other" }
  ]
}
"#;

    /// `pkg`, plus `bad` which is not rooted at main/default.
    pub const PKG_AND_BAD: &str = r#"{
  "packageDirectories": [
    { "path": "pkg", "default": true },
    { "path": "bad" }
  ]
}
"#;
}

/// Well-known file locations inside fixtures.
#[allow(dead_code)]
pub mod paths {
    pub const LABELS: &str = "pkg/main/default/labels/CustomLabels.labels-meta.xml";
    pub const BAD_LABELS: &str = "bad/labels/CustomLabels.labels-meta.xml";
    pub const OTHER_CLASS: &str = "other/main/default/classes/Util.cls-meta.xml";
    pub const OTHER_CLASS_BODY: &str = "other/main/default/classes/Util.cls";
    pub const WORKFLOW: &str = "pkg/main/default/workflows/Account.workflow-meta.xml";
}

/// File contents used by fixtures.
#[allow(dead_code)]
pub mod fixtures {
    /// A labels file with three labels.
    pub const LABELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomLabels xmlns="http://soap.sforce.com/2006/04/metadata">
    <labels>
        <fullName>Greeting</fullName>
        <language>en_US</language>
        <protected>false</protected>
        <shortDescription>Greeting</shortDescription>
        <value>Hello</value>
    </labels>
    <labels>
        <fullName>Farewell</fullName>
        <language>en_US</language>
        <protected>false</protected>
        <shortDescription>Farewell</shortDescription>
        <value>Goodbye</value>
    </labels>
    <labels>
        <fullName>Thanks</fullName>
        <language>en_US</language>
        <protected>true</protected>
        <shortDescription>Thanks</shortDescription>
        <value>Thank you</value>
    </labels>
</CustomLabels>
"#;

    /// A labels file with one label.
    pub const ONE_LABEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomLabels xmlns="http://soap.sforce.com/2006/04/metadata">
    <labels>
        <fullName>Elsewhere</fullName>
        <value>Elsewhere</value>
    </labels>
</CustomLabels>
"#;

    pub const APEX_CLASS_META: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ApexClass xmlns="http://soap.sforce.com/2006/04/metadata">
    <apiVersion>61.0</apiVersion>
    <status>Active</status>
</ApexClass>
"#;

    pub const APEX_CLASS_BODY: &str = "public class Util {}\n";

    /// A workflow with an alert, a field update and two rules.
    pub const WORKFLOW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Workflow xmlns="http://soap.sforce.com/2006/04/metadata">
    <alerts>
        <fullName>NotifyOwner</fullName>
        <description>Notify the owner</description>
        <protected>false</protected>
    </alerts>
    <fieldUpdates>
        <fullName>SetStatus</fullName>
        <field>Status__c</field>
        <literalValue>Closed</literalValue>
    </fieldUpdates>
    <rules>
        <fullName>CloseAccount</fullName>
        <active>true</active>
    </rules>
    <rules>
        <fullName>ReopenAccount</fullName>
        <active>false</active>
    </rules>
</Workflow>
"#;
}

/// A temporary project directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    scratch: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new fixture with an empty project directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            scratch: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `decomposer-project.json`.
    pub fn with_manifest(self, content: &str) -> Self {
        self.with_file("decomposer-project.json", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// The single-package labels project used by most scenarios.
    pub fn labels_project() -> Self {
        Self::new()
            .with_manifest(manifests::SINGLE_PKG)
            .with_file(paths::LABELS, fixtures::LABELS)
    }

    /// Get the path to the project directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A directory outside the project for temp workspaces.
    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Absolute path of a project-relative path.
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.path().join(rel)
    }

    /// A child path usable with `assert_fs` assertions.
    pub fn child(&self, rel: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(rel)
    }

    pub fn manifest_bytes(&self) -> Vec<u8> {
        fs::read(self.abs("decomposer-project.json")).expect("Failed to read manifest")
    }

    /// Create a command for the decomposer binary running in the project.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("decomposer");
        cmd.current_dir(self.path())
            .env("DECOMPOSER_TEMP_DIR", self.scratch())
            .env_remove("DECOMPOSER_PROJECT_DIR")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Every file under `dir` with its bytes, keyed by relative path.
#[allow(dead_code)]
pub fn snapshot_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    if !dir.exists() {
        return files;
    }
    for entry in WalkDir::new(dir) {
        let entry = entry.expect("Failed to walk directory");
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(dir)
                .expect("walked path is under dir")
                .to_path_buf();
            files.insert(rel, fs::read(entry.path()).expect("Failed to read file"));
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_project() {
        let fixture = TestFixture::labels_project();
        assert!(fixture.abs(paths::LABELS).is_file());
        assert!(!fixture.manifest_bytes().is_empty());
    }

    #[test]
    fn test_snapshot_tree_is_relative() {
        let fixture = TestFixture::labels_project();
        let tree = snapshot_tree(&fixture.abs("pkg"));
        assert_eq!(tree.len(), 1);
        assert!(tree.contains_key(Path::new("main/default/labels/CustomLabels.labels-meta.xml")));
    }
}
