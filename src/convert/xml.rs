//! Minimal XML tree used by the converter.
//!
//! Documents are parsed with `xot` and copied into a small owned tree that
//! is easy to split and reassemble. Element names, attributes and text are
//! kept. Attributes keep their prefixed name and namespace, so a subtree
//! written as its own document declares every prefix it uses on its root.
//! Output is always pretty-printed with four-space indentation and the
//! registry namespace on the root element.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use xot::{Node, Xot};

use crate::error::{Error, Result};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An attribute; `name` carries the prefix when `namespace` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
    pub namespace: Option<String>,
}

impl XmlAttribute {
    fn prefix(&self) -> Option<&str> {
        self.namespace.as_ref()?;
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An element holding a single text node.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: vec![XmlNode::Text(text.into())],
        }
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Trimmed text of the first child element called `name`.
    pub fn text_of(&self, name: &str) -> Option<String> {
        self.child_elements()
            .find(|e| e.name == name)
            .map(|e| e.text().trim().to_string())
    }

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> std::result::Result<XmlElement, String> {
        let mut xot = Xot::new();
        let document = xot.parse(input).map_err(|e| e.to_string())?;
        let root = xot.document_element(document).map_err(|e| e.to_string())?;
        Ok(from_node(&xot, root))
    }

    /// Serialize as a complete document with `namespace` on the root.
    pub fn to_document(&self, namespace: &str) -> String {
        let mut prefixes = BTreeMap::new();
        self.collect_prefixes(&mut prefixes);

        let mut declarations = format!(" xmlns=\"{}\"", escape_attr(namespace));
        for (prefix, uri) in prefixes {
            declarations.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape_attr(uri)));
        }

        let mut out = String::from(XML_DECLARATION);
        out.push('\n');
        write_element(&mut out, self, 0, Some(&declarations));
        out.push('\n');
        out
    }

    /// Prefixes used by attributes anywhere in this subtree.
    fn collect_prefixes<'a>(&'a self, prefixes: &mut BTreeMap<&'a str, &'a str>) {
        for attribute in &self.attributes {
            if let (Some(prefix), Some(uri)) = (attribute.prefix(), &attribute.namespace) {
                prefixes.entry(prefix).or_insert(uri);
            }
        }
        for child in self.child_elements() {
            child.collect_prefixes(prefixes);
        }
    }
}

fn from_node(xot: &Xot, node: Node) -> XmlElement {
    let name = xot
        .element(node)
        .map(|e| xot.local_name_str(e.name()).to_string())
        .unwrap_or_default();

    let attributes = xot
        .attributes(node)
        .iter()
        .map(|(name, value)| attribute(xot, node, name, value))
        .collect();

    let mut children = Vec::new();
    for child in xot.children(node) {
        if xot.is_element(child) {
            children.push(XmlNode::Element(from_node(xot, child)));
        } else if let Some(text) = xot.text_str(child) {
            children.push(XmlNode::Text(text.to_string()));
        }
    }

    // Indentation between elements is not content
    if children.iter().any(|c| matches!(c, XmlNode::Element(_))) {
        children.retain(|c| !matches!(c, XmlNode::Text(t) if t.trim().is_empty()));
    }

    XmlElement {
        name,
        attributes,
        children,
    }
}

fn attribute(xot: &Xot, node: Node, name: xot::NameId, value: &str) -> XmlAttribute {
    let (local, uri) = xot.name_ns_str(name);
    if uri.is_empty() {
        return XmlAttribute {
            name: local.to_string(),
            value: value.to_string(),
            namespace: None,
        };
    }

    let prefix = xot
        .prefix_for_namespace(node, xot.namespace_for_name(name))
        .map(|p| xot.prefix_str(p))
        .filter(|p| !p.is_empty())
        .unwrap_or("ns");
    XmlAttribute {
        name: format!("{}:{}", prefix, local),
        value: value.to_string(),
        namespace: Some(uri.to_string()),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape(text).replace('"', "&quot;")
}

fn write_element(out: &mut String, element: &XmlElement, depth: usize, declarations: Option<&str>) {
    let indent = "    ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.name);
    if let Some(declarations) = declarations {
        out.push_str(declarations);
    }
    for attribute in &element.attributes {
        out.push_str(&format!(" {}=\"{}\"", attribute.name, escape_attr(&attribute.value)));
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let only_text = element
        .children
        .iter()
        .all(|c| matches!(c, XmlNode::Text(_)));

    if only_text {
        out.push_str(&escape(&element.text()));
    } else {
        for child in &element.children {
            out.push('\n');
            match child {
                XmlNode::Element(e) => write_element(out, e, depth + 1, None),
                XmlNode::Text(t) => {
                    out.push_str(&"    ".repeat(depth + 1));
                    out.push_str(&escape(t.trim()));
                }
            }
        }
        out.push('\n');
        out.push_str(&indent);
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

/// Read and parse an XML file.
pub fn read_document(path: &Path) -> Result<XmlElement> {
    let content = fs::read_to_string(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to read '{}': {}", path.display(), e),
    })?;
    XmlElement::parse(&content).map_err(|message| Error::Xml {
        path: path.to_path_buf(),
        message,
    })
}

/// Write `element` as a document, creating parent directories.
pub fn write_document(path: &Path, element: &XmlElement, namespace: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", parent.display(), e),
        })?;
    }
    fs::write(path, element.to_document(namespace)).map_err(|e| Error::Filesystem {
        message: format!("Failed to write file '{}': {}", path.display(), e),
    })
}
