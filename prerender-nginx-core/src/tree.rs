//! Directive tree model
//!
//! An nginx configuration is held as a list of [`ConfigDocument`]s, one per
//! physical file. Each document owns an ordered list of [`DirectiveNode`]s.
//! A node's `children` is `None` for a simple directive (`listen 80;`) and
//! `Some` for a block directive, where `Some(vec![])` is an empty block
//! (`location / {}`).

use std::path::{Path, PathBuf};

/// A single directive, simple or block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveNode {
    /// Directive keyword (`server`, `location`, `map`, ...)
    pub name: String,

    /// Positional arguments
    pub args: Vec<String>,

    /// Nested directives, present only for block directives
    pub children: Option<Vec<DirectiveNode>>,

    /// File this node was read from, if any
    pub source_file: Option<PathBuf>,

    /// Indices into the owning [`ConfigSet`] of the documents pulled in by
    /// an `include` directive
    pub includes: Vec<usize>,
}

impl DirectiveNode {
    /// Create a simple directive
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            children: None,
            source_file: None,
            includes: Vec::new(),
        }
    }

    /// Create a block directive
    pub fn block<I, S>(name: impl Into<String>, args: I, children: Vec<DirectiveNode>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, args).with_children(children)
    }

    /// Create a block directive without arguments (`http`, `server`, ...)
    pub fn section(name: impl Into<String>, children: Vec<DirectiveNode>) -> Self {
        Self::new(name, Vec::<String>::new()).with_children(children)
    }

    pub fn with_children(mut self, children: Vec<DirectiveNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_source(mut self, file: impl Into<PathBuf>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    /// Check if this is a block directive
    pub fn is_block(&self) -> bool {
        self.children.is_some()
    }

    /// Check if this is a comment node
    pub fn is_comment(&self) -> bool {
        self.name == "#"
    }

    /// Get the first argument
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Whether `name` and `args` equal the given discriminator
    pub fn matches(&self, name: &str, args: &[&str]) -> bool {
        self.name == name
            && self.args.len() == args.len()
            && self.args.iter().zip(args).all(|(a, b)| a == b)
    }

    /// Block children, empty for simple directives
    pub fn children(&self) -> &[DirectiveNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Mutable block children, turning a simple directive into an empty block
    pub fn children_mut(&mut self) -> &mut Vec<DirectiveNode> {
        self.children.get_or_insert_with(Vec::new)
    }

    /// Set `source_file` on this node and every descendant that lacks one
    pub fn adopt_source(&mut self, file: &Path) {
        if self.source_file.is_none() {
            self.source_file = Some(file.to_path_buf());
        }
        if let Some(children) = &mut self.children {
            for child in children {
                child.adopt_source(file);
            }
        }
    }
}

/// Parse status reported for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStatus {
    #[default]
    Ok,
    Error,
}

/// One problem found while reading a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line, if known
    pub line: Option<usize>,
    /// Byte offset into the source, if known
    pub offset: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Root of one parsed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub status: ParseStatus,
    pub errors: Vec<ParseIssue>,
    pub directives: Vec<DirectiveNode>,
}

impl ConfigDocument {
    /// Create a document that parsed cleanly
    pub fn new(path: impl Into<PathBuf>, directives: Vec<DirectiveNode>) -> Self {
        Self {
            path: path.into(),
            status: ParseStatus::Ok,
            errors: Vec::new(),
            directives,
        }
    }

    /// Create a document that failed to parse
    pub fn failed(path: impl Into<PathBuf>, errors: Vec<ParseIssue>) -> Self {
        Self {
            path: path.into(),
            status: ParseStatus::Error,
            errors,
            directives: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ParseStatus::Ok
    }

    /// Walk an index path (child positions from the document root)
    pub fn node(&self, path: &[usize]) -> Option<&DirectiveNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.directives.get(*first)?;
        for idx in rest {
            node = node.children.as_ref()?.get(*idx)?;
        }
        Some(node)
    }

    /// Mutable counterpart of [`ConfigDocument::node`]
    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut DirectiveNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.directives.get_mut(*first)?;
        for idx in rest {
            node = node.children.as_mut()?.get_mut(*idx)?;
        }
        Some(node)
    }
}

/// A multi-file configuration; document 0 is the main file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigSet {
    pub documents: Vec<ConfigDocument>,
}

impl ConfigSet {
    pub fn new(documents: Vec<ConfigDocument>) -> Self {
        Self { documents }
    }

    /// The file the tool was pointed at
    pub fn main(&self) -> Option<&ConfigDocument> {
        self.documents.first()
    }

    pub fn main_mut(&mut self) -> Option<&mut ConfigDocument> {
        self.documents.first_mut()
    }

    pub fn get(&self, index: usize) -> Option<&ConfigDocument> {
        self.documents.get(index)
    }

    /// Every document path, main first
    pub fn paths(&self) -> Vec<PathBuf> {
        self.documents.iter().map(|d| d.path.clone()).collect()
    }

    /// Index of the document read from `path`
    pub fn position(&self, path: &Path) -> Option<usize> {
        self.documents.iter().position(|d| d.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_vs_empty_block() {
        let simple = DirectiveNode::new("listen", ["80"]);
        let empty = DirectiveNode::block("location", ["/"], vec![]);
        assert!(!simple.is_block());
        assert!(empty.is_block());
        assert!(empty.children().is_empty());
        assert_ne!(simple.children, empty.children);
    }

    #[test]
    fn test_matches_requires_exact_args() {
        let node = DirectiveNode::new("if", ["$prerender", "=", "1"]);
        assert!(node.matches("if", &["$prerender", "=", "1"]));
        assert!(!node.matches("if", &["$prerender", "="]));
        assert!(!node.matches("if", &["$prerender", "=", "0"]));
        assert!(!node.matches("set", &["$prerender", "=", "1"]));
    }

    #[test]
    fn test_node_path_lookup() {
        let doc = ConfigDocument::new(
            "/etc/nginx/nginx.conf",
            vec![DirectiveNode::section(
                "http",
                vec![
                    DirectiveNode::new("sendfile", ["on"]),
                    DirectiveNode::section("server", vec![]),
                ],
            )],
        );
        assert_eq!(doc.node(&[0, 1]).map(|n| n.name.as_str()), Some("server"));
        assert!(doc.node(&[0, 2]).is_none());
        assert!(doc.node(&[0, 0, 0]).is_none());
        assert!(doc.node(&[]).is_none());
    }

    #[test]
    fn test_adopt_source_keeps_existing() {
        let mut node = DirectiveNode::section(
            "server",
            vec![DirectiveNode::new("listen", ["80"]).with_source("/other.conf")],
        );
        node.adopt_source(Path::new("/main.conf"));
        assert_eq!(node.source_file.as_deref(), Some(Path::new("/main.conf")));
        assert_eq!(node.children()[0].source_file.as_deref(), Some(Path::new("/other.conf")));
    }
}
