//! Section locator
//!
//! Finds the `http` section, the `server` blocks inside it and `location`
//! blocks inside a server. All lookups are plain linear scans over
//! immediate children.

use crate::error::{Error, Result};
use crate::tree::{ConfigDocument, ConfigSet, DirectiveNode};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Human-facing identity of a server block
///
/// Not a uniqueness key: two blocks may share it. Selection always goes
/// through an explicit index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    /// First argument of the first `server_name`
    pub server_name: Option<String>,
    /// First argument of the first `listen`
    pub listen: Option<String>,
    /// File the server block lives in
    pub owner: PathBuf,
}

impl ServerIdentity {
    /// Scan a server block's immediate children once; first occurrence wins
    pub fn of(server: &DirectiveNode, owner: &Path) -> Self {
        let mut server_name = None;
        let mut listen = None;
        for child in server.children() {
            match child.name.as_str() {
                "server_name" if server_name.is_none() => {
                    server_name = Some(child.first_arg().map(str::to_string));
                }
                "listen" if listen.is_none() => {
                    listen = Some(child.first_arg().map(str::to_string));
                }
                _ => {}
            }
        }
        Self {
            server_name: server_name.flatten(),
            listen: listen.flatten(),
            owner: owner.to_path_buf(),
        }
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.server_name {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "default (no server_name)")?,
        }
        if let Some(listen) = &self.listen {
            write!(f, " [listen {}]", listen)?;
        }
        Ok(())
    }
}

/// A server block found in a scope
#[derive(Debug, Clone)]
pub struct ServerBlock<'a> {
    /// Position within the scope
    pub index: usize,
    pub node: &'a DirectiveNode,
    pub identity: ServerIdentity,
}

/// Address of a node inside a [`ConfigSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRef {
    /// Index of the owning document
    pub document: usize,
    /// Child positions from the document root
    pub path: Vec<usize>,
}

/// A server block discovered across the whole configuration set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub server: ServerRef,
    pub identity: ServerIdentity,
}

/// Find the top-level `http` section of a document
pub fn find_http_section(doc: &ConfigDocument) -> Option<&DirectiveNode> {
    doc.directives.iter().find(|d| d.name == "http")
}

/// Position of the top-level `http` section, if any
pub fn http_section_index(doc: &ConfigDocument) -> Option<usize> {
    doc.directives.iter().position(|d| d.name == "http")
}

/// Directives searched for servers and maps: the `http` block, or the
/// document's top level when it has no `http` wrapper
pub fn http_scope(doc: &ConfigDocument) -> &[DirectiveNode] {
    match find_http_section(doc) {
        Some(http) => http.children(),
        None => &doc.directives,
    }
}

/// Mutable counterpart of [`http_scope`]
pub fn http_scope_mut(doc: &mut ConfigDocument) -> &mut Vec<DirectiveNode> {
    match http_section_index(doc) {
        Some(idx) => doc.directives[idx].children_mut(),
        None => &mut doc.directives,
    }
}

/// Collect every `server` child of `scope`, in order
///
/// Returns an empty list when there are none; deciding whether that is an
/// error is up to the caller.
pub fn find_server_blocks<'a>(scope: &'a [DirectiveNode], owner: &Path) -> Vec<ServerBlock<'a>> {
    scope
        .iter()
        .enumerate()
        .filter(|(_, d)| d.name == "server")
        .map(|(index, node)| ServerBlock {
            index,
            node,
            identity: ServerIdentity::of(node, owner),
        })
        .collect()
}

/// Index of the `location` child whose first argument equals `path`
pub fn location_index(server: &DirectiveNode, path: &str) -> Option<usize> {
    server
        .children()
        .iter()
        .position(|d| d.name == "location" && d.first_arg() == Some(path))
}

/// Find a `location` block by exact first-argument match
pub fn find_location_block<'a>(server: &'a DirectiveNode, path: &str) -> Result<&'a DirectiveNode> {
    location_index(server, path)
        .map(|idx| &server.children()[idx])
        .ok_or_else(|| location_not_found(path))
}

/// Mutable counterpart of [`find_location_block`]
pub fn find_location_block_mut<'a>(server: &'a mut DirectiveNode, path: &str) -> Result<&'a mut DirectiveNode> {
    let idx = location_index(server, path).ok_or_else(|| location_not_found(path))?;
    Ok(&mut server.children_mut()[idx])
}

fn location_not_found(path: &str) -> Error {
    Error::NotFound(format!("no location block found for {} in the server block", path))
}

/// Discover server blocks across the main document and everything it
/// includes from its `http` scope
///
/// Documents with a non-ok status are skipped with a warning.
pub fn discover_servers(set: &ConfigSet) -> Vec<DiscoveredServer> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    if set.main().is_some() {
        walk_document(set, 0, &mut visited, &mut found);
    }
    found
}

fn walk_document(
    set: &ConfigSet,
    doc_idx: usize,
    visited: &mut HashSet<usize>,
    found: &mut Vec<DiscoveredServer>,
) {
    if !visited.insert(doc_idx) {
        return;
    }
    let Some(doc) = set.get(doc_idx) else {
        return;
    };
    if !doc.is_ok() {
        tracing::warn!(
            path = %doc.path.display(),
            errors = ?doc.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Skipping document that failed to parse"
        );
        return;
    }

    let prefix: Vec<usize> = http_section_index(doc).into_iter().collect();
    let scope = http_scope(doc);

    for (index, node) in scope.iter().enumerate() {
        match node.name.as_str() {
            "server" => {
                let mut path = prefix.clone();
                path.push(index);
                found.push(DiscoveredServer {
                    server: ServerRef { document: doc_idx, path },
                    identity: ServerIdentity::of(node, &doc.path),
                });
            }
            "include" => {
                for &included in &node.includes {
                    walk_document(set, included, visited, found);
                }
            }
            _ => {}
        }
    }
}
