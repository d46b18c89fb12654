//! Multi-file loading
//!
//! Parses the main file, then every file its `include` directives name.
//! Relative include patterns resolve against the main file's directory,
//! the way nginx resolves them against its configuration prefix. Each
//! file is parsed once; include nodes record the indices of the
//! documents they pulled in.

use crate::parser::lexer::line_of;
use crate::parser::{parse, ParseError};
use prerender_nginx_core::{ConfigDocument, ConfigSet, DirectiveNode, ParseIssue, ParseStatus};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to produce any configuration set at all
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load `path` and everything it includes
///
/// Only an unreadable main file is an error. Syntax errors, unreadable
/// includes and patterns matching nothing are recorded on the affected
/// document, which is then marked [`ParseStatus::Error`].
pub fn load(path: impl AsRef<Path>) -> Result<ConfigSet, LoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut loader = Loader {
        base_dir,
        documents: vec![parse_document(path, &source)],
        index: HashMap::from([(path.to_path_buf(), 0)]),
    };

    // Documents appended while resolving are picked up by this same loop
    let mut current = 0;
    while current < loader.documents.len() {
        loader.resolve_document(current);
        current += 1;
    }

    tracing::debug!(
        main = %path.display(),
        documents = loader.documents.len(),
        "Loaded nginx configuration"
    );
    Ok(ConfigSet::new(loader.documents))
}

/// Parse one file's text into a document
pub fn parse_document(path: &Path, source: &str) -> ConfigDocument {
    match parse(source) {
        Ok(mut directives) => {
            for node in &mut directives {
                node.adopt_source(path);
            }
            ConfigDocument::new(path, directives)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse nginx configuration");
            ConfigDocument::failed(path, vec![issue_from(source, &e)])
        }
    }
}

fn issue_from(source: &str, error: &ParseError) -> ParseIssue {
    let offset = error.position();
    ParseIssue {
        line: Some(line_of(source, offset)),
        offset: Some(offset),
        message: error.to_string(),
    }
}

struct Loader {
    base_dir: PathBuf,
    documents: Vec<ConfigDocument>,
    index: HashMap<PathBuf, usize>,
}

impl Loader {
    fn resolve_document(&mut self, doc_idx: usize) {
        if !self.documents[doc_idx].is_ok() {
            return;
        }
        let mut directives = std::mem::take(&mut self.documents[doc_idx].directives);
        let mut issues = Vec::new();
        self.resolve_nodes(&mut directives, &mut issues);

        let doc = &mut self.documents[doc_idx];
        doc.directives = directives;
        if !issues.is_empty() {
            doc.status = ParseStatus::Error;
            doc.errors.extend(issues);
        }
    }

    fn resolve_nodes(&mut self, nodes: &mut [DirectiveNode], issues: &mut Vec<ParseIssue>) {
        for node in nodes {
            if node.name == "include" && !node.is_block() {
                self.resolve_include(node, issues);
            } else if let Some(children) = &mut node.children {
                self.resolve_nodes(children, issues);
            }
        }
    }

    fn resolve_include(&mut self, node: &mut DirectiveNode, issues: &mut Vec<ParseIssue>) {
        let Some(pattern) = node.first_arg() else {
            return;
        };
        let full = self.base_dir.join(pattern);

        for file in expand(&full) {
            match file {
                Ok(file) => {
                    let idx = self.document_for(&file);
                    if !node.includes.contains(&idx) {
                        node.includes.push(idx);
                    }
                }
                Err(message) => issues.push(ParseIssue {
                    line: None,
                    offset: None,
                    message,
                }),
            }
        }
    }

    /// Index of the document for `file`, parsing it on first sight
    fn document_for(&mut self, file: &Path) -> usize {
        if let Some(&idx) = self.index.get(file) {
            return idx;
        }
        let doc = match std::fs::read_to_string(file) {
            Ok(source) => parse_document(file, &source),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Cannot read included file");
                ConfigDocument::failed(
                    file,
                    vec![ParseIssue {
                        line: None,
                        offset: None,
                        message: format!("cannot read {}: {}", file.display(), e),
                    }],
                )
            }
        };
        let idx = self.documents.len();
        self.documents.push(doc);
        self.index.insert(file.to_path_buf(), idx);
        idx
    }
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Files an include pattern names, sorted; a literal path must exist
fn expand(full: &Path) -> Vec<Result<PathBuf, String>> {
    let pattern = full.to_string_lossy();
    if !has_glob_chars(&pattern) {
        return if full.exists() {
            vec![Ok(full.to_path_buf())]
        } else {
            vec![Err(format!("include file not found: {}", full.display()))]
        };
    }

    match glob::glob(&pattern) {
        Ok(paths) => paths
            .map(|entry| entry.map_err(|e| e.to_string()))
            .filter(|entry| entry.as_ref().map_or(true, |p| p.is_file()))
            .collect(),
        Err(e) => vec![Err(format!("invalid include pattern {}: {}", pattern, e))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_detection() {
        assert!(has_glob_chars("conf.d/*.conf"));
        assert!(has_glob_chars("site?.conf"));
        assert!(!has_glob_chars("mime.types"));
    }

    #[test]
    fn test_parse_document_failure_carries_line() {
        let doc = parse_document(Path::new("/x.conf"), "http {\n    listen 80\n}\n");
        assert!(!doc.is_ok());
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].line, Some(3));
        assert!(doc.directives.is_empty());
    }

    #[test]
    fn test_parse_document_sets_source() {
        let doc = parse_document(Path::new("/x.conf"), "http { server { } }");
        let server = &doc.directives[0].children()[0];
        assert_eq!(server.source_file.as_deref(), Some(Path::new("/x.conf")));
    }
}
