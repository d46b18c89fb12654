//! Transformation orchestrator
//!
//! Sequences server discovery, backups, patches and serialization for one
//! run, and owns the rollback path when something fails after the tree
//! started changing.

use crate::backup::{self, BackupManager, BackupSlot};
use crate::error::{Error, Result};
use crate::locator::{
    discover_servers, find_location_block, http_scope_mut, DiscoveredServer, ServerIdentity,
};
use crate::patch::{add_map_section, add_prerender_location, rewrite_root_location};
use crate::tree::{ConfigDocument, ConfigSet};
use std::io;
use std::path::{Path, PathBuf};

/// Serializes a document back to its file
///
/// Implemented by the configuration crate's builder; tests use in-memory
/// writers.
pub trait ConfigWriter {
    fn write(&self, doc: &ConfigDocument) -> io::Result<()>;
}

/// Parameters of one installation run
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// 1-based server block index; `None` auto-selects a single server
    pub selection: Option<usize>,
    /// Prerender token written into the proxy location
    pub token: &'a str,
}

/// What an installation run changed
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub server: ServerIdentity,
    /// One slot per modified file, main configuration first
    pub files: Vec<BackupSlot>,
}

/// Outcome of restoring pending backups
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Pick a server by 1-based index, or the only one when no index is given
pub fn select_server(servers: &[DiscoveredServer], selection: Option<usize>) -> Result<&DiscoveredServer> {
    if servers.is_empty() {
        return Err(Error::NotFound("no server blocks found in the nginx configuration".to_string()));
    }
    let index = match selection {
        Some(index) => index,
        None if servers.len() == 1 => 1,
        None => {
            return Err(Error::AmbiguousSelection {
                index: 0,
                available: servers.len(),
            })
        }
    };
    index
        .checked_sub(1)
        .and_then(|i| servers.get(i))
        .ok_or(Error::AmbiguousSelection {
            index,
            available: servers.len(),
        })
}

/// Runs the patch pipeline against a configuration set
pub struct Installer<W> {
    writer: W,
}

impl<W: ConfigWriter> Installer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Install the prerender integration into `set`
    ///
    /// On error the files on disk are either untouched or restored from
    /// their backups; if restoring fails the error is
    /// [`Error::RollbackFailed`].
    pub fn install(&self, set: &mut ConfigSet, request: InstallRequest<'_>) -> Result<InstallReport> {
        let main = set
            .main()
            .ok_or_else(|| Error::NotFound("main configuration document".to_string()))?;
        if !main.is_ok() {
            return Err(Error::ParseSkipped {
                path: main.path.clone(),
                errors: main.errors.iter().map(ToString::to_string).collect(),
            });
        }
        if request.token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        let servers = discover_servers(set);
        let chosen = select_server(&servers, request.selection)?.clone();
        tracing::info!(
            server = %chosen.identity,
            file = %chosen.identity.owner.display(),
            "Selected server configuration"
        );

        // `location /` must exist before any backup is taken
        let server = set
            .get(chosen.server.document)
            .and_then(|doc| doc.node(&chosen.server.path))
            .ok_or_else(|| Error::NotFound("selected server block".to_string()))?;
        find_location_block(server, "/")?;

        let mut targets = vec![main.path.clone()];
        if chosen.identity.owner != main.path {
            targets.push(chosen.identity.owner.clone());
        }

        let mut backups = BackupManager::prepare(&targets)?;
        backups.verify()?;
        backups.mark_modified()?;

        match self.apply(set, &chosen, request.token, &targets) {
            Ok(()) => {
                backups.keep_all();
                Ok(InstallReport {
                    server: chosen.identity,
                    files: backups.slots().to_vec(),
                })
            }
            Err(cause) => {
                tracing::error!(error = %cause, "Modification failed, rolling back");
                let failures = backups.restore_all();
                if failures.is_empty() {
                    Err(cause)
                } else {
                    Err(Error::RollbackFailed {
                        cause: Box::new(cause),
                        failures,
                    })
                }
            }
        }
    }

    fn apply(&self, set: &mut ConfigSet, chosen: &DiscoveredServer, token: &str, targets: &[PathBuf]) -> Result<()> {
        let server = set
            .documents
            .get_mut(chosen.server.document)
            .and_then(|doc| doc.node_mut(&chosen.server.path))
            .ok_or_else(|| Error::NotFound("selected server block".to_string()))?;

        rewrite_root_location(server)?;
        add_prerender_location(server, token)?;

        let main = set
            .main_mut()
            .ok_or_else(|| Error::NotFound("main configuration document".to_string()))?;
        add_map_section(http_scope_mut(main));

        for target in targets {
            let doc = find_document(set, target)?;
            self.writer.write(doc).map_err(|e| Error::io(target, e))?;
            tracing::info!(file = %target.display(), "Modified configuration saved");
        }
        Ok(())
    }
}

fn find_document<'a>(set: &'a ConfigSet, path: &Path) -> Result<&'a ConfigDocument> {
    set.position(path)
        .and_then(|idx| set.get(idx))
        .ok_or_else(|| Error::NotFound(format!("document for {}", path.display())))
}

/// Restore every file among `paths` that has a pending backup
pub fn restore_pending(paths: &[PathBuf]) -> RestoreReport {
    let mut report = RestoreReport::default();
    for target in backup::pending(paths) {
        let mut slot = BackupSlot::new(&target);
        match slot.restore() {
            Ok(()) => report.restored.push(target),
            Err(Error::Io { source, .. }) => report.failed.push((target, source)),
            Err(e) => report.failed.push((target, io::Error::other(e.to_string()))),
        }
    }
    if !report.restored.is_empty() && !report.failed.is_empty() {
        tracing::warn!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "Only part of the configuration was restored"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DirectiveNode;

    fn discovered(name: &str) -> DiscoveredServer {
        DiscoveredServer {
            server: crate::locator::ServerRef {
                document: 0,
                path: vec![0],
            },
            identity: ServerIdentity {
                server_name: Some(name.to_string()),
                listen: None,
                owner: Path::new("/etc/nginx/nginx.conf").to_path_buf(),
            },
        }
    }

    #[test]
    fn test_select_single_server_automatically() {
        let servers = vec![discovered("a")];
        assert_eq!(select_server(&servers, None).unwrap().identity.server_name.as_deref(), Some("a"));
    }

    #[test]
    fn test_select_by_index() {
        let servers = vec![discovered("a"), discovered("b")];
        assert_eq!(select_server(&servers, Some(2)).unwrap().identity.server_name.as_deref(), Some("b"));
        assert!(matches!(
            select_server(&servers, Some(3)),
            Err(Error::AmbiguousSelection { index: 3, available: 2 })
        ));
        assert!(matches!(
            select_server(&servers, Some(0)),
            Err(Error::AmbiguousSelection { index: 0, available: 2 })
        ));
        assert!(matches!(select_server(&servers, None), Err(Error::AmbiguousSelection { .. })));
    }

    #[test]
    fn test_select_without_servers() {
        assert!(matches!(select_server(&[], Some(1)), Err(Error::NotFound(_))));
    }

    struct NullWriter;

    impl ConfigWriter for NullWriter {
        fn write(&self, _doc: &ConfigDocument) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_token_touches_nothing() {
        let mut set = ConfigSet::new(vec![ConfigDocument::new(
            "/nonexistent/nginx.conf",
            vec![DirectiveNode::section("server", vec![])],
        )]);
        let before = set.clone();
        let err = Installer::new(NullWriter)
            .install(&mut set, InstallRequest { selection: None, token: " " })
            .unwrap_err();
        assert!(matches!(err, Error::MissingToken));
        assert_eq!(set, before);
    }

    #[test]
    fn test_main_parse_error_is_fatal() {
        let mut set = ConfigSet::new(vec![ConfigDocument::failed("/etc/nginx/nginx.conf", vec![])]);
        let err = Installer::new(NullWriter)
            .install(&mut set, InstallRequest { selection: None, token: "tok" })
            .unwrap_err();
        assert!(matches!(err, Error::ParseSkipped { .. }));
    }
}
