//! Writing documents back to disk

use crate::builder::build;
use prerender_nginx_core::{ConfigDocument, ConfigWriter};
use std::io;

/// Serializes each document with [`build`] and overwrites its file
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter;

impl ConfigWriter for FileWriter {
    fn write(&self, doc: &ConfigDocument) -> io::Result<()> {
        tracing::debug!(path = %doc.path.display(), "Writing nginx configuration");
        std::fs::write(&doc.path, build(&doc.directives))
    }
}
