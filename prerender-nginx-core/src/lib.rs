//! Prerender nginx Core Library
//!
//! This crate edits an in-memory nginx directive tree to route crawler
//! traffic through Prerender.io, and keeps file-level backups so every
//! modified file can be returned to its previous content.
//!
//! Parsing and serializing configuration text lives in
//! `prerender-nginx-config`; this crate only sees [`ConfigSet`]s and file
//! paths.

pub mod backup;
pub mod config;
pub mod error;
pub mod installer;
pub mod locator;
pub mod patch;
pub mod tree;

pub use error::{Error, Result};
pub use installer::{ConfigWriter, InstallReport, InstallRequest, Installer, RestoreReport};
pub use locator::{DiscoveredServer, ServerIdentity, ServerRef};
pub use tree::{ConfigDocument, ConfigSet, DirectiveNode, ParseIssue, ParseStatus};

/// Installer version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
