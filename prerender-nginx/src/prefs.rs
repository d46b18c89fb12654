//! Remembered answers between runs
//!
//! The last nginx configuration path, token and site URL are stored as
//! JSON so a rerun (to verify, or to restore) does not ask again.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nginx_conf: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

/// JSON file holding [`Prefs`]
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/prerender-nginx/state.json`, or a dotfile in the
    /// working directory when the platform has no config dir
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("prerender-nginx").join("state.json"))
            .unwrap_or_else(|| PathBuf::from(".prerender-nginx.json"))
    }

    /// Missing or unreadable state counts as empty
    pub fn load(&self) -> Prefs {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Prefs::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::debug!(path = %self.path.display(), error = %e, "Ignoring corrupt state file");
            Prefs::default()
        })
    }

    pub fn save(&self, prefs: &Prefs) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    /// Apply `change` and save; failures only matter for the next run
    pub fn update(&self, change: impl FnOnce(&mut Prefs)) {
        let mut prefs = self.load();
        change(&mut prefs);
        if let Err(e) = self.save(&prefs) {
            tracing::debug!(error = %e, "Could not save state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), Prefs::default());
    }

    #[test]
    fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::new(dir.path().join("nested").join("state.json"));
        store.update(|p| p.token = Some("abc".to_string()));
        store.update(|p| p.site_url = Some("https://example.com".to_string()));

        let prefs = store.load();
        assert_eq!(prefs.token.as_deref(), Some("abc"));
        assert_eq!(prefs.site_url.as_deref(), Some("https://example.com"));
        assert!(prefs.nginx_conf.is_none());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(PrefsStore::new(path).load(), Prefs::default());
    }
}
