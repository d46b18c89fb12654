//! Configuration loader

use crate::config::InstallerConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Configuration loader for the supported formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<InstallerConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown config format: {}", ext))),
        }
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<InstallerConfig> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No installer config file, using defaults");
            Ok(InstallerConfig::default())
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<InstallerConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<InstallerConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_json_loading() {
        let json = r#"{"nginx_conf": "/usr/local/nginx/conf/nginx.conf"}"#;
        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.nginx_conf, PathBuf::from("/usr/local/nginx/conf/nginx.conf"));
        assert_eq!(config.service.reload_command[0], "sudo");
    }

    #[test]
    fn test_toml_loading() {
        let toml = r#"
            log_file = "/var/log/prerender-nginx.log"

            [service]
            reload_command = ["nginx", "-s", "reload"]

            [verify]
            timeout_secs = 5
        "#;
        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.nginx_conf, PathBuf::from("/etc/nginx/nginx.conf"));
        assert_eq!(config.service.reload_command, vec!["nginx", "-s", "reload"]);
        assert_eq!(config.verify.timeout_secs, 5);
        assert!(config.verify.user_agent.starts_with("Googlebot"));
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installer.yaml");
        std::fs::write(&path, "nginx_conf: /x").unwrap();
        assert!(matches!(ConfigLoader::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, InstallerConfig::default());
    }
}
