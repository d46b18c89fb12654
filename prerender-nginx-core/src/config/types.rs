//! Configuration type definitions
//!
//! These types describe how the installer itself runs: where the nginx
//! configuration lives, how the service is reloaded and how an installation
//! is verified.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the installer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallerConfig {
    /// Main nginx configuration file
    #[serde(default = "default_nginx_conf")]
    pub nginx_conf: PathBuf,

    /// File receiving the debug-level log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Where remembered answers (path, token, URL) are stored;
    /// `None` uses the platform config directory
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Service control
    #[serde(default)]
    pub service: ServiceConfig,

    /// Post-install verification
    #[serde(default)]
    pub verify: VerifyConfig,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            nginx_conf: default_nginx_conf(),
            log_file: default_log_file(),
            state_file: None,
            service: ServiceConfig::default(),
            verify: VerifyConfig::default(),
        }
    }
}

fn default_nginx_conf() -> PathBuf {
    PathBuf::from("/etc/nginx/nginx.conf")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("prerender.log")
}

/// Service control configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Command (program and arguments) that reloads nginx
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            reload_command: default_reload_command(),
        }
    }
}

fn default_reload_command() -> Vec<String> {
    ["sudo", "systemctl", "restart", "nginx"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Verification configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyConfig {
    /// User agent sent when checking that crawlers get prerendered pages
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    "Googlebot/2.1 (+http://www.google.com/bot.html)".to_string()
}

fn default_timeout() -> u64 {
    30
}
