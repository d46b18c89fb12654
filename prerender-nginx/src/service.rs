//! nginx service control

use anyhow::{bail, Context};
use std::process::Command;

/// Run the configured reload command, failing on a non-zero exit
pub fn reload(command: &[String]) -> anyhow::Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("no reload command configured");
    };
    tracing::info!("Reloading nginx service, you may be prompted for your sudo password...");
    tracing::debug!(command = %command.join(" "), "Running reload command");

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to run `{}`", command.join(" ")))?;
    if !status.success() {
        bail!("`{}` exited with {}", command.join(" "), status);
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reload_status() {
        assert!(reload(&cmd(&["true"])).is_ok());
        assert!(reload(&cmd(&["false"])).is_err());
        assert!(reload(&[]).is_err());
        assert!(reload(&cmd(&["/nonexistent/reload-nginx"])).is_err());
    }
}
