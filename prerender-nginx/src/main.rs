//! prerender-nginx - installs the Prerender.io integration into nginx
//!
//! This is the main entry point for the prerender-nginx CLI.

mod prefs;
mod prompt;
mod service;
mod site;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prefs::PrefsStore;
use prerender_nginx_config::{render_issue, FileWriter};
use prerender_nginx_core::backup::{self, backup_path_for};
use prerender_nginx_core::config::{ConfigLoader, InstallerConfig};
use prerender_nginx_core::installer::restore_pending;
use prerender_nginx_core::locator::discover_servers;
use prerender_nginx_core::{ConfigSet, Error, InstallRequest, Installer};
use prompt::Prompter;
use site::SiteChecker;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// prerender-nginx - route crawler traffic through Prerender.io
#[derive(Parser)]
#[command(name = "prerender-nginx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Installer configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the Prerender integration to an nginx server block
    Install {
        /// Path to the main nginx configuration file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Prerender token
        #[arg(short, long)]
        token: Option<String>,

        /// URL of the site to integrate
        #[arg(short, long)]
        url: Option<String>,

        /// 1-based index of the server block to modify
        #[arg(short, long)]
        server: Option<usize>,

        /// Answer yes to every question
        #[arg(short, long)]
        yes: bool,
    },

    /// Restore nginx configuration files from their backups
    Restore {
        /// Path to the main nginx configuration file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List the server blocks found in the configuration
    Servers {
        /// Path to the main nginx configuration file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Check whether a site is reachable and already integrated
    Check {
        /// URL of the site
        #[arg(short, long)]
        url: String,
    },

    /// Show version information
    Version,
}

/// Shared state for every subcommand
struct App {
    config: InstallerConfig,
    prefs: PrefsStore,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::load_or_default(default_config_path())?,
    };
    init_logging(cli.verbose, &config.log_file);

    tracing::debug!(version = prerender_nginx_core::VERSION, "Starting prerender-nginx");
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let prefs = PrefsStore::new(
        config
            .state_file
            .clone()
            .unwrap_or_else(PrefsStore::default_path),
    );
    let ctx = App { config, prefs };

    match cli.command {
        Commands::Install {
            file,
            token,
            url,
            server,
            yes,
        } => run_install(
            &ctx,
            InstallArgs {
                file,
                token,
                url,
                server,
            },
            Prompter::new(yes),
        ),
        Commands::Restore { file } => run_restore(&ctx, file),
        Commands::Servers { file } => run_servers(&ctx, file),
        Commands::Check { url } => run_check(&ctx, &url),
        Commands::Version => {
            println!("prerender-nginx v{}", prerender_nginx_core::VERSION);
            Ok(())
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("prerender-nginx").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("prerender-nginx.toml"))
}

/// Console output at info (debug with `--verbose`, or `RUST_LOG`), and a
/// debug-level log file to attach to support requests
fn init_logging(verbose: bool, log_file: &Path) {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let file_layer = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(EnvFilter::new(
                    "info,prerender_nginx=debug,prerender_nginx_core=debug,prerender_nginx_config=debug",
                )),
        ),
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_file.display(), e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();
}

struct InstallArgs {
    file: Option<PathBuf>,
    token: Option<String>,
    url: Option<String>,
    server: Option<usize>,
}

fn run_install(ctx: &App, args: InstallArgs, prompt: Prompter) -> Result<()> {
    let Some(config_path) = resolve_config_path(ctx, args.file, prompt)? else {
        return Ok(());
    };
    ctx.prefs.update(|p| p.nginx_conf = Some(config_path.clone()));

    let mut set = load_config(&config_path)?;

    let pending = backup::pending(&set.paths());
    if !pending.is_empty() && !prompt.assume_yes() {
        for target in &pending {
            tracing::info!("Backup of {} found at {}", target.display(), backup_path_for(target).display());
        }
        if prompt.confirm("Do you want to restore the original nginx configuration?")? {
            return restore_and_reload(ctx, &pending);
        }
    }

    let checker = SiteChecker::new(&ctx.config.verify)?;
    let Some(site_url) = resolve_site_url(ctx, &checker, args.url, prompt)? else {
        return Ok(());
    };

    let servers = discover_servers(&set);
    if servers.is_empty() {
        bail!(Error::NotFound("no server blocks in the nginx configuration".to_string()));
    }
    tracing::info!("Following server configurations were found:");
    for (i, found) in servers.iter().enumerate() {
        tracing::info!("  {}. {}", i + 1, found.identity);
    }
    let selection = match args.server {
        Some(index) => Some(index),
        None if servers.len() == 1 => None,
        None => {
            let items: Vec<String> = servers.iter().map(|s| s.identity.to_string()).collect();
            Some(prompt.select("Which server do you want to integrate?", &items, "--server")? + 1)
        }
    };

    let token = resolve_token(ctx, args.token, prompt)?;

    if !prompt.confirm("Do you want to modify the nginx configuration?")? {
        tracing::info!("No modifications were made to the nginx configuration.");
        return Ok(());
    }

    let installer = Installer::new(FileWriter);
    let report = match installer.install(&mut set, InstallRequest { selection, token: &token }) {
        Ok(report) => report,
        Err(e @ Error::RollbackFailed { .. }) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
        Err(e) => {
            tracing::info!("No modifications were made to the nginx configuration.");
            return Err(e.into());
        }
    };
    tracing::info!("Selected server configuration: {}", report.server);
    for slot in &report.files {
        tracing::info!(
            "Modified {} (backup at {}{})",
            slot.target.display(),
            slot.backup.display(),
            if slot.created { "" } else { ", kept from an earlier run" }
        );
    }

    if let Err(e) = service::reload(&ctx.config.service.reload_command) {
        tracing::warn!(error = %e, "Reload failed");
        tracing::info!("Please reload the nginx service manually and re-run to verify the installation.");
        return Ok(());
    }

    if checker.check_integration(&site_url) {
        tracing::info!("Prerender integration successfully verified for {}", site_url);
        return Ok(());
    }

    tracing::info!(
        "Verification failed. Possible reasons include:\n\
         - Incorrect routing configuration.\n\
         - Firewall rules blocking access.\n\
         - Invalid Prerender token.\n\
         - Non-standard nginx configuration.\n\
         Please check your configuration and try again. If the issue persists, contact support \
         and attach {} to your request.\n\
         To retry verification, run the installer once again.",
        ctx.config.log_file.display()
    );
    if !prompt.assume_yes()
        && prompt.confirm("Do you want to restore the original nginx configuration?")?
    {
        let targets: Vec<PathBuf> = report.files.iter().map(|slot| slot.target.clone()).collect();
        return restore_and_reload(ctx, &targets);
    }
    Ok(())
}

/// Flag, remembered path, configured default, then ask; `None` if the user quits
fn resolve_config_path(
    ctx: &App,
    flag: Option<PathBuf>,
    prompt: Prompter,
) -> Result<Option<PathBuf>> {
    if let Some(path) = flag {
        return Ok(Some(path));
    }

    let remembered = ctx.prefs.load().nginx_conf;
    let configured = Some(ctx.config.nginx_conf.clone()).filter(|d| remembered.as_ref() != Some(d));
    for candidate in remembered.into_iter().chain(configured) {
        if candidate.exists()
            && prompt.confirm(&format!(
                "nginx configuration found at {}. Do you want to use it?",
                candidate.display()
            ))?
        {
            return Ok(Some(candidate));
        }
    }

    loop {
        let answer = prompt.text(
            "Path to the nginx configuration file (or 'exit' to quit)",
            "--file",
        )?;
        if answer.eq_ignore_ascii_case("exit") {
            return Ok(None);
        }
        let path = PathBuf::from(answer);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::info!("The file at {} does not exist. Please try again.", path.display());
    }
}

/// Ask until the site answers; `None` when it is already integrated
fn resolve_site_url(
    ctx: &App,
    checker: &SiteChecker,
    flag: Option<String>,
    prompt: Prompter,
) -> Result<Option<String>> {
    let mut url = match flag {
        Some(url) => Some(url),
        None => match ctx.prefs.load().site_url {
            Some(saved) if prompt.confirm(&format!("Do you want to integrate \"{}\"?", saved))? => {
                Some(saved)
            }
            _ => None,
        },
    };

    loop {
        let candidate = match url.take() {
            Some(url) => url,
            None => prompt.text(
                "URL of the site to integrate with Prerender.io (e.g. https://www.site.com)",
                "--url",
            )?,
        };
        tracing::info!("Checking if the site at {} is accessible...", candidate);
        if !checker.check_access(&candidate) {
            if prompt.assume_yes() {
                bail!("site {} is not reachable", candidate);
            }
            tracing::info!("The site at {} is not reachable.", candidate);
            continue;
        }
        if checker.check_integration(&candidate) {
            tracing::info!("Prerender integration exists for {}", candidate);
            return Ok(None);
        }
        ctx.prefs.update(|p| p.site_url = Some(candidate.clone()));
        return Ok(Some(candidate));
    }
}

/// Flag, remembered token, then ask
fn resolve_token(ctx: &App, flag: Option<String>, prompt: Prompter) -> Result<String> {
    let token = match flag {
        Some(token) => token,
        None => match ctx.prefs.load().token {
            Some(saved)
                if prompt.confirm(&format!(
                    "A saved Prerender token \"{}\" was found. Do you want to use it?",
                    saved
                ))? =>
            {
                saved
            }
            _ => prompt.text("Please enter your Prerender token", "--token")?,
        },
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!(Error::MissingToken);
    }
    ctx.prefs.update(|p| p.token = Some(token.clone()));
    Ok(token)
}

/// Parse `path` and its includes; an unparsable main file is fatal
fn load_config(path: &Path) -> Result<ConfigSet> {
    let set = prerender_nginx_config::load(path)?;
    let Some(main) = set.main() else {
        bail!("nothing loaded from {}", path.display());
    };
    if !main.is_ok() {
        let source = std::fs::read_to_string(path).unwrap_or_default();
        for issue in &main.errors {
            eprintln!("{}", render_issue(path, &source, issue, true));
        }
        bail!(Error::ParseSkipped {
            path: path.to_path_buf(),
            errors: main.errors.iter().map(ToString::to_string).collect(),
        });
    }
    tracing::info!("nginx configuration loaded successfully.");
    Ok(set)
}

fn restore_and_reload(ctx: &App, targets: &[PathBuf]) -> Result<()> {
    let report = restore_pending(targets);
    for path in &report.restored {
        tracing::info!("Restored {} from {}", path.display(), backup_path_for(path).display());
    }
    for (path, e) in &report.failed {
        tracing::error!("Could not restore {}: {}", path.display(), e);
    }
    if !report.is_complete() {
        bail!("restore incomplete, manual intervention required");
    }
    if report.restored.is_empty() {
        tracing::info!("No backups to restore.");
        return Ok(());
    }
    service::reload(&ctx.config.service.reload_command).context(
        "please reload the nginx service manually to complete the restore",
    )?;
    tracing::info!("Original nginx configuration restored successfully.");
    Ok(())
}

fn configured_path(ctx: &App, flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| ctx.prefs.load().nginx_conf)
        .unwrap_or_else(|| ctx.config.nginx_conf.clone())
}

fn run_restore(ctx: &App, file: Option<PathBuf>) -> Result<()> {
    let path = configured_path(ctx, file);
    // Restoring must work even when the modified file no longer parses
    let targets = match prerender_nginx_config::load(&path) {
        Ok(set) => set.paths(),
        Err(e) => {
            tracing::debug!(error = %e, "Falling back to the main file only");
            vec![path.clone()]
        }
    };
    restore_and_reload(ctx, &targets)
}

fn run_servers(ctx: &App, file: Option<PathBuf>) -> Result<()> {
    let path = configured_path(ctx, file);
    let set = load_config(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    for doc in set.documents.iter().filter(|d| !d.is_ok()) {
        tracing::warn!("Skipped {}: {}", doc.path.display(), doc.errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "));
    }
    let servers = discover_servers(&set);
    if servers.is_empty() {
        println!("No server blocks found in {}", path.display());
    }
    for (i, found) in servers.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, found.identity, found.identity.owner.display());
    }
    Ok(())
}

fn run_check(ctx: &App, url: &str) -> Result<()> {
    let checker = SiteChecker::new(&ctx.config.verify)?;
    if !checker.check_access(url) {
        bail!("site {} is not reachable", url);
    }
    println!("{} is reachable", url);
    if checker.check_integration(url) {
        println!("Prerender integration is active");
    } else {
        println!("Prerender integration not found");
    }
    Ok(())
}
