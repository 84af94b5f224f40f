//! ScriptRunner: an interactive runner for `package.json` scripts.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, loads configuration, and then either lists scripts, runs one
//! directly, or starts the interactive menu session.

mod clipboard;
mod config;
mod error;
mod favorites;
mod history;
mod launcher;
mod manifest;
mod menu;
mod output;
mod prompt;
mod registry;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod ui;
mod workspace;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::RunnerError;
use crate::favorites::Favorites;
use crate::history::{History, DEFAULT_HISTORY_LIMIT};
use crate::launcher::{PackageManager, SystemLauncher};
use crate::manifest::{ManifestSource, PackageJsonSource};
use crate::output::MAX_LOG_LINES;
use crate::prompt::TerminalPrompter;
use crate::session::{Project, Session, SessionOptions};
use crate::workspace::{FsWorkspaceLocator, WorkspaceLocator};

/// Environment variable holding the log filter; `RUST_LOG` is the fallback.
const LOG_ENV: &str = "SCRIPTRUNNER_LOG";
/// Exit status after Ctrl+C in a menu.
const INTERRUPTED_EXIT: u8 = 130;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "scriptrunner",
    about = "Interactive runner for package.json scripts",
    styles = help_styles(),
    color = clap::ColorChoice::Auto,
    disable_version_flag = true,
    after_help = "Examples:\n  scriptrunner              Interactive mode in the current directory\n  scriptrunner dev          Run the 'dev' script directly\n  scriptrunner -d ./myapp   Use a different directory\n  scriptrunner -l           List available scripts"
)]
struct Cli {
    /// Script to run directly, skipping the menus.
    script: Option<String>,
    /// Project directory (defaults to the current directory).
    #[arg(short, long, value_name = "PATH")]
    directory: Option<PathBuf>,
    /// List scripts without running anything.
    #[arg(short, long)]
    list: bool,
    /// Print version.
    #[arg(short = 'v', long = "version")]
    version: bool,
    /// Path to a config.toml to use instead of the per-user one.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Ignore any config.toml.
    #[arg(long)]
    no_config: bool,
    /// Max log lines kept per background script.
    #[arg(long)]
    max_lines: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version {
        println!("ScriptRunner v{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }
    init_tracing();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => match err.downcast_ref::<RunnerError>() {
            Some(RunnerError::Interrupted) => {
                ui::show_info("Interrupted. Background scripts keep running.");
                ExitCode::from(INTERRUPTED_EXIT)
            }
            _ => {
                ui::show_error(&format!("{err:#}"));
                ExitCode::FAILURE
            }
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(&cli)?;
    let directory = resolve_directory(cli.directory.as_deref())?;
    let manifests = PackageJsonSource;
    let manifest = manifests.load(&directory)?;
    if manifest.scripts.is_empty() {
        return Err(RunnerError::NoScripts { path: directory }.into());
    }
    debug!(
        project = %manifest.project_name(),
        version = %manifest.version,
        scripts = manifest.scripts.len(),
        "loaded manifest"
    );
    let project = Project::from_manifest(manifest, &directory);

    if cli.list {
        ui::list_scripts(&project.name, &project.scripts);
        return Ok(ExitCode::SUCCESS);
    }

    let history = History::new(&settings.config_dir, settings.history_limit);

    if let Some(script) = cli.script.as_deref() {
        let code = session::run_direct(
            &SystemLauncher,
            &history,
            &project,
            script,
            settings.package_manager,
        )
        .await?;
        return Ok(exit_code(code));
    }

    let locator = FsWorkspaceLocator::new(PackageJsonSource);
    let workspaces = locator
        .detect(&directory)
        .map(|config| locator.find(&config))
        .filter(|found| !found.is_empty());

    let mut session = Session::new(
        TerminalPrompter::new(settings.symbols),
        Arc::new(SystemLauncher),
        Box::new(PackageJsonSource),
        history,
        Favorites::new(&settings.config_dir),
        settings.session_options(),
        project,
    );
    if let Some(workspaces) = workspaces {
        debug!(count = workspaces.len(), "monorepo detected");
        session = session.with_workspaces(workspaces);
    }
    session.run().await?;
    Ok(ExitCode::SUCCESS)
}

fn resolve_directory(directory: Option<&Path>) -> Result<PathBuf> {
    let directory = match directory {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    std::fs::canonicalize(&directory)
        .with_context(|| format!("directory {} does not exist", directory.display()))
}

fn exit_code(code: Option<i32>) -> ExitCode {
    ExitCode::from(exit_status(code))
}

/// Maps a script's exit status onto ours; signal deaths count as failure.
fn exit_status(code: Option<i32>) -> u8 {
    match code.map(u8::try_from) {
        Some(Ok(code)) => code,
        _ => 1,
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Cyan.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

/// Runtime settings collected from CLI + config.
#[derive(Debug, Clone)]
struct Settings {
    config_dir: PathBuf,
    max_log_lines: usize,
    history_limit: usize,
    recent_limit: usize,
    log_view_lines: usize,
    package_manager: Option<PackageManager>,
    symbols: bool,
}

impl Settings {
    fn load(cli: &Cli) -> Result<Self> {
        let config_dir = config::config_dir();
        let config = if cli.no_config {
            Config::default()
        } else if let Some(path) = &cli.config {
            config::load_config(path)?
        } else {
            config::load_default_config(&config_dir)?
        };
        Ok(Self::from_cli(cli, config, config_dir))
    }

    fn from_cli(cli: &Cli, config: Config, config_dir: PathBuf) -> Self {
        const DEFAULT_RECENT_LIMIT: usize = 5;
        const DEFAULT_LOG_VIEW_LINES: usize = 30;
        Self {
            config_dir,
            max_log_lines: cli
                .max_lines
                .or(config.max_log_lines)
                .unwrap_or(MAX_LOG_LINES),
            history_limit: config.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            recent_limit: config.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT),
            log_view_lines: config.log_view_lines.unwrap_or(DEFAULT_LOG_VIEW_LINES),
            package_manager: config.package_manager,
            symbols: config.symbols.unwrap_or(true),
        }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            recent_limit: self.recent_limit,
            log_view_lines: self.log_view_lines,
            max_log_lines: self.max_log_lines,
            package_manager: self.package_manager,
            symbols: self.symbols,
        }
    }
}
