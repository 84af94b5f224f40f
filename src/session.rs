//! The interactive session.
//!
//! The loop alternates between two top-level states, workspace selection
//! (monorepo only) and script selection. Execution options and background
//! process options are nested prompts that always return to the state that
//! opened them. Dead background processes are pruned right before each
//! top-level menu is built; nothing watches for exits in between.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clipboard;
use crate::error::{RunnerError, RunnerResult};
use crate::favorites::Favorites;
use crate::history::History;
use crate::launcher::{Invocation, PackageManager, ProcessLauncher};
use crate::manifest::{Manifest, ManifestSource, Scripts};
use crate::menu::{
    self, BackgroundItem, ExecOption, MenuSelection, ProcessOption, ScriptMenuInput,
};
use crate::output::LogBuffer;
use crate::prompt::Prompter;
use crate::registry::{BackgroundRef, BackgroundRegistry};
use crate::ui::{self, Glyphs};
use crate::workspace::WorkspaceDescriptor;

/// A directory whose scripts can be run.
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub directory: PathBuf,
    pub scripts: Scripts,
    /// Set when the project is a workspace of a monorepo.
    pub workspace: Option<String>,
}

impl Project {
    pub fn from_manifest(manifest: Manifest, directory: &Path) -> Self {
        Self {
            name: manifest.project_name().to_string(),
            directory: directory.to_path_buf(),
            scripts: manifest.scripts,
            workspace: None,
        }
    }

    fn from_workspace(root_name: &str, workspace: &WorkspaceDescriptor) -> Self {
        Self {
            name: root_name.to_string(),
            directory: workspace.path.clone(),
            scripts: workspace.scripts.clone(),
            workspace: Some(workspace.name.clone()),
        }
    }

    /// Name recorded in history and favorites.
    fn record_name(&self) -> &str {
        self.workspace.as_deref().unwrap_or(&self.name)
    }
}

/// Tunables resolved from CLI flags and the config file.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub recent_limit: usize,
    pub log_view_lines: usize,
    pub max_log_lines: usize,
    pub package_manager: Option<PackageManager>,
    pub symbols: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recent_limit: 5,
            log_view_lines: 30,
            max_log_lines: crate::output::MAX_LOG_LINES,
            package_manager: None,
            symbols: true,
        }
    }
}

/// Resolves the invocation for `script` in `directory`.
pub fn invocation_for(
    manager: Option<PackageManager>,
    directory: &Path,
    script: &str,
) -> (PackageManager, Invocation) {
    let manager = manager.unwrap_or_else(|| PackageManager::detect(directory));
    (manager, manager.invocation(script))
}

/// Runs one script in the foreground without any menus.
///
/// History is only written once the script is known to exist.
pub async fn run_direct<L: ProcessLauncher>(
    launcher: &L,
    history: &History,
    project: &Project,
    script: &str,
    manager: Option<PackageManager>,
) -> RunnerResult<Option<i32>> {
    if !project.scripts.contains(script) {
        return Err(RunnerError::ScriptNotFound {
            name: script.to_string(),
        });
    }
    history.record(script, &project.directory, project.record_name());
    let (manager, invocation) = invocation_for(manager, &project.directory, script);
    ui::show_run_banner(script, manager);
    launcher.run_foreground(&invocation, &project.directory).await
}

fn describe_error(err: &RunnerError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WorkspaceSelect,
    ScriptSelect,
    Exit,
}

enum Notice {
    Success(String),
    Error(String),
    Warning(String),
}

pub struct Session<P, L> {
    prompter: P,
    launcher: Arc<L>,
    manifests: Box<dyn ManifestSource>,
    registry: BackgroundRegistry<L>,
    history: History,
    favorites: Favorites,
    options: SessionOptions,
    glyphs: Glyphs,
    root: Project,
    workspaces: Option<Vec<WorkspaceDescriptor>>,
    current: Project,
    needs_refresh: bool,
    notices: Vec<Notice>,
}

impl<P: Prompter, L: ProcessLauncher> Session<P, L> {
    pub fn new(
        prompter: P,
        launcher: Arc<L>,
        manifests: Box<dyn ManifestSource>,
        history: History,
        favorites: Favorites,
        options: SessionOptions,
        root: Project,
    ) -> Self {
        Self {
            prompter,
            registry: BackgroundRegistry::new(Arc::clone(&launcher), options.max_log_lines),
            launcher,
            manifests,
            history,
            favorites,
            glyphs: Glyphs::new(options.symbols),
            options,
            current: root.clone(),
            root,
            workspaces: None,
            needs_refresh: false,
            notices: Vec::new(),
        }
    }

    /// Switches the session to monorepo mode, starting at workspace selection.
    pub fn with_workspaces(mut self, workspaces: Vec<WorkspaceDescriptor>) -> Self {
        self.workspaces = Some(workspaces);
        self
    }

    pub fn registry(&self) -> &BackgroundRegistry<L> {
        &self.registry
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Runs the loop until the user exits. A prompt interrupted with Ctrl+C
    /// surfaces as [`RunnerError::Interrupted`].
    pub async fn run(&mut self) -> RunnerResult<()> {
        ui::show_header(&self.root.name, None);
        let mut state = if self.workspaces.is_some() {
            State::WorkspaceSelect
        } else {
            State::ScriptSelect
        };

        while state != State::Exit {
            self.registry.prune();
            self.redraw();
            state = match state {
                State::WorkspaceSelect => self.select_workspace().await?,
                State::ScriptSelect => self.select_script().await?,
                State::Exit => State::Exit,
            };
        }

        self.registry.prune();
        if !self.registry.is_empty() {
            ui::show_info(&format!(
                "{} background process(es) will keep running.",
                self.registry.len()
            ));
        }
        ui::show_success("See you!");
        Ok(())
    }

    async fn select_workspace(&mut self) -> RunnerResult<State> {
        let workspaces = self.workspaces.clone().unwrap_or_default();
        let favorites = self.favorites.all();
        let background = self.background_items();
        let menu = menu::workspace_menu(
            &self.root.name,
            &workspaces,
            &favorites,
            &background,
            &self.glyphs,
        );

        let next = match menu.ask(&mut self.prompter)? {
            MenuSelection::Exit => State::Exit,
            MenuSelection::Root => {
                self.current = self.root.clone();
                self.needs_refresh = true;
                State::ScriptSelect
            }
            MenuSelection::Workspace(idx) => match workspaces.get(idx) {
                Some(workspace) if workspace.scripts.is_empty() => {
                    self.notices.push(Notice::Warning(format!(
                        "Workspace \"{}\" has no scripts",
                        workspace.name
                    )));
                    State::WorkspaceSelect
                }
                Some(workspace) => {
                    debug!(workspace = %workspace.name, "entering workspace");
                    self.current = Project::from_workspace(&self.root.name, workspace);
                    self.needs_refresh = true;
                    State::ScriptSelect
                }
                None => State::WorkspaceSelect,
            },
            MenuSelection::Favorite(favorite) => {
                let directory = PathBuf::from(&favorite.directory);
                match self.project_at(&directory) {
                    Some(project) if project.scripts.contains(&favorite.script) => {
                        self.execution_options(&project, &favorite.script).await?;
                    }
                    _ => self.notices.push(Notice::Warning(format!(
                        "Script \"{}\" is no longer available in {}",
                        favorite.script, favorite.directory
                    ))),
                }
                self.needs_refresh = true;
                State::WorkspaceSelect
            }
            MenuSelection::Background(reference) => {
                self.process_options(reference)?;
                State::WorkspaceSelect
            }
            MenuSelection::Script(_) | MenuSelection::BackToWorkspaces => State::WorkspaceSelect,
        };
        Ok(next)
    }

    async fn select_script(&mut self) -> RunnerResult<State> {
        let favorites = self.favorites.for_directory(&self.current.directory);
        let recent = self
            .history
            .recent(&self.current.directory, self.options.recent_limit);
        let background = self.background_items();
        let menu = menu::script_menu(
            &ScriptMenuInput {
                scripts: &self.current.scripts,
                favorites: &favorites,
                recent: &recent,
                background: &background,
                monorepo: self.workspaces.is_some(),
            },
            &self.glyphs,
        );

        let next = match menu.ask(&mut self.prompter)? {
            MenuSelection::Exit => State::Exit,
            MenuSelection::BackToWorkspaces => {
                self.current = self.root.clone();
                self.needs_refresh = true;
                State::WorkspaceSelect
            }
            MenuSelection::Script(name) => {
                let project = self.current.clone();
                self.execution_options(&project, &name).await?;
                State::ScriptSelect
            }
            MenuSelection::Background(reference) => {
                self.process_options(reference)?;
                State::ScriptSelect
            }
            MenuSelection::Favorite(_) | MenuSelection::Workspace(_) | MenuSelection::Root => {
                State::ScriptSelect
            }
        };
        Ok(next)
    }

    async fn execution_options(&mut self, project: &Project, script: &str) -> RunnerResult<()> {
        let is_favorite = self.favorites.is_favorite(script, &project.directory);
        let option =
            menu::execution_menu(script, is_favorite, &self.glyphs).ask(&mut self.prompter)?;
        let (manager, invocation) =
            invocation_for(self.options.package_manager, &project.directory, script);

        match option {
            ExecOption::Back => {}
            ExecOption::Favorite => {
                let added = self
                    .favorites
                    .toggle(script, &project.directory, project.record_name());
                let message = if added {
                    format!("\"{script}\" added to favorites")
                } else {
                    format!("\"{script}\" removed from favorites")
                };
                self.notices.push(Notice::Success(message));
            }
            ExecOption::Interactive => {
                self.history
                    .record(script, &project.directory, project.record_name());
                ui::show_run_banner(script, manager);
                let code = self
                    .launcher
                    .run_foreground(&invocation, &project.directory)
                    .await?;
                let (ok, message) = ui::run_outcome(script, code);
                self.notices.push(if ok {
                    Notice::Success(message)
                } else {
                    Notice::Error(message)
                });
            }
            ExecOption::Background => {
                self.history
                    .record(script, &project.directory, project.record_name());
                match self.registry.launch(
                    script,
                    &invocation,
                    &project.directory,
                    project.workspace.clone(),
                ) {
                    Ok(process) => self.notices.push(Notice::Success(format!(
                        "\"{script}\" started in background (PID: {})",
                        process.pid
                    ))),
                    Err(err) => {
                        warn!(script, error = %err, "background launch failed");
                        self.notices.push(Notice::Error(describe_error(&err)));
                    }
                }
            }
            ExecOption::Copy => {
                let command = invocation.display();
                match clipboard::copy_text(&command) {
                    Ok(()) => self
                        .notices
                        .push(Notice::Success(format!("Command copied: {command}"))),
                    Err(err) => {
                        debug!(error = %err, "clipboard copy failed");
                        self.notices.push(Notice::Error(format!(
                            "Failed to copy to clipboard. Command: {command}"
                        )));
                    }
                }
            }
        }
        self.needs_refresh = true;
        Ok(())
    }

    fn process_options(&mut self, reference: BackgroundRef) -> RunnerResult<()> {
        // The process may have exited since the menu was drawn.
        let (name, pid, log_count) = match self.registry.find(reference.pid) {
            Some(process) => (process.name.clone(), process.pid, process.log_count()),
            None => (reference.name.clone(), reference.pid, 0),
        };

        match menu::process_menu(&name, pid, log_count, &self.glyphs).ask(&mut self.prompter)? {
            ProcessOption::Logs => {
                let (logs, started_at) = match self.registry.find(pid) {
                    Some(process) => (process.logs(), Some(process.started_at)),
                    None => (LogBuffer::new(1), None),
                };
                ui::show_logs(&name, pid, started_at, &logs, self.options.log_view_lines);
                menu::back_menu().ask(&mut self.prompter)?;
            }
            ProcessOption::Kill => {
                if self.registry.kill(pid) {
                    self.registry.remove(pid);
                    info!(script = %name, pid, "killed background script");
                }
            }
            ProcessOption::Back => {}
        }
        self.needs_refresh = true;
        Ok(())
    }

    fn background_items(&self) -> Vec<BackgroundItem> {
        self.registry
            .iter()
            .map(|process| BackgroundItem {
                reference: process.reference(),
                workspace: process.workspace.clone(),
            })
            .collect()
    }

    /// Root, a known workspace, or any other directory holding a manifest.
    fn project_at(&self, directory: &Path) -> Option<Project> {
        if directory == self.root.directory {
            return Some(self.root.clone());
        }
        if let Some(workspace) = self
            .workspaces
            .iter()
            .flatten()
            .find(|ws| ws.path == directory)
        {
            return Some(Project::from_workspace(&self.root.name, workspace));
        }
        match self.manifests.load(directory) {
            Ok(manifest) => Some(Project::from_manifest(manifest, directory)),
            Err(err) => {
                debug!(
                    directory = %directory.display(),
                    error = %err,
                    "favorite directory unreadable"
                );
                None
            }
        }
    }

    /// Workspace shown in the header, if one is selected.
    fn location(&self) -> Option<&str> {
        self.current.workspace.as_deref()
    }

    fn redraw(&mut self) {
        if self.needs_refresh {
            ui::clear_screen();
            ui::show_header(&self.root.name, self.location());
            self.needs_refresh = false;
        }
        for notice in self.notices.drain(..) {
            match notice {
                Notice::Success(message) => ui::show_success(&message),
                Notice::Error(message) => ui::show_error(&message),
                Notice::Warning(message) => ui::show_warning(&message),
            }
        }
    }
}
