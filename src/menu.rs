//! Builders for every menu the session shows.
//!
//! Building is pure: callers pass in the scripts, favorites, recent runs and
//! live background processes, and get back a [`Menu`] whose choice values say
//! what was picked. Keys are stable and unstyled (`script:<name>`, `bg:<pid>`,
//! `exit`, ...) so that tests can drive the menus without parsing labels.

use std::collections::HashSet;

use crate::favorites::FavoriteRecord;
use crate::history::HistoryRecord;
use crate::manifest::{ScriptEntry, Scripts};
use crate::prompt::Menu;
use crate::registry::BackgroundRef;
use crate::ui::{self, Glyphs, Marker, OptionColor};
use crate::workspace::WorkspaceDescriptor;

/// What the user picked from a script or workspace menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuSelection {
    Exit,
    Script(String),
    Background(BackgroundRef),
    Favorite(FavoriteRecord),
    BackToWorkspaces,
    /// Index into the workspace list the menu was built from.
    Workspace(usize),
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOption {
    Interactive,
    Background,
    Copy,
    Favorite,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOption {
    Logs,
    Kill,
    Back,
}

/// A background process as shown in a menu.
#[derive(Debug, Clone)]
pub struct BackgroundItem {
    pub reference: BackgroundRef,
    pub workspace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RankedScript<'a> {
    pub entry: &'a ScriptEntry,
    pub marker: Marker,
}

/// Orders scripts as favorites, then recently run, then the rest; each tier
/// sorted by name.
///
/// `favorites` and `recent` must already be limited to the current directory.
pub fn rank_scripts<'a>(
    scripts: &'a Scripts,
    favorites: &[FavoriteRecord],
    recent: &[HistoryRecord],
) -> Vec<RankedScript<'a>> {
    let favorite: HashSet<&str> = favorites.iter().map(|f| f.script.as_str()).collect();
    let recent: HashSet<&str> = recent.iter().map(|r| r.script.as_str()).collect();

    let mut ranked: Vec<RankedScript<'a>> = scripts
        .iter()
        .map(|entry| {
            let marker = if favorite.contains(entry.name.as_str()) {
                Marker::Favorite
            } else if recent.contains(entry.name.as_str()) {
                Marker::Recent
            } else {
                Marker::None
            };
            RankedScript { entry, marker }
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.marker
            .cmp(&b.marker)
            .then_with(|| a.entry.name.cmp(&b.entry.name))
    });
    ranked
}

pub struct ScriptMenuInput<'a> {
    pub scripts: &'a Scripts,
    pub favorites: &'a [FavoriteRecord],
    pub recent: &'a [HistoryRecord],
    pub background: &'a [BackgroundItem],
    /// Adds "Back to workspaces" when running inside a monorepo.
    pub monorepo: bool,
}

pub fn script_menu(input: &ScriptMenuInput<'_>, glyphs: &Glyphs) -> Menu<MenuSelection> {
    let mut menu = Menu::new("Select script to run:");
    for ranked in rank_scripts(input.scripts, input.favorites, input.recent) {
        menu.push_choice(
            format!("script:{}", ranked.entry.name),
            ui::script_label(ranked.entry, ranked.marker, glyphs),
            MenuSelection::Script(ranked.entry.name.clone()),
        );
    }
    push_background(&mut menu, input.background, glyphs);
    menu.push_separator(glyphs.separator());
    if input.monorepo {
        menu.push_choice(
            "workspaces",
            ui::option_label(
                "Back to workspaces",
                "choose another package",
                OptionColor::Secondary,
                glyphs,
            ),
            MenuSelection::BackToWorkspaces,
        );
    }
    menu.push_choice("exit", ui::exit_label(), MenuSelection::Exit);
    menu
}

pub fn workspace_menu(
    root_name: &str,
    workspaces: &[WorkspaceDescriptor],
    favorites: &[FavoriteRecord],
    background: &[BackgroundItem],
    glyphs: &Glyphs,
) -> Menu<MenuSelection> {
    let mut menu = Menu::new("Select workspace:").choice(
        "root",
        ui::root_label(root_name, glyphs),
        MenuSelection::Root,
    );
    menu.push_separator(ui::section_label("Workspaces"));
    for (idx, workspace) in workspaces.iter().enumerate() {
        menu.push_choice(
            format!("workspace:{}", workspace.name),
            ui::workspace_label(workspace, glyphs),
            MenuSelection::Workspace(idx),
        );
    }
    if !favorites.is_empty() {
        menu.push_separator(ui::section_label("Favorites"));
        for favorite in favorites {
            menu.push_choice(
                format!("favorite:{}:{}", favorite.directory, favorite.script),
                ui::favorite_shortcut_label(favorite, glyphs),
                MenuSelection::Favorite(favorite.clone()),
            );
        }
    }
    push_background(&mut menu, background, glyphs);
    menu.separator(glyphs.separator())
        .choice("exit", ui::exit_label(), MenuSelection::Exit)
}

fn push_background(menu: &mut Menu<MenuSelection>, background: &[BackgroundItem], glyphs: &Glyphs) {
    if background.is_empty() {
        return;
    }
    menu.push_separator(glyphs.separator());
    for item in background {
        let BackgroundRef { pid, name } = &item.reference;
        menu.push_choice(
            format!("bg:{pid}"),
            ui::background_label(name, *pid, item.workspace.as_deref(), glyphs),
            MenuSelection::Background(item.reference.clone()),
        );
    }
}

pub fn execution_menu(script: &str, is_favorite: bool, glyphs: &Glyphs) -> Menu<ExecOption> {
    let favorite = if is_favorite {
        ui::option_label(
            &format!("{} Remove favorite", glyphs.favorite),
            "drop from favorites",
            OptionColor::Accent,
            glyphs,
        )
    } else {
        ui::option_label(
            &format!("{} Add favorite", glyphs.unfavorite),
            "pin to the top of the list",
            OptionColor::Accent,
            glyphs,
        )
    };
    Menu::new(format!("How do you want to run \"{}\"?", ui::highlight(script)))
        .choice(
            "interactive",
            ui::option_label(
                "Run (interactive)",
                "output visible, Ctrl+C to stop",
                OptionColor::Primary,
                glyphs,
            ),
            ExecOption::Interactive,
        )
        .choice(
            "background",
            ui::option_label(
                "Run (background)",
                "keeps running while you navigate",
                OptionColor::Secondary,
                glyphs,
            ),
            ExecOption::Background,
        )
        .choice(
            "copy",
            ui::option_label("Copy command", "copy to clipboard", OptionColor::Accent, glyphs),
            ExecOption::Copy,
        )
        .choice("favorite", favorite, ExecOption::Favorite)
        .separator(glyphs.separator())
        .choice("back", ui::back_label(), ExecOption::Back)
}

pub fn process_menu(
    name: &str,
    pid: u32,
    log_count: usize,
    glyphs: &Glyphs,
) -> Menu<ProcessOption> {
    Menu::new(format!("Process \"{name}\" (PID: {pid}):"))
        .choice(
            "logs",
            ui::option_label(
                "View logs",
                &format!("{log_count} line(s) captured"),
                OptionColor::Secondary,
                glyphs,
            ),
            ProcessOption::Logs,
        )
        .choice(
            "kill",
            ui::option_label("Kill process", "terminate the script", OptionColor::Danger, glyphs),
            ProcessOption::Kill,
        )
        .separator(glyphs.separator())
        .choice("back", ui::back_label(), ProcessOption::Back)
}

/// Single-choice menu closing a read-only view.
pub fn back_menu() -> Menu<()> {
    let mut menu = Menu::new("").choice("back", ui::back_label(), ());
    menu.wrap = false;
    menu
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn scripts(names: &[(&str, &str)]) -> Scripts {
        Scripts::new(names.iter().map(|(name, command)| ScriptEntry {
            name: name.to_string(),
            command: command.to_string(),
            description: None,
        }))
    }

    fn favorite(script: &str) -> FavoriteRecord {
        FavoriteRecord {
            script: script.to_string(),
            directory: "/p".to_string(),
            project_name: "p".to_string(),
            added_at: Utc::now(),
        }
    }

    fn recent(script: &str) -> HistoryRecord {
        HistoryRecord {
            script: script.to_string(),
            directory: "/p".to_string(),
            project_name: "p".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn names(ranked: &[RankedScript<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.entry.name.clone()).collect()
    }

    fn sample() -> Scripts {
        scripts(&[("build", "tsc"), ("test", "jest"), ("dev", "vite")])
    }

    #[test]
    fn plain_scripts_are_alphabetical() {
        let scripts = sample();
        assert_eq!(names(&rank_scripts(&scripts, &[], &[])), vec!["build", "dev", "test"]);
    }

    #[test]
    fn favorite_moves_to_front() {
        let scripts = sample();
        let ranked = rank_scripts(&scripts, &[favorite("test")], &[]);
        assert_eq!(names(&ranked), vec!["test", "build", "dev"]);
        assert_eq!(ranked[0].marker, Marker::Favorite);
        assert_eq!(ranked[1].marker, Marker::None);
    }

    #[test]
    fn recent_tier_is_alphabetical_not_by_recency() {
        let scripts = scripts(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")]);
        let history = [recent("d"), recent("b"), recent("e")];
        let ranked = rank_scripts(&scripts, &[favorite("e")], &history);
        assert_eq!(names(&ranked), vec!["e", "b", "d", "a", "c"]);
        let markers: Vec<_> = ranked.iter().map(|r| r.marker).collect();
        assert_eq!(
            markers,
            vec![Marker::Favorite, Marker::Recent, Marker::Recent, Marker::None, Marker::None]
        );
    }

    #[test]
    fn tie_break_is_case_sensitive() {
        let scripts = scripts(&[("beta", "x"), ("Alpha", "x"), ("alpha", "x")]);
        assert_eq!(names(&rank_scripts(&scripts, &[], &[])), vec!["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn ranking_respects_tiers_for_every_subset() {
        let all = ["lint", "build", "dev", "test", "serve", "clean"];
        let scripts = scripts(&all.map(|n| (n, "cmd")));
        // Every favorite/recent assignment over six names.
        for mask in 0..(3u32.pow(all.len() as u32)) {
            let mut favorites = Vec::new();
            let mut recents = Vec::new();
            let mut code = mask;
            for name in all {
                match code % 3 {
                    1 => favorites.push(favorite(name)),
                    2 => recents.push(recent(name)),
                    _ => {}
                }
                code /= 3;
            }
            let ranked = rank_scripts(&scripts, &favorites, &recents);
            assert_eq!(ranked.len(), all.len());
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                assert!(a.marker <= b.marker);
                if a.marker == b.marker {
                    assert!(a.entry.name < b.entry.name);
                }
            }
        }
    }

    #[test]
    fn script_menu_layout() {
        let scripts = sample();
        let background = vec![BackgroundItem {
            reference: BackgroundRef {
                pid: 42,
                name: "dev".to_string(),
            },
            workspace: None,
        }];
        let input = ScriptMenuInput {
            scripts: &scripts,
            favorites: &[],
            recent: &[],
            background: &background,
            monorepo: true,
        };
        let menu = script_menu(&input, &Glyphs::new(true));
        assert_eq!(
            menu.keys(),
            vec!["script:build", "script:dev", "script:test", "bg:42", "workspaces", "exit"]
        );
        assert!(menu.wrap);
    }

    #[test]
    fn empty_scripts_still_offer_exit() {
        let scripts = Scripts::default();
        let input = ScriptMenuInput {
            scripts: &scripts,
            favorites: &[],
            recent: &[],
            background: &[],
            monorepo: false,
        };
        assert_eq!(script_menu(&input, &Glyphs::new(false)).keys(), vec!["exit"]);
    }

    #[test]
    fn workspace_menu_lists_root_workspaces_favorites_and_exit() {
        let workspaces = vec![WorkspaceDescriptor {
            name: "web".to_string(),
            path: "/repo/apps/web".into(),
            relative_path: "apps/web".to_string(),
            scripts: sample(),
        }];
        let menu = workspace_menu("repo", &workspaces, &[favorite("dev")], &[], &Glyphs::new(true));
        assert_eq!(menu.keys(), vec!["root", "workspace:web", "favorite:/p:dev", "exit"]);
    }

    #[test]
    fn execution_menu_reflects_favorite_state() {
        let glyphs = Glyphs::new(false);
        let add = execution_menu("dev", false, &glyphs);
        let remove = execution_menu("dev", true, &glyphs);
        let label = |menu: &Menu<ExecOption>| {
            menu.choices()
                .find(|c| c.value == ExecOption::Favorite)
                .map(|c| c.label.clone())
                .unwrap()
        };
        assert!(label(&add).contains("Add favorite"));
        assert!(label(&remove).contains("Remove favorite"));
        assert_eq!(add.keys(), vec!["interactive", "background", "copy", "favorite", "back"]);
    }
}
