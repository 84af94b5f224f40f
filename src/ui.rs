//! Terminal presentation: header, notices, menu labels and the log view.

use std::io::{self, IsTerminal};

use chrono::{DateTime, Local};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::{style, Color, StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};

use crate::favorites::FavoriteRecord;
use crate::launcher::PackageManager;
use crate::manifest::{ScriptEntry, Scripts};
use crate::output::{sanitize_text, LogBuffer, StreamKind};
use crate::workspace::WorkspaceDescriptor;

const PRIMARY: Color = Color::Rgb { r: 0x22, g: 0xC5, b: 0x5E };
const SECONDARY: Color = Color::Rgb { r: 0x3B, g: 0x82, b: 0xF6 };
const ACCENT: Color = Color::Rgb { r: 0xF5, g: 0x9E, b: 0x0B };
const DANGER: Color = Color::Rgb { r: 0xEF, g: 0x44, b: 0x44 };
const MUTED: Color = Color::Rgb { r: 0x6B, g: 0x72, b: 0x80 };
const PURPLE: Color = Color::Rgb { r: 0xA8, g: 0x55, b: 0xF7 };

const RULE_WIDTH: usize = 75;
const NAME_WIDTH: usize = 14;

const SCRIPT_COLORS: [(&[&str], Color); 4] = [
    (&["dev", "start", "serve", "watch"], PRIMARY),
    (&["test", "spec", "e2e", "coverage"], SECONDARY),
    (&["build", "compile", "bundle", "dist"], ACCENT),
    (&["lint", "format", "prettier", "eslint", "check"], PURPLE),
];

const BANNER: &str = r"
  ┌─┐┌─┐┬─┐┬┌─┐┌┬┐┬─┐┬ ┬┌┐┌┌┐┌┌─┐┬─┐
  └─┐│  ├┬┘│├─┘ │ ├┬┘│ │││││││├┤ ├┬┘
  └─┘└─┘┴└─┴┴   ┴ ┴└─└─┘┘└┘┘└┘└─┘┴└─";

/// Markers used in menu labels; ASCII fallbacks when symbols are disabled.
#[derive(Debug, Clone, Copy)]
pub struct Glyphs {
    pub favorite: &'static str,
    pub unfavorite: &'static str,
    pub recent: &'static str,
    pub background: &'static str,
    pub root: &'static str,
    pub arrow: &'static str,
    pub rule: &'static str,
}

impl Glyphs {
    pub fn new(unicode: bool) -> Self {
        if unicode {
            Self {
                favorite: "★",
                unfavorite: "☆",
                recent: "↻",
                background: "⚡",
                root: "⌂",
                arrow: "→",
                rule: "─",
            }
        } else {
            Self {
                favorite: "*",
                unfavorite: "o",
                recent: "~",
                background: "&",
                root: "^",
                arrow: "->",
                rule: "-",
            }
        }
    }

    pub fn separator(&self) -> String {
        self.rule.repeat(40).with(MUTED).to_string()
    }
}

/// Marker shown in front of a script name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Marker {
    Favorite,
    Recent,
    None,
}

fn muted<D: std::fmt::Display>(text: D) -> StyledContent<D> {
    style(text).with(MUTED)
}

pub fn script_color(name: &str) -> Color {
    let lower = name.to_lowercase();
    SCRIPT_COLORS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(_, color)| *color)
        .unwrap_or(MUTED)
}

/// Clears the terminal. A no-op when stdout is not a terminal.
pub fn clear_screen() {
    let mut stdout = io::stdout();
    if stdout.is_terminal() {
        let _ = execute!(stdout, Clear(ClearType::All), Clear(ClearType::Purge), MoveTo(0, 0));
    }
}

pub fn show_header(project: &str, workspace: Option<&str>) {
    let rule = muted("─".repeat(RULE_WIDTH));
    println!("{}", BANNER.with(PRIMARY));
    println!();
    println!("{rule}");
    let location = match workspace {
        Some(ws) => format!("{} {} {}", project.with(ACCENT), muted("→"), ws.with(PRIMARY)),
        None => project.with(ACCENT).to_string(),
    };
    println!(
        "  {} {}  {}  {}",
        "ScriptRunner".with(SECONDARY),
        muted(format!("v{}", env!("CARGO_PKG_VERSION"))),
        muted("|"),
        location
    );
    println!("{rule}");
    println!();
}

pub fn show_error(message: &str) {
    println!("{}", format!("\n  ✖ {message}\n").with(DANGER));
}

pub fn show_success(message: &str) {
    println!("{}", format!("\n  ✔ {message}\n").with(PRIMARY));
}

pub fn show_info(message: &str) {
    println!("{}", format!("\n  ℹ {message}\n").with(SECONDARY));
}

pub fn show_warning(message: &str) {
    println!("{}", format!("\n  ⚠ {message}\n").with(ACCENT));
}

fn describe(entry: &ScriptEntry, glyphs: &Glyphs) -> String {
    let description = entry
        .description
        .as_deref()
        .map(|d| format!("  {}", muted(format!("# {d}")).italic()))
        .unwrap_or_default();
    format!(
        "{} {} {}{}",
        format!("{:<width$}", entry.name, width = NAME_WIDTH)
            .with(script_color(&entry.name))
            .bold(),
        muted(glyphs.arrow),
        muted(&entry.command),
        description
    )
}

pub fn script_label(entry: &ScriptEntry, marker: Marker, glyphs: &Glyphs) -> String {
    let icon = match marker {
        Marker::Favorite => format!("{} ", glyphs.favorite.with(ACCENT)),
        Marker::Recent => format!("{} ", muted(glyphs.recent)),
        Marker::None => " ".repeat(2),
    };
    format!("{icon}{}", describe(entry, glyphs))
}

pub fn background_label(name: &str, pid: u32, workspace: Option<&str>, glyphs: &Glyphs) -> String {
    let scope = workspace
        .map(|ws| format!(" {}", muted(format!("[{ws}]"))))
        .unwrap_or_default();
    format!(
        "{} {} {}{}",
        glyphs.background.with(SECONDARY),
        format!("{name:<width$}", width = NAME_WIDTH).with(ACCENT),
        muted(format!("PID: {pid}")),
        scope
    )
}

pub fn root_label(project: &str, glyphs: &Glyphs) -> String {
    format!(
        "{}  {} {}",
        format!("{} Root", glyphs.root).with(PRIMARY).bold(),
        muted(glyphs.arrow),
        project.with(ACCENT)
    )
}

pub fn workspace_label(workspace: &WorkspaceDescriptor, glyphs: &Glyphs) -> String {
    format!(
        "{} {} {}",
        format!("{:<20}", workspace.name).with(SECONDARY).bold(),
        muted(glyphs.arrow),
        muted(&workspace.relative_path)
    )
}

pub fn favorite_shortcut_label(favorite: &FavoriteRecord, glyphs: &Glyphs) -> String {
    format!(
        "{} {} {}",
        glyphs.favorite.with(ACCENT),
        format!("{:<width$}", favorite.script, width = NAME_WIDTH)
            .with(script_color(&favorite.script))
            .bold(),
        muted(format!("({})", favorite.project_name))
    )
}

pub fn section_label(title: &str) -> String {
    muted(format!(" {title}")).to_string()
}

pub fn exit_label() -> String {
    "Exit".with(DANGER).to_string()
}

pub fn back_label() -> String {
    muted("Back").to_string()
}

pub fn option_label(title: &str, hint: &str, color: OptionColor, glyphs: &Glyphs) -> String {
    let color = match color {
        OptionColor::Primary => PRIMARY,
        OptionColor::Secondary => SECONDARY,
        OptionColor::Accent => ACCENT,
        OptionColor::Danger => DANGER,
    };
    format!(
        "{} {}",
        format!("{title:<22}").with(color),
        muted(format!("{} {hint}", glyphs.arrow))
    )
}

#[derive(Debug, Clone, Copy)]
pub enum OptionColor {
    Primary,
    Secondary,
    Accent,
    Danger,
}

pub fn highlight(text: &str) -> String {
    text.with(PRIMARY).to_string()
}

pub fn show_run_banner(script: &str, manager: PackageManager) {
    println!();
    println!(
        "  {} {} {}",
        "Running:".with(SECONDARY),
        script.with(PRIMARY).bold(),
        muted(format!("via {}", manager.as_str()))
    );
    println!("{}", muted("─".repeat(RULE_WIDTH)));
    println!();
}

/// Notice describing how a foreground run ended.
pub fn run_outcome(script: &str, code: Option<i32>) -> (bool, String) {
    match code {
        Some(0) => (true, format!("\"{script}\" finished successfully")),
        Some(code) => (false, format!("\"{script}\" exited with code {code}")),
        None => (false, format!("\"{script}\" was terminated by a signal")),
    }
}

pub fn show_logs(
    name: &str,
    pid: u32,
    started_at: Option<DateTime<Local>>,
    logs: &LogBuffer,
    max_lines: usize,
) {
    let rule = muted("─".repeat(RULE_WIDTH));
    let started = started_at
        .map(|at| format!(", started {}", at.format("%H:%M:%S")))
        .unwrap_or_default();
    println!();
    println!("{rule}");
    println!(
        "  {} {} {}",
        "Logs:".with(SECONDARY),
        name.with(ACCENT),
        muted(format!("(PID: {pid}{started})"))
    );
    println!("{rule}");

    if logs.is_empty() {
        println!("{}", muted("  (no output captured)"));
    } else {
        for line in logs.tail(max_lines) {
            let tag = match line.stream {
                StreamKind::Stderr => line.stream.tag().with(DANGER),
                StreamKind::Stdout => muted(line.stream.tag()),
            };
            println!(
                "  {} {} {}",
                muted(line.time.format("%H:%M:%S")),
                tag,
                sanitize_text(&line.text)
            );
        }
        let omitted = logs.len().saturating_sub(max_lines);
        if omitted > 0 {
            println!("{}", muted(format!("  ... {omitted} earlier lines omitted")));
        }
    }

    println!("{rule}");
    println!();
}

/// Plain listing used by `--list`.
pub fn list_scripts(project: &str, scripts: &Scripts) {
    println!("{} {}", "Scripts in".with(SECONDARY), project.with(ACCENT));
    println!();
    for entry in scripts.iter() {
        println!("{}", list_line(entry));
    }
}

fn list_line(entry: &ScriptEntry) -> String {
    let mut line = format!(
        "  {} → {}",
        entry.name.as_str().with(script_color(&entry.name)).bold(),
        entry.command
    );
    if let Some(description) = &entry.description {
        line.push_str(&format!("  {}", muted(format!("# {description}"))));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_color_follows_name_patterns() {
        assert_eq!(script_color("dev:web"), PRIMARY);
        assert_eq!(script_color("Test"), SECONDARY);
        assert_eq!(script_color("bundle"), ACCENT);
        assert_eq!(script_color("eslint-fix"), PURPLE);
        assert_eq!(script_color("deploy"), MUTED);
    }

    #[test]
    fn run_outcome_reports_exit_code() {
        assert!(run_outcome("build", Some(0)).0);
        let (ok, message) = run_outcome("build", Some(2));
        assert!(!ok);
        assert!(message.contains("code 2"));
        assert!(!run_outcome("build", None).0);
    }

    #[test]
    fn ascii_glyphs_avoid_unicode() {
        let glyphs = Glyphs::new(false);
        for glyph in [glyphs.favorite, glyphs.recent, glyphs.background, glyphs.arrow] {
            assert!(glyph.is_ascii());
        }
    }
}
