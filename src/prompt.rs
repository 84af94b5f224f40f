//! Selection prompts.
//!
//! A `Menu<T>` describes one prompt: a message, an ordered list of choices and
//! separators, and whether the cursor wraps around. A `Prompter` turns a menu
//! view into the index of the chosen row; `TerminalPrompter` does that with an
//! inline list drawn in raw mode.

use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveToColumn, MoveToPreviousLine, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, DisableLineWrap, EnableLineWrap,
};
use crossterm::{execute, queue};

use crate::error::{RunnerError, RunnerResult};

/// A selectable row.
#[derive(Debug, Clone)]
pub struct Choice<T> {
    /// Stable plain-text identifier, independent of styling.
    pub key: String,
    pub label: String,
    pub value: T,
}

#[derive(Debug, Clone)]
pub enum MenuItem<T> {
    Choice(Choice<T>),
    Separator(String),
}

/// Configuration of a single selection prompt.
#[derive(Debug, Clone)]
pub struct Menu<T> {
    pub message: String,
    pub items: Vec<MenuItem<T>>,
    /// Whether moving past either end wraps around.
    pub wrap: bool,
}

/// Borrowed, type-erased form of a menu handed to a [`Prompter`].
#[derive(Debug)]
pub struct MenuView<'a> {
    pub message: &'a str,
    pub rows: Vec<Row<'a>>,
    pub wrap: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    Choice { key: &'a str, label: &'a str },
    Separator(&'a str),
}

impl Row<'_> {
    fn is_choice(&self) -> bool {
        matches!(self, Row::Choice { .. })
    }
}

impl<T: Clone> Menu<T> {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            items: Vec::new(),
            wrap: true,
        }
    }

    pub fn choice(mut self, key: impl Into<String>, label: impl Into<String>, value: T) -> Self {
        self.push_choice(key, label, value);
        self
    }

    pub fn separator(mut self, text: impl Into<String>) -> Self {
        self.push_separator(text);
        self
    }

    pub fn push_choice(&mut self, key: impl Into<String>, label: impl Into<String>, value: T) {
        self.items.push(MenuItem::Choice(Choice {
            key: key.into(),
            label: label.into(),
            value,
        }));
    }

    pub fn push_separator(&mut self, text: impl Into<String>) {
        self.items.push(MenuItem::Separator(text.into()));
    }

    pub fn choices(&self) -> impl Iterator<Item = &Choice<T>> {
        self.items.iter().filter_map(|item| match item {
            MenuItem::Choice(choice) => Some(choice),
            MenuItem::Separator(_) => None,
        })
    }

    /// Keys of all choices, in display order.
    pub fn keys(&self) -> Vec<&str> {
        self.choices().map(|c| c.key.as_str()).collect()
    }

    pub fn view(&self) -> MenuView<'_> {
        MenuView {
            message: &self.message,
            rows: self
                .items
                .iter()
                .map(|item| match item {
                    MenuItem::Choice(choice) => Row::Choice {
                        key: &choice.key,
                        label: &choice.label,
                    },
                    MenuItem::Separator(text) => Row::Separator(text),
                })
                .collect(),
            wrap: self.wrap,
        }
    }

    /// Shows the menu and returns the value of the chosen entry.
    pub fn ask<P: Prompter + ?Sized>(&self, prompter: &mut P) -> RunnerResult<T> {
        let index = prompter.choose(&self.view())?;
        match self.items.get(index) {
            Some(MenuItem::Choice(choice)) => Ok(choice.value.clone()),
            _ => Err(RunnerError::Prompt(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("row {index} is not a selectable choice"),
            ))),
        }
    }
}

pub trait Prompter {
    /// Returns the index (into `view.rows`) of the chosen row.
    fn choose(&mut self, view: &MenuView<'_>) -> RunnerResult<usize>;
}

/// Interactive prompter drawing an inline list on the terminal.
#[derive(Debug, Clone)]
pub struct TerminalPrompter {
    use_symbols: bool,
}

impl TerminalPrompter {
    pub fn new(use_symbols: bool) -> Self {
        Self { use_symbols }
    }

    fn pointer(&self) -> &'static str {
        if self.use_symbols {
            "❯"
        } else {
            ">"
        }
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&mut self, view: &MenuView<'_>) -> RunnerResult<usize> {
        let selectable: Vec<usize> = view
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_choice())
            .map(|(idx, _)| idx)
            .collect();
        if selectable.is_empty() {
            return Err(RunnerError::Prompt(io::Error::new(
                io::ErrorKind::InvalidInput,
                "menu has no choices",
            )));
        }

        let mut stdout = io::stdout();
        let _guard = RawModeGuard::enter(&mut stdout).map_err(RunnerError::Prompt)?;
        let mut position = 0usize;
        let mut drawn = 0u16;

        loop {
            drawn = self
                .render(&mut stdout, view, selectable[position], drawn)
                .map_err(RunnerError::Prompt)?;
            let Event::Key(key) = event::read().map_err(RunnerError::Prompt)? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    clear_drawn(&mut stdout, drawn).map_err(RunnerError::Prompt)?;
                    return Err(RunnerError::Interrupted);
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    position = step(position, selectable.len(), false, view.wrap);
                }
                KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                    position = step(position, selectable.len(), true, view.wrap);
                }
                KeyCode::Home => position = 0,
                KeyCode::End => position = selectable.len() - 1,
                KeyCode::Enter => {
                    let chosen = selectable[position];
                    self.finish(&mut stdout, view, chosen, drawn)
                        .map_err(RunnerError::Prompt)?;
                    return Ok(chosen);
                }
                _ => {}
            }
        }
    }
}

impl TerminalPrompter {
    fn render(
        &self,
        out: &mut Stdout,
        view: &MenuView<'_>,
        cursor: usize,
        drawn: u16,
    ) -> io::Result<u16> {
        clear_drawn(out, drawn)?;
        let (_, height) = terminal::size().unwrap_or((80, 24));
        let page = view.rows.len().min(usize::from(height.saturating_sub(2)).max(3));
        let start = cursor
            .saturating_sub(page / 2)
            .min(view.rows.len().saturating_sub(page));

        queue!(
            out,
            Print("? ".green().bold()),
            Print(view.message.bold()),
            Print("\r\n")
        )?;
        for (idx, row) in view.rows.iter().enumerate().skip(start).take(page) {
            match row {
                Row::Choice { label, .. } if idx == cursor => {
                    queue!(out, Print(format!("{} ", self.pointer()).cyan()), Print(label))?;
                }
                Row::Choice { label, .. } => queue!(out, Print("  "), Print(label))?,
                Row::Separator(text) => queue!(out, Print(" "), Print(text.dark_grey()))?,
            }
            queue!(out, Print("\r\n"))?;
        }
        out.flush()?;
        Ok(u16::try_from(page + 1).unwrap_or(u16::MAX))
    }

    fn finish(
        &self,
        out: &mut Stdout,
        view: &MenuView<'_>,
        chosen: usize,
        drawn: u16,
    ) -> io::Result<()> {
        clear_drawn(out, drawn)?;
        if view.message.is_empty() {
            return out.flush();
        }
        let label = match view.rows.get(chosen) {
            Some(Row::Choice { label, .. }) => *label,
            _ => "",
        };
        queue!(
            out,
            Print("? ".green().bold()),
            Print(view.message.bold()),
            Print(" "),
            Print(label),
            Print("\r\n")
        )?;
        out.flush()
    }
}

fn step(position: usize, len: usize, forward: bool, wrap: bool) -> usize {
    match (forward, wrap) {
        (true, _) if position + 1 < len => position + 1,
        (true, true) => 0,
        (true, false) => position,
        (false, _) if position > 0 => position - 1,
        (false, true) => len - 1,
        (false, false) => position,
    }
}

fn clear_drawn(out: &mut Stdout, drawn: u16) -> io::Result<()> {
    if drawn > 0 {
        queue!(out, MoveToPreviousLine(drawn))?;
    }
    queue!(out, MoveToColumn(0), Clear(ClearType::FromCursorDown))
}

/// Restores the terminal when the prompt returns or unwinds.
struct RawModeGuard;

impl RawModeGuard {
    fn enter(out: &mut Stdout) -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(out, Hide, DisableLineWrap)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), EnableLineWrap, Show);
        let _ = disable_raw_mode();
    }
}
