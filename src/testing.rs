//! Test doubles for the launcher and prompt seams.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::error::{RunnerError, RunnerResult};
use crate::launcher::{Invocation, OutputChunk, ProcessLauncher, ProcessSignal, Spawned};
use crate::output::StreamKind;
use crate::prompt::{MenuView, Prompter, Row};

const FIRST_PID: u32 = 4000;

#[derive(Default)]
struct FakeState {
    spawned: u32,
    alive: HashSet<u32>,
    senders: HashMap<u32, mpsc::UnboundedSender<OutputChunk>>,
    fail: bool,
    exit_code: Option<i32>,
    foreground: Vec<(String, String)>,
    background: Vec<(String, String)>,
}

/// In-memory launcher: nothing is executed, every call is recorded.
#[derive(Default)]
pub struct FakeLauncher {
    state: Mutex<FakeState>,
}

impl FakeLauncher {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Makes every subsequent spawn fail.
    pub fn fail_spawns(&self) {
        self.state().fail = true;
    }

    pub fn set_exit_code(&self, code: i32) {
        self.state().exit_code = Some(code);
    }

    /// Marks the process as finished.
    pub fn exit(&self, pid: u32) {
        let mut state = self.state();
        state.alive.remove(&pid);
        state.senders.remove(&pid);
    }

    pub fn emit(&self, pid: u32, stream: StreamKind, line: &str) {
        if let Some(tx) = self.state().senders.get(&pid) {
            let _ = tx.send(OutputChunk {
                stream,
                line: line.to_string(),
            });
        }
    }

    pub fn close_output(&self, pid: u32) {
        self.state().senders.remove(&pid);
    }

    /// Display strings of foreground invocations, in call order.
    pub fn foreground_runs(&self) -> Vec<String> {
        self.state().foreground.iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    pub fn foreground_dirs(&self) -> Vec<String> {
        self.state().foreground.iter().map(|(_, dir)| dir.clone()).collect()
    }

    /// Display strings of background invocations, in call order.
    pub fn background_runs(&self) -> Vec<String> {
        self.state().background.iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    pub fn background_dirs(&self) -> Vec<String> {
        self.state().background.iter().map(|(_, dir)| dir.clone()).collect()
    }

    fn spawn_error(invocation: &Invocation) -> RunnerError {
        RunnerError::SpawnFailure {
            command: invocation.display(),
            source: io::Error::new(io::ErrorKind::NotFound, "fake spawn failure"),
        }
    }
}

impl ProcessLauncher for FakeLauncher {
    async fn run_foreground(
        &self,
        invocation: &Invocation,
        directory: &Path,
    ) -> RunnerResult<Option<i32>> {
        let mut state = self.state();
        if state.fail {
            return Err(Self::spawn_error(invocation));
        }
        state
            .foreground
            .push((invocation.display(), directory.display().to_string()));
        Ok(Some(state.exit_code.unwrap_or(0)))
    }

    fn run_background(&self, invocation: &Invocation, directory: &Path) -> RunnerResult<Spawned> {
        let mut state = self.state();
        if state.fail {
            return Err(Self::spawn_error(invocation));
        }
        let pid = FIRST_PID + state.spawned;
        state.spawned += 1;
        let (tx, output) = mpsc::unbounded_channel();
        state.senders.insert(pid, tx);
        state.alive.insert(pid);
        state
            .background
            .push((invocation.display(), directory.display().to_string()));
        Ok(Spawned { pid, output })
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> bool {
        let mut state = self.state();
        match signal {
            ProcessSignal::Probe => state.alive.contains(&pid),
            ProcessSignal::Terminate => {
                state.senders.remove(&pid);
                state.alive.remove(&pid)
            }
        }
    }
}

/// Prompter that answers from a queue of choice keys and records every menu
/// it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    shown: Vec<ShownMenu>,
}

#[derive(Debug, Clone)]
pub struct ShownMenu {
    pub message: String,
    pub keys: Vec<String>,
    pub wrap: bool,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            shown: Vec::new(),
        }
    }

    pub fn shown(&self) -> &[ShownMenu] {
        &self.shown
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&mut self, view: &MenuView<'_>) -> RunnerResult<usize> {
        let keys: Vec<String> = view
            .rows
            .iter()
            .filter_map(|row| match row {
                Row::Choice { key, .. } => Some(key.to_string()),
                Row::Separator(_) => None,
            })
            .collect();
        self.shown.push(ShownMenu {
            message: view.message.to_string(),
            keys: keys.clone(),
            wrap: view.wrap,
        });

        let Some(answer) = self.answers.pop_front() else {
            return Err(RunnerError::Interrupted);
        };
        view.rows
            .iter()
            .position(|row| matches!(row, Row::Choice { key, .. } if *key == answer))
            .ok_or_else(|| {
                RunnerError::Prompt(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no choice keyed {answer:?}; offered {keys:?}"),
                ))
            })
    }
}
