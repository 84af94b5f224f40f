//! In-memory registry of scripts running in the background.
//!
//! The registry is owned by the session loop, which is the only place that
//! launches, kills or prunes entries. Output reaches each entry's log buffer
//! through a channel drained by a per-process sink task, so appends happen
//! while the loop is parked on a prompt.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::RunnerResult;
use crate::launcher::{Invocation, OutputChunk, ProcessLauncher, ProcessSignal};
use crate::output::{is_blank, LogBuffer, LogLine};

/// The minimal handle a menu item carries for a background process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRef {
    pub pid: u32,
    pub name: String,
}

/// A tracked background script.
#[derive(Debug)]
pub struct BackgroundProcess {
    pub name: String,
    pub pid: u32,
    pub workspace: Option<String>,
    pub started_at: DateTime<Local>,
    logs: Arc<Mutex<LogBuffer>>,
}

impl BackgroundProcess {
    /// Snapshot of the captured output.
    pub fn logs(&self) -> LogBuffer {
        lock(&self.logs).clone()
    }

    pub fn log_count(&self) -> usize {
        lock(&self.logs).len()
    }

    pub fn reference(&self) -> BackgroundRef {
        BackgroundRef {
            pid: self.pid,
            name: self.name.clone(),
        }
    }
}

pub struct BackgroundRegistry<L> {
    launcher: Arc<L>,
    processes: Vec<BackgroundProcess>,
    max_log_lines: usize,
}

impl<L: ProcessLauncher> BackgroundRegistry<L> {
    pub fn new(launcher: Arc<L>, max_log_lines: usize) -> Self {
        Self {
            launcher,
            processes: Vec::new(),
            max_log_lines,
        }
    }

    /// Starts `invocation` in the background and registers it right away.
    pub fn launch(
        &mut self,
        name: &str,
        invocation: &Invocation,
        directory: &Path,
        workspace: Option<String>,
    ) -> RunnerResult<&BackgroundProcess> {
        let spawned = self.launcher.run_background(invocation, directory)?;
        let logs = Arc::new(Mutex::new(LogBuffer::new(self.max_log_lines)));
        spawn_log_sink(spawned.output, Arc::clone(&logs));

        // A pid can only be reused once the old process is gone.
        self.processes.retain(|p| p.pid != spawned.pid);
        self.processes.push(BackgroundProcess {
            name: name.to_string(),
            pid: spawned.pid,
            workspace,
            started_at: Local::now(),
            logs,
        });
        info!(script = name, pid = spawned.pid, "registered background script");
        let last = self.processes.len() - 1;
        Ok(&self.processes[last])
    }

    /// Drops every entry whose process no longer answers a liveness probe.
    /// Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.processes.len();
        let launcher = &self.launcher;
        self.processes.retain(|p| {
            let alive = launcher.is_alive(p.pid);
            if !alive {
                debug!(script = %p.name, pid = p.pid, "pruning finished background script");
            }
            alive
        });
        before - self.processes.len()
    }

    /// Sends a termination signal. Does not remove the entry.
    pub fn kill(&self, pid: u32) -> bool {
        let delivered = self.launcher.signal(pid, ProcessSignal::Terminate);
        debug!(pid, signal = ProcessSignal::Terminate.label(), delivered, "kill requested");
        delivered
    }

    pub fn remove(&mut self, pid: u32) -> Option<BackgroundProcess> {
        let idx = self.processes.iter().position(|p| p.pid == pid)?;
        Some(self.processes.remove(idx))
    }

    pub fn find(&self, pid: u32) -> Option<&BackgroundProcess> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackgroundProcess> {
        self.processes.iter()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

fn spawn_log_sink(mut output: mpsc::UnboundedReceiver<OutputChunk>, logs: Arc<Mutex<LogBuffer>>) {
    tokio::spawn(async move {
        while let Some(chunk) = output.recv().await {
            if is_blank(&chunk.line) {
                continue;
            }
            lock(&logs).push(LogLine::now(chunk.stream, chunk.line));
        }
    });
}

fn lock(logs: &Mutex<LogBuffer>) -> MutexGuard<'_, LogBuffer> {
    logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
