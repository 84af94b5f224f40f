//! Spawning scripts through the project's package manager.
//!
//! Foreground runs inherit the terminal and block until the script exits.
//! Background runs are detached into their own process group with piped
//! output; each line is forwarded over a channel to whoever owns the process.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::output::StreamKind;

/// Lockfiles probed in order; the first one present decides the manager.
const LOCK_FILES: [(&str, PackageManager); 4] = [
    ("pnpm-lock.yaml", PackageManager::Pnpm),
    ("yarn.lock", PackageManager::Yarn),
    ("package-lock.json", PackageManager::Npm),
    ("bun.lockb", PackageManager::Bun),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn detect(directory: &Path) -> Self {
        LOCK_FILES
            .iter()
            .find(|(file, _)| directory.join(file).exists())
            .map(|(_, pm)| *pm)
            .unwrap_or(PackageManager::Npm)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    pub fn invocation(self, script: &str) -> Invocation {
        Invocation {
            program: self.as_str().to_string(),
            args: vec!["run".to_string(), script.to_string()],
        }
    }
}

/// A program plus arguments, run inside a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Shell-quoted form, suitable for pasting into a terminal.
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len());
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        shell_words::join(parts)
    }

    fn command(&self, directory: &Path) -> Command {
        #[cfg(windows)]
        let mut command = {
            // Package managers ship as .cmd shims on Windows.
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&self.program);
            command
        };
        #[cfg(not(windows))]
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(directory);
        command
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Existence check only; nothing is delivered.
    Probe,
    Terminate,
}

impl ProcessSignal {
    pub fn label(self) -> &'static str {
        match self {
            ProcessSignal::Probe => "probe",
            ProcessSignal::Terminate => "SIGTERM",
        }
    }
}

/// One line read from a background process.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub stream: StreamKind,
    pub line: String,
}

/// A freshly started background process.
#[derive(Debug)]
pub struct Spawned {
    pub pid: u32,
    pub output: mpsc::UnboundedReceiver<OutputChunk>,
}

pub trait ProcessLauncher: Send + Sync + 'static {
    /// Runs with inherited stdio and waits; yields the exit code (`None` if
    /// the script was ended by a signal).
    fn run_foreground(
        &self,
        invocation: &Invocation,
        directory: &Path,
    ) -> impl Future<Output = RunnerResult<Option<i32>>> + Send;

    /// Starts detached with piped output and returns immediately.
    fn run_background(&self, invocation: &Invocation, directory: &Path) -> RunnerResult<Spawned>;

    /// Returns whether the signal was delivered. Unknown pids yield `false`.
    fn signal(&self, pid: u32, signal: ProcessSignal) -> bool;

    fn is_alive(&self, pid: u32) -> bool {
        self.signal(pid, ProcessSignal::Probe)
    }
}

/// Launcher backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    async fn run_foreground(
        &self,
        invocation: &Invocation,
        directory: &Path,
    ) -> RunnerResult<Option<i32>> {
        let mut command = invocation.command(directory);
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let mut child = command.spawn().map_err(|source| RunnerError::SpawnFailure {
            command: invocation.display(),
            source,
        })?;
        debug!(command = %invocation.display(), pid = ?child.id(), "started foreground script");
        let status = child.wait().await?;
        Ok(status.code())
    }

    fn run_background(&self, invocation: &Invocation, directory: &Path) -> RunnerResult<Spawned> {
        let mut command = invocation.command(directory);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                let _ = libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|source| RunnerError::SpawnFailure {
            command: invocation.display(),
            source,
        })?;
        let pid = child.id().unwrap_or(0);
        let (tx, output) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_stream(StreamKind::Stdout, stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_stream(StreamKind::Stderr, stderr, tx));
        }

        // Reap the child so a finished script stops answering liveness probes.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(pid, code = ?status.code(), "background script exited"),
                Err(err) => warn!(pid, error = %err, "failed to wait on background script"),
            }
        });

        debug!(command = %invocation.display(), pid, "started background script");
        Ok(Spawned { pid, output })
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> bool {
        if pid == 0 {
            return false;
        }
        send_os_signal(pid, signal)
    }
}

#[cfg(unix)]
fn send_os_signal(pid: u32, signal: ProcessSignal) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    unsafe {
        match signal {
            ProcessSignal::Probe => libc::kill(pid, 0) == 0,
            ProcessSignal::Terminate => {
                // Background scripts lead their own group; reach the whole tree.
                let group = libc::kill(-pid, libc::SIGTERM) == 0;
                let leader = libc::kill(pid, libc::SIGTERM) == 0;
                group || leader
            }
        }
    }
}

#[cfg(not(unix))]
fn send_os_signal(pid: u32, signal: ProcessSignal) -> bool {
    use std::process::Command as StdCommand;
    match signal {
        ProcessSignal::Probe => StdCommand::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
            .unwrap_or(false),
        ProcessSignal::Terminate => StdCommand::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false),
    }
}

async fn read_stream<R>(stream: StreamKind, reader: R, tx: mpsc::UnboundedSender<OutputChunk>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    // Lines are decoded lossily; only EOF or a read error ends capture.
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "stopped reading script output");
                break;
            }
        }
        let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
        if tx.send(OutputChunk { stream, line }).is_err() {
            break;
        }
    }
}

fn trim_line_ending(mut bytes: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = bytes {
        bytes = rest;
    }
    if let [rest @ .., b'\r'] = bytes {
        bytes = rest;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_package_manager_from_lockfiles() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);
        std::fs::write(dir.path().join("bun.lockb"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Bun);
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Yarn);
        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Pnpm);
    }

    #[test]
    fn invocation_renders_copyable_command() {
        let invocation = PackageManager::Pnpm.invocation("test:unit");
        assert_eq!(invocation.program, "pnpm");
        assert_eq!(invocation.args, vec!["run", "test:unit"]);
        assert_eq!(invocation.display(), "pnpm run test:unit");
        assert_eq!(
            PackageManager::Npm.invocation("build prod").display(),
            "npm run 'build prod'"
        );
    }

    #[test]
    fn unknown_pid_is_not_alive() {
        assert!(!SystemLauncher.is_alive(0));
        assert!(!SystemLauncher.signal(0, ProcessSignal::Terminate));
    }

    #[cfg(unix)]
    #[test]
    fn current_process_answers_probe() {
        assert!(SystemLauncher.is_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn background_output_arrives_over_channel() {
        let dir = tempfile::tempdir().unwrap();
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo hello; echo oops 1>&2".to_string()],
        };
        let mut spawned = SystemLauncher.run_background(&invocation, dir.path()).unwrap();
        assert!(spawned.pid > 0);
        let mut seen = Vec::new();
        while let Some(chunk) = spawned.output.recv().await {
            seen.push((chunk.stream, chunk.line));
        }
        assert!(seen.contains(&(StreamKind::Stdout, "hello".to_string())));
        assert!(seen.contains(&(StreamKind::Stderr, "oops".to_string())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_stop_capture() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                format!(
                    "echo before; printf 'caf\\351\\r\\n'; echo after; echo ok > '{}'",
                    marker.display()
                ),
            ],
        };
        let mut spawned = SystemLauncher.run_background(&invocation, dir.path()).unwrap();
        let mut lines = Vec::new();
        while let Some(chunk) = spawned.output.recv().await {
            lines.push(chunk.line);
        }
        assert_eq!(lines, vec!["before", "caf\u{FFFD}", "after"]);
        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }

    #[test]
    fn line_endings_are_trimmed() {
        assert_eq!(trim_line_ending(b"a\r\n"), b"a");
        assert_eq!(trim_line_ending(b"a\n"), b"a");
        assert_eq!(trim_line_ending(b"a"), b"a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn foreground_reports_exit_code_and_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let failing = Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
        };
        let code = SystemLauncher.run_foreground(&failing, dir.path()).await.unwrap();
        assert_eq!(code, Some(3));

        let missing = Invocation {
            program: "definitely-not-a-real-binary-xyz".to_string(),
            args: Vec::new(),
        };
        let err = SystemLauncher
            .run_foreground(&missing, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::SpawnFailure { .. }));
    }
}
