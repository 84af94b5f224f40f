//! Error taxonomy shared by the runner's modules.
//!
//! Manifest errors are fatal at startup. Spawn errors during a foreground run
//! end the session. Clipboard errors are recovered by the caller, and the
//! persisted lists never produce an error at all.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading projects, launching scripts and prompting.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("package.json not found in {}", path.display())]
    ManifestNotFound { path: PathBuf },
    #[error("package.json in {} is not valid JSON", path.display())]
    ManifestMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no scripts found in {}", path.display())]
    NoScripts { path: PathBuf },
    #[error("script \"{name}\" not found")]
    ScriptNotFound { name: String },
    #[error("failed to start `{command}`")]
    SpawnFailure {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("clipboard unavailable: {0}")]
    ClipboardUnsupported(String),
    #[error("prompt failed")]
    Prompt(#[source] io::Error),
    #[error("interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
