use crate::error::{RunnerError, RunnerResult};

/// Puts `text` on the system clipboard.
pub fn copy_text(text: &str) -> RunnerResult<()> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|err| RunnerError::ClipboardUnsupported(err.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|err| RunnerError::ClipboardUnsupported(err.to_string()))
}
