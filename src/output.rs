//! Captured output of background scripts.
//!
//! Each background process owns a `LogBuffer`: a fixed-capacity ring that keeps
//! the newest lines in arrival order and drops the oldest on overflow.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use strip_ansi_escapes::strip;

/// Default number of lines kept per background process.
pub const MAX_LOG_LINES: usize = 100;

/// Indicates the source stream of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn tag(self) -> &'static str {
        match self {
            StreamKind::Stdout => "OUT",
            StreamKind::Stderr => "ERR",
        }
    }
}

/// A single line of captured output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub time: DateTime<Local>,
    pub stream: StreamKind,
    pub text: String,
}

impl LogLine {
    pub fn now(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            stream,
            text: text.into(),
        }
    }
}

/// A fixed-capacity ring buffer for storing `LogLine`s.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    max_lines: usize,
    lines: VecDeque<LogLine>,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            max_lines,
            lines: VecDeque::with_capacity(max_lines.min(1024)),
        }
    }

    /// Adds a line to the buffer.
    ///
    /// Returns `true` if an old line was dropped to make room.
    pub fn push(&mut self, line: LogLine) -> bool {
        let mut dropped = false;
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
            dropped = true;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    /// The newest `count` lines, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogLine> {
        let skip = self.lines.len().saturating_sub(count);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

/// Whether a raw output line is worth keeping.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Removes ANSI escape codes so captured lines render cleanly in the log view.
pub fn sanitize_text(text: &str) -> String {
    let stripped = strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_drops_oldest() {
        let mut buffer = LogBuffer::new(2);
        buffer.push(LogLine::now(StreamKind::Stdout, "a"));
        buffer.push(LogLine::now(StreamKind::Stderr, "b"));
        let dropped = buffer.push(LogLine::now(StreamKind::Stdout, "c"));
        assert!(dropped);
        let lines = buffer.iter().map(|l| l.text.clone()).collect::<Vec<_>>();
        assert_eq!(lines, vec!["b", "c"]);
    }

    #[test]
    fn keeps_last_hundred_of_one_hundred_fifty() {
        let mut buffer = LogBuffer::new(MAX_LOG_LINES);
        for idx in 0..150 {
            buffer.push(LogLine::now(StreamKind::Stdout, format!("line {idx}")));
        }
        assert_eq!(buffer.len(), 100);
        let texts: Vec<_> = buffer.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts.first(), Some(&"line 50"));
        assert_eq!(texts.last(), Some(&"line 149"));
        assert!(texts.windows(2).all(|w| {
            let a: usize = w[0].trim_start_matches("line ").parse().unwrap();
            let b: usize = w[1].trim_start_matches("line ").parse().unwrap();
            b == a + 1
        }));
    }

    #[test]
    fn tail_returns_newest_in_order() {
        let mut buffer = LogBuffer::new(10);
        for text in ["a", "b", "c"] {
            buffer.push(LogLine::now(StreamKind::Stdout, text));
        }
        let tail: Vec<_> = buffer.tail(2).into_iter().map(|l| l.text).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert_eq!(buffer.tail(10).len(), 3);
    }

    #[test]
    fn sanitize_strips_ansi() {
        assert_eq!(sanitize_text("\u{1b}[32mready\u{1b}[0m"), "ready");
        assert!(is_blank("   "));
        assert!(!is_blank(" x "));
    }
}
