//! User-facing progress output.

use std::sync::Mutex;

/// Sink for build progress. Steps report through this rather than logging
/// directly so front ends can render it their own way.
pub trait Ui: Send + Sync {
    /// Announce a step.
    fn say(&self, message: &str);

    /// Secondary detail under the current step.
    fn message(&self, message: &str);

    fn error(&self, message: &str);
}

/// Default UI writing through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUi;

impl Ui for TracingUi {
    fn say(&self, message: &str) {
        tracing::info!("==> {}", message);
    }

    fn message(&self, message: &str) {
        tracing::info!("    {}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// One line written to a [`RecordingUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiLine {
    Say(String),
    Message(String),
    Error(String),
}

/// UI that keeps every line, for callers that inspect the transcript.
#[derive(Debug, Default)]
pub struct RecordingUi {
    lines: Mutex<Vec<UiLine>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<UiLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                UiLine::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: UiLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl Ui for RecordingUi {
    fn say(&self, message: &str) {
        self.push(UiLine::Say(message.to_string()));
    }

    fn message(&self, message: &str) {
        self.push(UiLine::Message(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(UiLine::Error(message.to_string()));
    }
}
