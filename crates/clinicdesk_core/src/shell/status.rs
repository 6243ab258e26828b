//! Status-reporting sink shared by the host and plugins.

use log::{error, info, warn};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

const MAX_STATUS_LINES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl Display for StatusLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-visible status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

/// Receiver of user-visible status messages.
pub trait StatusSink: Send + Sync {
    fn write_status(&self, level: StatusLevel, message: &str);
}

/// In-memory status sink that also forwards every line to the log.
///
/// Keeps the most recent lines only.
#[derive(Debug, Default)]
pub struct StatusBoard {
    lines: Mutex<VecDeque<StatusLine>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<StatusLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }
}

impl StatusSink for StatusBoard {
    fn write_status(&self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Info => info!("event=status module=shell status=ok level=info message={message}"),
            StatusLevel::Warning => {
                warn!("event=status module=shell status=ok level=warning message={message}")
            }
            StatusLevel::Error => {
                error!("event=status module=shell status=error level=error message={message}")
            }
        }

        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == MAX_STATUS_LINES {
            lines.pop_front();
        }
        lines.push_back(StatusLine {
            level,
            message: message.to_string(),
        });
    }
}
