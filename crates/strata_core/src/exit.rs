//! Exit requests
//!
//! The engine never stops itself. It records an [`ExitInfo`] that the host
//! reads after every advance.

use std::fmt;

/// Why the host should stop ticking
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExitCode {
    /// Keep running
    #[default]
    NoRequest,
    /// Game logic asked to quit
    QuitGame,
    /// Game logic asked to restart, optionally with another file
    Restart,
    /// The scene list became empty
    NoScenesLeft,
    /// An unrecoverable error was reported
    Exception,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::NoRequest => "no request",
            ExitCode::QuitGame => "quit game",
            ExitCode::Restart => "restart",
            ExitCode::NoScenesLeft => "no scenes left",
            ExitCode::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// The process-wide exit record
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: ExitCode,
    pub filename: Option<String>,
}

impl ExitInfo {
    pub fn new(code: ExitCode, filename: Option<String>) -> Self {
        Self { code, filename }
    }

    /// True once any exit code other than `NoRequest` is recorded
    pub fn is_requested(&self) -> bool {
        self.code != ExitCode::NoRequest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_no_request() {
        let info = ExitInfo::default();
        assert_eq!(info.code, ExitCode::NoRequest);
        assert!(info.filename.is_none());
        assert!(!info.is_requested());
    }

    #[test]
    fn test_requested() {
        let info = ExitInfo::new(ExitCode::Restart, Some("level2.ron".to_string()));
        assert!(info.is_requested());
        assert_eq!(info.filename.as_deref(), Some("level2.ron"));
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::NoScenesLeft.to_string(), "no scenes left");
    }
}
