//! Semantic checks on a loaded configuration.

use crate::{
    error::{Error, Result},
    schema::BeholderConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "database.connect_attempts"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

impl BeholderConfig {
    /// Collect diagnostics without failing.
    #[must_use]
    pub fn diagnostics(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.irc.nick.trim().is_empty() {
            result.push(Severity::Error, "irc.nick", "must not be empty");
        }
        if self.irc.command_prefix.is_empty() {
            result.push(Severity::Error, "irc.command_prefix", "must not be empty");
        }
        if self.irc.port == 0 {
            result.push(Severity::Error, "irc.port", "must be non-zero");
        }
        if !self.irc.tls {
            result.push(
                Severity::Warning,
                "irc.tls",
                "plaintext connection; NickServ password would be sent in the clear",
            );
        }
        if self.irc.admin_nick.is_none() {
            result.push(
                Severity::Info,
                "irc.admin_nick",
                "unset; private-message channel commands are disabled",
            );
        }

        if self.database.url.trim().is_empty() {
            result.push(Severity::Error, "database.url", "must not be empty");
        } else if !self.database.url.starts_with("sqlite:") {
            result.push(
                Severity::Error,
                "database.url",
                format!("unsupported scheme in {:?}, expected sqlite:", self.database.url),
            );
        }
        if self.database.connect_attempts == 0 {
            result.push(
                Severity::Error,
                "database.connect_attempts",
                "must be at least 1",
            );
        }

        if self.reconcile.tick_interval_secs == 0 {
            result.push(
                Severity::Error,
                "reconcile.tick_interval_secs",
                "must be at least 1",
            );
        }

        if self.control.socket_path.is_none() {
            result.push(
                Severity::Info,
                "control.socket_path",
                "unset; the bot only picks up membership changes on restart",
            );
        }

        result
    }

    /// Fail with every error-level diagnostic.
    pub fn validate(&self) -> Result<()> {
        let result = self.diagnostics();
        if !result.has_errors() {
            return Ok(());
        }
        Err(Error::Invalid {
            problems: result
                .diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(ToString::to_string)
                .collect(),
        })
    }
}
