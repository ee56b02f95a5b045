//! Error types for couchctl
//!
//! Everything a command can fail with ends up as a [`CouchCtlError`], which
//! knows how to print itself as a diagnostic with suggestions.

use colored::Colorize;
use couchctl_core::{ConfigError, CouchError};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// ```text
/// error: Authentication failed: Name or password is incorrect.
///
///   tip: Check the stored credentials: couchctl profile show <profile>
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<String>,
}

impl CliDiagnostic {
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add a detail line below the error message
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    pub fn tip(mut self, description: &str) -> Self {
        self.tips.push(description.to_string());
        self
    }

    /// Print the diagnostic to stderr with colored formatting
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for description in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
        }
    }
}

/// Main error type for the couchctl application
#[derive(Error, Debug)]
pub enum CouchCtlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Server error: {message}")]
    ApiError { message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Not supported by this server: {message}")]
    Unsupported { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

/// Result type for couchctl operations
pub type Result<T> = std::result::Result<T, CouchCtlError>;

impl CouchCtlError {
    /// Hints for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            CouchCtlError::ProfileNotFound { name } => vec![
                "List available profiles: couchctl profile list".to_string(),
                format!(
                    "Create profile '{}': couchctl profile set {} --url <url>",
                    name, name
                ),
            ],
            CouchCtlError::AuthenticationFailed { .. } => vec![
                "Check the stored credentials: couchctl profile show <profile>".to_string(),
                "Override them for one call with --user and --password".to_string(),
                "Admin-only endpoints need a server admin account".to_string(),
            ],
            CouchCtlError::ConnectionError { .. } => vec![
                "Check that the server is running and reachable".to_string(),
                "Verify the server URL: couchctl profile show <profile>".to_string(),
            ],
            CouchCtlError::Timeout { .. } => {
                vec!["Raise the request timeout with --timeout <seconds>".to_string()]
            }
            CouchCtlError::NotFound { .. } => vec![
                "List databases: couchctl db list --all".to_string(),
                "List users: couchctl user list".to_string(),
            ],
            CouchCtlError::Unsupported { .. } => vec![
                "Clustering requires CouchDB 2.0 or later; check: couchctl info".to_string(),
            ],
            CouchCtlError::InvalidInput { .. } => {
                vec!["Check the command syntax: couchctl <command> --help".to_string()]
            }
            _ => vec![],
        }
    }

    /// Print a cargo-style diagnostic to stderr
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&self.to_string());

        if let CouchCtlError::ConnectionError { message } = self
            && message.contains("certificate")
        {
            diag = diag.detail("TLS verification failed for the server certificate");
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion);
        }

        diag.print();
    }
}

impl From<CouchError> for CouchCtlError {
    fn from(err: CouchError) -> Self {
        match err {
            CouchError::Unauthorized { reason } | CouchError::Forbidden { reason } => {
                CouchCtlError::AuthenticationFailed { message: reason }
            }
            CouchError::ContentNotFound { path } => CouchCtlError::NotFound { message: path },
            CouchError::Request(e) if e.is_timeout() => CouchCtlError::Timeout {
                message: e.to_string(),
            },
            CouchError::Request(e) => CouchCtlError::ConnectionError {
                message: e.to_string(),
            },
            CouchError::Config(e) => CouchCtlError::from(e),
            e @ (CouchError::InvalidUrl { .. } | CouchError::InvalidAuthMode(_)) => {
                CouchCtlError::InvalidInput {
                    message: e.to_string(),
                }
            }
            e => CouchCtlError::ApiError {
                message: e.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CouchCtlError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => CouchCtlError::ProfileNotFound { name },
            e => CouchCtlError::Configuration(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CouchCtlError {
    fn from(err: serde_json::Error) -> Self {
        CouchCtlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for CouchCtlError {
    fn from(err: std::io::Error) -> Self {
        CouchCtlError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<anyhow::Error> for CouchCtlError {
    fn from(err: anyhow::Error) -> Self {
        CouchCtlError::Configuration(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_authentication_failed() {
        let err: CouchCtlError = CouchError::Unauthorized {
            reason: "Name or password is incorrect.".to_string(),
        }
        .into();
        assert!(matches!(err, CouchCtlError::AuthenticationFailed { .. }));
        assert!(err.to_string().contains("Name or password is incorrect."));

        let err: CouchCtlError = CouchError::Forbidden {
            reason: "You are not a server admin.".to_string(),
        }
        .into();
        assert!(matches!(err, CouchCtlError::AuthenticationFailed { .. }));
    }

    #[test]
    fn test_refusals_keep_reason() {
        let err: CouchCtlError = CouchError::DatabaseNotCreatable {
            reason: Some("The database could not be created, the file already exists.".into()),
        }
        .into();
        assert!(err.to_string().contains("file already exists"));
    }

    #[test]
    fn test_profile_not_found_has_suggestions() {
        let err: CouchCtlError = ConfigError::ProfileNotFound {
            name: "prod".to_string(),
        }
        .into();
        let suggestions = err.suggestions();
        assert!(suggestions.iter().any(|s| s.contains("couchctl profile set prod")));
    }

    #[test]
    fn test_invalid_auth_mode_is_input_error() {
        let err: CouchCtlError = CouchError::InvalidAuthMode("kerberos".into()).into();
        assert!(matches!(err, CouchCtlError::InvalidInput { .. }));
    }
}
