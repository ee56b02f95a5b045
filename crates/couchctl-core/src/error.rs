//! Unified error handling for couchctl-core
//!
//! Every failure a [`Connection`](crate::Connection) can report is a variant of
//! [`CouchError`]. Callers pattern-match on the variant or use the predicate
//! helpers.
//!
//! # Example
//!
//! ```rust
//! use couchctl_core::CouchError;
//!
//! fn describe(err: &CouchError) -> &'static str {
//!     if err.is_not_found() {
//!         "missing"
//!     } else if err.is_unauthorized() {
//!         "check your credentials"
//!     } else {
//!         "failed"
//!     }
//! }
//!
//! let err = CouchError::ContentNotFound { path: "/reports".to_string() };
//! assert_eq!(describe(&err), "missing");
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Core error type for every CouchDB operation
#[derive(Error, Debug)]
pub enum CouchError {
    /// The server answered with JSON of an unexpected shape
    #[error("Bad response from server: {0}")]
    BadResponse(String),

    /// `/_all_dbs` did not return an array
    #[error("Database list unavailable")]
    DatabaseUnavailable,

    /// Creating a database was refused
    #[error("Database not creatable{}", reason_suffix(.reason))]
    DatabaseNotCreatable { reason: Option<String> },

    /// Deleting a database was refused
    #[error("Database not deletable{}", reason_suffix(.reason))]
    DatabaseNotDeletable { reason: Option<String> },

    /// The server reported 404 for the requested path
    #[error("Content not found: {path}")]
    ContentNotFound { path: String },

    /// HTTP 401
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// HTTP 403
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// HTTP 5xx
    #[error("Server error ({status}): {reason}")]
    Server { status: u16, reason: String },

    /// Network, TLS or timeout failure from the HTTP client
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The server URL could not be parsed
    #[error("Invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// An authentication mode name was not recognised
    #[error("Unknown authentication mode '{0}' (expected none, basic or cookie)")]
    InvalidAuthMode(String),

    /// Configuration or credential resolution failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CouchError>;

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl CouchError {
    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CouchError::ContentNotFound { .. })
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            CouchError::Unauthorized { .. } | CouchError::Forbidden { .. }
        )
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, CouchError::Server { .. })
    }

    /// Returns true if the request timed out in the transport
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CouchError::Request(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if the server answered with an unexpected shape
    #[must_use]
    pub fn is_bad_response(&self) -> bool {
        matches!(
            self,
            CouchError::BadResponse(_) | CouchError::DatabaseUnavailable | CouchError::Json(_)
        )
    }

    /// The server-supplied reason, when the error carries one
    pub fn reason(&self) -> Option<&str> {
        match self {
            CouchError::DatabaseNotCreatable { reason }
            | CouchError::DatabaseNotDeletable { reason } => reason.as_deref(),
            CouchError::Unauthorized { reason }
            | CouchError::Forbidden { reason }
            | CouchError::Server { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        let err = CouchError::ContentNotFound {
            path: "/missing".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_unauthorized_covers_401_and_403() {
        let unauthorized = CouchError::Unauthorized {
            reason: "Name or password is incorrect.".to_string(),
        };
        let forbidden = CouchError::Forbidden {
            reason: "You are not a server admin.".to_string(),
        };
        assert!(unauthorized.is_unauthorized());
        assert!(forbidden.is_unauthorized());
        assert!(!forbidden.is_not_found());
    }

    #[test]
    fn test_reason_accessor() {
        let err = CouchError::DatabaseNotCreatable {
            reason: Some("The database could not be created, the file already exists.".into()),
        };
        assert_eq!(
            err.reason(),
            Some("The database could not be created, the file already exists.")
        );

        let err = CouchError::DatabaseNotDeletable { reason: None };
        assert_eq!(err.reason(), None);
        assert_eq!(CouchError::DatabaseUnavailable.reason(), None);
    }

    #[test]
    fn test_display_includes_reason_when_present() {
        let with_reason = CouchError::DatabaseNotCreatable {
            reason: Some("file_exists".to_string()),
        };
        assert_eq!(with_reason.to_string(), "Database not creatable: file_exists");

        let without = CouchError::DatabaseNotDeletable { reason: None };
        assert_eq!(without.to_string(), "Database not deletable");
    }

    #[test]
    fn test_bad_response_family() {
        assert!(CouchError::BadResponse("not an object".into()).is_bad_response());
        assert!(CouchError::DatabaseUnavailable.is_bad_response());
        assert!(!CouchError::Server {
            status: 500,
            reason: "boom".into()
        }
        .is_bad_response());
    }
}
