//! How outgoing requests carry credentials

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CouchError;

/// Authentication mode held by the transport.
///
/// - `None` sends no credentials.
/// - `Basic` sends an `Authorization: Basic` header on every request.
/// - `Cookie` sends the `AuthSession` cookie obtained from `POST /_session`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Basic,
    Cookie,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Basic => "basic",
            AuthMode::Cookie => "cookie",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = CouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthMode::None),
            "basic" => Ok(AuthMode::Basic),
            "cookie" => Ok(AuthMode::Cookie),
            _ => Err(CouchError::InvalidAuthMode(s.to_string())),
        }
    }
}
