//! Server version detection

use serde_json::Value;

use crate::error::{CouchError, Result};

/// Major version reported when the version string cannot be parsed
pub const UNKNOWN_MAJOR_VERSION: i32 = -1;

/// First major version with clustering (`/_membership`, `/_node/...`)
pub const FIRST_CLUSTERED_MAJOR: i32 = 2;

/// What the server root endpoint says about itself
#[derive(Debug, Clone, PartialEq)]
pub struct ServerVersionInfo {
    version: String,
    major: i32,
    raw: Value,
}

impl ServerVersionInfo {
    /// Build from the `GET /` payload.
    ///
    /// The payload must be an object. A missing or non-string `version`
    /// is read as an empty string, which yields an unknown major version.
    pub fn from_root(response: Value) -> Result<Self> {
        if !response.is_object() {
            return Err(CouchError::BadResponse(
                "server root did not return an object".to_string(),
            ));
        }

        let version = response
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let major = parse_major(&version);

        Ok(Self {
            version,
            major,
            raw: response,
        })
    }

    /// Full version string, e.g. `"3.3.3"`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Major version, or [`UNKNOWN_MAJOR_VERSION`]
    pub fn major(&self) -> i32 {
        self.major
    }

    /// The whole root payload (`couchdb`, `vendor`, `features`, ...)
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn supports_clusters(&self) -> bool {
        self.major >= FIRST_CLUSTERED_MAJOR
    }
}

/// Integer before the first `.`; [`UNKNOWN_MAJOR_VERSION`] if that is not a number
pub fn parse_major(version: &str) -> i32 {
    let head = version.split('.').next().unwrap_or_default();
    head.trim().parse().unwrap_or(UNKNOWN_MAJOR_VERSION)
}
