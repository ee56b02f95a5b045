//! Handles to remote databases

use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::communication::Communication;
use crate::error::{CouchError, Result};

/// Percent-encode a name for use as one path segment
pub(crate) fn encode_segment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// A named database on the server.
///
/// The handle shares the transport of the connection that issued it.
/// Existence is not cached; every check goes to the server.
#[derive(Clone)]
pub struct DatabaseHandle {
    comm: Arc<dyn Communication>,
    name: String,
}

impl DatabaseHandle {
    pub fn new(comm: Arc<dyn Communication>, name: impl Into<String>) -> Self {
        Self {
            comm,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `/<percent-encoded name>`
    pub fn path(&self) -> String {
        format!("/{}", encode_segment(&self.name))
    }

    /// The shared transport, for document and view operations built on top
    pub fn communication(&self) -> &Arc<dyn Communication> {
        &self.comm
    }

    /// `HEAD /{db}`; `Ok(false)` when the server reports 404
    pub async fn exists(&self) -> Result<bool> {
        match self.comm.issue(&self.path(), Method::HEAD, None, true).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `GET /{db}`: document counts, sizes, update sequence
    pub async fn info(&self) -> Result<Value> {
        let response = self.comm.get_data(&self.path()).await?;
        if !response.is_object() {
            return Err(CouchError::BadResponse(format!(
                "database info for '{}' is not an object",
                self.name
            )));
        }
        Ok(response)
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for DatabaseHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.comm, &other.comm)
    }
}
