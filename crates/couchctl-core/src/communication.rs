//! The transport seam between [`Connection`](crate::Connection) and the wire
//!
//! A `Communication` executes one HTTP request against the configured server
//! and hands back parsed JSON. It also owns the live session state: the
//! authentication mode, the credentials and any session cookie captured from
//! the server.
//!
//! One transport object backs a logical server session. It is shared as an
//! `Arc<dyn Communication>` by the connection and by every handle the
//! connection issues, so a handle stays usable after the connection that
//! created it is dropped.
//!
//! # Concurrency
//!
//! Implementations guard their own state, so each accessor is atomic. The
//! authentication mode is nevertheless shared: while a `Connection` is in the
//! middle of `login()` it toggles the mode, and a concurrent request issued
//! through another handle on the same transport may observe the transient
//! mode. Serialise such use externally if it matters.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::auth::AuthMode;
use crate::error::Result;
use crate::user::User;

#[async_trait]
pub trait Communication: Send + Sync {
    /// Issue `method` against `path` (relative to the server URL).
    ///
    /// With `tolerate_empty` set, an empty response body yields
    /// `Value::Null` instead of a `BadResponse` error.
    async fn issue(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
        tolerate_empty: bool,
    ) -> Result<Value>;

    fn auth_mode(&self) -> AuthMode;
    fn set_auth_mode(&self, mode: AuthMode);

    fn user(&self) -> User;
    fn set_user(&self, user: User);

    fn server_url(&self) -> String;
    fn set_server_url(&self, url: &str) -> Result<()>;

    fn timeout(&self) -> Option<Duration>;
    fn set_timeout(&self, timeout: Option<Duration>);

    /// `GET path`, requiring a body
    async fn get_data(&self, path: &str) -> Result<Value> {
        self.issue(path, Method::GET, None, false).await
    }
}

/// Restores the transport's authentication mode when dropped.
///
/// Used around multi-step sequences that toggle the mode so that every exit
/// path, including early returns through `?`, leaves the original mode in
/// place.
pub(crate) struct AuthModeGuard<'a> {
    comm: &'a dyn Communication,
    original: AuthMode,
}

impl<'a> AuthModeGuard<'a> {
    pub(crate) fn new(comm: &'a dyn Communication) -> Self {
        Self {
            original: comm.auth_mode(),
            comm,
        }
    }

    pub(crate) fn original(&self) -> AuthMode {
        self.original
    }
}

impl Drop for AuthModeGuard<'_> {
    fn drop(&mut self) {
        self.comm.set_auth_mode(self.original);
    }
}
