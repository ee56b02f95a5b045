//! Session-level client for one CouchDB server
//!
//! [`Connection`] coordinates authentication, server version detection and
//! the lifecycle of databases and users. Each operation is one or more
//! sequential requests through the shared [`Communication`]; the JSON that
//! comes back is validated and reshaped into typed results or
//! [`CouchError`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use couchctl_core::{AuthMode, Connection, User};
//!
//! # async fn example() -> couchctl_core::Result<()> {
//! let conn = Connection::new(
//!     "http://localhost:5984",
//!     User::new("admin", "secret"),
//!     AuthMode::Cookie,
//! )?;
//!
//! conn.login().await?;
//! let reports = conn.ensure_db_exists("reports").await?.into_inner();
//! println!("{} exists: {}", reports.name(), reports.exists().await?);
//!
//! for name in conn.list_db_names().await? {
//!     println!("{}", name);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::Method;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::AuthMode;
use crate::cluster::{ClusterConnection, NodeConnection};
use crate::communication::{AuthModeGuard, Communication};
use crate::config::Profile;
use crate::database::{DatabaseHandle, encode_segment};
use crate::error::{CouchError, Result};
use crate::http::HttpCommunication;
use crate::user::User;
use crate::version::ServerVersionInfo;

/// Prefix of every document id in the `_users` database
pub const USER_DOC_PREFIX: &str = "org.couchdb.user:";

/// Outcome of [`Connection::ensure_db_exists`]
#[derive(Debug, Clone, PartialEq)]
pub enum Ensured<T> {
    /// The resource was already there
    Existing(T),
    /// The resource was created by this call
    Created(T),
}

impl<T> Ensured<T> {
    pub fn into_inner(self) -> T {
        match self {
            Ensured::Existing(inner) | Ensured::Created(inner) => inner,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }
}

/// Outcome of [`Connection::ensure_db_is_deleted`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    AlreadyAbsent,
}

/// Names starting with `_` or `shards/` are reserved by the server
fn is_reserved_db_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with("shards/")
}

fn user_doc_path(name: &str) -> String {
    format!("/_users/{}{}", USER_DOC_PREFIX, encode_segment(name))
}

/// `Err(reason)` when a create/delete reply carries `error` or lacks `ok: true`
fn acknowledged(response: &Value) -> std::result::Result<(), Option<String>> {
    if response.get("error").is_some() {
        return Err(response
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string));
    }
    if response.get("ok").and_then(Value::as_bool) != Some(true) {
        return Err(None);
    }
    Ok(())
}

/// The session-level client.
///
/// The transport is shared: every [`DatabaseHandle`], [`ClusterConnection`]
/// and [`NodeConnection`] issued here holds its own reference to it and keeps
/// working after the connection is dropped.
///
/// Login, logout and credential validation are serialised per connection.
/// They toggle the transport's authentication mode while they run, so
/// requests issued concurrently through handles on the same transport can
/// observe the transient mode.
pub struct Connection {
    comm: Arc<dyn Communication>,
    version: Mutex<Option<ServerVersionInfo>>,
    session_lock: tokio::sync::Mutex<()>,
}

impl Connection {
    /// Connect to `url` over HTTP with the given credentials and mode
    pub fn new(url: &str, user: User, auth_mode: AuthMode) -> Result<Self> {
        let comm = HttpCommunication::builder()
            .base_url(url)
            .user(user)
            .auth_mode(auth_mode)
            .build()?;
        Ok(Self::with_communication(Arc::new(comm)))
    }

    /// Wrap an existing transport, e.g. one shared with other connections
    pub fn with_communication(comm: Arc<dyn Communication>) -> Self {
        Self {
            comm,
            version: Mutex::new(None),
            session_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build from a configuration profile, resolving env and keyring references
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let resolved = profile.resolve()?;
        let mut builder = HttpCommunication::builder()
            .base_url(resolved.url)
            .user(resolved.user)
            .auth_mode(resolved.auth);
        if let Some(timeout) = resolved.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_communication(Arc::new(builder.build()?)))
    }

    /// The shared low-level transport
    pub fn communication(&self) -> &Arc<dyn Communication> {
        &self.comm
    }

    fn cached_version(&self) -> MutexGuard<'_, Option<ServerVersionInfo>> {
        self.version.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, name: &str) -> DatabaseHandle {
        DatabaseHandle::new(self.comm.clone(), name)
    }

    // ---------------------------------------------------------------------
    // Transport pass-through
    // ---------------------------------------------------------------------

    pub fn timeout(&self) -> Option<Duration> {
        self.comm.timeout()
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) -> &Self {
        self.comm.set_timeout(timeout);
        self
    }

    pub fn server_url(&self) -> String {
        self.comm.server_url()
    }

    /// Point the connection at another server.
    ///
    /// The cached version information belongs to the old server and is
    /// discarded.
    pub fn set_server_url(&self, url: &str) -> Result<&Self> {
        self.comm.set_server_url(url)?;
        *self.cached_version() = None;
        debug!("Server URL set to {}", url);
        Ok(self)
    }

    pub fn user(&self) -> User {
        self.comm.user()
    }

    pub fn set_user(&self, user: User) -> &Self {
        self.comm.set_user(user);
        self
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.comm.auth_mode()
    }

    /// `"none"`, `"basic"` or `"cookie"`
    pub fn auth_mode_readable(&self) -> &'static str {
        self.comm.auth_mode().as_str()
    }

    pub fn set_auth_mode(&self, mode: AuthMode) -> &Self {
        self.comm.set_auth_mode(mode);
        self
    }

    /// Set the mode from its name, case-insensitively
    pub fn set_auth_mode_str(&self, mode: &str) -> Result<&Self> {
        self.comm.set_auth_mode(mode.parse()?);
        Ok(self)
    }

    // ---------------------------------------------------------------------
    // Version and capability negotiation
    // ---------------------------------------------------------------------

    /// Server root information, fetched once and cached
    pub async fn get_couchdb_info(&self) -> Result<ServerVersionInfo> {
        if let Some(info) = self.cached_version().as_ref() {
            return Ok(info.clone());
        }

        let response = self.comm.issue("/", Method::GET, None, true).await?;
        let info = ServerVersionInfo::from_root(response)?;
        debug!(
            "Server version {} (major {})",
            info.version(),
            info.major()
        );

        *self.cached_version() = Some(info.clone());
        Ok(info)
    }

    pub async fn get_couchdb_version(&self) -> Result<String> {
        Ok(self.get_couchdb_info().await?.version().to_string())
    }

    /// Major version, or -1 when the version string is not understood
    pub async fn get_major_version(&self) -> Result<i32> {
        Ok(self.get_couchdb_info().await?.major())
    }

    pub async fn get_supports_clusters(&self) -> Result<bool> {
        Ok(self.get_couchdb_info().await?.supports_clusters())
    }

    /// A cluster handle, or `None` when the server predates clustering
    pub async fn upgrade_to_cluster_connection(
        &self,
        node_local_port: u16,
    ) -> Result<Option<ClusterConnection>> {
        if self.get_supports_clusters().await? {
            Ok(Some(ClusterConnection::new(
                self.comm.clone(),
                node_local_port,
            )))
        } else {
            Ok(None)
        }
    }

    /// A single node handle.
    ///
    /// Without clustering this is the server itself (empty node name). With
    /// clustering it is the first node the cluster enumerates; `None` only if
    /// the cluster reports no nodes at all.
    pub async fn upgrade_to_node_connection(
        &self,
        node_local_port: u16,
    ) -> Result<Option<NodeConnection>> {
        if self.get_supports_clusters().await? {
            ClusterConnection::new(self.comm.clone(), node_local_port)
                .first_node()
                .await
        } else {
            Ok(Some(NodeConnection::new(
                self.comm.clone(),
                node_local_port,
                "",
            )))
        }
    }

    // ---------------------------------------------------------------------
    // Server utilities
    // ---------------------------------------------------------------------

    /// `count` UUIDs generated by the server
    pub async fn get_uuids(&self, count: usize) -> Result<Vec<String>> {
        let response = self
            .comm
            .get_data(&format!("/_uuids?count={}", count))
            .await?;

        response
            .get("uuids")
            .and_then(Value::as_array)
            .ok_or_else(|| CouchError::BadResponse("/_uuids has no uuids array".to_string()))?
            .iter()
            .map(|uuid| {
                uuid.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| CouchError::BadResponse("uuid is not a string".to_string()))
            })
            .collect()
    }

    /// `GET /_active_tasks`
    pub async fn get_active_tasks(&self) -> Result<Vec<Value>> {
        match self.comm.get_data("/_active_tasks").await? {
            Value::Array(tasks) => Ok(tasks),
            _ => Err(CouchError::BadResponse(
                "/_active_tasks did not return an array".to_string(),
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Databases
    // ---------------------------------------------------------------------

    async fn all_db_names(&self) -> Result<Vec<String>> {
        let Value::Array(names) = self.comm.get_data("/_all_dbs").await? else {
            return Err(CouchError::DatabaseUnavailable);
        };

        names
            .into_iter()
            .map(|name| match name {
                Value::String(name) => Ok(name),
                other => Err(CouchError::BadResponse(format!(
                    "database name is not a string: {}",
                    other
                ))),
            })
            .collect()
    }

    /// Database names, excluding reserved (`_…`) and shard (`shards/…`) names
    pub async fn list_db_names(&self) -> Result<Vec<String>> {
        Ok(self
            .all_db_names()
            .await?
            .into_iter()
            .filter(|name| !is_reserved_db_name(name))
            .collect())
    }

    /// Every database name the server reports, in server order
    pub async fn list_all_db_names(&self) -> Result<Vec<String>> {
        self.all_db_names().await
    }

    /// Handles for [`list_db_names`](Self::list_db_names)
    pub async fn list_dbs(&self) -> Result<Vec<DatabaseHandle>> {
        Ok(self
            .list_db_names()
            .await?
            .iter()
            .map(|name| self.handle(name))
            .collect())
    }

    /// Handles for [`list_all_db_names`](Self::list_all_db_names)
    pub async fn list_all_dbs(&self) -> Result<Vec<DatabaseHandle>> {
        Ok(self
            .all_db_names()
            .await?
            .iter()
            .map(|name| self.handle(name))
            .collect())
    }

    /// Probe `HEAD /{db}` and return a handle; `ContentNotFound` if absent
    pub async fn get_db(&self, name: &str) -> Result<DatabaseHandle> {
        let handle = self.handle(name);
        self.comm
            .issue(&handle.path(), Method::HEAD, None, true)
            .await?;
        Ok(handle)
    }

    /// True if the database exists; never fails for a missing database
    pub async fn db_exists(&self, name: &str) -> Result<bool> {
        self.handle(name).exists().await
    }

    /// `PUT /{db}`
    pub async fn create_db(&self, name: &str) -> Result<DatabaseHandle> {
        let handle = self.handle(name);
        let response = self
            .comm
            .issue(&handle.path(), Method::PUT, None, false)
            .await?;
        if !response.is_object() {
            return Err(CouchError::DatabaseUnavailable);
        }

        if let Err(reason) = acknowledged(&response) {
            debug!(
                "Unable to create database '{}': {}",
                name,
                reason.as_deref().unwrap_or("not acknowledged")
            );
            return Err(CouchError::DatabaseNotCreatable { reason });
        }

        info!("Created database '{}'", name);
        Ok(handle)
    }

    /// `DELETE /{db}`. Irreversible.
    pub async fn remove_db(&self, name: &str) -> Result<&Self> {
        let response = self
            .comm
            .issue(&self.handle(name).path(), Method::DELETE, None, false)
            .await?;
        if !response.is_object() {
            return Err(CouchError::DatabaseNotDeletable { reason: None });
        }

        if let Err(reason) = acknowledged(&response) {
            debug!(
                "Unable to delete database '{}': {}",
                name,
                reason.as_deref().unwrap_or("not acknowledged")
            );
            return Err(CouchError::DatabaseNotDeletable { reason });
        }

        info!("Deleted database '{}'", name);
        Ok(self)
    }

    /// Return the database, creating it if the server reports it missing
    pub async fn ensure_db_exists(&self, name: &str) -> Result<Ensured<DatabaseHandle>> {
        match self.get_db(name).await {
            Ok(handle) => Ok(Ensured::Existing(handle)),
            Err(e) if e.is_not_found() => Ok(Ensured::Created(self.create_db(name).await?)),
            Err(e) => Err(e),
        }
    }

    /// Delete the database; a missing or undeletable one counts as gone
    pub async fn ensure_db_is_deleted(&self, name: &str) -> Result<Removal> {
        match self.remove_db(name).await {
            Ok(_) => Ok(Removal::Deleted),
            Err(CouchError::ContentNotFound { .. } | CouchError::DatabaseNotDeletable { .. }) => {
                debug!("Database '{}' already absent", name);
                Ok(Removal::AlreadyAbsent)
            }
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Authentication
    // ---------------------------------------------------------------------

    async fn post_session(&self) -> Result<Value> {
        let user = self.comm.user();
        let credentials = json!({
            "name": user.username(),
            "password": user.password(),
        });
        self.comm
            .issue("/_session", Method::POST, Some(credentials), false)
            .await
    }

    async fn logout_locked(&self) -> Result<()> {
        if self.comm.auth_mode() == AuthMode::Cookie {
            self.comm
                .issue("/_session", Method::DELETE, None, false)
                .await?;
            info!("Session closed");
        }
        Ok(())
    }

    async fn validate_credentials_locked(&self) -> Result<Value> {
        let restore = AuthModeGuard::new(self.comm.as_ref());

        // Basic auth so a stale cookie is not presented instead of the credentials
        self.comm.set_auth_mode(AuthMode::Basic);
        let response = self.post_session().await?;

        // Drop the session the server just opened
        self.comm.set_auth_mode(AuthMode::Cookie);
        if let Err(e) = self.logout_locked().await {
            warn!(
                "Discarding validation session failed, restoring '{}' mode: {}",
                restore.original(),
                e
            );
            return Err(e);
        }

        info!("Credentials validated for '{}'", self.comm.user().username());
        Ok(response)
    }

    async fn establish_session_locked(&self) -> Result<Value> {
        let response = {
            let _restore = AuthModeGuard::new(self.comm.as_ref());
            self.comm.set_auth_mode(AuthMode::Basic);
            self.post_session().await?
        };

        self.comm.set_auth_mode(AuthMode::Cookie);
        info!("Session established for '{}'", self.comm.user().username());
        Ok(response)
    }

    /// Check the held credentials with a `POST /_session` round trip and
    /// immediately discard the session. The authentication mode is unchanged
    /// afterwards, whether or not the check succeeds.
    pub async fn validate_credentials(&self) -> Result<Value> {
        let _session = self.session_lock.lock().await;
        self.validate_credentials_locked().await
    }

    /// Open a cookie session with the held credentials and switch the
    /// transport to cookie mode. On failure the original mode is kept.
    pub async fn establish_session(&self) -> Result<Value> {
        let _session = self.session_lock.lock().await;
        self.establish_session_locked().await
    }

    /// Log in according to the current mode.
    ///
    /// - `none`: nothing to do.
    /// - `basic`: validate the credentials, keep no session.
    /// - `cookie`: open a session and keep its cookie.
    pub async fn login(&self) -> Result<&Self> {
        let _session = self.session_lock.lock().await;
        match self.comm.auth_mode() {
            AuthMode::None => debug!("No authentication configured, login skipped"),
            AuthMode::Basic => {
                self.validate_credentials_locked().await?;
            }
            AuthMode::Cookie => {
                self.establish_session_locked().await?;
            }
        }
        Ok(self)
    }

    /// The `GET /_session` payload in cookie mode; `None` without a request otherwise
    pub async fn get_login_info(&self) -> Result<Option<Value>> {
        match self.comm.auth_mode() {
            AuthMode::Cookie => Ok(Some(self.comm.get_data("/_session").await?)),
            AuthMode::None | AuthMode::Basic => Ok(None),
        }
    }

    /// Drop the server-side session in cookie mode. The local mode is kept.
    pub async fn logout(&self) -> Result<&Self> {
        let _session = self.session_lock.lock().await;
        self.logout_locked().await?;
        Ok(self)
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    /// `PUT /_users/org.couchdb.user:{name}`. The raw reply is returned so the
    /// caller can tell `ok` from a conflict.
    pub async fn create_user(
        &self,
        name: &str,
        password: &str,
        roles: &[String],
    ) -> Result<Value> {
        let password = if password.is_empty() {
            Value::Null
        } else {
            Value::from(password)
        };
        // `_users` validation requires `roles`, even when empty
        let doc = json!({
            "name": name,
            "password": password,
            "roles": roles,
            "type": "user",
        });

        debug!("Creating user '{}'", name);
        self.comm
            .issue(&user_doc_path(name), Method::PUT, Some(doc), false)
            .await
    }

    /// [`create_user`](Self::create_user) from a [`User`] value
    pub async fn create_user_from(&self, user: &User, roles: &[String]) -> Result<Value> {
        self.create_user(user.username(), user.password(), roles)
            .await
    }

    pub async fn get_user_info(&self, name: &str) -> Result<Value> {
        self.comm.get_data(&user_doc_path(name)).await
    }

    pub async fn delete_user(&self, name: &str) -> Result<Value> {
        debug!("Deleting user '{}'", name);
        self.comm
            .issue(&user_doc_path(name), Method::DELETE, None, false)
            .await
    }

    /// Names of the user documents in `_users`, in server order
    pub async fn list_user_names(&self) -> Result<Vec<String>> {
        let response = self.comm.get_data("/_users/_all_docs").await?;
        let rows = response
            .get("rows")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CouchError::BadResponse("/_users/_all_docs has no rows array".to_string())
            })?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .filter(|id| !id.starts_with('_'))
            .map(|id| id.strip_prefix(USER_DOC_PREFIX).unwrap_or(id))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("server_url", &self.comm.server_url())
            .field("auth_mode", &self.comm.auth_mode())
            .finish_non_exhaustive()
    }
}
