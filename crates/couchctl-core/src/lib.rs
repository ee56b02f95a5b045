//! # couchctl-core
//!
//! Session-level client for CouchDB servers.
//!
//! The crate sits on top of a low-level transport ([`Communication`]) that
//! issues one JSON request at a time, and provides:
//!
//! - **Authentication** - `none`, `basic` and `cookie` modes, with login,
//!   logout and credential validation built on `/_session`
//! - **Version negotiation** - the server root is read once and cached; the
//!   major version decides whether clustering is available
//! - **Database lifecycle** - list, probe, create, delete, and idempotent
//!   `ensure_*` variants
//! - **User management** - documents in the `_users` database
//! - **Topology** - upgrade to a [`ClusterConnection`] or [`NodeConnection`]
//! - **Profiles** - TOML configuration with env expansion and optional
//!   keyring-backed secrets
//!
//! ## Crate Structure
//!
//! ```text
//! couchctl-core/
//! ├── src/
//! │   ├── lib.rs
//! │   ├── connection.rs    # Connection: the session-level client
//! │   ├── communication.rs # Communication trait (transport seam)
//! │   ├── http.rs          # reqwest-backed Communication
//! │   ├── auth.rs          # AuthMode
//! │   ├── user.rs          # User credentials
//! │   ├── version.rs       # ServerVersionInfo
//! │   ├── database.rs      # DatabaseHandle
//! │   ├── cluster.rs       # ClusterConnection, NodeConnection
//! │   ├── error.rs         # CouchError
//! │   ├── testing.rs       # scripted Communication (test-support)
//! │   └── config/          # profiles, credentials
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use couchctl_core::{AuthMode, Connection, DEFAULT_NODE_LOCAL_PORT, User};
//!
//! # async fn example() -> couchctl_core::Result<()> {
//! let conn = Connection::new("http://localhost:5984", User::new("admin", "secret"), AuthMode::Basic)?;
//! conn.login().await?;
//!
//! println!("CouchDB {}", conn.get_couchdb_version().await?);
//! if let Some(cluster) = conn.upgrade_to_cluster_connection(DEFAULT_NODE_LOCAL_PORT).await? {
//!     for node in cluster.nodes().await? {
//!         println!("node {}", node.name());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cluster;
pub mod communication;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod http;
pub mod user;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use auth::AuthMode;
pub use cluster::{ClusterConnection, DEFAULT_NODE_LOCAL_PORT, NodeConnection};
pub use communication::Communication;
pub use config::{Config, ConfigError, Profile, ResolvedProfile};
pub use connection::{Connection, Ensured, Removal};
pub use database::DatabaseHandle;
pub use error::{CouchError, Result};
pub use http::{COUCHCTL_USER_AGENT, HttpCommunication, HttpCommunicationBuilder};
pub use user::User;
pub use version::ServerVersionInfo;
