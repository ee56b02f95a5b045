//! Profiles for the CouchDB servers a user talks to
//!
//! Profiles live in a TOML file at the platform config location. Values may
//! reference environment variables (`${VAR}`, `${VAR:-default}`) and, with the
//! `secure-storage` feature, secrets kept in the OS keyring (`keyring:<key>`).

// Nested `config::config`: the module is the subsystem, the file holds `Config`
#![allow(clippy::module_inception)]

pub mod config;
pub mod credential;
pub mod error;

pub use config::{Config, ENV_PASSWORD, ENV_URL, ENV_USER, Profile, ResolvedProfile};
pub use credential::{CredentialStorage, CredentialStore};
pub use error::{ConfigError, Result};
