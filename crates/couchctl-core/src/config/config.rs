//! Profile file handling
//!
//! Configuration is stored in TOML with any number of named profiles, each
//! describing one server and how to authenticate against it.
//!
//! ```toml
//! default_profile = "local"
//!
//! [profiles.local]
//! url = "http://localhost:5984"
//! username = "admin"
//! password = "${COUCH_ADMIN_PASSWORD}"
//! auth = "cookie"
//!
//! [profiles.staging]
//! url = "https://couch.staging.example.com"
//! auth = "basic"
//! username = "deploy"
//! password = "keyring:staging-deploy"
//! timeout_secs = 30
//! ```

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::credential::CredentialStore;
use super::error::{ConfigError, Result};
use crate::auth::AuthMode;
use crate::cluster::DEFAULT_NODE_LOCAL_PORT;
use crate::user::User;

/// Overrides the profile's server URL
pub const ENV_URL: &str = "COUCH_URL";
/// Overrides the profile's username
pub const ENV_USER: &str = "COUCH_USER";
/// Overrides the profile's password
pub const ENV_PASSWORD: &str = "COUCH_PASSWORD";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Profile used when none is named on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// One server and the credentials to use with it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plaintext, `${VAR}` or `keyring:<key>`; prompted for when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_node_local_port")]
    pub node_local_port: u16,
}

fn default_node_local_port() -> u16 {
    DEFAULT_NODE_LOCAL_PORT
}

/// A profile with every reference resolved, ready to connect with
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub url: String,
    pub user: User,
    pub auth: AuthMode,
    pub timeout: Option<Duration>,
    pub node_local_port: u16,
}

impl Profile {
    /// Anonymous profile for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            auth: AuthMode::None,
            timeout_secs: None,
            node_local_port: DEFAULT_NODE_LOCAL_PORT,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Resolve keyring references, letting `COUCH_URL`, `COUCH_USER` and
    /// `COUCH_PASSWORD` override the stored values
    pub fn resolve(&self) -> Result<ResolvedProfile> {
        self.resolve_with(true)
    }

    /// Resolve keyring references only, ignoring the environment
    pub fn resolve_stored(&self) -> Result<ResolvedProfile> {
        self.resolve_with(false)
    }

    fn resolve_with(&self, use_env: bool) -> Result<ResolvedProfile> {
        let store = CredentialStore::new();
        let env = |var: &'static str| use_env.then_some(var);

        let url = store.get_credential(&self.url, env(ENV_URL)).map_err(|e| {
            ConfigError::CredentialError(format!("Failed to resolve URL: {}", e))
        })?;
        let username = store
            .get_credential(self.username.as_deref().unwrap_or_default(), env(ENV_USER))
            .map_err(|e| {
                ConfigError::CredentialError(format!("Failed to resolve username: {}", e))
            })?;
        let password = store
            .get_credential(self.password.as_deref().unwrap_or_default(), env(ENV_PASSWORD))
            .map_err(|e| {
                ConfigError::CredentialError(format!("Failed to resolve password: {}", e))
            })?;

        Ok(ResolvedProfile {
            url,
            user: User::new(username, password),
            auth: self.auth,
            timeout: self.timeout(),
            node_local_port: self.node_local_port,
        })
    }
}

impl Config {
    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path; a missing file is an empty config
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        let config: Config = toml::from_str(&Self::expand_env_vars(&content))?;
        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Set or update a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Remove a profile, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// All profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Pick the profile to use: explicit name, then the default, then the
    /// first by name
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            if !self.profiles.contains_key(name) {
                return Err(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        self.list_profiles()
            .first()
            .map(|(name, _)| (*name).clone())
            .ok_or_else(|| ConfigError::NoProfiles {
                suggestion: "Use 'couchctl profile set' to create one, or pass --url."
                    .to_string(),
            })
    }

    /// Path of the configuration file
    ///
    /// On macOS an existing `~/.config/couchctl/` is preferred over
    /// `~/Library/Application Support/org.couchdb.couchctl/`.
    /// On Linux: `~/.config/couchctl/config.toml`.
    /// On Windows: `%APPDATA%\couchdb\couchctl\config\config.toml`.
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_dir = base_dirs.home_dir().join(".config").join("couchctl");
                if linux_style_dir.exists() {
                    return Ok(linux_style_dir.join("config.toml"));
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("org", "couchdb", "couchctl").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand `${VAR}` and `${VAR:-default}`; unset variables are left as written
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok())
            .to_string()
    }
}
