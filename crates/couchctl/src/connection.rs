//! Connection management: turning profiles, environment and flags into a
//! [`Connection`]

use crate::error::{CouchCtlError, Result as CliResult};
use anyhow::Context;
use couchctl_core::config::{ConfigError, ENV_PASSWORD, ENV_URL, ENV_USER};
use couchctl_core::{
    AuthMode, Config, Connection, DEFAULT_NODE_LOCAL_PORT, HttpCommunication, ResolvedProfile,
    User,
};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Server used when neither a profile nor `--url`/`COUCH_URL` names one
pub const FALLBACK_URL: &str = "http://localhost:5984";

/// Connection settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub auth: Option<AuthMode>,
    pub timeout_secs: Option<u64>,
}

/// Creates connections from the loaded configuration
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<std::path::PathBuf>,
}

impl ConnectionManager {
    /// `config_path` is `Some` only when `--config-file` was given
    pub fn with_config_path(config: Config, config_path: Option<std::path::PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save the configuration to the appropriate location
    pub fn save_config(&self) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            self.config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            self.config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Work out where to connect and as whom.
    ///
    /// Precedence is flags, then `COUCH_*` environment variables, then the
    /// profile. When `--config-file` is given the environment is ignored so
    /// the file fully describes the connection.
    pub fn resolve_target(
        &self,
        profile_name: Option<&str>,
        overrides: &ConnectionOverrides,
    ) -> CliResult<ResolvedProfile> {
        let use_env_vars = self.config_path.is_none();
        debug!(
            "Config path: {:?}, use_env_vars: {}",
            self.config_path, use_env_vars
        );
        if !use_env_vars {
            info!("--config-file specified explicitly, ignoring environment variables");
        }

        let mut target = match self.config.resolve_profile(profile_name) {
            Ok(name) => {
                info!("Using profile: {}", name);
                self.config
                    .get_profile(&name)
                    .ok_or(CouchCtlError::ProfileNotFound { name: name.clone() })?
                    .resolve_stored()?
            }
            Err(ConfigError::NoProfiles { .. }) => {
                debug!("No profiles configured, starting from {}", FALLBACK_URL);
                ResolvedProfile {
                    url: FALLBACK_URL.to_string(),
                    user: User::default(),
                    auth: AuthMode::None,
                    timeout: None,
                    node_local_port: DEFAULT_NODE_LOCAL_PORT,
                }
            }
            Err(e) => return Err(e.into()),
        };
        let profile_auth = target.auth;

        let env_var = |var: &str| {
            use_env_vars
                .then(|| std::env::var(var).ok())
                .flatten()
                .inspect(|_| debug!("Found {} environment variable", var))
        };

        let url = overrides.url.clone().or_else(|| env_var(ENV_URL));
        let username = overrides.user.clone().or_else(|| env_var(ENV_USER));
        let password = overrides.password.clone().or_else(|| env_var(ENV_PASSWORD));

        if let Some(url) = url {
            target.url = url;
        }
        if username.is_some() || password.is_some() {
            target.user = User::new(
                username.unwrap_or_else(|| target.user.username().to_string()),
                password.unwrap_or_else(|| target.user.password().to_string()),
            );
        }
        if let Some(secs) = overrides.timeout_secs {
            target.timeout = Some(Duration::from_secs(secs));
        }

        target.auth = match overrides.auth {
            Some(mode) => mode,
            // Credentials without a mode would never be sent
            None if profile_auth == AuthMode::None && !target.user.is_anonymous() => {
                debug!("Credentials given without an auth mode, using basic");
                AuthMode::Basic
            }
            None => profile_auth,
        };

        if target.auth != AuthMode::None
            && !target.user.is_anonymous()
            && target.user.password().is_empty()
            && std::io::stdin().is_terminal()
        {
            let prompt = format!("Password for {}: ", target.user.username());
            let password = rpassword::prompt_password(prompt)?;
            target.user = User::new(target.user.username().to_string(), password);
        }

        trace!("Resolved target: {:?}", target);
        Ok(target)
    }

    /// Open a connection without logging in
    pub fn connect(
        &self,
        profile_name: Option<&str>,
        overrides: &ConnectionOverrides,
    ) -> CliResult<(Connection, ResolvedProfile)> {
        let target = self.resolve_target(profile_name, overrides)?;
        info!(
            "Connecting to {} (auth: {})",
            target.url, target.auth
        );

        let mut builder = HttpCommunication::builder()
            .base_url(target.url.clone())
            .user(target.user.clone())
            .auth_mode(target.auth);
        if let Some(timeout) = target.timeout {
            builder = builder.timeout(timeout);
        }

        let conn = Connection::with_communication(Arc::new(builder.build()?));
        Ok((conn, target))
    }

    /// Open a connection ready for data commands.
    ///
    /// Under cookie auth a session is established first, since each
    /// invocation starts without one.
    pub async fn create_connection(
        &self,
        profile_name: Option<&str>,
        overrides: &ConnectionOverrides,
    ) -> CliResult<(Connection, ResolvedProfile)> {
        let (conn, target) = self.connect(profile_name, overrides)?;
        if conn.auth_mode() == AuthMode::Cookie {
            conn.login().await?;
        }
        debug!("Connection ready");
        Ok((conn, target))
    }
}
