//! Profile management command implementations

use super::CommandContext;
use crate::cli::{self, ProfileCommands};
use crate::connection::{ConnectionManager, ConnectionOverrides};
use crate::error::{CouchCtlError, Result as CliResult};
use crate::output::{self, OutputFormat};
use couchctl_core::config::CredentialStore;
use couchctl_core::{Config, Profile};
use serde_json::{Value, json};
use std::io::{IsTerminal, Write};
use tracing::{debug, info, trace};

/// Handle profile management commands
pub fn handle_profile_command(
    profile_cmd: &ProfileCommands,
    ctx: &CommandContext<'_>,
) -> CliResult<()> {
    use ProfileCommands::*;

    let output_format = ctx.output;
    // Edits go to a copy that is then written back to disk
    let mut conn_mgr = ctx.conn_mgr.clone();
    let conn_mgr = &mut conn_mgr;

    match profile_cmd {
        List => handle_list(conn_mgr, output_format),
        Path => handle_path(conn_mgr, output_format),
        Show { name } => handle_show(conn_mgr, name, output_format),
        Set {
            name,
            node_port,
            default,
            #[cfg(feature = "secure-storage")]
            use_keyring,
        } => handle_set(
            conn_mgr,
            name,
            &ctx.overrides,
            *node_port,
            *default,
            #[cfg(feature = "secure-storage")]
            *use_keyring,
        ),
        Remove { name } => handle_remove(conn_mgr, name),
    }
}

fn config_location(conn_mgr: &ConnectionManager) -> Option<String> {
    conn_mgr
        .config_path
        .clone()
        .or_else(|| Config::config_path().ok())
        .map(|p| p.to_string_lossy().to_string())
}

fn mask(secret: &str) -> String {
    if CredentialStore::is_keyring_reference(secret) {
        secret.to_string()
    } else {
        "********".to_string()
    }
}

fn describe(name: &str, profile: &Profile, is_default: bool) -> Value {
    json!({
        "name": name,
        "url": profile.url,
        "username": profile.username,
        "password": profile.password.as_deref().map(mask),
        "auth": profile.auth,
        "timeout_secs": profile.timeout_secs,
        "node_local_port": profile.node_local_port,
        "default": is_default,
    })
}

fn handle_list(conn_mgr: &ConnectionManager, output_format: cli::OutputFormat) -> CliResult<()> {
    debug!("Listing all configured profiles");
    let profiles = conn_mgr.config.list_profiles();
    trace!("Found {} profiles", profiles.len());

    let format = OutputFormat::resolve(output_format, OutputFormat::Table);
    if profiles.is_empty() && format == OutputFormat::Table {
        println!("No profiles configured.");
        println!("Create one with: couchctl profile set <name> --url <url>");
        return Ok(());
    }

    let default = conn_mgr.config.default_profile.as_deref();
    let rows: Vec<Value> = profiles
        .iter()
        .map(|(name, profile)| {
            json!({
                "name": name,
                "url": profile.url,
                "auth": profile.auth,
                "default": default == Some(name.as_str()),
            })
        })
        .collect();
    output::print_output(rows, format)?;
    Ok(())
}

fn handle_path(conn_mgr: &ConnectionManager, output_format: cli::OutputFormat) -> CliResult<()> {
    let path = config_location(conn_mgr).ok_or_else(|| {
        CouchCtlError::Configuration("could not determine the configuration directory".into())
    })?;

    match OutputFormat::resolve(output_format, OutputFormat::Table) {
        OutputFormat::Table => println!("{}", path),
        format => output::print_output(json!({"path": path}), format)?,
    }
    Ok(())
}

fn handle_show(
    conn_mgr: &ConnectionManager,
    name: &str,
    output_format: cli::OutputFormat,
) -> CliResult<()> {
    debug!("Showing profile: {}", name);
    let profile = conn_mgr
        .config
        .get_profile(name)
        .ok_or_else(|| CouchCtlError::ProfileNotFound { name: name.into() })?;
    let is_default = conn_mgr.config.default_profile.as_deref() == Some(name);

    output::print_output(
        describe(name, profile, is_default),
        OutputFormat::resolve(output_format, OutputFormat::Table),
    )?;
    Ok(())
}

fn handle_set(
    conn_mgr: &mut ConnectionManager,
    name: &str,
    overrides: &ConnectionOverrides,
    node_port: Option<u16>,
    make_default: bool,
    #[cfg(feature = "secure-storage")] use_keyring: bool,
) -> CliResult<()> {
    debug!("Setting profile: {}", name);

    let existing = conn_mgr.config.get_profile(name).cloned();
    let url = overrides
        .url
        .clone()
        .or_else(|| existing.as_ref().map(|p| p.url.clone()))
        .ok_or_else(|| CouchCtlError::InvalidInput {
            message: format!("--url is required to create profile '{}'", name),
        })?;

    let mut profile = existing.unwrap_or_else(|| Profile::new(url.clone()));
    profile.url = url;
    if let Some(user) = &overrides.user {
        profile.username = Some(user.clone());
    }
    if let Some(auth) = overrides.auth {
        profile.auth = auth;
    }
    if let Some(secs) = overrides.timeout_secs {
        profile.timeout_secs = Some(secs);
    }
    if let Some(port) = node_port {
        profile.node_local_port = port;
    }

    if let Some(password) = &overrides.password {
        #[cfg(feature = "secure-storage")]
        let password = if use_keyring {
            let store = CredentialStore::keyring();
            let reference = store.store_credential(&format!("{}-password", name), password)?;
            println!("Password stored securely in OS keyring");
            reference
        } else {
            password.clone()
        };
        #[cfg(not(feature = "secure-storage"))]
        let password = password.clone();

        profile.password = Some(password);
    }

    conn_mgr.config.set_profile(name.to_string(), profile);
    if make_default || conn_mgr.config.default_profile.is_none() {
        conn_mgr.config.default_profile = Some(name.to_string());
    }
    conn_mgr.save_config()?;

    info!("Saved profile '{}'", name);
    println!("Profile '{}' saved", name);
    if conn_mgr.config.default_profile.as_deref() == Some(name) {
        println!("'{}' is the default profile", name);
    }
    Ok(())
}

fn handle_remove(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    debug!("Removing profile: {}", name);

    if conn_mgr.config.get_profile(name).is_none() {
        return Err(CouchCtlError::ProfileNotFound { name: name.into() });
    }

    if std::io::stdin().is_terminal() && !confirm(name)? {
        println!("Profile removal cancelled.");
        return Ok(());
    }

    if let Some(profile) = conn_mgr.config.remove_profile(name)
        && let Some(password) = profile.password.as_deref()
        && CredentialStore::is_keyring_reference(password)
    {
        #[cfg(feature = "secure-storage")]
        if let Err(e) = CredentialStore::keyring().delete_credential(password) {
            tracing::warn!("Could not remove keyring entry for '{}': {}", name, e);
        }
        #[cfg(not(feature = "secure-storage"))]
        debug!("Leaving keyring entry for '{}' in place", name);
    }
    conn_mgr.save_config()?;

    println!("Profile '{}' removed", name);
    Ok(())
}

fn confirm(name: &str) -> CliResult<bool> {
    print!(
        "Are you sure you want to remove profile '{}'? (y/N): ",
        name
    );
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
