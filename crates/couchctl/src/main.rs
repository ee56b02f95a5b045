use anyhow::Result;
use clap::Parser;
use couchctl_core::Config;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;

use cli::{Cli, Commands};
use commands::CommandContext;
use connection::{ConnectionManager, ConnectionOverrides};
use error::CouchCtlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    let conn_mgr = match load_config(&cli) {
        Ok(conn_mgr) => conn_mgr,
        Err(e) => {
            e.print_diagnostic();
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(&cli, &conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration from `--config-file` or the default location
fn load_config(cli: &Cli) -> Result<ConnectionManager, CouchCtlError> {
    let (config, config_path) = if let Some(config_file) = &cli.config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        let config = Config::load_from_path(&path)?;
        (config, Some(path))
    } else {
        debug!("Loading config from default location");
        (Config::load()?, None)
    };
    debug!(
        "Creating ConnectionManager with config_path: {:?}",
        config_path
    );
    Ok(ConnectionManager::with_config_path(config, config_path))
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over the verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "couchctl=warn,couchctl_core=warn",
            1 => "couchctl=info,couchctl_core=info",
            2 => "couchctl=debug,couchctl_core=debug",
            _ => "couchctl=trace,couchctl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

fn overrides_from(cli: &Cli) -> ConnectionOverrides {
    ConnectionOverrides {
        url: cli.url.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
        auth: cli.auth,
        timeout_secs: cli.timeout,
    }
}

async fn execute_command(cli: &Cli, conn_mgr: &ConnectionManager) -> Result<(), CouchCtlError> {
    // Arguments may carry passwords, so only the sanitized form is logged
    info!("Command: {}", format_command(&cli.command));

    let ctx = CommandContext {
        conn_mgr,
        profile: cli.profile.as_deref(),
        overrides: overrides_from(cli),
        output: cli.output,
    };
    let start = std::time::Instant::now();

    let result = match &cli.command {
        Commands::Info => commands::server::handle_info(&ctx).await,
        Commands::Uuids { count } => commands::server::handle_uuids(&ctx, *count).await,
        Commands::Tasks => commands::server::handle_tasks(&ctx).await,
        Commands::Db(cmd) => commands::db::handle_db_command(cmd, &ctx).await,
        Commands::User(cmd) => commands::user::handle_user_command(cmd, &ctx).await,
        Commands::Session(cmd) => commands::session::handle_session_command(cmd, &ctx).await,
        Commands::Cluster(cmd) => commands::cluster::handle_cluster_command(cmd, &ctx).await,
        Commands::Profile(cmd) => {
            debug!("Executing profile command");
            commands::profile::handle_profile_command(cmd, &ctx)
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Command completed successfully in {:.3}s",
            duration.as_secs_f64()
        ),
        Err(e) => error!(
            "Command failed after {:.3}s: {}",
            duration.as_secs_f64(),
            e
        ),
    }

    result
}

/// Command line with secrets removed, for logging
fn format_command(command: &Commands) -> String {
    match command {
        Commands::Info => "info".to_string(),
        Commands::Uuids { count } => format!("uuids --count {}", count),
        Commands::Tasks => "tasks".to_string(),
        Commands::Db(cmd) => format!("db {:?}", cmd),
        Commands::User(cmd) => {
            use cli::UserCommands::*;
            match cmd {
                List => "user list".to_string(),
                Get { name } => format!("user get {}", name),
                Create { name, roles, .. } => {
                    format!("user create {} roles={:?} [password redacted]", name, roles)
                }
                Delete { name } => format!("user delete {}", name),
            }
        }
        Commands::Session(cmd) => format!("session {:?}", cmd),
        Commands::Cluster(cmd) => format!("cluster {:?}", cmd),
        Commands::Profile(cmd) => {
            use cli::ProfileCommands::*;
            match cmd {
                List => "profile list".to_string(),
                Path => "profile path".to_string(),
                Show { name } => format!("profile show {}", name),
                Set { name, .. } => format!("profile set {} [credentials redacted]", name),
                Remove { name } => format!("profile remove {}", name),
            }
        }
    }
}
