//! CLI structure and command definitions
//!
//! Global flags select the server and credentials; subcommands map onto
//! `couchctl_core::Connection` operations. Profile management lives here,
//! the CouchDB command groups live in [`couch`].

use clap::{Parser, Subcommand};
use couchctl_core::AuthMode;

pub mod couch;

pub use couch::*;

/// CouchDB administration from the command line
#[derive(Parser, Debug)]
#[command(name = "couchctl")]
#[command(version, about = "CouchDB management CLI")]
#[command(long_about = "
CouchDB management CLI

Talks to a CouchDB server over HTTP using a saved profile, environment
variables (COUCH_URL, COUCH_USER, COUCH_PASSWORD) or explicit flags.
Flags win over the environment, which wins over the profile.

EXAMPLES:
    # Save a profile and make it the default
    couchctl profile set local --url http://localhost:5984 --user admin --auth cookie --default

    # Server version and capabilities
    couchctl info

    # Databases
    couchctl db list
    couchctl db ensure reports
    couchctl db ensure-deleted scratch

    # Users
    couchctl user create alice --new-password wonderland --role reader

    # Cluster topology (CouchDB 2.0 and later)
    couchctl cluster nodes

For more help on a specific command, run:
    couchctl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "COUCHCTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file (disables COUCH_* overrides)
    #[arg(long, global = true, env = "COUCHCTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Server URL, overriding the profile
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Username, overriding the profile
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Password, overriding the profile
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Authentication mode, overriding the profile
    #[arg(long, global = true, value_enum)]
    pub auth: Option<AuthMode>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Automatically choose format based on command
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Server version and clustering support
    Info,

    /// Generate UUIDs on the server
    Uuids {
        /// How many UUIDs to generate
        #[arg(long, short = 'n', default_value_t = 1)]
        count: usize,
    },

    /// Tasks currently running on the server
    Tasks,

    /// Database lifecycle
    #[command(subcommand, visible_alias = "database")]
    #[command(after_help = "EXAMPLES:
    # List user databases (system and shard databases hidden)
    couchctl db list

    # Include _users, _replicator and friends
    couchctl db list --all

    # Create only if missing
    couchctl db ensure reports

    # Delete if present, succeed either way
    couchctl db ensure-deleted scratch
")]
    Db(DbCommands),

    /// User documents in the _users database
    #[command(subcommand)]
    User(UserCommands),

    /// Authentication session
    #[command(subcommand)]
    Session(SessionCommands),

    /// Cluster topology
    #[command(subcommand)]
    Cluster(ClusterCommands),

    /// Profile management
    #[command(subcommand, visible_alias = "prof")]
    #[command(after_help = "EXAMPLES:
    # Anonymous local profile
    couchctl profile set local --url http://localhost:5984

    # Cookie session with a password read from the environment at load time
    couchctl profile set prod --url https://couch.example.com \\
        --user admin --password '${COUCH_PROD_PASSWORD}' --auth cookie

    # List, inspect, remove
    couchctl profile list
    couchctl profile show prod
    couchctl profile remove prod
")]
    Profile(ProfileCommands),
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all configured profiles
    #[command(visible_alias = "ls")]
    List,

    /// Show the path to the configuration file
    Path,

    /// Show details of a specific profile
    #[command(visible_alias = "get")]
    Show {
        /// Profile name to show
        name: String,
    },

    /// Set or create a profile from the global --url, --user, --password,
    /// --auth and --timeout flags
    #[command(visible_alias = "add")]
    Set {
        /// Profile name
        name: String,

        /// Node-local port used for cluster node access
        #[arg(long)]
        node_port: Option<u16>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,

        /// Store the password in the OS keyring instead of the config file
        #[cfg(feature = "secure-storage")]
        #[arg(long)]
        use_keyring: bool,
    },

    /// Remove a profile
    #[command(visible_alias = "rm")]
    Remove {
        /// Profile name to remove
        name: String,
    },
}
