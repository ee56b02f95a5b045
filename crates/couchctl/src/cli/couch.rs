//! CouchDB command groups

use clap::Subcommand;

/// Database commands
#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// List database names
    #[command(visible_alias = "ls")]
    List {
        /// Include system (_*) and shard (shards/*) databases
        #[arg(long)]
        all: bool,
    },

    /// Show database information (document count, sizes, update sequence)
    Get {
        /// Database name
        name: String,
    },

    /// Check whether a database exists
    Exists {
        /// Database name
        name: String,
    },

    /// Create a database; fails if it already exists
    Create {
        /// Database name
        name: String,
    },

    /// Delete a database and all of its documents
    #[command(visible_alias = "rm")]
    Delete {
        /// Database name
        name: String,
    },

    /// Create a database unless it already exists
    Ensure {
        /// Database name
        name: String,
    },

    /// Delete a database if it exists
    EnsureDeleted {
        /// Database name
        name: String,
    },
}

/// User commands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List user names
    #[command(visible_alias = "ls")]
    List,

    /// Show a user document
    Get {
        /// User name
        name: String,
    },

    /// Create a user
    #[command(after_help = "EXAMPLES:
    # Reader account
    couchctl user create alice --new-password wonderland --role reader

    # Several roles
    couchctl user create bob --new-password builder --role writer --role reader
")]
    Create {
        /// User name
        name: String,

        /// Password for the new user (prompted for when omitted on a terminal)
        #[arg(long)]
        new_password: Option<String>,

        /// Role to grant; repeat for several
        #[arg(long = "role")]
        roles: Vec<String>,
    },

    /// Delete a user document
    #[command(visible_alias = "rm")]
    Delete {
        /// User name
        name: String,
    },
}

/// Session commands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Log in with the configured mode (validates credentials under basic auth)
    Login,

    /// Show the server's view of the current session (cookie auth only)
    Info,

    /// Log in, then close the server-side session
    Logout,
}

/// Cluster commands
#[derive(Subcommand, Debug)]
pub enum ClusterCommands {
    /// List cluster member nodes
    Nodes {
        /// Node-local port, overriding the profile
        #[arg(long)]
        node_port: Option<u16>,
    },

    /// Show the node this server resolves to
    Node {
        /// Node-local port, overriding the profile
        #[arg(long)]
        node_port: Option<u16>,

        /// Include the node's configuration
        #[arg(long)]
        config: bool,
    },
}
