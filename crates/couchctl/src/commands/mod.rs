//! Command implementations

pub mod cluster;
pub mod db;
pub mod profile;
pub mod server;
pub mod session;
pub mod user;

use crate::cli;
use crate::connection::{ConnectionManager, ConnectionOverrides};
use crate::error::Result as CliResult;
use crate::output::{self, OutputFormat};
use couchctl_core::{Connection, ResolvedProfile};
use serde::Serialize;

/// What every command handler needs from the parsed command line
pub struct CommandContext<'a> {
    pub conn_mgr: &'a ConnectionManager,
    pub profile: Option<&'a str>,
    pub overrides: ConnectionOverrides,
    pub output: cli::OutputFormat,
}

impl CommandContext<'_> {
    /// Connection for data commands, logged in under cookie auth
    pub async fn connection(&self) -> CliResult<(Connection, ResolvedProfile)> {
        self.conn_mgr
            .create_connection(self.profile, &self.overrides)
            .await
    }

    /// Connection with no session established yet
    pub fn raw_connection(&self) -> CliResult<(Connection, ResolvedProfile)> {
        self.conn_mgr.connect(self.profile, &self.overrides)
    }

    /// Print `data` in the requested format, or `auto_format` for `-o auto`
    pub fn print<T: Serialize>(&self, data: T, auto_format: OutputFormat) -> CliResult<()> {
        output::print_output(data, OutputFormat::resolve(self.output, auto_format))?;
        Ok(())
    }
}
