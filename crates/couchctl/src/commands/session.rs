//! Session commands
//!
//! Every invocation is its own process, so a cookie session never outlives
//! the command that created it. `login` and `logout` are mostly useful for
//! checking that the configured credentials work.

use super::CommandContext;
use crate::cli::SessionCommands;
use crate::error::Result as CliResult;
use crate::output::OutputFormat;
use couchctl_core::AuthMode;
use serde_json::json;
use tracing::info;

pub async fn handle_session_command(
    cmd: &SessionCommands,
    ctx: &CommandContext<'_>,
) -> CliResult<()> {
    let (conn, target) = ctx.raw_connection()?;

    match cmd {
        SessionCommands::Login => {
            conn.login().await?;
            info!("Logged in as '{}'", target.user.username());
            let session = conn.get_login_info().await?;
            ctx.print(
                json!({
                    "ok": true,
                    "user": target.user.username(),
                    "auth": conn.auth_mode(),
                    "session": session,
                }),
                OutputFormat::Json,
            )
        }
        SessionCommands::Info => {
            if conn.auth_mode() == AuthMode::Cookie {
                conn.login().await?;
            }
            let session = conn.get_login_info().await?;
            ctx.print(
                json!({
                    "user": target.user.username(),
                    "auth": conn.auth_mode(),
                    "session": session,
                }),
                OutputFormat::Json,
            )
        }
        SessionCommands::Logout => {
            if conn.auth_mode() == AuthMode::Cookie {
                conn.login().await?;
            }
            conn.logout().await?;
            ctx.print(
                json!({"ok": true, "auth": conn.auth_mode()}),
                OutputFormat::Table,
            )
        }
    }
}
