//! Database lifecycle commands

use super::CommandContext;
use crate::cli::DbCommands;
use crate::error::Result as CliResult;
use crate::output::OutputFormat;
use couchctl_core::Removal;
use serde_json::json;
use tracing::info;

pub async fn handle_db_command(cmd: &DbCommands, ctx: &CommandContext<'_>) -> CliResult<()> {
    let (conn, _) = ctx.connection().await?;

    match cmd {
        DbCommands::List { all } => {
            let names = if *all {
                conn.list_all_db_names().await?
            } else {
                conn.list_db_names().await?
            };
            ctx.print(names, OutputFormat::Table)
        }
        DbCommands::Get { name } => {
            let info = conn.get_db(name).await?.info().await?;
            ctx.print(info, OutputFormat::Json)
        }
        DbCommands::Exists { name } => {
            let exists = conn.db_exists(name).await?;
            ctx.print(json!({"name": name, "exists": exists}), OutputFormat::Table)
        }
        DbCommands::Create { name } => {
            let db = conn.create_db(name).await?;
            ctx.print(json!({"ok": true, "name": db.name()}), OutputFormat::Table)
        }
        DbCommands::Delete { name } => {
            conn.remove_db(name).await?;
            ctx.print(json!({"ok": true, "name": name}), OutputFormat::Table)
        }
        DbCommands::Ensure { name } => {
            let ensured = conn.ensure_db_exists(name).await?;
            let created = ensured.was_created();
            if !created {
                info!("Database '{}' already exists", name);
            }
            ctx.print(
                json!({"ok": true, "name": ensured.into_inner().name(), "created": created}),
                OutputFormat::Table,
            )
        }
        DbCommands::EnsureDeleted { name } => {
            let removal = conn.ensure_db_is_deleted(name).await?;
            ctx.print(
                json!({"ok": true, "name": name, "deleted": removal == Removal::Deleted}),
                OutputFormat::Table,
            )
        }
    }
}
