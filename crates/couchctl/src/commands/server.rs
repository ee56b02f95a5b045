//! Server-wide commands: info, uuids, tasks

use super::CommandContext;
use crate::error::Result as CliResult;
use crate::output::OutputFormat;
use serde_json::json;
use tracing::debug;

pub async fn handle_info(ctx: &CommandContext<'_>) -> CliResult<()> {
    let (conn, _) = ctx.connection().await?;
    let info = conn.get_couchdb_info().await?;
    debug!("Server reports version '{}'", info.version());

    ctx.print(
        json!({
            "url": conn.server_url(),
            "version": info.version(),
            "major": info.major(),
            "supports_clusters": info.supports_clusters(),
            "server": info.raw(),
        }),
        OutputFormat::Json,
    )
}

pub async fn handle_uuids(ctx: &CommandContext<'_>, count: usize) -> CliResult<()> {
    let (conn, _) = ctx.connection().await?;
    let uuids = conn.get_uuids(count).await?;
    ctx.print(uuids, OutputFormat::Table)
}

pub async fn handle_tasks(ctx: &CommandContext<'_>) -> CliResult<()> {
    let (conn, _) = ctx.connection().await?;
    let tasks = conn.get_active_tasks().await?;
    debug!("{} active task(s)", tasks.len());
    ctx.print(tasks, OutputFormat::Table)
}
