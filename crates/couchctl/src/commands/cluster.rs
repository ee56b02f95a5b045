//! Cluster topology commands

use super::CommandContext;
use crate::cli::ClusterCommands;
use crate::error::{CouchCtlError, Result as CliResult};
use crate::output::OutputFormat;
use serde_json::json;
use tracing::debug;

pub async fn handle_cluster_command(
    cmd: &ClusterCommands,
    ctx: &CommandContext<'_>,
) -> CliResult<()> {
    let (conn, target) = ctx.connection().await?;

    match cmd {
        ClusterCommands::Nodes { node_port } => {
            let port = node_port.unwrap_or(target.node_local_port);
            let Some(cluster) = conn.upgrade_to_cluster_connection(port).await? else {
                let version = conn.get_couchdb_version().await?;
                return Err(CouchCtlError::Unsupported {
                    message: format!("server version '{}' has no cluster membership", version),
                });
            };

            let nodes = cluster.nodes().await?;
            debug!("Cluster has {} node(s)", nodes.len());
            let rows: Vec<_> = nodes
                .iter()
                .map(|node| json!({"name": node.name(), "node_local_port": node.node_local_port()}))
                .collect();
            ctx.print(rows, OutputFormat::Table)
        }
        ClusterCommands::Node { node_port, config } => {
            let port = node_port.unwrap_or(target.node_local_port);
            let node = conn.upgrade_to_node_connection(port).await?.ok_or_else(|| {
                CouchCtlError::NotFound {
                    message: "cluster membership lists no nodes".to_string(),
                }
            })?;

            let mut out = json!({
                "name": node.name(),
                "standalone": node.is_standalone(),
                "node_local_port": node.node_local_port(),
            });
            if *config {
                out["config"] = node.config().await?;
            }
            ctx.print(out, if *config { OutputFormat::Json } else { OutputFormat::Table })
        }
    }
}
