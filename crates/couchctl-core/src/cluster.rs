//! Cluster and node topology handles
//!
//! A [`ClusterConnection`] is only meaningful on servers that support
//! clustering (major version 2 and later). A [`NodeConnection`] addresses one
//! node: either a named member of a cluster, or the whole server itself when
//! clustering is unavailable (empty node name).

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::communication::Communication;
use crate::database::encode_segment;
use crate::error::{CouchError, Result};

/// Port serving the node-local interface on a clustered server
pub const DEFAULT_NODE_LOCAL_PORT: u16 = 5986;

/// The cluster behind a 2.x+ server
#[derive(Clone)]
pub struct ClusterConnection {
    comm: Arc<dyn Communication>,
    node_local_port: u16,
}

impl ClusterConnection {
    pub fn new(comm: Arc<dyn Communication>, node_local_port: u16) -> Self {
        Self {
            comm,
            node_local_port,
        }
    }

    pub fn node_local_port(&self) -> u16 {
        self.node_local_port
    }

    /// `GET /_membership`, one handle per entry of `all_nodes`, in server order
    pub async fn nodes(&self) -> Result<Vec<NodeConnection>> {
        let response = self.comm.get_data("/_membership").await?;
        let all_nodes = response
            .get("all_nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                CouchError::BadResponse("/_membership has no all_nodes array".to_string())
            })?;

        let nodes = all_nodes
            .iter()
            .map(|node| {
                node.as_str()
                    .map(|name| {
                        NodeConnection::new(self.comm.clone(), self.node_local_port, name)
                    })
                    .ok_or_else(|| {
                        CouchError::BadResponse("node name is not a string".to_string())
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Cluster has {} node(s)", nodes.len());
        Ok(nodes)
    }

    /// First node of [`nodes`](Self::nodes), if the cluster reports any
    pub async fn first_node(&self) -> Result<Option<NodeConnection>> {
        Ok(self.nodes().await?.into_iter().next())
    }
}

impl fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("node_local_port", &self.node_local_port)
            .finish_non_exhaustive()
    }
}

/// One node, or the whole server when `name` is empty
#[derive(Clone)]
pub struct NodeConnection {
    comm: Arc<dyn Communication>,
    node_local_port: u16,
    name: String,
}

impl NodeConnection {
    pub fn new(comm: Arc<dyn Communication>, node_local_port: u16, name: impl Into<String>) -> Self {
        Self {
            comm,
            node_local_port,
            name: name.into(),
        }
    }

    /// Node name such as `couchdb@10.0.0.1`; empty for a standalone server
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_local_port(&self) -> u16 {
        self.node_local_port
    }

    pub fn is_standalone(&self) -> bool {
        self.name.is_empty()
    }

    fn config_path(&self) -> String {
        if self.is_standalone() {
            "/_config".to_string()
        } else {
            format!("/_node/{}/_config", encode_segment(&self.name))
        }
    }

    /// The node's configuration sections
    pub async fn config(&self) -> Result<Value> {
        let response = self.comm.get_data(&self.config_path()).await?;
        if !response.is_object() {
            return Err(CouchError::BadResponse(
                "node configuration is not an object".to_string(),
            ));
        }
        Ok(response)
    }
}

impl fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConnection")
            .field("name", &self.name)
            .field("node_local_port", &self.node_local_port)
            .finish_non_exhaustive()
    }
}
