//! Node route groups (`noderoute.group.<name>`).

use rpcgate_data::RecordId;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{ConfigDomain, parse_json, render_json};
use crate::error::{ConfigError, ConfigResult};
use crate::namespace::NODE_ROUTE_GROUP_PREFIX;

/// Named, ordered set of backend node endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRouteGroup {
    /// Record id; `0` until stored.
    pub id: RecordId,
    /// Logical name.
    pub name: String,
    /// Node endpoints in routing order, as written.
    pub nodes: Vec<String>,
}

impl NodeRouteGroup {
    /// Group with the given nodes.
    #[must_use]
    pub fn new(name: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            nodes,
        }
    }

    /// Parsed node endpoints.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a node is not an absolute URL.
    pub fn node_urls(&self) -> ConfigResult<Vec<Url>> {
        parse_nodes(&self.name, &self.nodes)
    }
}

#[derive(Serialize, Deserialize)]
struct RouteGroupPayload {
    #[serde(default)]
    nodes: Vec<String>,
}

fn parse_nodes(name: &str, nodes: &[String]) -> ConfigResult<Vec<Url>> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            Url::parse(node).map_err(|err| {
                ConfigError::invalid(
                    NodeRouteGroup::KIND,
                    name,
                    format!("node {index} ('{node}') is not an absolute URL: {err}"),
                )
            })
        })
        .collect()
}

impl ConfigDomain for NodeRouteGroup {
    const PREFIX: &'static str = NODE_ROUTE_GROUP_PREFIX;
    const KIND: &'static str = "node route group";

    fn from_payload(id: RecordId, name: &str, value: &str) -> ConfigResult<Self> {
        let payload: RouteGroupPayload = parse_json(Self::KIND, name, value)?;
        parse_nodes(name, &payload.nodes)?;
        Ok(Self {
            id,
            name: name.to_string(),
            nodes: payload.nodes,
        })
    }

    fn to_payload(&self) -> ConfigResult<String> {
        parse_nodes(&self.name, &self.nodes)?;
        render_json(
            Self::KIND,
            &self.name,
            &RouteGroupPayload {
                nodes: self.nodes.clone(),
            },
        )
    }

    fn logical_name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> RecordId {
        self.id
    }
}
