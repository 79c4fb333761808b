//! Edge Data Structure
//!
//! A directed, ontology-typed link from a parent (domain) node to a child
//! (range) node. Edges define the node tree; they have no lifecycle of their
//! own and are created and removed together with the nodes they connect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub edge_id: String,

    /// Parent node
    pub domain_node_id: String,

    /// Child node
    pub range_node_id: String,

    /// Ontology property labelling the relation
    #[serde(default)]
    pub ontology_property: Option<String>,
}

impl Edge {
    pub fn new(
        edge_id: impl Into<String>,
        domain_node_id: impl Into<String>,
        range_node_id: impl Into<String>,
        ontology_property: Option<String>,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            domain_node_id: domain_node_id.into(),
            range_node_id: range_node_id.into(),
            ontology_property,
        }
    }

    /// Whether either endpoint is `node_id`
    pub fn touches(&self, node_id: &str) -> bool {
        self.domain_node_id == node_id || self.range_node_id == node_id
    }
}
