//! Graph Wire Shape
//!
//! `GraphData` is the full-graph payload fetched once per page load: the
//! graph's metadata with its nodes, edges and cards. Branches in the branch
//! library use the same shape.

use crate::behaviors::TreeItem;
use crate::models::{Card, Edge, Node};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphData {
    pub graph_id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub is_resource: bool,

    /// Ontology used by the graph; `None` disables ontology rules
    #[serde(default)]
    pub ontology_id: Option<String>,

    /// Set on draft copies of a published graph
    #[serde(default)]
    pub source_identifier_id: Option<String>,

    #[serde(default)]
    pub icon_class: Option<String>,

    pub nodes: Vec<Node>,

    #[serde(default)]
    pub edges: Vec<Edge>,

    #[serde(default)]
    pub cards: Vec<Card>,
}

impl GraphData {
    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_top_node())
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id() == node_id)
    }
}

impl TreeItem for GraphData {
    fn tree_key(&self) -> &str {
        &self.graph_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }
}
