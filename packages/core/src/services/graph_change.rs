//! Structural Change Records
//!
//! Every structural operation on the graph model returns a `GraphChange`
//! describing what it did. The card tree consumes these to patch itself
//! instead of rebuilding. Each record describes exactly one completed
//! mutation.

use serde::{Deserialize, Serialize};

/// Where a node-group's card belongs after a mutation
///
/// `parent_nodegroup_id` is the declared structural parent; the card tree
/// attaches the card there without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPlacement {
    pub card_id: String,
    pub nodegroup_id: String,
    pub parent_nodegroup_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphChange {
    /// A node or a grafted branch was added under an existing node
    #[serde(rename_all = "camelCase")]
    NodesAppended {
        root_node_id: String,
        node_ids: Vec<String>,
        placements: Vec<CardPlacement>,
    },

    /// A node's fields or grouping changed
    ///
    /// `placements` lists the cards of the node's subtree whose structural
    /// parent may have changed (top-down); `dissolved_nodegroup` is set when
    /// the node stopped being a collector.
    #[serde(rename_all = "camelCase")]
    NodeUpdated {
        node_id: String,
        affected_node_ids: Vec<String>,
        placements: Vec<CardPlacement>,
        dissolved_nodegroup: Option<String>,
    },

    /// A subtree was re-parented
    #[serde(rename_all = "camelCase")]
    NodeMoved {
        node_id: String,
        affected_node_ids: Vec<String>,
        placements: Vec<CardPlacement>,
    },

    /// A subtree was removed; `removed_nodegroups` is ordered top-down
    #[serde(rename_all = "camelCase")]
    NodesDeleted {
        node_id: String,
        removed_node_ids: Vec<String>,
        removed_edge_ids: Vec<String>,
        removed_nodegroups: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    NodesReordered { parent_node_id: String },

    CardsReordered,
}

impl GraphChange {
    /// Nodes whose widget bindings may need to be re-resolved
    pub fn touched_node_ids(&self) -> Vec<&str> {
        match self {
            GraphChange::NodesAppended { node_ids, .. } => node_ids.iter().map(String::as_str).collect(),
            GraphChange::NodeUpdated {
                node_id,
                affected_node_ids,
                ..
            }
            | GraphChange::NodeMoved {
                node_id,
                affected_node_ids,
                ..
            } => std::iter::once(node_id.as_str())
                .chain(affected_node_ids.iter().map(String::as_str))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// False for plain field edits that leave the card hierarchy alone
    pub fn is_structural(&self) -> bool {
        match self {
            GraphChange::NodeUpdated {
                placements,
                dissolved_nodegroup,
                ..
            } => !placements.is_empty() || dissolved_nodegroup.is_some(),
            _ => true,
        }
    }
}
