//! Node-Groups
//!
//! A node-group is the set of nodes sharing one collector. Groups are not
//! stored on their own; they are derived from the nodes' `nodegroup_id`
//! values and the node tree. A group's parent group is the group of its
//! collector's parent node.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    /// Id of the collector node heading the group
    pub nodegroup_id: String,

    /// Group of the collector's parent node; `None` for the root group
    pub parent_nodegroup_id: Option<String>,

    /// Nodes in the group, collector first
    pub member_ids: Vec<String>,
}

impl NodeGroup {
    pub fn is_root(&self) -> bool {
        self.parent_nodegroup_id.is_none()
    }
}
