//! Branch Library List
//!
//! Branches that can be grafted onto the selected node. A branch is listed
//! when its name contains the filter text and it can be appended to the
//! selected node. Draft branches (those carrying a source identifier) are
//! never listed. Visible branches are sorted by lowercase name.

use crate::models::GraphData;
use crate::services::{GraphError, GraphModel};
use crate::tree::state::{SelectionMode, TreeState};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BranchList {
    branches: Vec<GraphData>,
    state: TreeState,
    filter: String,
    /// branch id → can be appended to the current target
    appendable: HashMap<String, bool>,
    target_node_id: Option<String>,
}

impl BranchList {
    pub fn new(branches: Vec<GraphData>) -> Self {
        let mut state = TreeState::new(SelectionMode::Single, 0);
        for branch in &branches {
            state.insert(&branch.graph_id, None);
        }
        let mut list = Self {
            branches,
            state,
            filter: String::new(),
            appendable: HashMap::new(),
            target_node_id: None,
        };
        list.apply();
        list
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branch(&self, branch_id: &str) -> Option<&GraphData> {
        self.branches.iter().find(|b| b.graph_id == branch_id)
    }

    pub fn target_node_id(&self) -> Option<&str> {
        self.target_node_id.as_deref()
    }

    /// Re-check every branch against a new target node
    pub async fn set_target(&mut self, graph: &GraphModel, target_node_id: &str) -> Result<(), GraphError> {
        let mut appendable = HashMap::with_capacity(self.branches.len());
        for branch in &self.branches {
            let ok = graph.can_append(target_node_id, branch).await?;
            appendable.insert(branch.graph_id.clone(), ok);
        }
        self.appendable = appendable;
        self.target_node_id = Some(target_node_id.to_string());
        self.apply();
        Ok(())
    }

    /// Filter by case-insensitive name substring (any length)
    pub fn filter(&mut self, text: &str) {
        self.filter = text.trim().to_lowercase();
        self.apply();
    }

    fn is_listed(&self, branch: &GraphData) -> bool {
        branch.source_identifier_id.is_none()
            && branch.name.to_lowercase().contains(&self.filter)
            && self.appendable.get(&branch.graph_id).copied().unwrap_or(false)
    }

    fn apply(&mut self) {
        let hidden: Vec<(String, bool)> = self
            .branches
            .iter()
            .map(|b| (b.graph_id.clone(), !self.is_listed(b)))
            .collect();
        for (id, filtered) in hidden {
            self.state.set_filtered(&id, filtered);
            if filtered {
                self.state.deselect(&id);
            }
        }
    }

    /// Listed branches, sorted by lowercase name
    pub fn visible(&self) -> Vec<&GraphData> {
        let mut visible: Vec<&GraphData> = self
            .branches
            .iter()
            .filter(|b| !self.state.is_filtered(&b.graph_id))
            .collect();
        visible.sort_by_key(|b| b.name.to_lowercase());
        visible
    }

    /// Select a listed branch
    pub fn select(&mut self, branch_id: &str) -> bool {
        if self.state.is_filtered(branch_id) {
            return false;
        }
        self.state.select(branch_id)
    }

    pub fn selected(&self) -> Option<&GraphData> {
        self.state
            .selection()
            .first()
            .and_then(|id| self.branch(id))
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }
}
