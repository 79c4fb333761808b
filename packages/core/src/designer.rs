//! Graph Designer
//!
//! Ties the graph model to its views: the node tree, the card tree, an
//! optional permission tree and the branch list. Every structural operation
//! goes through here so each completed mutation is applied to the trees
//! exactly once, in order.

use crate::models::{Card, GraphData, MutationOutcome, Node};
use crate::services::{CollectorToggle, GraphChange, GraphError, GraphModel, NodeEdit};
use crate::tree::{BranchList, CardTree, NodeTree, SelectionMode, SyncOutcome};

pub struct GraphDesigner {
    graph: GraphModel,
    node_tree: NodeTree,
    card_tree: CardTree,
    permission_tree: Option<CardTree>,
    branch_list: BranchList,
    /// Graph-level settings have unsaved edits
    settings_dirty: bool,
}

impl GraphDesigner {
    pub fn new(graph: GraphModel, branches: Vec<GraphData>) -> Self {
        Self {
            node_tree: NodeTree::build(&graph),
            card_tree: CardTree::build(&graph, SelectionMode::Single),
            permission_tree: None,
            branch_list: BranchList::new(branches),
            settings_dirty: false,
            graph,
        }
    }

    /// Add a permission tree built from the published graph's cards
    pub fn with_permission_tree(mut self, source_cards: Vec<Card>) -> Self {
        self.permission_tree = Some(CardTree::build_permission_tree(&self.graph, source_cards));
        self
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn node_tree(&self) -> &NodeTree {
        &self.node_tree
    }

    pub fn node_tree_mut(&mut self) -> &mut NodeTree {
        &mut self.node_tree
    }

    pub fn card_tree(&self) -> &CardTree {
        &self.card_tree
    }

    pub fn card_tree_mut(&mut self) -> &mut CardTree {
        &mut self.card_tree
    }

    pub fn permission_tree(&self) -> Option<&CardTree> {
        self.permission_tree.as_ref()
    }

    pub fn permission_tree_mut(&mut self) -> Option<&mut CardTree> {
        self.permission_tree.as_mut()
    }

    pub fn branch_list(&self) -> &BranchList {
        &self.branch_list
    }

    pub fn branch_list_mut(&mut self) -> &mut BranchList {
        &mut self.branch_list
    }

    pub fn settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    pub fn set_settings_dirty(&mut self, dirty: bool) {
        self.settings_dirty = dirty;
    }

    pub fn selected_node(&self) -> Option<String> {
        self.node_tree.selected()
    }

    /// Feed one completed mutation to every view
    fn apply(&mut self, change: &GraphChange) -> SyncOutcome {
        let outcome = self.card_tree.apply_change(&self.graph, change);
        if let Some(tree) = self.permission_tree.as_mut() {
            tree.apply_change(&self.graph, change);
        }
        self.node_tree.sync(&self.graph);
        tracing::debug!("Applied {:?} to views ({:?})", change, outcome);
        outcome
    }

    /// Select a node, its card, and re-check the branch list against it
    ///
    /// Ignored while graph settings have unsaved edits.
    pub async fn select_node(&mut self, node_id: &str) -> Result<bool, GraphError> {
        if self.settings_dirty {
            tracing::debug!("Ignoring selection of {} while settings are dirty", node_id);
            return Ok(false);
        }
        let nodegroup_id = match self.graph.node(node_id) {
            Some(node) => node.nodegroup_id().to_string(),
            None => return Err(GraphError::node_not_found(node_id)),
        };
        self.node_tree.select(node_id);
        self.node_tree.expand_to_root(node_id);
        self.card_tree.select_nodegroup(&nodegroup_id);
        self.graph.refresh_valid_connections(node_id).await?;
        self.branch_list.set_target(&self.graph, node_id).await?;
        Ok(true)
    }

    /// Append a node under the selected node (or the top node) and select it
    pub async fn add_child_node(&mut self) -> Result<String, GraphError> {
        let parent_id = self
            .selected_node()
            .unwrap_or_else(|| self.graph.root_id().to_string());
        let change = self.graph.append_node(&parent_id).await?;
        self.apply(&change);
        let GraphChange::NodesAppended { root_node_id, .. } = change else {
            return Err(GraphError::invariant_violation("append did not report new nodes"));
        };
        self.node_tree.expand(&parent_id);
        self.select_node(&root_node_id).await?;
        Ok(root_node_id)
    }

    pub async fn delete_node(&mut self, node_id: &str) -> Result<GraphChange, GraphError> {
        let parent_id = self.graph.parent_node(node_id).map(|p| p.node_id().to_string());
        let change = self.graph.delete_node(node_id).await?;
        self.apply(&change);
        if self.selected_node().is_none() {
            if let Some(parent_id) = parent_id {
                self.select_node(&parent_id).await?;
            }
        }
        Ok(change)
    }

    pub fn toggle_collector(&mut self, node_id: &str) -> Result<CollectorToggle, GraphError> {
        let toggle = self.graph.toggle_collector(node_id)?;
        if let Some(change) = &toggle.change {
            self.apply(change);
        }
        Ok(toggle)
    }

    /// Edit one node's plain fields and patch the views
    pub fn edit_node<F>(&mut self, node_id: &str, edit: F) -> Result<NodeEdit, GraphError>
    where
        F: FnOnce(&mut Node) -> MutationOutcome,
    {
        let edit = self.graph.edit_node(node_id, edit)?;
        if let Some(change) = &edit.change {
            self.apply(change);
        }
        Ok(edit)
    }

    pub fn rename_node(&mut self, node_id: &str, name: &str) -> Result<NodeEdit, GraphError> {
        let edit = self.graph.rename_node(node_id, name)?;
        if let Some(change) = &edit.change {
            self.apply(change);
        }
        Ok(edit)
    }

    pub fn set_node_datatype(&mut self, node_id: &str, datatype: &str) -> Result<NodeEdit, GraphError> {
        let edit = self.graph.set_node_datatype(node_id, datatype)?;
        if let Some(change) = &edit.change {
            self.apply(change);
        }
        Ok(edit)
    }

    pub async fn save_node(&mut self, node_id: &str) -> Result<GraphChange, GraphError> {
        let change = self.graph.save_node(node_id).await?;
        self.apply(&change);
        Ok(change)
    }

    /// Graft the branch selected in the branch list under the selected node
    pub async fn append_selected_branch(&mut self, property: Option<String>) -> Result<GraphChange, GraphError> {
        let target_id = self
            .selected_node()
            .ok_or_else(|| GraphError::invariant_violation("no node selected"))?;
        let branch = self
            .branch_list
            .selected()
            .cloned()
            .ok_or_else(|| GraphError::invariant_violation("no branch selected"))?;
        let change = self.graph.append_branch(&target_id, &branch, property).await?;
        self.apply(&change);
        self.node_tree.expand(&target_id);
        self.branch_list.clear_selection();
        Ok(change)
    }

    pub async fn move_node(
        &mut self,
        node_id: &str,
        property: Option<String>,
        new_parent_id: &str,
    ) -> Result<GraphChange, GraphError> {
        let change = self.graph.move_node(node_id, property, new_parent_id).await?;
        self.apply(&change);
        self.node_tree.expand_to_root(node_id);
        Ok(change)
    }

    pub async fn reorder_nodes(&mut self, parent_id: &str, ordered_ids: &[String]) -> Result<GraphChange, GraphError> {
        let change = self.graph.reorder_nodes(parent_id, ordered_ids).await?;
        self.apply(&change);
        Ok(change)
    }

    pub async fn reorder_cards(&mut self, ordered_card_ids: &[String]) -> Result<GraphChange, GraphError> {
        let change = self.graph.reorder_cards(ordered_card_ids).await?;
        self.apply(&change);
        Ok(change)
    }

    pub fn filter_nodes(&mut self, text: &str) {
        self.node_tree.filter(&self.graph, text);
    }

    pub fn filter_cards(&mut self, text: &str) {
        self.card_tree.filter(&self.graph, text);
    }

    /// Discard unsaved edits and resync every view
    pub fn reset(&mut self) {
        self.graph.reset();
        self.settings_dirty = false;
        self.node_tree.sync(&self.graph);
        self.card_tree.rebuild(&self.graph);
        if let Some(tree) = self.permission_tree.as_mut() {
            tree.rebuild(&self.graph);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.settings_dirty || self.graph.is_dirty()
    }
}
