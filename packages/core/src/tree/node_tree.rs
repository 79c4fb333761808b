//! Node Tree View
//!
//! Single-select tree over the graph's nodes. Structure is read from the
//! graph model on every sync; only the per-node UI state lives here.

use crate::behaviors::TreeItem;
use crate::services::GraphModel;
use crate::tree::state::{SelectionMode, TreeItemState, TreeState};

/// One visible row of the node tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub node_id: String,
    pub depth: usize,
    pub display_name: String,
    pub state: TreeItemState,
}

#[derive(Debug, Clone)]
pub struct NodeTree {
    state: TreeState,
    root_id: String,
}

impl NodeTree {
    /// Build the tree with the top node expanded
    pub fn build(graph: &GraphModel) -> Self {
        let mut tree = Self {
            state: TreeState::new(SelectionMode::Single, graph.config().filter_min_length),
            root_id: graph.root_id().to_string(),
        };
        tree.sync(graph);
        tree.state.expand(graph.root_id());
        tree
    }

    /// Track new nodes, drop deleted ones and refresh parent links
    pub fn sync(&mut self, graph: &GraphModel) {
        self.state.retain(|id| graph.node(id).is_some());
        for node in graph.nodes() {
            let parent = graph.parent_node(node.node_id()).map(|p| p.node_id());
            self.state.insert(node.node_id(), parent);
        }
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn select(&mut self, node_id: &str) -> bool {
        self.state.select(node_id)
    }

    pub fn selected(&self) -> Option<String> {
        self.state.selection().into_iter().next()
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }

    pub fn expand(&mut self, node_id: &str) {
        self.state.expand(node_id);
    }

    pub fn collapse(&mut self, node_id: &str) {
        self.state.collapse(node_id);
    }

    pub fn expand_all(&mut self) {
        self.state.expand_all();
    }

    /// Collapse everything except the top node
    pub fn collapse_all(&mut self) {
        let root = self.root_id.clone();
        self.state.collapse_where(|id| id != root);
    }

    pub fn expand_to_root(&mut self, node_id: &str) {
        self.state.expand_to_root(node_id);
    }

    /// Filter on node name, datatype and ontology class
    pub fn filter(&mut self, graph: &GraphModel, text: &str) {
        self.state.apply_filter(text, graph.nodes());
    }

    pub fn clear_filter(&mut self) {
        self.state.clear_filter();
    }

    /// True when a descendant of `node_id` is selected
    pub fn is_child_selected(&self, graph: &GraphModel, node_id: &str) -> bool {
        graph
            .subtree_ids(node_id)
            .iter()
            .skip(1)
            .any(|id| self.state.is_selected(id))
    }

    /// `name (prefix)`, the prefix being the part of the friendly class
    /// name before its first underscore
    pub fn display_name(&self, graph: &GraphModel, node_id: &str) -> Option<String> {
        let node = graph.node(node_id)?;
        let friendly = node.ontology_class_friendly_name(graph.session().namespaces());
        let prefix = friendly.split('_').next().unwrap_or_default();
        if prefix.is_empty() {
            Some(node.name().to_string())
        } else {
            Some(format!("{} ({})", node.name(), prefix))
        }
    }

    /// Id used to match the node against a published graph
    pub fn node_identifier<'a>(&self, graph: &'a GraphModel, node_id: &str) -> Option<&'a str> {
        graph.node(node_id).map(|n| n.identifier())
    }

    /// Visible rows: unfiltered nodes below expanded parents
    pub fn rows(&self, graph: &GraphModel) -> Vec<NodeRow> {
        let mut rows = Vec::new();
        let mut stack = vec![(graph.root_id().to_string(), 0usize)];
        while let Some((node_id, depth)) = stack.pop() {
            let state = self.state.state(&node_id);
            if state.filtered {
                continue;
            }
            if state.expanded {
                let children = graph.child_ids(&node_id);
                stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
            }
            rows.push(NodeRow {
                display_name: self.display_name(graph, &node_id).unwrap_or_default(),
                node_id,
                depth,
                state,
            });
        }
        rows
    }

    /// Ids of nodes matching the active filter
    pub fn matches(&self, graph: &GraphModel) -> Vec<String> {
        if !self.state.is_filter_active() {
            return Vec::new();
        }
        let needle = self.state.filter_text();
        let mut ids: Vec<String> = graph
            .nodes()
            .filter(|n| n.matches_filter(needle))
            .map(|n| n.node_id().to_string())
            .collect();
        ids.sort();
        ids
    }
}
