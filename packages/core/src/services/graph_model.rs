//! Graph Model
//!
//! `GraphModel` is the in-memory mirror of one resource model: its nodes,
//! edges and cards, addressed by id. It is the single source of truth for
//! structure; the tree views read it and patch themselves from the
//! `GraphChange` records its operations return.
//!
//! # Structural operations
//!
//! Operations that cross the persistence boundary (`append_node`,
//! `delete_node`, `append_branch`, `move_node`, `save_node`, the reorders)
//! are `async fn(&mut self, ..)`. The exclusive borrow keeps a second
//! structural mutation from starting while one is in flight. Every operation
//! checks its preconditions first, sends exactly one persistence call, and
//! only touches local state after that call succeeded.
//!
//! # Invariants
//!
//! - there is exactly one top node, and it is a collector
//! - every edge endpoint exists
//! - every node has exactly one parent edge, except the top node
//! - a non-collector's group is its parent's group
//! - every collector has exactly one card

use crate::behaviors::{EntityKind, Persistable};
use crate::config::DesignerConfig;
use crate::models::{
    derive_alias, valid_ontology_classes, valid_ontology_properties, Card, CardWidget,
    DatatypeRecord, Edge, GraphData, MutationOutcome, Node, NodeGroup, OntologyConnection, ValidationError,
};
use crate::services::error::GraphError;
use crate::services::graph_change::{CardPlacement, GraphChange};
use crate::services::ontology_service::RefreshOutcome;
use crate::services::persistence::PersistenceService;
use crate::services::session::SessionCache;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// How far `get_child_nodes_and_edges` descends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Direct children only
    Direct,
    /// Every descendant
    Full,
}

/// Descendant ids of a node, top-down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildNodesAndEdges {
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
}

/// Result of a local field edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEdit {
    pub outcome: MutationOutcome,
    /// Set when the edit was applied; feed it to the card tree
    pub change: Option<GraphChange>,
}

impl NodeEdit {
    fn unchanged(outcome: MutationOutcome) -> Self {
        Self {
            outcome,
            change: None,
        }
    }
}

/// Result of `toggle_collector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorToggle {
    pub node_id: String,
    pub outcome: MutationOutcome,
    pub old_nodegroup_id: String,
    pub new_nodegroup_id: String,
    /// Descendants re-pointed along with the node
    pub moved_node_ids: Vec<String>,
    pub change: Option<GraphChange>,
}

pub struct GraphModel {
    graph_id: String,
    name: String,
    description: Option<String>,
    is_resource: bool,
    ontology_id: Option<String>,
    source_identifier_id: Option<String>,
    icon_class: Option<String>,

    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    /// child node id → id of the edge from its parent
    parent_edge: HashMap<String, String>,
    /// parent node id → ids of edges to its children
    child_edges: HashMap<String, Vec<String>>,
    /// nodegroup id → card
    cards: HashMap<String, Card>,
    root_id: String,

    /// Cards of groups dissolved by an unsaved collector toggle
    dissolved_cards: HashMap<String, Card>,
    /// Toggled node → descendants regrouped with it, pending save
    pending_regroups: HashMap<String, Vec<String>>,
    /// Edited node → node-groups whose card bindings changed with it, pending save
    pending_cards: HashMap<String, HashSet<String>>,

    session: SessionCache,
    persistence: Arc<dyn PersistenceService>,
    config: DesignerConfig,
    loaded_at: DateTime<Utc>,
}

impl GraphModel {
    /// Build the model from a full graph fetch, checking structural invariants
    pub fn load(
        data: GraphData,
        session: SessionCache,
        persistence: Arc<dyn PersistenceService>,
        config: DesignerConfig,
    ) -> Result<Self, GraphError> {
        let GraphData {
            graph_id,
            name,
            description,
            is_resource,
            ontology_id,
            source_identifier_id,
            icon_class,
            nodes,
            edges,
            cards,
        } = data;

        let top_nodes: Vec<&str> = nodes
            .iter()
            .filter(|n| n.is_top_node())
            .map(|n| n.node_id())
            .collect();
        if top_nodes.len() != 1 {
            return Err(GraphError::invariant_violation(format!(
                "expected exactly one top node, found {}",
                top_nodes.len()
            )));
        }
        let root_id = top_nodes[0].to_string();

        let mut node_map = HashMap::with_capacity(nodes.len());
        for mut node in nodes {
            node.validate()?;
            node.confirm();
            let id = node.node_id().to_string();
            if node_map.insert(id.clone(), node).is_some() {
                return Err(GraphError::invariant_violation(format!("duplicate node id {}", id)));
            }
        }

        let mut model = Self {
            graph_id,
            name,
            description,
            is_resource,
            ontology_id,
            source_identifier_id,
            icon_class,
            nodes: node_map,
            edges: HashMap::new(),
            parent_edge: HashMap::new(),
            child_edges: HashMap::new(),
            cards: HashMap::new(),
            root_id,
            dissolved_cards: HashMap::new(),
            pending_regroups: HashMap::new(),
            pending_cards: HashMap::new(),
            session,
            persistence,
            config,
            loaded_at: Utc::now(),
        };

        for edge in edges {
            if !model.nodes.contains_key(&edge.domain_node_id)
                || !model.nodes.contains_key(&edge.range_node_id)
            {
                return Err(GraphError::invariant_violation(format!(
                    "edge {} references a missing node",
                    edge.edge_id
                )));
            }
            if edge.range_node_id == model.root_id {
                return Err(GraphError::invariant_violation(format!(
                    "edge {} points at the top node",
                    edge.edge_id
                )));
            }
            if model.parent_edge.contains_key(&edge.range_node_id) {
                return Err(GraphError::invariant_violation(format!(
                    "node {} has more than one parent",
                    edge.range_node_id
                )));
            }
            model.insert_edge(edge);
        }

        let reachable = model.subtree_ids(&model.root_id).len();
        if reachable != model.nodes.len() {
            return Err(GraphError::invariant_violation(format!(
                "{} nodes are not reachable from the top node",
                model.nodes.len() - reachable
            )));
        }

        model.check_nodegroups()?;

        for mut card in cards {
            let collector = model
                .nodes
                .get(&card.nodegroup_id)
                .filter(|n| n.is_collector());
            if collector.is_none() {
                return Err(GraphError::invariant_violation(format!(
                    "card {} references unknown node-group {}",
                    card.card_id, card.nodegroup_id
                )));
            }
            card.ensure_constraint();
            card.confirm();
            model.cards.insert(card.nodegroup_id.clone(), card);
        }

        let missing: Vec<String> = model
            .nodes
            .values()
            .filter(|n| n.is_collector() && !model.cards.contains_key(n.node_id()))
            .map(|n| n.node_id().to_string())
            .collect();
        for nodegroup_id in missing {
            tracing::warn!("Node-group {} has no card, creating one", nodegroup_id);
            model.create_card_record(&nodegroup_id, None);
        }

        tracing::info!(
            "Loaded graph {} ({} nodes, {} edges, {} cards)",
            model.graph_id,
            model.nodes.len(),
            model.edges.len(),
            model.cards.len()
        );
        Ok(model)
    }

    fn check_nodegroups(&self) -> Result<(), GraphError> {
        for node in self.nodes.values() {
            if node.is_top_node() {
                if !node.is_collector() {
                    return Err(GraphError::invariant_violation(format!(
                        "top node {} must be a collector",
                        node.node_id()
                    )));
                }
                continue;
            }
            if node.is_collector() {
                continue;
            }
            let parent_group = self.parent_node(node.node_id()).map(|p| p.nodegroup_id());
            if parent_group != Some(node.nodegroup_id()) {
                return Err(GraphError::invariant_violation(format!(
                    "node {} has node-group {} which is not its parent's",
                    node.node_id(),
                    node.nodegroup_id()
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_resource(&self) -> bool {
        self.is_resource
    }

    pub fn ontology_id(&self) -> Option<&str> {
        self.ontology_id.as_deref()
    }

    pub fn has_ontology(&self) -> bool {
        self.ontology_id.is_some()
    }

    pub fn source_identifier_id(&self) -> Option<&str> {
        self.source_identifier_id.as_deref()
    }

    pub fn icon_class(&self) -> Option<&str> {
        self.icon_class.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(&self.root_id)
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.get(edge_id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.values().find(|c| c.card_id == card_id)
    }

    pub fn card_for_nodegroup(&self, nodegroup_id: &str) -> Option<&Card> {
        self.cards.get(nodegroup_id)
    }

    pub fn card_for_nodegroup_mut(&mut self, nodegroup_id: &str) -> Option<&mut Card> {
        self.cards.get_mut(nodegroup_id)
    }

    pub fn card_mut(&mut self, card_id: &str) -> Option<&mut Card> {
        self.cards.values_mut().find(|c| c.card_id == card_id)
    }

    fn require(&self, node_id: &str) -> Result<&Node, GraphError> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| GraphError::node_not_found(node_id))
    }

    // ------------------------------------------------------------------
    // Structure queries
    // ------------------------------------------------------------------

    pub fn parent_edge(&self, node_id: &str) -> Option<&Edge> {
        self.parent_edge
            .get(node_id)
            .and_then(|edge_id| self.edges.get(edge_id))
    }

    pub fn parent_node(&self, node_id: &str) -> Option<&Node> {
        self.parent_edge(node_id)
            .and_then(|edge| self.nodes.get(&edge.domain_node_id))
    }

    /// Direct children ordered by sort order, then name
    pub fn child_ids(&self, node_id: &str) -> Vec<String> {
        let mut children: Vec<&Node> = self
            .child_edges
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .filter_map(|edge| self.nodes.get(&edge.range_node_id))
            .collect();
        children.sort_by(|a, b| {
            a.sort_order()
                .cmp(&b.sort_order())
                .then_with(|| a.name().cmp(b.name()))
        });
        children.iter().map(|n| n.node_id().to_string()).collect()
    }

    /// The node and all its descendants, breadth-first
    pub fn subtree_ids(&self, node_id: &str) -> Vec<String> {
        if !self.nodes.contains_key(node_id) {
            return Vec::new();
        }
        let mut ordered = Vec::new();
        let mut queue = VecDeque::from([node_id.to_string()]);
        while let Some(id) = queue.pop_front() {
            queue.extend(self.child_ids(&id));
            ordered.push(id);
        }
        ordered
    }

    pub fn get_child_nodes_and_edges(
        &self,
        node_id: &str,
        traversal: Traversal,
    ) -> Result<ChildNodesAndEdges, GraphError> {
        self.require(node_id)?;
        let node_ids = match traversal {
            Traversal::Direct => self.child_ids(node_id),
            Traversal::Full => self.subtree_ids(node_id).into_iter().skip(1).collect(),
        };
        let edge_ids = node_ids
            .iter()
            .filter_map(|id| self.parent_edge.get(id).cloned())
            .collect();
        Ok(ChildNodesAndEdges { node_ids, edge_ids })
    }

    /// Ancestors from the parent up to the top node
    pub fn ancestor_ids(&self, node_id: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_node(node_id);
        while let Some(node) = current {
            ancestors.push(node.node_id().to_string());
            current = self.parent_node(node.node_id());
        }
        ancestors
    }

    pub fn is_descendant(&self, node_id: &str, ancestor_id: &str) -> bool {
        self.ancestor_ids(node_id).iter().any(|a| a == ancestor_id)
    }

    // ------------------------------------------------------------------
    // Node-groups
    // ------------------------------------------------------------------

    /// Structural parent of a node-group: the group of its collector's parent
    pub fn parent_nodegroup_id(&self, nodegroup_id: &str) -> Option<String> {
        self.parent_node(nodegroup_id)
            .map(|parent| parent.nodegroup_id().to_string())
    }

    pub fn node_group(&self, nodegroup_id: &str) -> Option<NodeGroup> {
        let collector = self.nodes.get(nodegroup_id).filter(|n| n.is_collector())?;
        let member_ids = self
            .subtree_ids(collector.node_id())
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map_or(false, |n| n.nodegroup_id() == nodegroup_id)
            })
            .collect();
        Some(NodeGroup {
            nodegroup_id: nodegroup_id.to_string(),
            parent_nodegroup_id: self.parent_nodegroup_id(nodegroup_id),
            member_ids,
        })
    }

    /// All node-groups, top-down
    pub fn node_groups(&self) -> Vec<NodeGroup> {
        self.subtree_ids(&self.root_id)
            .iter()
            .filter_map(|id| self.node_group(id))
            .collect()
    }

    pub fn root_nodegroup(&self) -> Option<&str> {
        self.root().map(|root| root.nodegroup_id())
    }

    pub fn root_card(&self) -> Option<&Card> {
        self.root_nodegroup()
            .and_then(|nodegroup_id| self.cards.get(nodegroup_id))
    }

    /// Resolve a node identifier from a published graph to this graph's node-group
    ///
    /// Matches on the node's source identifier, falling back to the node id.
    pub fn resolve_nodegroup(&self, identifier: &str) -> Option<&str> {
        self.nodes
            .values()
            .find(|n| n.source_identifier_id() == Some(identifier))
            .or_else(|| self.nodes.get(identifier))
            .map(|n| n.nodegroup_id())
    }

    /// Card placements for every collector in a subtree, top-down
    fn collector_placements(&self, node_id: &str) -> Vec<CardPlacement> {
        self.subtree_ids(node_id)
            .into_iter()
            .filter_map(|id| {
                let node = self.nodes.get(&id).filter(|n| n.is_collector())?;
                let card = self.cards.get(node.node_id())?;
                Some(CardPlacement {
                    card_id: card.card_id.clone(),
                    nodegroup_id: id.clone(),
                    parent_nodegroup_id: self.parent_nodegroup_id(&id),
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Internal bookkeeping
    // ------------------------------------------------------------------

    fn insert_edge(&mut self, edge: Edge) {
        self.parent_edge
            .insert(edge.range_node_id.clone(), edge.edge_id.clone());
        self.child_edges
            .entry(edge.domain_node_id.clone())
            .or_default()
            .push(edge.edge_id.clone());
        self.edges.insert(edge.edge_id.clone(), edge);
    }

    fn remove_edge(&mut self, edge_id: &str) -> Option<Edge> {
        let edge = self.edges.remove(edge_id)?;
        self.parent_edge.remove(&edge.range_node_id);
        if let Some(children) = self.child_edges.get_mut(&edge.domain_node_id) {
            children.retain(|id| id != edge_id);
        }
        Some(edge)
    }

    fn next_child_sort_order(&self, parent_id: &str) -> i64 {
        self.child_ids(parent_id)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.sort_order() + 1)
            .max()
            .unwrap_or(0)
    }

    fn next_card_sort_order(&self) -> i64 {
        self.cards
            .values()
            .map(|c| c.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Make `base` unique among the other nodes' aliases by suffixing `_n`
    fn unique_alias(&self, base: &str, node_id: &str) -> String {
        let taken: HashSet<&str> = self
            .nodes
            .values()
            .filter(|n| n.node_id() != node_id)
            .filter_map(|n| n.alias())
            .collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Create an unconfirmed card for a collector that has none
    fn create_card_record(&mut self, nodegroup_id: &str, card_id: Option<String>) -> Option<String> {
        let collector = self.nodes.get(nodegroup_id)?;
        let card_id = card_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let card = Card::for_collector(card_id.clone(), collector)
            .with_sort_order(self.next_card_sort_order());
        self.cards.insert(nodegroup_id.to_string(), card);
        Some(card_id)
    }

    /// Bind each node on the card of its own group with its datatype's
    /// default widget and drop its bindings on every other card
    ///
    /// A binding that already uses the default widget keeps its position and
    /// config. Returns the node-groups whose card changed.
    fn bind_widgets(&mut self, node_ids: &[String]) -> Vec<String> {
        let mut changed = Vec::new();
        for node_id in node_ids {
            let target = self.nodes.get(node_id).map(|n| {
                (
                    n.nodegroup_id().to_string(),
                    n.datatype().to_string(),
                    n.name().to_string(),
                )
            });
            for (nodegroup_id, card) in self.cards.iter_mut() {
                if target.as_ref().map_or(false, |(group, _, _)| group == nodegroup_id) {
                    continue;
                }
                if card.remove_widget(node_id).is_some() {
                    tracing::debug!("Unbound node {} from card {}", node_id, card.card_id);
                    changed.push(nodegroup_id.clone());
                }
            }

            let Some((group, datatype, name)) = target else {
                continue;
            };
            let default_widget = self
                .session
                .datatypes()
                .default_widget_id(&datatype)
                .map(str::to_string);
            let Some(card) = self.cards.get_mut(&group) else {
                continue;
            };
            let before = card.widget_for(node_id).cloned();
            match default_widget {
                Some(widget_id) => {
                    let widget = match before.clone() {
                        Some(mut existing) if existing.widget_id == widget_id => {
                            existing.label = name;
                            existing
                        }
                        Some(existing) => CardWidget {
                            widget_id,
                            node_id: node_id.clone(),
                            label: name,
                            sort_order: existing.sort_order,
                            visible: existing.visible,
                            config: Map::new(),
                        },
                        None => CardWidget {
                            widget_id,
                            node_id: node_id.clone(),
                            label: name,
                            sort_order: card.next_widget_sort_order(),
                            visible: true,
                            config: Map::new(),
                        },
                    };
                    card.upsert_widget(widget);
                }
                None => {
                    card.remove_widget(node_id);
                }
            }
            if card.widget_for(node_id) != before.as_ref() {
                changed.push(group);
            }
        }
        changed.sort();
        changed.dedup();
        changed
    }

    /// Re-resolve widget bindings after a local edit
    ///
    /// Cards changed here are sent with the next save of the node that
    /// caused the change.
    fn sync_widgets(&mut self, node_ids: &[String]) {
        for node_id in node_ids {
            let changed = self.bind_widgets(std::slice::from_ref(node_id));
            if !changed.is_empty() {
                self.pending_cards
                    .entry(node_id.clone())
                    .or_default()
                    .extend(changed);
            }
        }
    }

    /// Re-resolve widget bindings after a persisted structural change and
    /// record them as confirmed
    fn bind_confirmed_widgets(&mut self, node_ids: &[String]) {
        for nodegroup_id in self.bind_widgets(node_ids) {
            if let Some(card) = self.cards.get_mut(&nodegroup_id) {
                card.confirm_widgets();
            }
        }
    }

    /// Default ontology wiring for a new child of a node with `parent_class`
    ///
    /// Picks the first valid property, then the first class valid for it.
    async fn default_ontology_wiring(
        &self,
        parent_class: Option<&str>,
    ) -> Result<(Option<String>, Option<String>, Vec<OntologyConnection>), GraphError> {
        let Some(parent_class) = parent_class.filter(|_| self.has_ontology()) else {
            return Ok((None, None, Vec::new()));
        };
        let connections = self
            .session
            .ontology()
            .connections_for_domain(parent_class)
            .await?;
        let property = valid_ontology_properties(&connections, None)
            .into_iter()
            .next();
        let class = valid_ontology_classes(&connections, property.as_deref())
            .into_iter()
            .next();
        Ok((class, property, connections))
    }

    // ------------------------------------------------------------------
    // Local edits
    // ------------------------------------------------------------------

    /// Apply a field edit through `Node`'s public setters
    ///
    /// A renamed node's derived alias is kept unique within the graph and its
    /// widget binding follows the edit.
    pub fn edit_node<F>(&mut self, node_id: &str, edit: F) -> Result<NodeEdit, GraphError>
    where
        F: FnOnce(&mut Node) -> MutationOutcome,
    {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::node_not_found(node_id))?;
        let previous_name = node.name().to_string();
        let outcome = edit(node);
        if !outcome.is_applied() {
            return Ok(NodeEdit::unchanged(outcome));
        }

        let rederive = self
            .nodes
            .get(node_id)
            .filter(|n| n.name() != previous_name && !n.has_custom_alias())
            .map(|n| derive_alias(n.name()));
        if let Some(base) = rederive {
            let alias = self.unique_alias(&base, node_id);
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.set_alias_unchecked(alias);
            }
        }
        self.sync_widgets(&[node_id.to_string()]);
        Ok(NodeEdit {
            outcome,
            change: Some(GraphChange::NodeUpdated {
                node_id: node_id.to_string(),
                affected_node_ids: Vec::new(),
                placements: Vec::new(),
                dissolved_nodegroup: None,
            }),
        })
    }

    /// Rename a node, keeping its derived alias unique within the graph
    pub fn rename_node(&mut self, node_id: &str, name: &str) -> Result<NodeEdit, GraphError> {
        self.edit_node(node_id, |node| node.set_name(name))
    }

    /// Switch a node's datatype, merging the new default config
    pub fn set_node_datatype(&mut self, node_id: &str, datatype: &str) -> Result<NodeEdit, GraphError> {
        let registry = self.session.datatypes();
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::node_not_found(node_id))?;
        let outcome = node.set_datatype(datatype, registry)?;
        if !outcome.is_applied() {
            return Ok(NodeEdit::unchanged(outcome));
        }
        self.sync_widgets(&[node_id.to_string()]);
        Ok(NodeEdit {
            outcome,
            change: Some(GraphChange::NodeUpdated {
                node_id: node_id.to_string(),
                affected_node_ids: Vec::new(),
                placements: Vec::new(),
                dissolved_nodegroup: None,
            }),
        })
    }

    /// Make a node head its own group, or fold it back into its parent's
    ///
    /// Only descendants whose group is the node's *old* group move with it;
    /// nested groups keep their own collectors. The change is local until the
    /// node is saved. A card is created for a new collector (or the one it
    /// had before an unsaved un-collect is restored); un-collecting stashes
    /// the group's card.
    pub fn toggle_collector(&mut self, node_id: &str) -> Result<CollectorToggle, GraphError> {
        let node = self.require(node_id)?;
        let old_group = node.nodegroup_id().to_string();

        if node.is_immutable() {
            tracing::warn!("Ignoring collector toggle on immutable node {}", node_id);
            return Ok(CollectorToggle {
                node_id: node_id.to_string(),
                outcome: MutationOutcome::RejectedImmutable,
                new_nodegroup_id: old_group.clone(),
                old_nodegroup_id: old_group,
                moved_node_ids: Vec::new(),
                change: None,
            });
        }

        let becoming_collector = !node.is_collector();
        let new_group = if becoming_collector {
            node_id.to_string()
        } else {
            if node.is_top_node() {
                return Err(GraphError::root_node_immutable(node_id, "un-collected"));
            }
            self.parent_node(node_id)
                .map(|parent| parent.nodegroup_id().to_string())
                .ok_or_else(|| {
                    GraphError::invariant_violation(format!("node {} has no parent", node_id))
                })?
        };

        let moved: Vec<String> = self
            .subtree_ids(node_id)
            .into_iter()
            .skip(1)
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map_or(false, |n| n.nodegroup_id() == old_group)
            })
            .collect();

        for id in std::iter::once(node_id).chain(moved.iter().map(String::as_str)) {
            if let Some(member) = self.nodes.get_mut(id) {
                member.nodegroup_id = new_group.clone();
            }
        }

        let pending = self.pending_regroups.entry(node_id.to_string()).or_default();
        pending.extend(moved.iter().cloned());
        pending.sort();
        pending.dedup();

        let dissolved = if becoming_collector {
            match self.dissolved_cards.remove(node_id) {
                Some(card) => {
                    self.cards.insert(node_id.to_string(), card);
                }
                None => {
                    self.create_card_record(node_id, None);
                }
            }
            None
        } else {
            if let Some(card) = self.cards.remove(&old_group) {
                self.dissolved_cards.insert(old_group.clone(), card);
            }
            Some(old_group.clone())
        };

        let mut regrouped = vec![node_id.to_string()];
        regrouped.extend(moved.iter().cloned());
        self.sync_widgets(&regrouped);

        tracing::info!(
            "Node {} node-group {} -> {} ({} descendants moved)",
            node_id,
            old_group,
            new_group,
            moved.len()
        );

        let change = GraphChange::NodeUpdated {
            node_id: node_id.to_string(),
            affected_node_ids: moved.clone(),
            placements: self.collector_placements(node_id),
            dissolved_nodegroup: dissolved,
        };
        Ok(CollectorToggle {
            node_id: node_id.to_string(),
            outcome: MutationOutcome::Applied,
            old_nodegroup_id: old_group,
            new_nodegroup_id: new_group,
            moved_node_ids: moved,
            change: Some(change),
        })
    }

    // ------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------

    fn build_child_node(
        &self,
        node_id: &str,
        nodegroup_id: Option<String>,
        record: Option<&DatatypeRecord>,
        ontology: (Option<String>, Option<String>),
        sort_order: i64,
    ) -> Node {
        let mut node = Node::new(
            node_id,
            self.graph_id.clone(),
            self.config.new_node_name.clone(),
            self.config.new_node_datatype.clone(),
            nodegroup_id,
        )
        .with_ontology(ontology.0, ontology.1)
        .with_sort_order(sort_order);
        if let Some(record) = record {
            node = node.with_config(Value::Object(record.default_config.clone()));
        }
        let alias = self.unique_alias(&derive_alias(node.name()), node_id);
        node.set_alias_unchecked(alias);
        node
    }

    /// Add a new node under `parent_id`
    ///
    /// The node takes the configured default name and datatype. It heads its
    /// own group only if the datatype collects by default; otherwise it joins
    /// the parent's group. Ontology property and class default to the first
    /// valid choices under the parent's class.
    pub async fn append_node(&mut self, parent_id: &str) -> Result<GraphChange, GraphError> {
        let parent = self.require(parent_id)?;
        if parent.is_immutable() {
            return Err(GraphError::immutable_node(parent_id));
        }
        let parent_group = parent.nodegroup_id().to_string();
        let parent_class = parent.ontology_class().map(str::to_string);

        let record = self
            .session
            .datatypes()
            .get(&self.config.new_node_datatype)
            .cloned();
        let collects = record.as_ref().map_or(false, |r| r.collects_by_default);
        let (class, property, connections) =
            self.default_ontology_wiring(parent_class.as_deref()).await?;
        let sort_order = self.next_child_sort_order(parent_id);

        let proposed_id = Uuid::new_v4().to_string();
        // None makes the node its own collector
        let nodegroup_id = (!collects).then(|| parent_group.clone());
        let proposed = self.build_child_node(
            &proposed_id,
            nodegroup_id.clone(),
            record.as_ref(),
            (class.clone(), property.clone()),
            sort_order,
        );

        let mut payload = proposed.to_payload();
        if let Value::Object(map) = &mut payload {
            map.insert("id".to_string(), Value::from(proposed_id.clone()));
            map.insert("parentNodeId".to_string(), Value::from(parent_id));
        }
        let response = self.persistence.create(EntityKind::Node, payload).await?;

        let node_id = response.id.clone();
        let mut node = if node_id == proposed_id {
            proposed
        } else {
            self.build_child_node(
                &node_id,
                nodegroup_id,
                record.as_ref(),
                (class, property.clone()),
                sort_order,
            )
        };
        node.apply_server_values(&response.server_fields);
        node.confirm();

        let edge_id = server_string(&response.server_fields, "edgeId")
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.insert_edge(Edge::new(edge_id, parent_id, node_id.clone(), property));
        self.nodes.insert(node_id.clone(), node);
        self.session.ontology().store(&node_id, connections).await;

        let mut placements = Vec::new();
        if collects {
            let card_id = self.create_card_record(&node_id, server_string(&response.server_fields, "cardId"));
            if let Some(card) = self.cards.get_mut(&node_id) {
                card.confirm();
            }
            if let Some(card_id) = card_id {
                placements.push(CardPlacement {
                    card_id,
                    nodegroup_id: node_id.clone(),
                    parent_nodegroup_id: Some(parent_group),
                });
            }
        }

        self.bind_confirmed_widgets(&[node_id.clone()]);

        tracing::info!("Appended node {} under {}", node_id, parent_id);
        Ok(GraphChange::NodesAppended {
            root_node_id: node_id.clone(),
            node_ids: vec![node_id],
            placements,
        })
    }

    /// Delete a node and everything below it
    ///
    /// The top node cannot be deleted. An immutable node can only be deleted
    /// when it heads its own group (the root of a grafted branch). On a
    /// failed or refused request nothing changes.
    pub async fn delete_node(&mut self, node_id: &str) -> Result<GraphChange, GraphError> {
        let node = self.require(node_id)?;
        if node.is_top_node() {
            return Err(GraphError::root_node_immutable(node_id, "deleted"));
        }
        if node.is_immutable() && !node.is_collector() {
            return Err(GraphError::immutable_node(node_id));
        }

        let response = self.persistence.delete(EntityKind::Node, node_id).await?;
        if !response.success {
            tracing::warn!("Server refused to delete node {}", node_id);
            return Err(GraphError::server_rejected("delete", node_id));
        }

        let removed_node_ids = self.subtree_ids(node_id);
        let removed_nodegroups: Vec<String> = removed_node_ids
            .iter()
            .filter(|id| self.nodes.get(*id).map_or(false, |n| n.is_collector()))
            .cloned()
            .collect();
        let removed: HashSet<&str> = removed_node_ids.iter().map(String::as_str).collect();
        let removed_edge_ids: Vec<String> = self
            .edges
            .values()
            .filter(|e| {
                removed.contains(e.domain_node_id.as_str()) || removed.contains(e.range_node_id.as_str())
            })
            .map(|e| e.edge_id.clone())
            .collect();

        for edge_id in &removed_edge_ids {
            self.remove_edge(edge_id);
        }
        for id in &removed_node_ids {
            self.nodes.remove(id);
            self.child_edges.remove(id);
            self.pending_regroups.remove(id);
            self.dissolved_cards.remove(id);
            self.session.ontology().forget(id).await;
        }
        for nodegroup_id in &removed_nodegroups {
            self.cards.remove(nodegroup_id);
        }
        for id in &removed_node_ids {
            self.pending_cards.remove(id);
            for card in self.cards.values_mut() {
                if card.remove_widget(id).is_some() {
                    card.confirm_widgets();
                }
            }
        }

        tracing::info!(
            "Deleted node {} ({} nodes, {} node-groups)",
            node_id,
            removed_node_ids.len(),
            removed_nodegroups.len()
        );
        Ok(GraphChange::NodesDeleted {
            node_id: node_id.to_string(),
            removed_node_ids,
            removed_edge_ids,
            removed_nodegroups,
        })
    }

    /// Whether `branch`'s root may be grafted under `target_id`
    ///
    /// Graphs without an ontology accept any branch. Otherwise the branch
    /// root's class must be among the classes allowed below the target's class.
    pub async fn can_append(&self, target_id: &str, branch: &GraphData) -> Result<bool, GraphError> {
        let target = self.require(target_id)?;
        if !self.has_ontology() {
            return Ok(true);
        }
        let Some(root_class) = branch.root().and_then(|root| root.ontology_class()) else {
            return Ok(false);
        };
        let Some(target_class) = target.ontology_class() else {
            return Ok(false);
        };
        let classes = self
            .session
            .ontology()
            .classes_for_domain(target_class)
            .await?;
        Ok(classes.iter().any(|class| class == root_class))
    }

    /// Graft a copy of `branch` under `target_id`
    ///
    /// Every grafted node, edge and card gets a fresh id. Relative grouping is
    /// preserved; when the branch root is not a collector, the nodes of its
    /// group join the target's group. `property` links the branch root to the
    /// target; when omitted the first valid property is used.
    pub async fn append_branch(
        &mut self,
        target_id: &str,
        branch: &GraphData,
        property: Option<String>,
    ) -> Result<GraphChange, GraphError> {
        let target = self.require(target_id)?;
        if target.is_immutable() {
            return Err(GraphError::immutable_node(target_id));
        }
        let target_group = target.nodegroup_id().to_string();
        let target_class = target.ontology_class().map(str::to_string);
        let branch_root = branch.root().ok_or_else(|| {
            GraphError::incompatible_branch(&branch.graph_id, target_id, "branch has no top node")
        })?;
        if !self.can_append(target_id, branch).await? {
            return Err(GraphError::incompatible_branch(
                &branch.graph_id,
                target_id,
                format!(
                    "class {} is not allowed here",
                    branch_root.ontology_class().unwrap_or("<none>")
                ),
            ));
        }

        let property = match property {
            Some(property) if self.has_ontology() => Some(property),
            Some(_) => None,
            None => {
                let (_, default_property, _) =
                    self.default_ontology_wiring(target_class.as_deref()).await?;
                default_property
            }
        };

        let id_map: HashMap<String, String> = branch
            .nodes
            .iter()
            .map(|n| (n.node_id().to_string(), Uuid::new_v4().to_string()))
            .collect();
        let root_group = (!branch_root.is_collector()).then(|| branch_root.nodegroup_id().to_string());
        let map_group = |group: &str| -> String {
            if root_group.as_deref() == Some(group) {
                return target_group.clone();
            }
            id_map
                .get(group)
                .cloned()
                .unwrap_or_else(|| target_group.clone())
        };

        let payload = json!({
            "graphId": self.graph_id,
            "targetNodeId": target_id,
            "branchGraphId": branch.graph_id,
            "property": property,
            "idMap": id_map,
        });
        let response = self.persistence.create(EntityKind::Branch, payload).await?;

        let strip_ontology = !self.has_ontology();
        let sort_order = self.next_child_sort_order(target_id);
        let mut grafted = Vec::with_capacity(branch.nodes.len());
        for source in &branch.nodes {
            let Some(new_id) = id_map.get(source.node_id()) else {
                continue;
            };
            let mut node = source.clone();
            node.rehome(new_id.clone(), &self.graph_id, map_group(source.nodegroup_id()));
            if strip_ontology {
                node.clear_ontology();
            }
            if source.node_id() == branch_root.node_id() {
                node.parent_property = property.clone();
                node.sort_order = sort_order;
            }
            grafted.push(node);
        }

        let root_id = id_map
            .get(branch_root.node_id())
            .cloned()
            .ok_or_else(|| GraphError::invariant_violation("branch root was not mapped"))?;
        let joining_edge = server_string(&response.server_fields, "edgeId")
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.insert_edge(Edge::new(joining_edge, target_id, root_id.clone(), property));
        for edge in &branch.edges {
            let (Some(domain), Some(range)) = (
                id_map.get(&edge.domain_node_id),
                id_map.get(&edge.range_node_id),
            ) else {
                continue;
            };
            let ontology_property = if strip_ontology {
                None
            } else {
                edge.ontology_property.clone()
            };
            self.insert_edge(Edge::new(
                Uuid::new_v4().to_string(),
                domain.clone(),
                range.clone(),
                ontology_property,
            ));
        }

        let node_ids: Vec<String> = grafted.iter().map(|n| n.node_id().to_string()).collect();
        for mut node in grafted {
            if !node.has_custom_alias() {
                let alias = self.unique_alias(node.alias().unwrap_or(&derive_alias(node.name())), node.node_id());
                node.set_alias_unchecked(alias);
            }
            node.confirm();
            self.nodes.insert(node.node_id().to_string(), node);
        }

        for source_card in &branch.cards {
            let Some(nodegroup_id) = id_map.get(&source_card.nodegroup_id) else {
                continue;
            };
            if !self.nodes.get(nodegroup_id).map_or(false, |n| n.is_collector()) {
                continue;
            }
            let mut card = remap_card(source_card, nodegroup_id, &id_map);
            card.sort_order = self.next_card_sort_order();
            card.confirm();
            self.cards.insert(nodegroup_id.clone(), card);
        }
        let uncarded: Vec<String> = node_ids
            .iter()
            .filter(|id| {
                self.nodes.get(*id).map_or(false, |n| n.is_collector()) && !self.cards.contains_key(*id)
            })
            .cloned()
            .collect();
        for nodegroup_id in uncarded {
            self.create_card_record(&nodegroup_id, None);
            if let Some(card) = self.cards.get_mut(&nodegroup_id) {
                card.confirm();
            }
        }

        self.bind_confirmed_widgets(&node_ids);

        tracing::info!(
            "Appended branch {} under {} ({} nodes)",
            branch.graph_id,
            target_id,
            node_ids.len()
        );
        Ok(GraphChange::NodesAppended {
            placements: self.collector_placements(&root_id),
            root_node_id: root_id,
            node_ids,
        })
    }

    /// Re-parent a subtree under `new_parent_id`
    ///
    /// Members of the moved node's group inside the subtree join the new
    /// parent's group when the node is not a collector. Collectors keep their
    /// group and their card follows the declared new parent.
    pub async fn move_node(
        &mut self,
        node_id: &str,
        property: Option<String>,
        new_parent_id: &str,
    ) -> Result<GraphChange, GraphError> {
        let node = self.require(node_id)?;
        if node.is_top_node() {
            return Err(GraphError::root_node_immutable(node_id, "moved"));
        }
        if node.is_immutable() {
            return Err(GraphError::immutable_node(node_id));
        }
        let new_parent = self.require(new_parent_id)?;
        if new_parent_id == node_id || self.is_descendant(new_parent_id, node_id) {
            return Err(GraphError::invalid_move(
                node_id,
                format!("{} is inside the moved subtree", new_parent_id),
            ));
        }
        let new_group = new_parent.nodegroup_id().to_string();
        let old_group = node.nodegroup_id().to_string();
        let is_collector = node.is_collector();
        let property = property.filter(|_| self.has_ontology());

        let payload = json!({
            "move": {
                "newParentNodeId": new_parent_id,
                "property": property,
            }
        });
        self.persistence
            .update(EntityKind::Node, node_id, payload)
            .await?;

        let edge_id = self
            .parent_edge
            .get(node_id)
            .cloned()
            .ok_or_else(|| GraphError::invariant_violation(format!("node {} has no parent edge", node_id)))?;
        if let Some(mut edge) = self.remove_edge(&edge_id) {
            edge.domain_node_id = new_parent_id.to_string();
            edge.ontology_property = property.clone();
            self.insert_edge(edge);
        }

        let sort_order = self.next_child_sort_order(new_parent_id);
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.parent_property = property.clone();
            node.sort_order = sort_order;
            node.patch_snapshot("parentProperty", json!(property));
            node.patch_snapshot("sortOrder", json!(sort_order));
        }

        let mut affected = Vec::new();
        if !is_collector {
            for id in self.subtree_ids(node_id) {
                if let Some(member) = self.nodes.get_mut(&id).filter(|n| n.nodegroup_id() == old_group) {
                    member.nodegroup_id = new_group.clone();
                    member.patch_snapshot("nodegroupId", json!(new_group));
                    if id != node_id {
                        affected.push(id);
                    }
                }
            }
        }

        let mut rebound = vec![node_id.to_string()];
        rebound.extend(affected.iter().cloned());
        self.bind_confirmed_widgets(&rebound);

        tracing::info!("Moved node {} under {}", node_id, new_parent_id);
        Ok(GraphChange::NodeMoved {
            node_id: node_id.to_string(),
            affected_node_ids: affected,
            placements: self.collector_placements(node_id),
        })
    }

    /// Check a node against the graph's ontology rules before saving
    fn validate_for_save(&self, node: &Node) -> Result<(), ValidationError> {
        node.validate()?;
        if !self.has_ontology() {
            return Ok(());
        }
        if node.ontology_class().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidOntology {
                node_id: node.node_id().to_string(),
                reason: "an ontology class is required".to_string(),
            });
        }
        if !node.is_top_node() && node.parent_property().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidOntology {
                node_id: node.node_id().to_string(),
                reason: "a parent property is required".to_string(),
            });
        }
        Ok(())
    }

    /// Persist a node's pending edits
    ///
    /// A card created by an unsaved collector toggle is sent along with the
    /// node, as is every card whose widget bindings changed on account of the
    /// node or the descendants it regrouped. On success the server's values (alias, field name) are applied,
    /// the node and its regrouped descendants are confirmed, and a card still
    /// carrying the default card name (or the node's previous name) takes the
    /// node's name.
    pub async fn save_node(&mut self, node_id: &str) -> Result<GraphChange, GraphError> {
        let node = self.require(node_id)?;
        if node.is_immutable() {
            return Err(GraphError::immutable_node(node_id));
        }
        self.validate_for_save(node)?;

        let mut payload = Map::new();
        payload.insert("node".to_string(), node.to_payload());
        let pending_card = self
            .cards
            .get(node.nodegroup_id())
            .filter(|card| node.is_collector() && card.confirmed_snapshot().is_none());
        let own_card_id = pending_card.map(|card| card.card_id.clone());
        if let Some(card) = pending_card {
            payload.insert("card".to_string(), card.to_payload());
        }

        let mut touched_ids = vec![node_id.to_string()];
        touched_ids.extend(self.pending_regroups.get(node_id).cloned().unwrap_or_default());
        let mut touched_groups: Vec<String> = touched_ids
            .iter()
            .filter_map(|id| self.pending_cards.get(id))
            .flatten()
            .cloned()
            .collect();
        touched_groups.sort();
        touched_groups.dedup();
        let touched_cards: Vec<Value> = touched_groups
            .iter()
            .filter_map(|group| self.cards.get(group))
            .filter(|card| Some(&card.card_id) != own_card_id.as_ref())
            .map(Card::to_payload)
            .collect();
        if !touched_cards.is_empty() {
            payload.insert("cards".to_string(), Value::Array(touched_cards));
        }
        if let Some(card) = self.dissolved_cards.get(node_id) {
            payload.insert("deleteCardId".to_string(), json!(card.card_id));
        }

        let response = self
            .persistence
            .update(EntityKind::Node, node_id, Value::Object(payload))
            .await?;

        let updated = response
            .updated_values
            .get("node")
            .cloned()
            .unwrap_or(response.updated_values);
        let default_card_name = self.config.default_card_name.clone();
        let Some(node) = self.nodes.get_mut(node_id) else {
            return Err(GraphError::node_not_found(node_id));
        };
        let previous_name = node
            .confirmed_snapshot()
            .and_then(|snapshot| snapshot.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        node.apply_server_values(&updated);
        node.confirm();
        let (nodegroup_id, name, is_collector) = (
            node.nodegroup_id().to_string(),
            node.name().to_string(),
            node.is_collector(),
        );

        let regrouped = self.pending_regroups.remove(node_id).unwrap_or_default();
        for id in &regrouped {
            if let Some(member) = self.nodes.get_mut(id) {
                let group = member.nodegroup_id().to_string();
                member.patch_snapshot("nodegroupId", json!(group));
            }
        }

        if is_collector {
            if let Some(card) = self.cards.get_mut(&nodegroup_id) {
                if card.name == default_card_name || Some(&card.name) == previous_name.as_ref() {
                    card.name = name;
                }
                card.confirm();
            }
        } else {
            self.dissolved_cards.remove(node_id);
        }

        for group in &touched_groups {
            if let Some(card) = self.cards.get_mut(group) {
                card.confirm();
            }
        }
        for id in &touched_ids {
            self.pending_cards.remove(id);
        }

        tracing::info!("Saved node {}", node_id);
        Ok(GraphChange::NodeUpdated {
            node_id: node_id.to_string(),
            affected_node_ids: regrouped,
            placements: Vec::new(),
            dissolved_nodegroup: None,
        })
    }

    /// Set the sort order of a node's children
    ///
    /// `ordered_ids` must be exactly the parent's children.
    pub async fn reorder_nodes(
        &mut self,
        parent_id: &str,
        ordered_ids: &[String],
    ) -> Result<GraphChange, GraphError> {
        self.require(parent_id)?;
        let mut current = self.child_ids(parent_id);
        current.sort();
        let mut requested = ordered_ids.to_vec();
        requested.sort();
        if current != requested {
            return Err(GraphError::invalid_move(
                parent_id,
                "reorder must list exactly the node's children",
            ));
        }

        let order: Vec<Value> = ordered_ids
            .iter()
            .enumerate()
            .map(|(i, id)| json!({ "nodeId": id, "sortOrder": i }))
            .collect();
        self.persistence
            .update(EntityKind::Graph, &self.graph_id, json!({ "reorderNodes": order }))
            .await?;

        for (i, id) in ordered_ids.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.sort_order = i as i64;
                node.patch_snapshot("sortOrder", json!(i));
            }
        }
        Ok(GraphChange::NodesReordered {
            parent_node_id: parent_id.to_string(),
        })
    }

    /// Set the sort order of cards
    pub async fn reorder_cards(&mut self, ordered_card_ids: &[String]) -> Result<GraphChange, GraphError> {
        if let Some(missing) = ordered_card_ids.iter().find(|id| self.card(id).is_none()) {
            return Err(GraphError::card_not_found(missing.as_str()));
        }

        let order: Vec<Value> = ordered_card_ids
            .iter()
            .enumerate()
            .map(|(i, id)| json!({ "cardId": id, "sortOrder": i }))
            .collect();
        self.persistence
            .update(EntityKind::Graph, &self.graph_id, json!({ "reorderCards": order }))
            .await?;

        for (i, id) in ordered_card_ids.iter().enumerate() {
            if let Some(card) = self.card_mut(id) {
                card.sort_order = i as i64;
                card.patch_snapshot("sortOrder", json!(i));
            }
        }
        Ok(GraphChange::CardsReordered)
    }

    // ------------------------------------------------------------------
    // Dirty state
    // ------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.nodes.values().any(|n| n.is_dirty()) || self.cards.values().any(|c| c.is_dirty())
    }

    pub fn dirty_node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .nodes
            .values()
            .filter(|n| n.is_dirty())
            .map(|n| n.node_id())
            .collect();
        ids.sort();
        ids
    }

    /// Discard every unsaved edit
    ///
    /// Nodes return to their confirmed snapshots; cards created by unsaved
    /// toggles are dropped and stashed cards are restored.
    pub fn reset(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
        self.pending_regroups.clear();
        self.pending_cards.clear();
        let stale: Vec<String> = self
            .cards
            .keys()
            .filter(|ng| !self.nodes.get(*ng).map_or(false, |n| n.is_collector()))
            .cloned()
            .collect();
        for nodegroup_id in stale {
            self.cards.remove(&nodegroup_id);
        }
        for (nodegroup_id, card) in std::mem::take(&mut self.dissolved_cards) {
            if self.nodes.get(&nodegroup_id).map_or(false, |n| n.is_collector()) {
                self.cards.insert(nodegroup_id, card);
            }
        }
        for card in self.cards.values_mut() {
            card.reset();
        }
        tracing::info!("Reset graph {} to its last saved state", self.graph_id);
    }

    // ------------------------------------------------------------------
    // Ontology
    // ------------------------------------------------------------------

    /// Refresh a node's cached connections from its parent's class
    pub async fn refresh_valid_connections(&self, node_id: &str) -> Result<RefreshOutcome, GraphError> {
        self.require(node_id)?;
        let domain = self
            .parent_node(node_id)
            .and_then(|p| p.ontology_class())
            .map(str::to_string);
        Ok(self
            .session
            .ontology()
            .refresh(node_id, domain.as_deref())
            .await?)
    }

    pub async fn valid_ontology_classes(&self, node_id: &str) -> Result<Vec<String>, GraphError> {
        let node = self.require(node_id)?;
        let connections = self.session.ontology().connections(node_id).await;
        Ok(node.valid_ontology_classes(&connections))
    }

    pub async fn valid_ontology_properties(&self, node_id: &str) -> Result<Vec<String>, GraphError> {
        let node = self.require(node_id)?;
        let connections = self.session.ontology().connections(node_id).await;
        Ok(node.valid_ontology_properties(&connections))
    }

    /// Export the current state in the full-graph wire shape
    pub fn to_graph_data(&self) -> GraphData {
        let order = self.subtree_ids(&self.root_id);
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        cards.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.card_id.cmp(&b.card_id)));
        GraphData {
            graph_id: self.graph_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_resource: self.is_resource,
            ontology_id: self.ontology_id.clone(),
            source_identifier_id: self.source_identifier_id.clone(),
            icon_class: self.icon_class.clone(),
            nodes: order.iter().filter_map(|id| self.nodes.get(id)).cloned().collect(),
            edges: order
                .iter()
                .filter_map(|id| self.parent_edge(id))
                .cloned()
                .collect(),
            cards,
        }
    }
}

fn server_string(fields: &Value, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Copy a branch card onto a grafted node-group
fn remap_card(source: &Card, nodegroup_id: &str, id_map: &HashMap<String, String>) -> Card {
    let card_id = Uuid::new_v4().to_string();
    let mut card = Card::new(card_id.clone(), nodegroup_id, source.name.clone())
        .with_sort_order(source.sort_order);
    card.description = source.description.clone();
    card.widgets = source
        .widgets
        .iter()
        .filter_map(|w| {
            let node_id = id_map.get(&w.node_id)?;
            let mut widget = w.clone();
            widget.node_id = node_id.clone();
            Some(widget)
        })
        .collect();
    card.constraints = source
        .constraints
        .iter()
        .map(|c| {
            let mut constraint = c.clone();
            constraint.constraint_id = Uuid::new_v4().to_string();
            constraint.card_id = card_id.clone();
            constraint.nodes = c.nodes.iter().filter_map(|n| id_map.get(n).cloned()).collect();
            constraint
        })
        .collect();
    card.ensure_constraint();
    card
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("graph_id", &self.graph_id)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("cards", &self.cards.len())
            .finish()
    }
}
