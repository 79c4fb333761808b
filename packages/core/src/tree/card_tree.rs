//! Card Tree and Synchronizer
//!
//! The card tree mirrors the node-group hierarchy: a card's children are the
//! cards of the node-groups whose structural parent is the card's group.
//! Cards are addressed by id and the hierarchy is stored as child lists plus
//! the parent ids kept in the tree's `TreeState`.
//!
//! After each structural mutation of the graph model the tree is patched
//! from the returned `GraphChange` instead of being rebuilt, so expansion
//! and selection on untouched subtrees survive:
//!
//! 1. placements detach a card and attach it under the *declared* parent group
//! 2. removed groups drop their card and splice its children into the
//!    former parent's child list
//! 3. the flattened index used by bulk operations is invalidated and
//!    recomputed on next access
//!
//! Widget bindings are not the tree's concern: the graph model re-binds them
//! as part of each mutation.
//!
//! When a declared parent group has no card in the tree, the tree rebuilds
//! from the graph model (state is kept for cards that still exist).
//!
//! A permission tree is a card tree built from another graph's cards (the
//! published source graph). Its node-group ids are resolved through the
//! local nodes' source identifiers and it is always rebuilt, never patched.

use crate::models::Card;
use crate::services::{CardPlacement, GraphChange, GraphModel};
use crate::tree::state::{SelectionMode, TreeItemState, TreeState};
use std::cell::OnceCell;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEntry {
    pub card_id: String,
    pub nodegroup_id: String,
    /// Child card ids, ordered
    pub children: Vec<String>,
}

/// How `apply_change` brought the tree up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Patched,
    Rebuilt,
}

/// One visible row of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRow {
    pub card_id: String,
    pub nodegroup_id: String,
    pub depth: usize,
    pub state: TreeItemState,
}

#[derive(Debug, Clone)]
enum CardSource {
    /// Cards come from the graph model itself
    Graph,
    /// Cards of a published graph, by card id
    Detached(HashMap<String, Card>),
}

#[derive(Debug)]
pub struct CardTree {
    entries: HashMap<String, CardEntry>,
    top_cards: Vec<String>,
    state: TreeState,
    flat: OnceCell<Vec<String>>,
    source: CardSource,
}

fn lookup_card<'a>(source: &'a CardSource, graph: &'a GraphModel, card_id: &str) -> Option<&'a Card> {
    match source {
        CardSource::Graph => graph.card(card_id),
        CardSource::Detached(cards) => cards.get(card_id),
    }
}

impl CardTree {
    fn empty(mode: SelectionMode, min_filter_length: usize, source: CardSource) -> Self {
        Self {
            entries: HashMap::new(),
            top_cards: Vec::new(),
            state: TreeState::new(mode, min_filter_length),
            flat: OnceCell::new(),
            source,
        }
    }

    /// Build the card tree of a graph
    pub fn build(graph: &GraphModel, mode: SelectionMode) -> Self {
        let mut tree = Self::empty(mode, graph.config().filter_min_length, CardSource::Graph);
        tree.assemble(graph);
        if let Some(root) = tree.top_cards.first().cloned() {
            tree.state.expand(&root);
        }
        tree
    }

    /// Build a multi-select tree from a published graph's cards
    pub fn build_permission_tree(graph: &GraphModel, source_cards: Vec<Card>) -> Self {
        let cards = source_cards
            .into_iter()
            .map(|card| (card.card_id.clone(), card))
            .collect();
        let mut tree = Self::empty(
            SelectionMode::Multiple,
            graph.config().filter_min_length,
            CardSource::Detached(cards),
        );
        tree.assemble(graph);
        tree
    }

    pub fn is_permission_tree(&self) -> bool {
        matches!(self.source, CardSource::Detached(_))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.entries.contains_key(card_id)
    }

    pub fn entry(&self, card_id: &str) -> Option<&CardEntry> {
        self.entries.get(card_id)
    }

    pub fn top_cards(&self) -> &[String] {
        &self.top_cards
    }

    pub fn children(&self, card_id: &str) -> &[String] {
        self.entries
            .get(card_id)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, card_id: &str) -> Option<&str> {
        self.state.parent(card_id)
    }

    pub fn state(&self) -> &TreeState {
        &self.state
    }

    pub fn card<'a>(&'a self, graph: &'a GraphModel, card_id: &str) -> Option<&'a Card> {
        lookup_card(&self.source, graph, card_id)
    }

    /// Find the card of a node-group by walking the tree from the top
    pub fn find_by_nodegroup(&self, nodegroup_id: &str) -> Option<&str> {
        let mut stack: Vec<&String> = self.top_cards.iter().rev().collect();
        while let Some(card_id) = stack.pop() {
            let entry = self.entries.get(card_id)?;
            if entry.nodegroup_id == nodegroup_id {
                return Some(&entry.card_id);
            }
            stack.extend(entry.children.iter().rev());
        }
        None
    }

    /// Card ids in pre-order, computed on first access after a change
    pub fn flattened(&self) -> &[String] {
        self.flat.get_or_init(|| {
            let mut ordered = Vec::with_capacity(self.entries.len());
            let mut stack: Vec<&String> = self.top_cards.iter().rev().collect();
            while let Some(card_id) = stack.pop() {
                ordered.push(card_id.clone());
                if let Some(entry) = self.entries.get(card_id) {
                    stack.extend(entry.children.iter().rev());
                }
            }
            ordered
        })
    }

    /// Visible rows: unfiltered cards below expanded parents
    pub fn rows(&self) -> Vec<CardRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<(&String, usize)> = self.top_cards.iter().rev().map(|c| (c, 0)).collect();
        while let Some((card_id, depth)) = stack.pop() {
            let Some(entry) = self.entries.get(card_id) else {
                continue;
            };
            let state = self.state.state(card_id);
            if state.filtered {
                continue;
            }
            rows.push(CardRow {
                card_id: card_id.clone(),
                nodegroup_id: entry.nodegroup_id.clone(),
                depth,
                state,
            });
            if state.expanded {
                stack.extend(entry.children.iter().rev().map(|c| (c, depth + 1)));
            }
        }
        rows
    }

    /// True when the tree has exactly one card per node-group, each under
    /// the card of its group's structural parent
    pub fn matches_graph(&self, graph: &GraphModel) -> bool {
        let groups = graph.node_groups();
        let listed: usize = self.top_cards.len() + self.entries.values().map(|e| e.children.len()).sum::<usize>();
        if groups.len() != self.entries.len() || listed != self.entries.len() {
            return false;
        }
        groups.iter().all(|group| {
            let Some(card_id) = self.find_by_nodegroup(&group.nodegroup_id) else {
                return false;
            };
            let parent_group = self
                .parent(card_id)
                .and_then(|p| self.entries.get(p))
                .map(|e| e.nodegroup_id.as_str());
            parent_group == group.parent_nodegroup_id.as_deref()
        })
    }

    // ------------------------------------------------------------------
    // Bulk state
    // ------------------------------------------------------------------

    pub fn expand_all(&mut self) {
        let ids = self.flattened().to_vec();
        for id in &ids {
            self.state.expand(id);
        }
    }

    pub fn collapse_all(&mut self) {
        let ids = self.flattened().to_vec();
        for id in &ids {
            self.state.collapse(id);
        }
    }

    /// Select every card (multi-select trees only)
    pub fn select_all(&mut self) -> usize {
        let ids = self.flattened().to_vec();
        self.state.select_all(ids.iter().map(String::as_str))
    }

    pub fn clear_selection(&mut self) {
        self.state.clear_selection();
    }

    pub fn select(&mut self, card_id: &str) -> bool {
        self.state.select(card_id)
    }

    pub fn toggle_selected(&mut self, card_id: &str) -> bool {
        self.state.toggle_selected(card_id)
    }

    pub fn selection(&self) -> Vec<String> {
        self.state.selection()
    }

    pub fn expand_to_root(&mut self, card_id: &str) {
        self.state.expand_to_root(card_id);
    }

    /// Select the card of a node-group and reveal it
    pub fn select_nodegroup(&mut self, nodegroup_id: &str) -> bool {
        let Some(card_id) = self.find_by_nodegroup(nodegroup_id).map(str::to_string) else {
            return false;
        };
        self.state.expand_to_root(&card_id);
        self.state.select(&card_id)
    }

    /// Filter on card name and description
    pub fn filter(&mut self, graph: &GraphModel, text: &str) {
        let cards: Vec<&Card> = self
            .entries
            .keys()
            .filter_map(|id| lookup_card(&self.source, graph, id))
            .collect();
        self.state.apply_filter(text, cards);
    }

    pub fn clear_filter(&mut self) {
        self.state.clear_filter();
    }

    // ------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------

    /// Card id and local node-group of every card the tree shows
    fn card_groups(&self, graph: &GraphModel) -> Vec<(String, String)> {
        match &self.source {
            CardSource::Graph => graph
                .cards()
                .map(|c| (c.card_id.clone(), c.nodegroup_id.clone()))
                .collect(),
            CardSource::Detached(cards) => cards
                .values()
                .filter_map(|card| match graph.resolve_nodegroup(&card.nodegroup_id) {
                    Some(nodegroup_id) => Some((card.card_id.clone(), nodegroup_id.to_string())),
                    None => {
                        tracing::debug!(
                            "Skipping card {}: node-group {} has no local node",
                            card.card_id,
                            card.nodegroup_id
                        );
                        None
                    }
                })
                .collect(),
        }
    }

    /// Rebuild the hierarchy from the graph, keeping state of surviving cards
    fn assemble(&mut self, graph: &GraphModel) {
        let cards = self.card_groups(graph);
        let by_group: HashMap<&str, &str> = cards
            .iter()
            .map(|(card_id, nodegroup_id)| (nodegroup_id.as_str(), card_id.as_str()))
            .collect();

        let mut entries: HashMap<String, CardEntry> = cards
            .iter()
            .map(|(card_id, nodegroup_id)| {
                (
                    card_id.clone(),
                    CardEntry {
                        card_id: card_id.clone(),
                        nodegroup_id: nodegroup_id.clone(),
                        children: Vec::new(),
                    },
                )
            })
            .collect();
        let mut top_cards = Vec::new();
        let mut parents: Vec<(String, Option<String>)> = Vec::with_capacity(cards.len());

        for (card_id, nodegroup_id) in &cards {
            let mut parent_group = graph.parent_nodegroup_id(nodegroup_id);
            let mut parent_card = None;
            let mut hops = 0;
            while let Some(group) = parent_group {
                if let Some(card) = by_group.get(group.as_str()).filter(|c| **c != card_id.as_str()) {
                    parent_card = Some(card.to_string());
                    break;
                }
                hops += 1;
                if hops > graph.node_count() {
                    break;
                }
                parent_group = graph.parent_nodegroup_id(&group);
            }
            match &parent_card {
                Some(parent) => {
                    if let Some(entry) = entries.get_mut(parent) {
                        entry.children.push(card_id.clone());
                    }
                }
                None => top_cards.push(card_id.clone()),
            }
            parents.push((card_id.clone(), parent_card));
        }

        self.entries = entries;
        self.top_cards = top_cards;
        self.state.retain(|id| by_group.values().any(|c| *c == id));
        for (card_id, parent) in &parents {
            self.state.insert(card_id, parent.as_deref());
        }
        self.sort_children(graph);
    }

    /// Full rebuild from the graph model
    pub fn rebuild(&mut self, graph: &GraphModel) {
        self.assemble(graph);
        tracing::debug!("Rebuilt card tree ({} cards)", self.entries.len());
    }

    fn sort_key(&self, graph: &GraphModel, card_id: &str) -> (i64, String) {
        lookup_card(&self.source, graph, card_id)
            .map(|c| (c.sort_order, c.name.to_lowercase()))
            .unwrap_or((i64::MAX, String::new()))
    }

    fn sort_children(&mut self, graph: &GraphModel) {
        let keys: HashMap<String, (i64, String)> = self
            .entries
            .keys()
            .map(|id| (id.clone(), self.sort_key(graph, id)))
            .collect();
        let by_key = |a: &String, b: &String| keys.get(a).cmp(&keys.get(b)).then_with(|| a.cmp(b));
        self.top_cards.sort_by(by_key);
        for entry in self.entries.values_mut() {
            entry.children.sort_by(by_key);
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.flat.take();
    }

    // ------------------------------------------------------------------
    // Patching
    // ------------------------------------------------------------------

    fn siblings_mut(&mut self, parent: Option<&str>) -> Option<&mut Vec<String>> {
        match parent {
            Some(parent) => self.entries.get_mut(parent).map(|e| &mut e.children),
            None => Some(&mut self.top_cards),
        }
    }

    fn detach(&mut self, card_id: &str) {
        let parent = self.state.parent(card_id).map(str::to_string);
        if let Some(siblings) = self.siblings_mut(parent.as_deref()) {
            siblings.retain(|c| c != card_id);
        }
    }

    fn attach(&mut self, graph: &GraphModel, card_id: &str, parent: Option<&str>) {
        let key = self.sort_key(graph, card_id);
        let sibling_keys: Vec<(i64, String)> = match parent {
            Some(p) => self.children(p).to_vec(),
            None => self.top_cards.clone(),
        }
        .iter()
        .map(|id| self.sort_key(graph, id))
        .collect();
        let index = sibling_keys
            .iter()
            .position(|k| *k > key)
            .unwrap_or(sibling_keys.len());
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.insert(index, card_id.to_string());
        }
        self.state.insert(card_id, parent);
    }

    /// Move a card under the card of its declared parent group
    ///
    /// Returns false when the parent group has no card in the tree.
    fn place(&mut self, graph: &GraphModel, placement: &CardPlacement) -> bool {
        let parent_card = match &placement.parent_nodegroup_id {
            Some(group) => match self.find_by_nodegroup(group) {
                Some(card_id) => Some(card_id.to_string()),
                None => return false,
            },
            None => None,
        };
        if parent_card.as_deref() == Some(placement.card_id.as_str()) {
            return false;
        }

        if !self.entries.contains_key(&placement.card_id) {
            if let Some(stale) = self.find_by_nodegroup(&placement.nodegroup_id).map(str::to_string) {
                self.delete_card(&stale);
            }
            self.entries.insert(
                placement.card_id.clone(),
                CardEntry {
                    card_id: placement.card_id.clone(),
                    nodegroup_id: placement.nodegroup_id.clone(),
                    children: Vec::new(),
                },
            );
        } else if self.state.parent(&placement.card_id) == parent_card.as_deref() {
            return true;
        } else {
            self.detach(&placement.card_id);
        }
        self.attach(graph, &placement.card_id, parent_card.as_deref());
        self.absorb_siblings(graph, &placement.card_id, parent_card.as_deref());
        true
    }

    /// Move sibling cards whose group now sits below `card_id`'s group
    fn absorb_siblings(&mut self, graph: &GraphModel, card_id: &str, parent: Option<&str>) {
        let Some(nodegroup_id) = self.entries.get(card_id).map(|e| e.nodegroup_id.clone()) else {
            return;
        };
        let siblings: Vec<String> = match parent {
            Some(p) => self.children(p).to_vec(),
            None => self.top_cards.clone(),
        };
        for sibling in siblings.iter().filter(|s| s.as_str() != card_id) {
            let Some(sibling_group) = self.entries.get(sibling).map(|e| e.nodegroup_id.clone()) else {
                continue;
            };
            if graph.parent_nodegroup_id(&sibling_group).as_deref() == Some(nodegroup_id.as_str()) {
                tracing::debug!("Card {} absorbs sibling card {}", card_id, sibling);
                self.detach(sibling);
                self.attach(graph, sibling, Some(card_id));
            }
        }
    }

    /// Remove a card, splicing its children into its former parent's list
    pub fn delete_card(&mut self, card_id: &str) -> bool {
        let Some(entry) = self.entries.remove(card_id) else {
            return false;
        };
        let parent = self.state.parent(card_id).map(str::to_string);
        if let Some(siblings) = self.siblings_mut(parent.as_deref()) {
            let index = siblings
                .iter()
                .position(|c| c == card_id)
                .unwrap_or(siblings.len());
            siblings.retain(|c| c != card_id);
            let index = index.min(siblings.len());
            for (offset, child) in entry.children.iter().enumerate() {
                siblings.insert(index + offset, child.clone());
            }
        }
        self.state.remove(card_id);
        self.invalidate();
        tracing::debug!(
            "Removed card {} ({} children spliced upward)",
            card_id,
            entry.children.len()
        );
        true
    }

    pub fn delete_card_for_nodegroup(&mut self, nodegroup_id: &str) -> bool {
        match self.find_by_nodegroup(nodegroup_id).map(str::to_string) {
            Some(card_id) => self.delete_card(&card_id),
            None => false,
        }
    }

    /// Apply placements in order; rebuild from the graph if one cannot be
    /// placed. Returns true when the tree was rebuilt.
    fn place_or_rebuild(&mut self, graph: &GraphModel, placements: &[CardPlacement]) -> bool {
        for placement in placements {
            if !self.place(graph, placement) {
                tracing::warn!(
                    "Card tree has no card for node-group {:?}, rebuilding from the graph",
                    placement.parent_nodegroup_id
                );
                self.rebuild(graph);
                return true;
            }
        }
        false
    }

    /// Patch the tree after one completed graph mutation
    pub fn apply_change(&mut self, graph: &GraphModel, change: &GraphChange) -> SyncOutcome {
        if self.is_permission_tree() {
            if change.is_structural() {
                self.rebuild(graph);
                return SyncOutcome::Rebuilt;
            }
            return SyncOutcome::Patched;
        }

        let rebuilt = match change {
            GraphChange::NodesAppended { placements, .. } => self.place_or_rebuild(graph, placements),
            GraphChange::NodeUpdated {
                placements,
                dissolved_nodegroup,
                ..
            } => {
                if let Some(group) = dissolved_nodegroup {
                    self.delete_card_for_nodegroup(group);
                }
                self.place_or_rebuild(graph, placements)
            }
            GraphChange::NodeMoved { placements, .. } => self.place_or_rebuild(graph, placements),
            GraphChange::NodesDeleted { removed_nodegroups, .. } => {
                for group in removed_nodegroups {
                    self.delete_card_for_nodegroup(group);
                }
                false
            }
            GraphChange::NodesReordered { .. } => false,
            GraphChange::CardsReordered => {
                self.sort_children(graph);
                false
            }
        };

        self.invalidate();
        if rebuilt {
            SyncOutcome::Rebuilt
        } else {
            SyncOutcome::Patched
        }
    }
}
