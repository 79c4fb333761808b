//! Card Data Structures
//!
//! A card is the editing unit bound to exactly one node-group. It holds the
//! widget bindings of the group's data-bearing nodes and the constraints
//! declared over them. The card hierarchy itself (which card is nested in
//! which) is derived from the node-group tree and kept by the card tree.

use crate::behaviors::{EntityKind, Persistable, TreeItem};
use crate::models::Node;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Binding of one node to a UI widget on a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardWidget {
    pub widget_id: String,
    pub node_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub config: Map<String, Value>,
}

fn default_visible() -> bool {
    true
}

/// Uniqueness / required-combination rule over nodes of a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConstraint {
    pub constraint_id: String,
    pub card_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub unique_to_all_instances: bool,
}

impl CardConstraint {
    /// Empty constraint every new card starts with
    pub fn blank(card_id: &str) -> Self {
        Self {
            constraint_id: Uuid::new_v4().to_string(),
            card_id: card_id.to_string(),
            nodes: Vec::new(),
            unique_to_all_instances: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: String,

    #[serde(rename = "nodegroupId")]
    pub nodegroup_id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub sort_order: i64,

    #[serde(default)]
    pub widgets: Vec<CardWidget>,

    #[serde(default)]
    pub constraints: Vec<CardConstraint>,

    #[serde(skip)]
    snapshot: Option<Value>,
}

impl Card {
    pub fn new(card_id: impl Into<String>, nodegroup_id: impl Into<String>, name: impl Into<String>) -> Self {
        let card_id = card_id.into();
        Self {
            constraints: vec![CardConstraint::blank(&card_id)],
            card_id,
            nodegroup_id: nodegroup_id.into(),
            name: name.into(),
            description: None,
            sort_order: 0,
            widgets: Vec::new(),
            snapshot: None,
        }
    }

    /// New card for a collector node, taking the node's name and description
    pub fn for_collector(card_id: impl Into<String>, collector: &Node) -> Self {
        let mut card = Self::new(card_id, collector.node_id(), collector.name());
        card.description = collector.description().map(str::to_string);
        card
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn widget_for(&self, node_id: &str) -> Option<&CardWidget> {
        self.widgets.iter().find(|w| w.node_id == node_id)
    }

    pub fn has_widget_for(&self, node_id: &str) -> bool {
        self.widget_for(node_id).is_some()
    }

    /// Insert or replace the binding for `widget.node_id`
    ///
    /// A replaced binding keeps its position. Returns true if a binding was replaced.
    pub fn upsert_widget(&mut self, widget: CardWidget) -> bool {
        match self.widgets.iter().position(|w| w.node_id == widget.node_id) {
            Some(index) => {
                self.widgets[index] = widget;
                true
            }
            None => {
                self.widgets.push(widget);
                false
            }
        }
    }

    /// Remove the binding for `node_id` and drop the node from constraints
    pub fn remove_widget(&mut self, node_id: &str) -> Option<CardWidget> {
        let index = self.widgets.iter().position(|w| w.node_id == node_id)?;
        for constraint in &mut self.constraints {
            constraint.nodes.retain(|n| n != node_id);
        }
        Some(self.widgets.remove(index))
    }

    pub fn next_widget_sort_order(&self) -> i64 {
        self.widgets
            .iter()
            .map(|w| w.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Record one field as server-confirmed
    pub(crate) fn patch_snapshot(&mut self, key: &str, value: Value) {
        if let Some(Value::Object(snapshot)) = self.snapshot.as_mut() {
            snapshot.insert(key.to_string(), value);
        }
    }

    /// Record the current widget bindings as server-confirmed
    pub(crate) fn confirm_widgets(&mut self) {
        let widgets = serde_json::to_value(&self.widgets).unwrap_or(Value::Null);
        let constraints = serde_json::to_value(&self.constraints).unwrap_or(Value::Null);
        self.patch_snapshot("widgets", widgets);
        self.patch_snapshot("constraints", constraints);
    }

    /// Drop unsaved edits by restoring the confirmed snapshot
    pub fn reset(&mut self) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        match serde_json::from_value::<Card>(snapshot.clone()) {
            Ok(mut restored) => {
                restored.snapshot = Some(snapshot);
                *self = restored;
            }
            Err(e) => tracing::warn!("Failed to reset card {}: {}", self.card_id, e),
        }
    }

    pub fn ensure_constraint(&mut self) {
        if self.constraints.is_empty() {
            self.constraints.push(CardConstraint::blank(&self.card_id));
        }
    }
}

impl Persistable for Card {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Card
    }

    fn entity_id(&self) -> &str {
        &self.card_id
    }

    fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn confirmed_snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    fn confirm(&mut self) {
        self.snapshot = Some(self.to_payload());
    }
}

impl TreeItem for Card {
    fn tree_key(&self) -> &str {
        &self.card_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        if let Some(description) = self.description.as_deref() {
            fields.push(description);
        }
        fields
    }
}
