//! Node Data Structures
//!
//! A `Node` is one field of a resource model. Nodes form a tree through
//! edges and are partitioned into node-groups: every node points at the
//! collector node that heads its group (`nodegroup_id`). A node whose
//! `nodegroup_id` equals its own id is a collector.
//!
//! # Editing
//!
//! Editable attributes are changed through setters that return a
//! [`MutationOutcome`]. Nodes flagged `is_immutable` come from a separately
//! versioned branch; writes to them are ignored and reported as
//! `RejectedImmutable` rather than failing.
//!
//! # Dirty tracking
//!
//! Each node keeps the JSON it last confirmed with the server. It is dirty
//! whenever its live serialized state differs from that snapshot.
//!
//! ```rust
//! use graph_designer_core::behaviors::Persistable;
//! use graph_designer_core::models::Node;
//!
//! let mut node = Node::new("node-1", "graph-1", "Name", "string", Some("node-1".into()));
//! node.confirm();
//! assert!(!node.is_dirty());
//!
//! node.set_name("Full Name");
//! assert!(node.is_dirty());
//!
//! node.reset();
//! assert_eq!(node.name(), "Name");
//! ```

use crate::behaviors::{ConfigurableDatatype, EntityKind, Persistable, TreeItem};
use crate::models::{
    resolve_friendly_ontology_name, valid_ontology_classes, valid_ontology_properties,
    DatatypeRegistry, OntologyConnection, OntologyNamespaces,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

const ALIAS_SEPARATOR_PATTERN: &str = r"[^a-z0-9]+";

fn default_true() -> bool {
    true
}

/// Validation errors for Node and graph entity data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Unknown datatype: {0}")]
    UnknownDatatype(String),

    #[error("Invalid ontology reference on node {node_id}: {reason}")]
    InvalidOntology { node_id: String, reason: String },

    #[error("Invalid datatype config: {0}")]
    InvalidConfig(String),
}

/// Result of a local edit on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The value changed
    Applied,
    /// The new value equals the current one
    Unchanged,
    /// The entity is immutable; nothing changed
    RejectedImmutable,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// Derive a node alias from its name
///
/// Lowercases the name and collapses every run of characters outside
/// `[a-z0-9]` into a single underscore.
///
/// ```rust
/// use graph_designer_core::models::derive_alias;
///
/// assert_eq!(derive_alias("Date of Birth"), "date_of_birth");
/// assert_eq!(derive_alias("  (Primary) Name!"), "primary_name");
/// ```
pub fn derive_alias(name: &str) -> String {
    static ALIAS_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ALIAS_REGEX.get_or_init(|| Regex::new(ALIAS_SEPARATOR_PATTERN).unwrap());
    regex
        .replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// One field of a resource model graph.
///
/// # Fields
///
/// - `node_id`: Stable UUID
/// - `nodegroup_id`: Collector node heading this node's group (itself if collector)
/// - `source_identifier_id`: Node this one was copied from (published graph)
/// - `config`: Datatype-specific configuration
/// - `is_immutable`: Inherited from a published branch, not locally editable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    node_id: String,

    graph_id: String,

    name: String,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    alias: Option<String>,

    #[serde(default)]
    has_custom_alias: bool,

    #[serde(default)]
    source_identifier_id: Option<String>,

    #[serde(rename = "nodegroupId")]
    pub(crate) nodegroup_id: String,

    datatype: String,

    #[serde(default)]
    config: Map<String, Value>,

    #[serde(default)]
    pub(crate) ontology_class: Option<String>,

    #[serde(default)]
    pub(crate) parent_property: Option<String>,

    #[serde(default = "default_true")]
    is_required: bool,

    #[serde(default = "default_true")]
    is_searchable: bool,

    #[serde(default)]
    is_exportable: bool,

    #[serde(default)]
    field_name: Option<String>,

    #[serde(default)]
    is_immutable: bool,

    #[serde(default)]
    pub(crate) is_top_node: bool,

    #[serde(default)]
    pub(crate) sort_order: i64,

    #[serde(default)]
    source_branch_publication_id: Option<String>,

    /// Last server-confirmed JSON
    #[serde(skip)]
    snapshot: Option<Value>,

    #[serde(skip)]
    confirmed_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a node that is not yet confirmed by the server
    ///
    /// `nodegroup_id` defaults to the node's own id (a collector).
    pub fn new(
        node_id: impl Into<String>,
        graph_id: impl Into<String>,
        name: impl Into<String>,
        datatype: impl Into<String>,
        nodegroup_id: Option<String>,
    ) -> Self {
        let node_id = node_id.into();
        let name = name.into();
        let nodegroup_id = nodegroup_id.unwrap_or_else(|| node_id.clone());
        Self {
            alias: Some(derive_alias(&name)),
            node_id,
            graph_id: graph_id.into(),
            name,
            description: None,
            has_custom_alias: false,
            source_identifier_id: None,
            nodegroup_id,
            datatype: datatype.into(),
            config: Map::new(),
            ontology_class: None,
            parent_property: None,
            is_required: true,
            is_searchable: true,
            is_exportable: false,
            field_name: None,
            is_immutable: false,
            is_top_node: false,
            sort_order: 0,
            source_branch_publication_id: None,
            snapshot: None,
            confirmed_at: None,
        }
    }

    /// Parse a node from its server JSON and confirm it
    pub fn from_source(source: Value) -> Result<Self, serde_json::Error> {
        let mut node: Node = serde_json::from_value(source)?;
        node.confirm();
        Ok(node)
    }

    pub fn with_ontology(mut self, class: Option<String>, parent_property: Option<String>) -> Self {
        self.ontology_class = class;
        self.parent_property = parent_property;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn as_top_node(mut self) -> Self {
        self.is_top_node = true;
        self
    }

    pub fn as_immutable(mut self) -> Self {
        self.is_immutable = true;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_source_identifier(mut self, source_identifier_id: impl Into<String>) -> Self {
        self.source_identifier_id = Some(source_identifier_id.into());
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn has_custom_alias(&self) -> bool {
        self.has_custom_alias
    }

    pub fn source_identifier_id(&self) -> Option<&str> {
        self.source_identifier_id.as_deref()
    }

    pub fn nodegroup_id(&self) -> &str {
        &self.nodegroup_id
    }

    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn ontology_class(&self) -> Option<&str> {
        self.ontology_class.as_deref().filter(|c| !c.is_empty())
    }

    pub fn parent_property(&self) -> Option<&str> {
        self.parent_property.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn is_searchable(&self) -> bool {
        self.is_searchable
    }

    pub fn is_exportable(&self) -> bool {
        self.is_exportable
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn is_immutable(&self) -> bool {
        self.is_immutable
    }

    pub fn is_top_node(&self) -> bool {
        self.is_top_node
    }

    pub fn sort_order(&self) -> i64 {
        self.sort_order
    }

    pub fn source_branch_publication_id(&self) -> Option<&str> {
        self.source_branch_publication_id.as_deref()
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    /// A node heads its own group iff its group id is its own id
    pub fn is_collector(&self) -> bool {
        self.node_id == self.nodegroup_id
    }

    /// Id used to match this node against a published graph
    pub fn identifier(&self) -> &str {
        self.source_identifier_id().unwrap_or(&self.node_id)
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    fn guard(&self, field: &str) -> Option<MutationOutcome> {
        if self.is_immutable {
            tracing::warn!(
                "Ignoring write to '{}' on immutable node {}",
                field,
                self.node_id
            );
            Some(MutationOutcome::RejectedImmutable)
        } else {
            None
        }
    }

    fn assign<T: PartialEq>(slot: &mut T, value: T) -> MutationOutcome {
        if *slot == value {
            MutationOutcome::Unchanged
        } else {
            *slot = value;
            MutationOutcome::Applied
        }
    }

    /// Rename the node, re-deriving the alias unless it is custom
    pub fn set_name(&mut self, name: impl Into<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("name") {
            return rejected;
        }
        let name = name.into();
        let outcome = Self::assign(&mut self.name, name);
        if outcome.is_applied() && !self.has_custom_alias {
            self.alias = Some(derive_alias(&self.name));
        }
        outcome
    }

    pub fn set_description(&mut self, description: Option<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("description") {
            return rejected;
        }
        Self::assign(&mut self.description, description)
    }

    /// Set a user-chosen alias; `None` returns to the derived alias
    pub fn set_custom_alias(&mut self, alias: Option<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("alias") {
            return rejected;
        }
        let (alias, custom) = match alias {
            Some(alias) if !alias.is_empty() => (Some(alias), true),
            _ => (Some(derive_alias(&self.name)), false),
        };
        let custom_changed = Self::assign(&mut self.has_custom_alias, custom);
        let alias_changed = Self::assign(&mut self.alias, alias);
        if custom_changed.is_applied() || alias_changed.is_applied() {
            MutationOutcome::Applied
        } else {
            MutationOutcome::Unchanged
        }
    }

    pub(crate) fn set_alias_unchecked(&mut self, alias: String) {
        self.alias = Some(alias);
    }

    /// Switch datatype, merging the new datatype's default config
    ///
    /// Existing config keys win over the defaults; keys the new datatype does
    /// not know about are kept.
    pub fn set_datatype(
        &mut self,
        datatype: &str,
        registry: &DatatypeRegistry,
    ) -> Result<MutationOutcome, ValidationError> {
        if let Some(rejected) = self.guard("datatype") {
            return Ok(rejected);
        }
        if self.datatype == datatype {
            return Ok(MutationOutcome::Unchanged);
        }
        let record = registry
            .get(datatype)
            .ok_or_else(|| ValidationError::UnknownDatatype(datatype.to_string()))?;

        let added = self.apply_datatype_defaults(record);
        tracing::debug!(
            "Node {} datatype {} -> {} (added config keys: {:?})",
            self.node_id,
            self.datatype,
            datatype,
            added
        );
        self.datatype = datatype.to_string();
        Ok(MutationOutcome::Applied)
    }

    pub fn set_config_value(&mut self, key: impl Into<String>, value: Value) -> MutationOutcome {
        if let Some(rejected) = self.guard("config") {
            return rejected;
        }
        let key = key.into();
        if self.config.get(&key) == Some(&value) {
            return MutationOutcome::Unchanged;
        }
        self.config.insert(key, value);
        MutationOutcome::Applied
    }

    pub fn set_ontology_class(&mut self, class: Option<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("ontologyClass") {
            return rejected;
        }
        Self::assign(&mut self.ontology_class, class.filter(|c| !c.is_empty()))
    }

    pub fn set_parent_property(&mut self, property: Option<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("parentProperty") {
            return rejected;
        }
        Self::assign(&mut self.parent_property, property.filter(|p| !p.is_empty()))
    }

    pub fn set_required(&mut self, value: bool) -> MutationOutcome {
        if let Some(rejected) = self.guard("isRequired") {
            return rejected;
        }
        Self::assign(&mut self.is_required, value)
    }

    pub fn set_searchable(&mut self, value: bool) -> MutationOutcome {
        if let Some(rejected) = self.guard("isSearchable") {
            return rejected;
        }
        Self::assign(&mut self.is_searchable, value)
    }

    pub fn set_exportable(&mut self, value: bool) -> MutationOutcome {
        if let Some(rejected) = self.guard("isExportable") {
            return rejected;
        }
        Self::assign(&mut self.is_exportable, value)
    }

    pub fn set_field_name(&mut self, field_name: Option<String>) -> MutationOutcome {
        if let Some(rejected) = self.guard("fieldName") {
            return rejected;
        }
        Self::assign(&mut self.field_name, field_name)
    }

    // ------------------------------------------------------------------
    // Ontology
    // ------------------------------------------------------------------

    /// Classes this node may take given the cached connections
    pub fn valid_ontology_classes(&self, connections: &[OntologyConnection]) -> Vec<String> {
        valid_ontology_classes(connections, self.parent_property())
    }

    /// Properties linking this node to its parent given the cached connections
    ///
    /// The top node has no parent, so it has no valid properties.
    pub fn valid_ontology_properties(&self, connections: &[OntologyConnection]) -> Vec<String> {
        if self.is_top_node {
            return Vec::new();
        }
        valid_ontology_properties(connections, self.ontology_class())
    }

    pub fn ontology_class_friendly_name(&self, namespaces: &OntologyNamespaces) -> String {
        resolve_friendly_ontology_name(self.ontology_class(), namespaces)
    }

    pub fn parent_property_friendly_name(&self, namespaces: &OntologyNamespaces) -> String {
        resolve_friendly_ontology_name(self.parent_property(), namespaces)
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Restore the last confirmed state, discarding local edits
    pub fn reset(&mut self) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        match serde_json::from_value::<Node>(snapshot.clone()) {
            Ok(mut restored) => {
                restored.snapshot = Some(snapshot);
                restored.confirmed_at = self.confirmed_at;
                *self = restored;
            }
            Err(e) => tracing::warn!("Failed to reset node {}: {}", self.node_id, e),
        }
    }

    /// Apply values computed by the server after a save
    pub(crate) fn apply_server_values(&mut self, values: &Value) {
        if let Some(alias) = values.get("alias").and_then(Value::as_str) {
            self.alias = Some(alias.to_string());
        }
        if let Some(field_name) = values.get("fieldName").and_then(Value::as_str) {
            self.field_name = Some(field_name.to_string());
        }
    }

    /// Re-point this node at another graph (used when grafting branches)
    pub(crate) fn rehome(&mut self, node_id: String, graph_id: &str, nodegroup_id: String) {
        self.source_identifier_id = None;
        self.node_id = node_id;
        self.graph_id = graph_id.to_string();
        self.nodegroup_id = nodegroup_id;
        self.is_top_node = false;
        self.snapshot = None;
        self.confirmed_at = None;
    }

    /// Record one field as server-confirmed, leaving other pending edits dirty
    pub(crate) fn patch_snapshot(&mut self, key: &str, value: Value) {
        if let Some(Value::Object(snapshot)) = self.snapshot.as_mut() {
            snapshot.insert(key.to_string(), value);
        }
    }

    pub(crate) fn clear_ontology(&mut self) {
        self.ontology_class = None;
        self.parent_property = None;
    }

    /// Check the node's own fields
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.node_id.is_empty() {
            return Err(ValidationError::MissingField("nodeId".to_string()));
        }
        if self.nodegroup_id.is_empty() {
            return Err(ValidationError::MissingField("nodegroupId".to_string()));
        }
        if self.datatype.is_empty() {
            return Err(ValidationError::MissingField("datatype".to_string()));
        }
        Ok(())
    }
}

impl Persistable for Node {
    fn entity_kind(&self) -> EntityKind {
        EntityKind::Node
    }

    fn entity_id(&self) -> &str {
        &self.node_id
    }

    fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn confirmed_snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    fn confirm(&mut self) {
        self.snapshot = Some(self.to_payload());
        self.confirmed_at = Some(Utc::now());
    }
}

impl TreeItem for Node {
    fn tree_key(&self) -> &str {
        &self.node_id
    }

    fn searchable_text(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.datatype.as_str()];
        if let Some(class) = self.ontology_class() {
            fields.push(class);
        }
        fields
    }
}

impl ConfigurableDatatype for Node {
    fn datatype_key(&self) -> &str {
        &self.datatype
    }

    fn datatype_config(&self) -> &Map<String, Value> {
        &self.config
    }

    fn datatype_config_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.config
    }
}
