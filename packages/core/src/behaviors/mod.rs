//! Entity Capabilities
//!
//! Small capability traits implemented by the concrete entity structs:
//!
//! - `Persistable` - entities mirrored from the server with a confirmed snapshot
//! - `TreeItem` - entities shown in a tree view and matched by its text filter
//! - `ConfigurableDatatype` - entities whose config follows a datatype template
//!
//! Entities combine these by implementing several traits rather than through
//! a base type.

use crate::models::{merge_default_config, DatatypeRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of entity sent to the persistence service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Graph,
    Node,
    Edge,
    Card,
    Branch,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Graph => "graph",
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
            EntityKind::Card => "card",
            EntityKind::Branch => "branch",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity that mirrors server state and can tell whether it has unsaved edits
pub trait Persistable {
    fn entity_kind(&self) -> EntityKind;

    fn entity_id(&self) -> &str;

    /// Live serialized state, as it would be sent to the server
    fn to_payload(&self) -> Value;

    /// Last server-confirmed state
    fn confirmed_snapshot(&self) -> Option<&Value>;

    /// Record the live state as server-confirmed
    fn confirm(&mut self);

    /// True whenever the live state differs from the confirmed snapshot
    ///
    /// Evaluated on read, so a burst of edits costs a single comparison.
    fn is_dirty(&self) -> bool {
        match self.confirmed_snapshot() {
            Some(snapshot) => *snapshot != self.to_payload(),
            None => true,
        }
    }
}

/// An entity displayed in a tree view
pub trait TreeItem {
    /// Stable id used as the key of the tree item's UI state
    fn tree_key(&self) -> &str;

    /// Text fields matched by the tree's filter
    fn searchable_text(&self) -> Vec<&str>;

    /// Case-insensitive substring match over the searchable fields
    ///
    /// `needle` must already be lowercase.
    fn matches_filter(&self, needle: &str) -> bool {
        self.searchable_text()
            .iter()
            .any(|text| text.to_lowercase().contains(needle))
    }
}

/// An entity whose configuration is shaped by a datatype's default template
pub trait ConfigurableDatatype {
    fn datatype_key(&self) -> &str;

    fn datatype_config(&self) -> &Map<String, Value>;

    fn datatype_config_mut(&mut self) -> &mut Map<String, Value>;

    /// Merge the record's default config into the live config
    ///
    /// Existing keys win over defaults. Returns the keys that were added.
    fn apply_datatype_defaults(&mut self, record: &DatatypeRecord) -> Vec<String> {
        merge_default_config(self.datatype_config_mut(), &record.default_config)
    }
}
