//! Datatype Registry
//!
//! Read-only lookup from a datatype key (e.g. `"string"`, `"boolean"`,
//! `"semantic"`) to the record describing its default configuration, default
//! widget and icon. The registry is provided fully populated when a graph is
//! loaded and is shared by every node in that graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Registry entry for one datatype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatypeRecord {
    /// Datatype key
    pub datatype: String,

    /// Configuration template applied when a node switches to this datatype
    #[serde(default)]
    pub default_config: Map<String, Value>,

    /// Widget bound to nodes of this datatype on their card
    ///
    /// Datatypes without a default widget are not data-bearing (e.g. `semantic`).
    #[serde(default)]
    pub default_widget_id: Option<String>,

    #[serde(default)]
    pub icon_class: String,

    #[serde(default)]
    pub is_searchable: bool,

    /// Name of the UI component that edits this datatype's config
    #[serde(default)]
    pub config_component: Option<String>,

    /// Whether a freshly appended node of this datatype starts its own node-group
    #[serde(default)]
    pub collects_by_default: bool,
}

impl DatatypeRecord {
    pub fn new(datatype: impl Into<String>) -> Self {
        Self {
            datatype: datatype.into(),
            default_config: Map::new(),
            default_widget_id: None,
            icon_class: String::new(),
            is_searchable: false,
            config_component: None,
            collects_by_default: false,
        }
    }

    pub fn with_default_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.default_config = map;
        }
        self
    }

    pub fn with_default_widget(mut self, widget_id: impl Into<String>) -> Self {
        self.default_widget_id = Some(widget_id.into());
        self
    }

    pub fn with_icon(mut self, icon_class: impl Into<String>) -> Self {
        self.icon_class = icon_class.into();
        self
    }

    pub fn searchable(mut self, config_component: impl Into<String>) -> Self {
        self.is_searchable = true;
        self.config_component = Some(config_component.into());
        self
    }

    pub fn collecting(mut self) -> Self {
        self.collects_by_default = true;
        self
    }

    /// Whether nodes of this datatype hold tile data (have a default widget)
    pub fn is_data_bearing(&self) -> bool {
        self.default_widget_id.is_some()
    }

    /// Searchable only when a config component exists and the record allows it
    pub fn is_searchable_datatype(&self) -> bool {
        self.config_component.is_some() && self.is_searchable
    }
}

/// Read-only datatype lookup shared by all nodes of a graph
#[derive(Debug, Clone, Default)]
pub struct DatatypeRegistry {
    records: HashMap<String, DatatypeRecord>,
}

impl DatatypeRegistry {
    pub fn new(records: impl IntoIterator<Item = DatatypeRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.datatype.clone(), record))
                .collect(),
        }
    }

    pub fn get(&self, datatype: &str) -> Option<&DatatypeRecord> {
        self.records.get(datatype)
    }

    pub fn contains(&self, datatype: &str) -> bool {
        self.records.contains_key(datatype)
    }

    pub fn default_widget_id(&self, datatype: &str) -> Option<&str> {
        self.get(datatype)
            .and_then(|record| record.default_widget_id.as_deref())
    }

    pub fn icon_class(&self, datatype: &str) -> &str {
        self.get(datatype)
            .map(|record| record.icon_class.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fill in every default key missing from `config`
///
/// Keys already present keep their value, and keys the defaults do not know
/// about are left in place. Returns the keys that were added.
pub fn merge_default_config(config: &mut Map<String, Value>, defaults: &Map<String, Value>) -> Vec<String> {
    let mut added = Vec::new();
    for (key, value) in defaults {
        if !config.contains_key(key) {
            config.insert(key.clone(), value.clone());
            added.push(key.clone());
        }
    }
    added
}
