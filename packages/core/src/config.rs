/// Configuration for the graph designer engine
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on ontology lookup page size
const MAX_ONTOLOGY_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignerConfig {
    /// Shortest filter text that activates tree filtering
    pub filter_min_length: usize,

    /// Placeholder name given to new cards; replaced by the collector's name on save
    pub default_card_name: String,

    /// Datatype of nodes created with "append node"
    pub new_node_datatype: String,

    /// Name of nodes created with "append node"
    pub new_node_name: String,

    /// Page size for ontology connection lookups
    pub ontology_page_size: usize,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            filter_min_length: 3,
            default_card_name: "New Card".to_string(),
            new_node_datatype: "semantic".to_string(),
            new_node_name: "New Node".to_string(),
            ontology_page_size: 50,
        }
    }
}

impl DesignerConfig {
    /// Load and validate a JSON config file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: DesignerConfig = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_card_name.trim().is_empty() {
            return Err("defaultCardName cannot be empty".to_string());
        }

        if self.new_node_datatype.is_empty() {
            return Err("newNodeDatatype cannot be empty".to_string());
        }

        if self.ontology_page_size == 0 {
            return Err("ontologyPageSize must be greater than 0".to_string());
        }

        if self.ontology_page_size > MAX_ONTOLOGY_PAGE_SIZE {
            return Err(format!(
                "ontologyPageSize cannot exceed {}",
                MAX_ONTOLOGY_PAGE_SIZE
            ));
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
