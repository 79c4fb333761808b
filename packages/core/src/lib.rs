//! Graph Designer Core
//!
//! In-memory engine behind a resource-model graph designer: a tree of typed
//! nodes grouped under collectors, the cards that edit each group, and the
//! tree views that present both.
//!
//! # Architecture
//!
//! - **Arena model**: nodes, edges and cards live in id-keyed maps on `GraphModel`
//! - **Capability traits**: entities implement `Persistable`, `TreeItem` and
//!   `ConfigurableDatatype` rather than sharing a base type
//! - **Server-confirmed state**: every structural change makes exactly one
//!   persistence call and mutates local state only after it succeeds
//! - **Change records**: each completed mutation yields a `GraphChange` that
//!   the card tree patches itself from
//!
//! # Modules
//!
//! - [`models`] - Nodes, edges, cards, node-groups and datatype records
//! - [`behaviors`] - Capability traits shared by the entities
//! - [`services`] - Graph model, persistence and ontology collaborators
//! - [`tree`] - Node tree, card tree, branch list and their UI state
//! - [`designer`] - Orchestrates the model and every view
//! - [`config`] - Designer settings

pub mod behaviors;
pub mod config;
pub mod designer;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use behaviors::*;
pub use config::{ConfigError, DesignerConfig};
pub use designer::GraphDesigner;
pub use models::*;
pub use services::*;
pub use tree::*;
