//! Data Models
//!
//! Entities of a resource model graph:
//!
//! - `Node` - one schema field, with datatype config and ontology role
//! - `Edge` - parent → child link typed by an ontology property
//! - `NodeGroup` - nodes sharing one collector (derived)
//! - `Card` - editing unit bound to one node-group
//! - `GraphData` - wire shape of a full graph fetch
//!
//! plus the datatype registry and ontology helpers the nodes rely on.

mod card;
mod datatype;
mod edge;
mod graph_data;
mod node;
mod nodegroup;
mod ontology;

pub use card::{Card, CardConstraint, CardWidget};
pub use datatype::{merge_default_config, DatatypeRecord, DatatypeRegistry};
pub use edge::Edge;
pub use graph_data::GraphData;
pub use node::{derive_alias, MutationOutcome, Node, ValidationError};
pub use nodegroup::NodeGroup;
pub use ontology::{
    make_friendly, resolve_friendly_ontology_name, valid_ontology_classes,
    valid_ontology_properties, OntologyConnection, OntologyNamespaces,
};
