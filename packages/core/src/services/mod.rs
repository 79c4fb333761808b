//! Graph Services
//!
//! This module contains the graph model and the collaborators it talks to:
//!
//! - `GraphModel` - nodes, edges and cards of one resource model, with the
//!   structural operations (append, delete, move, branch graft, save)
//! - `PersistenceService` - create/update/delete against the server
//! - `OntologyLookupService` / `OntologyConnectionCache` - valid class and
//!   property pairs, cached per node with last-request-wins refreshes
//! - `SessionCache` - lookups shared by every node of a loaded graph
//! - `GraphChange` - what a structural operation did, for the tree views

pub mod error;
pub mod graph_change;
pub mod graph_model;
pub mod ontology_service;
pub mod persistence;
pub mod session;

pub use error::GraphError;
pub use graph_change::{CardPlacement, GraphChange};
pub use graph_model::{ChildNodesAndEdges, CollectorToggle, GraphModel, NodeEdit, Traversal};
pub use ontology_service::{
    InMemoryOntology, OntologyConnectionCache, OntologyLookupError, OntologyLookupService,
    OntologyPage, OntologyQuery, OntologyRule, RefreshOutcome,
};
pub use persistence::{
    CreateResponse, DeleteResponse, InMemoryPersistence, PersistenceCall, PersistenceError,
    PersistenceService, UpdateResponse,
};
pub use session::SessionCache;
