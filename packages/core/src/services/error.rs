//! Service Layer Error Types
//!
//! Errors surfaced by graph operations. Local validation failures are raised
//! before any request is sent; server failures leave the local model as it
//! was before the call.

use crate::models::ValidationError;
use crate::services::ontology_service::OntologyLookupError;
use crate::services::persistence::PersistenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Card not found by ID
    #[error("Card not found: {id}")]
    CardNotFound { id: String },

    /// The top node cannot be deleted, moved or un-collected
    #[error("Root node {id} cannot be {action}")]
    RootNodeImmutable { id: String, action: String },

    /// Structural change on a node inherited from a published branch
    #[error("Node {id} is immutable")]
    ImmutableNode { id: String },

    /// Branch root class not valid under the target node
    #[error("Branch {branch_id} cannot be appended to node {target_id}: {reason}")]
    IncompatibleBranch {
        branch_id: String,
        target_id: String,
        reason: String,
    },

    /// Move target would break the tree
    #[error("Invalid move of node {node_id}: {reason}")]
    InvalidMove { node_id: String, reason: String },

    /// Loaded graph data violates a structural invariant
    #[error("Graph invariant violated: {0}")]
    InvariantViolation(String),

    /// Server answered but refused the change
    #[error("Server rejected {operation} on {id}")]
    ServerRejected { operation: String, id: String },

    /// Node or graph validation failed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persistence collaborator failed
    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// Ontology collaborator failed
    #[error("Ontology lookup failed: {0}")]
    OntologyLookup(#[from] OntologyLookupError),
}

impl GraphError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn card_not_found(id: impl Into<String>) -> Self {
        Self::CardNotFound { id: id.into() }
    }

    pub fn root_node_immutable(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self::RootNodeImmutable {
            id: id.into(),
            action: action.into(),
        }
    }

    pub fn immutable_node(id: impl Into<String>) -> Self {
        Self::ImmutableNode { id: id.into() }
    }

    pub fn incompatible_branch(
        branch_id: impl Into<String>,
        target_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::IncompatibleBranch {
            branch_id: branch_id.into(),
            target_id: target_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_move(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn server_rejected(operation: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ServerRejected {
            operation: operation.into(),
            id: id.into(),
        }
    }

    /// Rejected locally, before any request was sent
    pub fn is_validation_rejection(&self) -> bool {
        matches!(
            self,
            GraphError::NodeNotFound { .. }
                | GraphError::CardNotFound { .. }
                | GraphError::RootNodeImmutable { .. }
                | GraphError::ImmutableNode { .. }
                | GraphError::IncompatibleBranch { .. }
                | GraphError::InvalidMove { .. }
                | GraphError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_node_immutable_message() {
        let err = GraphError::root_node_immutable("root", "deleted");
        assert_eq!(format!("{}", err), "Root node root cannot be deleted");
        assert!(err.is_validation_rejection());
    }

    #[test]
    fn test_server_rejected_is_not_validation() {
        let err = GraphError::server_rejected("delete", "node-1");
        assert_eq!(format!("{}", err), "Server rejected delete on node-1");
        assert!(!err.is_validation_rejection());
    }

    #[test]
    fn test_incompatible_branch_message() {
        let err = GraphError::incompatible_branch("b1", "n1", "class E55_Type not allowed");
        assert_eq!(
            format!("{}", err),
            "Branch b1 cannot be appended to node n1: class E55_Type not allowed"
        );
    }

    #[test]
    fn test_persistence_error_converts() {
        let err: GraphError = PersistenceError::rejected("duplicate alias").into();
        assert!(matches!(err, GraphError::Persistence(_)));
    }
}
