//! Per-Session Shared Caches
//!
//! Lookups that every node of a graph reads but none of them owns: the
//! datatype registry, the ontology connection cache and the namespace table
//! used for friendly names. One `SessionCache` is built per graph load and
//! passed to the components that need it. Nothing is evicted while the
//! session lives.

use crate::models::{DatatypeRegistry, OntologyNamespaces};
use crate::services::ontology_service::{OntologyConnectionCache, OntologyLookupService};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SessionCache {
    datatypes: Arc<DatatypeRegistry>,
    ontology: Arc<OntologyConnectionCache>,
    namespaces: Arc<OntologyNamespaces>,
}

impl SessionCache {
    pub fn new(
        datatypes: DatatypeRegistry,
        lookup: Arc<dyn OntologyLookupService>,
        namespaces: OntologyNamespaces,
        page_size: usize,
    ) -> Self {
        Self {
            datatypes: Arc::new(datatypes),
            ontology: Arc::new(OntologyConnectionCache::new(lookup, page_size)),
            namespaces: Arc::new(namespaces),
        }
    }

    pub fn datatypes(&self) -> &DatatypeRegistry {
        &self.datatypes
    }

    pub fn ontology(&self) -> &Arc<OntologyConnectionCache> {
        &self.ontology
    }

    pub fn namespaces(&self) -> &OntologyNamespaces {
        &self.namespaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatatypeRecord;
    use crate::services::ontology_service::InMemoryOntology;

    #[test]
    fn test_clones_share_caches() {
        let session = SessionCache::new(
            DatatypeRegistry::new(vec![DatatypeRecord::new("string")]),
            Arc::new(InMemoryOntology::default()),
            OntologyNamespaces::new(),
            50,
        );
        let other = session.clone();

        assert!(Arc::ptr_eq(session.ontology(), other.ontology()));
        assert!(other.datatypes().contains("string"));
    }
}
