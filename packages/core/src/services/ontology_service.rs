//! Ontology Lookup and Connection Cache
//!
//! Valid `{class, property}` pairs come from an external ontology service.
//! The graph model never queries it directly; it goes through an
//! `OntologyConnectionCache` shared by every node of the graph.
//!
//! # Cancellation
//!
//! A refresh for a node may be superseded by a newer refresh for the same
//! node while its lookup is still in flight. Every refresh takes a
//! generation number up front, and a response is stored only if its
//! generation is still the latest when it arrives. Stale responses are
//! dropped (last request wins, not first response).

use crate::models::OntologyConnection;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OntologyLookupError {
    #[error("Ontology not found: {0}")]
    UnknownOntology(String),

    #[error("Ontology service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),
}

/// Query for valid connections between a domain and a range class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyQuery {
    /// Class of the parent node; `None` matches every domain
    pub domain_class: Option<String>,

    /// Class of the child node; `None` matches every range
    pub range_class: Option<String>,

    /// Case-insensitive text filter on class and property
    pub term: Option<String>,

    /// Zero-based page index
    pub page: usize,

    pub page_size: usize,
}

impl OntologyQuery {
    pub fn for_domain(domain_class: Option<&str>, page_size: usize) -> Self {
        Self {
            domain_class: domain_class.map(str::to_string),
            page_size,
            ..Default::default()
        }
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn with_range(mut self, range_class: impl Into<String>) -> Self {
        self.range_class = Some(range_class.into());
        self
    }

    fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            ..self.clone()
        }
    }
}

/// One page of lookup results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyPage {
    pub connections: Vec<OntologyConnection>,
    pub has_more: bool,
}

#[async_trait]
pub trait OntologyLookupService: Send + Sync {
    async fn lookup(&self, query: &OntologyQuery) -> Result<OntologyPage, OntologyLookupError>;
}

/// A `domain --property--> range` rule of an ontology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyRule {
    pub domain: String,
    pub property: String,
    pub range: String,
}

impl OntologyRule {
    pub fn new(domain: impl Into<String>, property: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            property: property.into(),
            range: range.into(),
        }
    }
}

/// Ontology held in memory as a list of rules
///
/// Results are sorted by class then property so pages are stable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOntology {
    rules: Vec<OntologyRule>,
}

impl InMemoryOntology {
    pub fn new(rules: impl IntoIterator<Item = OntologyRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    fn matching(&self, query: &OntologyQuery) -> Vec<OntologyConnection> {
        let term = query.term.as_deref().map(str::to_lowercase);
        let mut connections: Vec<OntologyConnection> = self
            .rules
            .iter()
            .filter(|rule| query.domain_class.as_deref().map_or(true, |d| rule.domain == d))
            .filter(|rule| query.range_class.as_deref().map_or(true, |r| rule.range == r))
            .map(|rule| OntologyConnection::new(rule.range.clone(), rule.property.clone()))
            .filter(|conn| match &term {
                Some(term) => {
                    conn.class.to_lowercase().contains(term.as_str())
                        || conn.property.to_lowercase().contains(term.as_str())
                }
                None => true,
            })
            .collect();
        connections.sort_by(|a, b| a.class.cmp(&b.class).then_with(|| a.property.cmp(&b.property)));
        connections.dedup();
        connections
    }
}

#[async_trait]
impl OntologyLookupService for InMemoryOntology {
    async fn lookup(&self, query: &OntologyQuery) -> Result<OntologyPage, OntologyLookupError> {
        if query.page_size == 0 {
            return Err(OntologyLookupError::InvalidPageSize(0));
        }
        let all = self.matching(query);
        let start = query.page.saturating_mul(query.page_size).min(all.len());
        let end = (start + query.page_size).min(all.len());
        Ok(OntologyPage {
            connections: all[start..end].to_vec(),
            has_more: end < all.len(),
        })
    }
}

/// Result of a cache refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Response stored; carries the number of connections
    Applied(usize),
    /// A newer refresh for the same key was issued; response dropped
    Superseded,
}

#[derive(Debug, Default)]
struct CacheState {
    by_node: HashMap<String, Vec<OntologyConnection>>,
    by_domain: HashMap<String, Vec<OntologyConnection>>,
    generations: HashMap<String, u64>,
}

/// Shared cache of valid ontology connections
///
/// Keyed per node (connections reachable from the node's position) and per
/// domain class (used to check whether a branch root may sit under a class).
pub struct OntologyConnectionCache {
    lookup: Arc<dyn OntologyLookupService>,
    page_size: usize,
    state: RwLock<CacheState>,
}

impl OntologyConnectionCache {
    pub fn new(lookup: Arc<dyn OntologyLookupService>, page_size: usize) -> Self {
        Self {
            lookup,
            page_size: page_size.max(1),
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Pass a single paged query straight to the lookup service
    ///
    /// Used by incremental search; results are not cached.
    pub async fn search(&self, query: &OntologyQuery) -> Result<OntologyPage, OntologyLookupError> {
        self.lookup.lookup(query).await
    }

    /// Fetch every page for a domain class
    async fn fetch_all(&self, domain_class: Option<&str>) -> Result<Vec<OntologyConnection>, OntologyLookupError> {
        let mut query = OntologyQuery::for_domain(domain_class, self.page_size);
        let mut connections = Vec::new();
        loop {
            let page = self.lookup.lookup(&query).await?;
            connections.extend(page.connections);
            if !page.has_more {
                break;
            }
            query = query.next_page();
        }
        Ok(connections)
    }

    async fn begin(&self, key: &str) -> u64 {
        let mut state = self.state.write().await;
        let generation = state.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Refresh the connections reachable from a node whose parent has `domain_class`
    pub async fn refresh(
        &self,
        node_id: &str,
        domain_class: Option<&str>,
    ) -> Result<RefreshOutcome, OntologyLookupError> {
        let key = format!("node:{}", node_id);
        let generation = self.begin(&key).await;
        let connections = self.fetch_all(domain_class).await?;

        let mut state = self.state.write().await;
        if state.generations.get(&key).copied() != Some(generation) {
            tracing::debug!(
                "Discarding stale ontology response for node {} (generation {})",
                node_id,
                generation
            );
            return Ok(RefreshOutcome::Superseded);
        }
        let count = connections.len();
        state.by_node.insert(node_id.to_string(), connections);
        tracing::debug!("Cached {} ontology connections for node {}", count, node_id);
        Ok(RefreshOutcome::Applied(count))
    }

    /// Refresh the connections allowed below a class
    pub async fn refresh_domain(&self, domain_class: &str) -> Result<RefreshOutcome, OntologyLookupError> {
        let key = format!("domain:{}", domain_class);
        let generation = self.begin(&key).await;
        let connections = self.fetch_all(Some(domain_class)).await?;

        let mut state = self.state.write().await;
        if state.generations.get(&key).copied() != Some(generation) {
            tracing::debug!("Discarding stale ontology response for class {}", domain_class);
            return Ok(RefreshOutcome::Superseded);
        }
        let count = connections.len();
        state.by_domain.insert(domain_class.to_string(), connections);
        Ok(RefreshOutcome::Applied(count))
    }

    /// Cached connections for a node (empty until refreshed)
    pub async fn connections(&self, node_id: &str) -> Vec<OntologyConnection> {
        let state = self.state.read().await;
        state.by_node.get(node_id).cloned().unwrap_or_default()
    }

    pub async fn has_connections(&self, node_id: &str) -> bool {
        self.state.read().await.by_node.contains_key(node_id)
    }

    /// Connections allowed below `domain_class`, refreshing on a miss
    pub async fn connections_for_domain(
        &self,
        domain_class: &str,
    ) -> Result<Vec<OntologyConnection>, OntologyLookupError> {
        {
            let state = self.state.read().await;
            if let Some(connections) = state.by_domain.get(domain_class) {
                return Ok(connections.clone());
            }
        }
        self.refresh_domain(domain_class).await?;
        let state = self.state.read().await;
        Ok(state.by_domain.get(domain_class).cloned().unwrap_or_default())
    }

    /// Classes allowed as children of `domain_class`
    pub async fn classes_for_domain(&self, domain_class: &str) -> Result<Vec<String>, OntologyLookupError> {
        let mut classes: Vec<String> = self
            .connections_for_domain(domain_class)
            .await?
            .into_iter()
            .map(|c| c.class)
            .collect();
        classes.sort();
        classes.dedup();
        Ok(classes)
    }

    /// Store connections for a node without a lookup
    pub async fn store(&self, node_id: &str, connections: Vec<OntologyConnection>) {
        let mut state = self.state.write().await;
        let key = format!("node:{}", node_id);
        *state.generations.entry(key).or_insert(0) += 1;
        state.by_node.insert(node_id.to_string(), connections);
    }

    /// Drop a node's cached connections and cancel its in-flight refresh
    pub async fn forget(&self, node_id: &str) {
        let mut state = self.state.write().await;
        let key = format!("node:{}", node_id);
        *state.generations.entry(key).or_insert(0) += 1;
        state.by_node.remove(node_id);
    }
}

impl std::fmt::Debug for OntologyConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyConnectionCache")
            .field("page_size", &self.page_size)
            .finish()
    }
}
