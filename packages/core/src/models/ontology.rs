//! Ontology Types and Helpers
//!
//! Nodes in a resource model carry an ontology class and the ontology property
//! that links them to their parent. The valid choices for both are looked up
//! from an ontology service and cached per node as a flat list of
//! `{class, property}` pairs. The helpers in this module narrow that list in
//! either direction: choosing a class narrows the valid properties and
//! choosing a property narrows the valid classes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reachable `{class, property}` pair from a node's position in the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyConnection {
    /// Ontology class URI the node may take
    pub class: String,

    /// Ontology property URI linking the node to its parent
    pub property: String,
}

impl OntologyConnection {
    pub fn new(class: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            property: property.into(),
        }
    }
}

/// Namespace URI → prefix lookup used to shorten ontology URIs for display
///
/// An empty prefix strips the namespace entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyNamespaces {
    namespaces: BTreeMap<String, String>,
}

impl OntologyNamespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace URI with its display prefix
    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.namespaces.insert(uri.into(), prefix.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Find the namespace that matches `uri`, preferring the longest match
    fn matching_namespace(&self, uri: &str) -> Option<(&str, &str)> {
        self.namespaces
            .iter()
            .filter(|(ns, _)| !ns.is_empty() && uri.contains(ns.as_str()))
            .max_by_key(|(ns, _)| ns.len())
            .map(|(ns, prefix)| (ns.as_str(), prefix.as_str()))
    }
}

impl FromIterator<(String, String)> for OntologyNamespaces {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            namespaces: iter.into_iter().collect(),
        }
    }
}

/// Shorten an ontology URI using the registered namespaces
///
/// Returns an empty string for a missing URI and the URI unchanged when no
/// namespace matches.
///
/// # Examples
///
/// ```rust
/// use graph_designer_core::models::{resolve_friendly_ontology_name, OntologyNamespaces};
///
/// let namespaces = OntologyNamespaces::new()
///     .with_namespace("http://www.cidoc-crm.org/cidoc-crm/", "crm");
/// assert_eq!(
///     resolve_friendly_ontology_name(Some("http://www.cidoc-crm.org/cidoc-crm/E21_Person"), &namespaces),
///     "crm:E21_Person"
/// );
/// assert_eq!(resolve_friendly_ontology_name(None, &namespaces), "");
/// ```
pub fn resolve_friendly_ontology_name(uri: Option<&str>, namespaces: &OntologyNamespaces) -> String {
    let uri = match uri {
        Some(uri) if !uri.is_empty() => uri,
        _ => return String::new(),
    };

    match namespaces.matching_namespace(uri) {
        Some((namespace, prefix)) if !prefix.is_empty() => {
            uri.replacen(namespace, &format!("{}:", prefix), 1)
        }
        Some((namespace, _)) => uri.replacen(namespace, "", 1),
        None => uri.to_string(),
    }
}

/// Last path segment of an ontology URI
pub fn make_friendly(uri: Option<&str>) -> String {
    match uri {
        Some(uri) if !uri.is_empty() => uri.rsplit('/').next().unwrap_or(uri).to_string(),
        _ => String::new(),
    }
}

/// Classes valid for a node, narrowed by the chosen parent property if any
///
/// Sorted alphabetically and deduplicated.
pub fn valid_ontology_classes(
    connections: &[OntologyConnection],
    parent_property: Option<&str>,
) -> Vec<String> {
    let property = parent_property.filter(|p| !p.is_empty());
    let mut classes: Vec<String> = connections
        .iter()
        .filter(|c| property.map_or(true, |p| c.property == p))
        .map(|c| c.class.clone())
        .collect();
    classes.sort();
    classes.dedup();
    classes
}

/// Properties valid for a node, narrowed by the chosen ontology class if any
pub fn valid_ontology_properties(
    connections: &[OntologyConnection],
    ontology_class: Option<&str>,
) -> Vec<String> {
    let class = ontology_class.filter(|c| !c.is_empty());
    let mut properties: Vec<String> = connections
        .iter()
        .filter(|c| class.map_or(true, |cls| c.class == cls))
        .map(|c| c.property.clone())
        .collect();
    properties.sort();
    properties.dedup();
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRM: &str = "http://www.cidoc-crm.org/cidoc-crm/";

    fn connections() -> Vec<OntologyConnection> {
        vec![
            OntologyConnection::new(format!("{CRM}E41_Appellation"), format!("{CRM}P1_is_identified_by")),
            OntologyConnection::new(format!("{CRM}E42_Identifier"), format!("{CRM}P1_is_identified_by")),
            OntologyConnection::new(format!("{CRM}E55_Type"), format!("{CRM}P2_has_type")),
            OntologyConnection::new(format!("{CRM}E41_Appellation"), format!("{CRM}P102_has_title")),
        ]
    }

    #[test]
    fn test_valid_classes_universe_is_sorted_and_deduplicated() {
        let classes = valid_ontology_classes(&connections(), None);
        assert_eq!(
            classes,
            vec![
                format!("{CRM}E41_Appellation"),
                format!("{CRM}E42_Identifier"),
                format!("{CRM}E55_Type"),
            ]
        );
    }

    #[test]
    fn test_valid_classes_narrowed_by_property() {
        let property = format!("{CRM}P2_has_type");
        let classes = valid_ontology_classes(&connections(), Some(&property));
        assert_eq!(classes, vec![format!("{CRM}E55_Type")]);
    }

    #[test]
    fn test_valid_properties_narrowed_by_class() {
        let class = format!("{CRM}E41_Appellation");
        let properties = valid_ontology_properties(&connections(), Some(&class));
        assert_eq!(
            properties,
            vec![format!("{CRM}P102_has_title"), format!("{CRM}P1_is_identified_by")]
        );
    }

    #[test]
    fn test_empty_selection_behaves_like_no_selection() {
        assert_eq!(
            valid_ontology_properties(&connections(), Some("")),
            valid_ontology_properties(&connections(), None)
        );
    }

    #[test]
    fn test_friendly_name_prefers_longest_namespace() {
        let namespaces = OntologyNamespaces::new()
            .with_namespace("http://www.cidoc-crm.org/", "org")
            .with_namespace(CRM, "crm");
        let uri = format!("{CRM}E22_Human-Made_Object");
        assert_eq!(
            resolve_friendly_ontology_name(Some(&uri), &namespaces),
            "crm:E22_Human-Made_Object"
        );
    }

    #[test]
    fn test_friendly_name_with_empty_prefix_strips_namespace() {
        let namespaces = OntologyNamespaces::new().with_namespace(CRM, "");
        let uri = format!("{CRM}E55_Type");
        assert_eq!(resolve_friendly_ontology_name(Some(&uri), &namespaces), "E55_Type");
    }

    #[test]
    fn test_friendly_name_without_match_returns_uri() {
        let namespaces = OntologyNamespaces::new().with_namespace(CRM, "crm");
        assert_eq!(
            resolve_friendly_ontology_name(Some("urn:local:Thing"), &namespaces),
            "urn:local:Thing"
        );
        assert_eq!(resolve_friendly_ontology_name(Some(""), &namespaces), "");
    }

    #[test]
    fn test_make_friendly_uses_last_segment() {
        assert_eq!(make_friendly(Some(&format!("{CRM}E55_Type"))), "E55_Type");
        assert_eq!(make_friendly(None), "");
    }
}
