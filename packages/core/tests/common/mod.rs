//! Shared fixtures for graph designer integration tests
//!
//! The "person" graph:
//!
//! ```text
//! r  Person       (collector, card-r)
//! ├── a  Name         string, group r
//! └── b  Names        (collector, card-b)
//!     ├── c1 Name Type    (collector, card-c1)
//!     └── c2 Name Value   string, group b
//! ```

#![allow(dead_code)]

use graph_designer_core::{
    Card, CardWidget, DatatypeRecord, DatatypeRegistry, DesignerConfig, Edge, GraphData,
    GraphModel, InMemoryOntology, InMemoryPersistence, Node, OntologyNamespaces, OntologyRule,
    SessionCache,
};
use serde_json::{json, Map};
use std::sync::Arc;

pub const GRAPH_ID: &str = "person-graph";

pub fn datatypes() -> DatatypeRegistry {
    DatatypeRegistry::new([
        DatatypeRecord::new("semantic").collecting(),
        DatatypeRecord::new("string")
            .with_default_widget("text-widget")
            .with_default_config(json!({ "maxLength": 255 })),
        DatatypeRecord::new("boolean")
            .with_default_widget("switch-widget")
            .with_default_config(json!({ "trueLabel": "Yes", "falseLabel": "No" })),
    ])
}

pub fn ontology_rules() -> Vec<OntologyRule> {
    vec![
        OntologyRule::new("E21_Person", "P1_is_identified_by", "E41_Appellation"),
        OntologyRule::new("E21_Person", "P2_has_type", "E55_Type"),
        OntologyRule::new("E41_Appellation", "P2_has_type", "E55_Type"),
        OntologyRule::new("E41_Appellation", "P3_has_note", "E62_String"),
    ]
}

pub fn namespaces() -> OntologyNamespaces {
    OntologyNamespaces::new().with_namespace("http://www.cidoc-crm.org/cidoc-crm/", "")
}

pub fn session() -> SessionCache {
    SessionCache::new(
        datatypes(),
        Arc::new(InMemoryOntology::new(ontology_rules())),
        namespaces(),
        50,
    )
}

pub fn widget(widget_id: &str, node_id: &str, label: &str, sort_order: i64) -> CardWidget {
    CardWidget {
        widget_id: widget_id.to_string(),
        node_id: node_id.to_string(),
        label: label.to_string(),
        sort_order,
        visible: true,
        config: Map::new(),
    }
}

fn node(id: &str, name: &str, datatype: &str, nodegroup: Option<&str>) -> Node {
    Node::new(id, GRAPH_ID, name, datatype, nodegroup.map(str::to_string))
}

/// The person graph, without ontology classes
pub fn person_graph_data() -> GraphData {
    let nodes = vec![
        node("r", "Person", "semantic", None).as_top_node(),
        node("a", "Name", "string", Some("r"))
            .with_config(json!({ "maxLength": 255 }))
            .with_sort_order(0),
        node("b", "Names", "semantic", None).with_sort_order(1),
        node("c1", "Name Type", "semantic", None).with_sort_order(0),
        node("c2", "Name Value", "string", Some("b"))
            .with_config(json!({ "maxLength": 255 }))
            .with_sort_order(1),
    ];
    let edges = vec![
        Edge::new("e-a", "r", "a", None),
        Edge::new("e-b", "r", "b", None),
        Edge::new("e-c1", "b", "c1", None),
        Edge::new("e-c2", "b", "c2", None),
    ];

    let mut card_r = Card::new("card-r", "r", "Person").with_sort_order(0);
    card_r.upsert_widget(widget("text-widget", "a", "Name", 0));
    let mut card_b = Card::new("card-b", "b", "Names").with_sort_order(1);
    card_b.upsert_widget(widget("text-widget", "c2", "Name Value", 0));
    let card_c1 = Card::new("card-c1", "c1", "Name Type").with_sort_order(2);

    GraphData {
        graph_id: GRAPH_ID.to_string(),
        name: "Person".to_string(),
        description: None,
        is_resource: true,
        ontology_id: None,
        source_identifier_id: None,
        icon_class: None,
        nodes,
        edges,
        cards: vec![card_r, card_b, card_c1],
    }
}

/// The person graph with ontology classes and edge properties
pub fn person_graph_data_with_ontology() -> GraphData {
    let mut data = person_graph_data();
    data.ontology_id = Some("cidoc-crm".to_string());
    data.nodes = data
        .nodes
        .into_iter()
        .map(|n| {
            let (class, property) = match n.node_id() {
                "r" => ("E21_Person", None),
                "a" | "b" => ("E41_Appellation", Some("P1_is_identified_by")),
                "c1" => ("E55_Type", Some("P2_has_type")),
                _ => ("E62_String", Some("P3_has_note")),
            };
            n.with_ontology(Some(class.to_string()), property.map(str::to_string))
        })
        .collect();
    data.edges = data
        .edges
        .into_iter()
        .map(|mut e| {
            e.ontology_property = data
                .nodes
                .iter()
                .find(|n| n.node_id() == e.range_node_id)
                .and_then(|n| n.parent_property())
                .map(str::to_string);
            e
        })
        .collect();
    data
}

/// A two-node branch: a collector root with one string child
pub fn appellation_branch(branch_id: &str, name: &str) -> GraphData {
    let root_id = format!("{}-root", branch_id);
    let child_id = format!("{}-value", branch_id);
    let root = Node::new(&root_id, branch_id, "Appellation", "semantic", None)
        .with_ontology(Some("E41_Appellation".to_string()), None)
        .as_top_node();
    let child = Node::new(&child_id, branch_id, "Appellation Value", "string", Some(root_id.clone()))
        .with_ontology(Some("E62_String".to_string()), Some("P3_has_note".to_string()));
    let mut card = Card::new(format!("{}-card", branch_id), &root_id, "Appellation");
    card.upsert_widget(widget("text-widget", &child_id, "Appellation Value", 0));

    GraphData {
        graph_id: branch_id.to_string(),
        name: name.to_string(),
        description: None,
        is_resource: false,
        ontology_id: Some("cidoc-crm".to_string()),
        source_identifier_id: None,
        icon_class: None,
        edges: vec![Edge::new(
            format!("{}-edge", branch_id),
            &root_id,
            &child_id,
            Some("P3_has_note".to_string()),
        )],
        nodes: vec![root, child],
        cards: vec![card],
    }
}

/// A single-node branch whose root class is `class`
pub fn single_node_branch(branch_id: &str, name: &str, class: &str) -> GraphData {
    let root = Node::new(format!("{}-root", branch_id), branch_id, name, "string", None)
        .with_ontology(Some(class.to_string()), None)
        .as_top_node();
    GraphData {
        graph_id: branch_id.to_string(),
        name: name.to_string(),
        description: None,
        is_resource: false,
        ontology_id: Some("cidoc-crm".to_string()),
        source_identifier_id: None,
        icon_class: None,
        nodes: vec![root],
        edges: Vec::new(),
        cards: Vec::new(),
    }
}

pub fn load(data: GraphData) -> anyhow::Result<(GraphModel, Arc<InMemoryPersistence>)> {
    load_with_config(data, DesignerConfig::default())
}

pub fn load_with_config(
    data: GraphData,
    config: DesignerConfig,
) -> anyhow::Result<(GraphModel, Arc<InMemoryPersistence>)> {
    let persistence = Arc::new(InMemoryPersistence::new());
    let graph = GraphModel::load(data, session(), persistence.clone(), config)?;
    Ok((graph, persistence))
}

pub fn person_graph() -> anyhow::Result<(GraphModel, Arc<InMemoryPersistence>)> {
    load(person_graph_data())
}
