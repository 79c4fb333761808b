//! Graph Inspection Binary
//!
//! Loads a resource model from a JSON graph fetch, checks its structural
//! invariants and prints the node tree and card tree.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin graph-inspect -- graph.json
//!
//! # With datatypes, ontology rules and namespaces
//! cargo run --bin graph-inspect -- graph.json session.json
//!
//! # Filter both trees
//! GRAPH_FILTER=name cargo run --bin graph-inspect -- graph.json
//! ```
//!
//! # Environment Variables
//!
//! - `GRAPH_DESIGNER_CONFIG`: Path to a designer config file
//! - `GRAPH_FILTER`: Filter text applied to both trees
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use graph_designer_core::{
    DatatypeRecord, DatatypeRegistry, DesignerConfig, GraphData, GraphDesigner, GraphModel,
    InMemoryOntology, InMemoryPersistence, OntologyNamespaces, OntologyRule, SessionCache,
};
use serde::Deserialize;

/// Lookups normally fetched once per page load
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SessionFile {
    datatypes: Vec<DatatypeRecord>,
    ontology_rules: Vec<OntologyRule>,
    namespaces: OntologyNamespaces,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let graph_path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: graph-inspect <graph.json> [session.json]"))?;
    let session_file: SessionFile = match args.next() {
        Some(path) => read_json(&PathBuf::from(path))?,
        None => SessionFile::default(),
    };

    let config = match env::var("GRAPH_DESIGNER_CONFIG") {
        Ok(path) => DesignerConfig::from_file(&path)?,
        Err(_) => DesignerConfig::default(),
    };

    let data: GraphData = read_json(&graph_path)?;
    tracing::info!("Loading graph {} from {}", data.graph_id, graph_path.display());

    let session = SessionCache::new(
        DatatypeRegistry::new(session_file.datatypes),
        Arc::new(InMemoryOntology::new(session_file.ontology_rules)),
        session_file.namespaces,
        config.ontology_page_size,
    );
    let graph = GraphModel::load(data, session, Arc::new(InMemoryPersistence::new()), config)?;
    tracing::info!(
        "Loaded {} nodes, {} cards",
        graph.node_count(),
        graph.cards().count()
    );

    let mut designer = GraphDesigner::new(graph, Vec::new());
    designer.node_tree_mut().expand_all();
    designer.card_tree_mut().expand_all();
    if let Ok(text) = env::var("GRAPH_FILTER") {
        designer.filter_nodes(&text);
        designer.filter_cards(&text);
    }

    println!("{} ({})", designer.graph().name(), designer.graph().graph_id());
    println!();
    println!("Nodes");
    for row in designer.node_tree().rows(designer.graph()) {
        let node = designer.graph().node(&row.node_id);
        let datatype = node.map(|n| n.datatype()).unwrap_or_default();
        let marker = if node.map(|n| n.is_collector()).unwrap_or(false) { "*" } else { " " };
        println!(
            "{}{} {} [{}]",
            "  ".repeat(row.depth),
            marker,
            row.display_name,
            datatype
        );
    }

    println!();
    println!("Cards");
    for row in designer.card_tree().rows() {
        let name = designer
            .card_tree()
            .card(designer.graph(), &row.card_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        println!("{}- {} ({})", "  ".repeat(row.depth), name, row.nodegroup_id);
    }

    Ok(())
}
