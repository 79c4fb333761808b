//! Performance benchmarks for graph designer tree views
//!
//! Run with: `cargo bench -p graph-designer-core`
//!
//! These benchmarks measure the interactive paths of the designer:
//! - Graph load with structural validation (2000+ nodes)
//! - Node and card tree filtering
//! - Card tree patching after a collector toggle versus a full rebuild

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graph_designer_core::{
    Card, CardTree, DatatypeRecord, DatatypeRegistry, DesignerConfig, Edge, GraphData,
    GraphDesigner, GraphModel, InMemoryOntology, InMemoryPersistence, Node, NodeTree,
    OntologyNamespaces, SelectionMode, SessionCache,
};
use std::sync::Arc;

const GRAPH_ID: &str = "bench-graph";

fn session() -> SessionCache {
    SessionCache::new(
        DatatypeRegistry::new([
            DatatypeRecord::new("semantic").collecting(),
            DatatypeRecord::new("string").with_default_widget("text-widget"),
        ]),
        Arc::new(InMemoryOntology::new(Vec::new())),
        OntologyNamespaces::new(),
        50,
    )
}

/// Generate a graph with `groups` collectors under the root, each holding
/// `leaves` string nodes and one nested collector
fn generate_graph(groups: usize, leaves: usize) -> GraphData {
    let mut nodes = vec![Node::new("root", GRAPH_ID, "Root", "semantic", None).as_top_node()];
    let mut edges = Vec::new();
    let mut cards = vec![Card::new("card-root", "root", "Root")];

    for g in 0..groups {
        let group_id = format!("g{}", g);
        nodes.push(
            Node::new(&group_id, GRAPH_ID, format!("Group {}", g), "semantic", None)
                .with_sort_order(g as i64),
        );
        edges.push(Edge::new(format!("e-{}", group_id), "root", &group_id, None));
        cards.push(Card::new(format!("card-{}", group_id), &group_id, format!("Group {}", g)));

        for l in 0..leaves {
            let leaf_id = format!("{}-l{}", group_id, l);
            nodes.push(
                Node::new(
                    &leaf_id,
                    GRAPH_ID,
                    format!("Field {} of {}", l, g),
                    "string",
                    Some(group_id.clone()),
                )
                .with_sort_order(l as i64),
            );
            edges.push(Edge::new(format!("e-{}", leaf_id), &group_id, &leaf_id, None));
        }

        let nested_id = format!("{}-n", group_id);
        nodes.push(
            Node::new(&nested_id, GRAPH_ID, format!("Nested {}", g), "semantic", None)
                .with_sort_order(leaves as i64),
        );
        edges.push(Edge::new(format!("e-{}", nested_id), &group_id, &nested_id, None));
        cards.push(Card::new(format!("card-{}", nested_id), &nested_id, format!("Nested {}", g)));
    }

    GraphData {
        graph_id: GRAPH_ID.to_string(),
        name: "Bench".to_string(),
        description: None,
        is_resource: true,
        ontology_id: None,
        source_identifier_id: None,
        icon_class: None,
        nodes,
        edges,
        cards,
    }
}

fn load(data: GraphData) -> GraphModel {
    GraphModel::load(
        data,
        session(),
        Arc::new(InMemoryPersistence::new()),
        DesignerConfig::default(),
    )
    .unwrap()
}

/// Benchmark graph load and validation (200 groups, ~2400 nodes)
fn bench_graph_load(c: &mut Criterion) {
    let data = generate_graph(200, 10);

    c.bench_function("graph_load_2400_nodes", |b| {
        b.iter(|| black_box(load(data.clone())));
    });
}

/// Benchmark node tree filter and clear
fn bench_node_tree_filter(c: &mut Criterion) {
    let graph = load(generate_graph(200, 10));
    let mut tree = NodeTree::build(&graph);

    c.bench_function("node_tree_filter", |b| {
        b.iter(|| {
            tree.filter(&graph, black_box("field 7 of 19"));
            tree.clear_filter();
        });
    });

    c.bench_function("node_tree_rows_expanded", |b| {
        tree.expand_all();
        b.iter(|| black_box(tree.rows(&graph)));
    });
}

/// Benchmark card tree filter and flattened order
fn bench_card_tree(c: &mut Criterion) {
    let graph = load(generate_graph(200, 10));
    let mut tree = CardTree::build(&graph, SelectionMode::Single);

    c.bench_function("card_tree_filter", |b| {
        b.iter(|| {
            tree.filter(&graph, black_box("nested 19"));
            tree.clear_filter();
        });
    });

    c.bench_function("card_tree_flattened", |b| {
        b.iter(|| black_box(tree.flattened().len()));
    });
}

/// Compare patching a toggle into the card tree with rebuilding it
fn bench_toggle_patch_vs_rebuild(c: &mut Criterion) {
    let data = generate_graph(200, 10);

    c.bench_function("toggle_collector_patched", |b| {
        let mut designer = GraphDesigner::new(load(data.clone()), Vec::new());
        b.iter(|| {
            designer.toggle_collector("g100-l3").unwrap();
            designer.toggle_collector("g100-l3").unwrap();
        });
    });

    c.bench_function("card_tree_rebuild", |b| {
        let graph = load(data.clone());
        b.iter(|| black_box(CardTree::build(&graph, SelectionMode::Single)));
    });
}

criterion_group!(
    benches,
    bench_graph_load,
    bench_node_tree_filter,
    bench_card_tree,
    bench_toggle_patch_vs_rebuild
);
criterion_main!(benches);
