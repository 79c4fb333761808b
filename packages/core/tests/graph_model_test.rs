//! Integration tests for GraphModel
//!
//! Tests cover:
//! - Load-time structural validation
//! - Append, delete, move and branch graft through the persistence boundary
//! - Collector toggles and their regrouping
//! - Save, reset and dirty tracking
//! - Server rejections leaving the model untouched

mod common;

use anyhow::Result;
use common::*;
use graph_designer_core::{
    Card, DesignerConfig, Edge, EntityKind, GraphChange, GraphError, MutationOutcome, Node,
    Persistable, PersistenceError, Traversal, ValidationError,
};
use serde_json::json;

// =========================================================================
// Load Validation Tests
// =========================================================================

#[test]
fn test_load_person_graph() -> Result<()> {
    let (graph, _) = person_graph()?;

    assert_eq!(graph.root_id(), "r");
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.cards().count(), 3);
    assert_eq!(graph.root_nodegroup(), Some("r"));
    assert_eq!(graph.root_card().map(|c| c.card_id.as_str()), Some("card-r"));
    assert!(!graph.is_dirty(), "Freshly loaded graph should be clean");
    Ok(())
}

#[test]
fn test_load_rejects_two_top_nodes() {
    let mut data = person_graph_data();
    data.nodes.push(Node::new("x", GRAPH_ID, "Other", "semantic", None).as_top_node());

    let err = load(data).unwrap_err();
    let err = err.downcast::<GraphError>().unwrap();
    assert!(matches!(err, GraphError::InvariantViolation(_)));
}

#[test]
fn test_load_rejects_dangling_edge() {
    let mut data = person_graph_data();
    data.edges.push(Edge::new("e-x", "b", "missing", None));

    assert!(load(data).is_err());
}

#[test]
fn test_load_rejects_unreachable_node() {
    let mut data = person_graph_data();
    data.nodes.push(Node::new("orphan", GRAPH_ID, "Orphan", "semantic", None));

    let err = load(data).unwrap_err().downcast::<GraphError>().unwrap();
    assert!(err.to_string().contains("not reachable"));
}

#[test]
fn test_load_rejects_group_not_matching_parent() {
    let mut data = person_graph_data();
    // c2 sits under b but claims r's group
    data.nodes.retain(|n| n.node_id() != "c2");
    data.nodes.push(Node::new("c2", GRAPH_ID, "Name Value", "string", Some("r".to_string())));

    assert!(load(data).is_err());
}

#[test]
fn test_load_rejects_card_for_non_collector() {
    let mut data = person_graph_data();
    data.cards.push(Card::new("card-a", "a", "Name"));

    assert!(load(data).is_err());
}

#[test]
fn test_load_creates_missing_card() -> Result<()> {
    let mut data = person_graph_data();
    data.cards.retain(|c| c.card_id != "card-c1");

    let (graph, _) = load(data)?;

    let card = graph.card_for_nodegroup("c1").expect("card created on load");
    assert_eq!(card.name, "Name Type");
    assert_eq!(card.constraints.len(), 1);
    Ok(())
}

#[test]
fn test_collector_matches_group_identity() -> Result<()> {
    let (graph, _) = person_graph()?;

    for node in graph.nodes() {
        assert_eq!(node.is_collector(), node.nodegroup_id() == node.node_id());
    }
    Ok(())
}

// =========================================================================
// Structure Query Tests
// =========================================================================

#[test]
fn test_child_nodes_and_edges() -> Result<()> {
    let (graph, _) = person_graph()?;

    let direct = graph.get_child_nodes_and_edges("r", Traversal::Direct)?;
    assert_eq!(direct.node_ids, vec!["a", "b"]);
    assert_eq!(direct.edge_ids, vec!["e-a", "e-b"]);

    let full = graph.get_child_nodes_and_edges("r", Traversal::Full)?;
    assert_eq!(full.node_ids, vec!["a", "b", "c1", "c2"]);
    assert_eq!(full.edge_ids.len(), 4);
    Ok(())
}

#[test]
fn test_node_groups_top_down() -> Result<()> {
    let (graph, _) = person_graph()?;

    let groups = graph.node_groups();
    let ids: Vec<&str> = groups.iter().map(|g| g.nodegroup_id.as_str()).collect();
    assert_eq!(ids, vec!["r", "b", "c1"]);

    let b = graph.node_group("b").unwrap();
    assert_eq!(b.parent_nodegroup_id.as_deref(), Some("r"));
    assert_eq!(b.member_ids, vec!["b", "c2"]);
    Ok(())
}

// =========================================================================
// Append Tests
// =========================================================================

#[tokio::test]
async fn test_append_node_collecting_datatype_creates_card() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;

    let change = graph.append_node("b").await?;

    let GraphChange::NodesAppended {
        root_node_id,
        placements,
        ..
    } = change
    else {
        panic!("expected NodesAppended");
    };
    let node = graph.node(&root_node_id).unwrap();
    assert!(node.is_collector());
    assert_eq!(node.name(), "New Node");
    assert_eq!(graph.parent_node(&root_node_id).unwrap().node_id(), "b");
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].parent_nodegroup_id.as_deref(), Some("b"));
    assert!(graph.card_for_nodegroup(&root_node_id).is_some());
    assert!(!graph.is_dirty());

    let calls = persistence.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, EntityKind::Node);
    assert_eq!(calls[0].payload["parentNodeId"], json!("b"));
    Ok(())
}

#[tokio::test]
async fn test_append_node_joins_parent_group() -> Result<()> {
    let config = DesignerConfig {
        new_node_datatype: "string".to_string(),
        ..Default::default()
    };
    let (mut graph, _) = load_with_config(person_graph_data(), config)?;

    let change = graph.append_node("b").await?;
    let id = change.touched_node_ids()[0].to_string();

    let node = graph.node(&id).unwrap();
    assert_eq!(node.nodegroup_id(), "b");
    assert_eq!(node.config().get("maxLength"), Some(&json!(255)));
    assert_eq!(graph.cards().count(), 3, "No card for a non-collector");
    Ok(())
}

#[tokio::test]
async fn test_appended_aliases_are_unique() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let first = graph.append_node("r").await?.touched_node_ids()[0].to_string();
    let second = graph.append_node("r").await?.touched_node_ids()[0].to_string();

    assert_eq!(graph.node(&first).unwrap().alias(), Some("new_node"));
    assert_eq!(graph.node(&second).unwrap().alias(), Some("new_node_1"));
    assert!(graph.node(&second).unwrap().sort_order() > graph.node(&first).unwrap().sort_order());
    Ok(())
}

#[tokio::test]
async fn test_append_node_uses_default_ontology_wiring() -> Result<()> {
    let (mut graph, _) = load(person_graph_data_with_ontology())?;

    let id = graph.append_node("r").await?.touched_node_ids()[0].to_string();

    let node = graph.node(&id).unwrap();
    assert_eq!(node.parent_property(), Some("P1_is_identified_by"));
    assert_eq!(node.ontology_class(), Some("E41_Appellation"));
    let edge = graph.parent_edge(&id).unwrap();
    assert_eq!(edge.ontology_property.as_deref(), Some("P1_is_identified_by"));
    Ok(())
}

#[tokio::test]
async fn test_append_node_rejected_leaves_graph_unchanged() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    persistence.reject_next();

    let err = graph.append_node("r").await.unwrap_err();

    assert!(matches!(
        err,
        GraphError::Persistence(PersistenceError::Rejected { .. })
    ));
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.edges().count(), 4);
    assert_eq!(graph.cards().count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_append_under_immutable_node_sends_nothing() -> Result<()> {
    let mut data = person_graph_data();
    data.nodes = data
        .nodes
        .into_iter()
        .map(|n| if n.node_id() == "c1" { n.as_immutable() } else { n })
        .collect();
    let (mut graph, persistence) = load(data)?;

    let err = graph.append_node("c1").await.unwrap_err();

    assert!(matches!(err, GraphError::ImmutableNode { .. }));
    assert!(err.is_validation_rejection());
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

// =========================================================================
// Delete Tests
// =========================================================================

#[tokio::test]
async fn test_delete_removes_every_reference() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let change = graph.delete_node("b").await?;

    let GraphChange::NodesDeleted {
        removed_node_ids,
        removed_nodegroups,
        removed_edge_ids,
        ..
    } = change
    else {
        panic!("expected NodesDeleted");
    };
    assert_eq!(removed_node_ids, vec!["b", "c1", "c2"]);
    assert_eq!(removed_nodegroups, vec!["b", "c1"]);
    assert_eq!(removed_edge_ids.len(), 3);

    for node in graph.nodes() {
        assert!(!removed_node_ids.iter().any(|id| id == node.nodegroup_id()));
    }
    for edge in graph.edges() {
        assert!(!removed_node_ids.iter().any(|id| edge.touches(id)));
    }
    assert!(graph.card("card-b").is_none());
    assert!(graph.card("card-c1").is_none());
    assert_eq!(graph.child_ids("r"), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_root_is_rejected_locally() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;

    let err = graph.delete_node("r").await.unwrap_err();

    assert!(matches!(err, GraphError::RootNodeImmutable { .. }));
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_delete_refused_by_server() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    persistence.reject_next();

    let err = graph.delete_node("b").await.unwrap_err();

    assert!(matches!(err, GraphError::ServerRejected { .. }));
    assert_eq!(graph.node_count(), 5);
    assert!(graph.card("card-c1").is_some());
    Ok(())
}

// =========================================================================
// Collector Toggle Tests
// =========================================================================

#[test]
fn test_toggle_collector_on_leaf() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let toggle = graph.toggle_collector("a")?;

    assert_eq!(toggle.outcome, MutationOutcome::Applied);
    assert_eq!(toggle.old_nodegroup_id, "r");
    assert_eq!(toggle.new_nodegroup_id, "a");
    assert!(graph.node("a").unwrap().is_collector());
    let card = graph.card_for_nodegroup("a").unwrap();
    assert_eq!(card.name, "Name");
    assert_eq!(card.widgets.len(), 1);
    assert_eq!(card.widget_for("a").unwrap().widget_id, "text-widget");
    assert!(!graph.card("card-r").unwrap().has_widget_for("a"));
    Ok(())
}

#[test]
fn test_toggle_collector_twice_restores_groups() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    let before: Vec<(String, String)> = graph
        .nodes()
        .map(|n| (n.node_id().to_string(), n.nodegroup_id().to_string()))
        .collect();

    let first = graph.toggle_collector("b")?;
    assert_eq!(first.moved_node_ids, vec!["c2"], "Nested collector c1 keeps its group");
    assert_eq!(graph.node("c2").unwrap().nodegroup_id(), "r");
    assert_eq!(graph.node("c1").unwrap().nodegroup_id(), "c1");
    assert!(graph.card("card-b").is_none());

    graph.toggle_collector("b")?;

    for (id, group) in before {
        assert_eq!(graph.node(&id).unwrap().nodegroup_id(), group, "node {}", id);
    }
    assert!(graph.card("card-b").is_some(), "Stashed card is restored");
    assert!(!graph.is_dirty());
    Ok(())
}

#[test]
fn test_toggle_root_is_rejected() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let err = graph.toggle_collector("r").unwrap_err();

    assert!(matches!(err, GraphError::RootNodeImmutable { .. }));
    Ok(())
}

#[test]
fn test_toggle_immutable_node_is_a_no_op() -> Result<()> {
    let mut data = person_graph_data();
    data.nodes = data
        .nodes
        .into_iter()
        .map(|n| if n.node_id() == "a" { n.as_immutable() } else { n })
        .collect();
    let (mut graph, _) = load(data)?;

    let toggle = graph.toggle_collector("a")?;

    assert_eq!(toggle.outcome, MutationOutcome::RejectedImmutable);
    assert!(toggle.change.is_none());
    assert_eq!(graph.node("a").unwrap().nodegroup_id(), "r");
    Ok(())
}

// =========================================================================
// Edit, Save and Reset Tests
// =========================================================================

#[test]
fn test_rename_keeps_alias_unique() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let edit = graph.rename_node("c2", "Name")?;

    assert_eq!(edit.outcome, MutationOutcome::Applied);
    assert_eq!(graph.node("c2").unwrap().alias(), Some("name_1"));
    assert_eq!(graph.dirty_node_ids(), vec!["c2"]);
    Ok(())
}

#[test]
fn test_set_datatype_merges_config() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    graph.set_node_datatype("a", "boolean")?;

    let config = graph.node("a").unwrap().config();
    assert_eq!(config.get("maxLength"), Some(&json!(255)));
    assert_eq!(config.get("trueLabel"), Some(&json!("Yes")));
    assert_eq!(config.get("falseLabel"), Some(&json!("No")));
    Ok(())
}

#[test]
fn test_set_unknown_datatype_fails_validation() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let err = graph.set_node_datatype("a", "geojson").unwrap_err();

    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::UnknownDatatype(_))
    ));
    assert_eq!(graph.node("a").unwrap().datatype(), "string");
    Ok(())
}

#[tokio::test]
async fn test_save_sends_pending_card_and_confirms() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    graph.toggle_collector("a")?;
    assert!(graph.is_dirty());

    graph.save_node("a").await?;

    let calls = persistence.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].payload.get("card").is_some());
    assert!(!graph.is_dirty());
    assert!(graph.card_for_nodegroup("a").unwrap().confirmed_snapshot().is_some());
    Ok(())
}

#[tokio::test]
async fn test_save_sends_cards_rebound_by_toggle() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    graph.toggle_collector("b")?;
    assert!(graph.card("card-r").unwrap().has_widget_for("c2"));

    graph.save_node("b").await?;

    let calls = persistence.calls();
    let cards = calls[0].payload["cards"].as_array().cloned().unwrap_or_default();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["cardId"], json!("card-r"));
    assert_eq!(calls[0].payload["deleteCardId"], json!("card-b"));
    assert!(!graph.is_dirty());
    Ok(())
}

#[tokio::test]
async fn test_save_confirms_relabelled_widget() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    graph.rename_node("c2", "Value")?;
    assert!(graph.card("card-b").unwrap().is_dirty());

    graph.save_node("c2").await?;

    assert!(persistence.calls()[0].payload.get("cards").is_some());
    assert!(!graph.is_dirty());
    Ok(())
}

#[test]
fn test_edit_node_keeps_alias_unique_and_relabels_widget() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let edit = graph.edit_node("c2", |node| node.set_name("Name"))?;

    assert!(edit.change.is_some());
    assert_eq!(graph.node("c2").unwrap().alias(), Some("name_1"));
    assert_eq!(graph.card("card-b").unwrap().widget_for("c2").unwrap().label, "Name");
    Ok(())
}

#[test]
fn test_edit_node_unchanged_reports_no_change() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let edit = graph.edit_node("a", |node| node.set_required(true))?;

    assert_eq!(edit.outcome, MutationOutcome::Unchanged);
    assert!(edit.change.is_none());
    assert!(!graph.is_dirty());
    Ok(())
}

#[tokio::test]
async fn test_save_renames_card_with_previous_name() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    graph.rename_node("b", "Appellations")?;

    graph.save_node("b").await?;

    assert_eq!(graph.card("card-b").unwrap().name, "Appellations");
    Ok(())
}

#[tokio::test]
async fn test_save_keeps_custom_card_name() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    graph.card_for_nodegroup_mut("b").unwrap().name = "Custom".to_string();
    graph.rename_node("b", "Appellations")?;

    graph.save_node("b").await?;

    assert_eq!(graph.card("card-b").unwrap().name, "Custom");
    Ok(())
}

#[tokio::test]
async fn test_save_requires_ontology_class() -> Result<()> {
    let (mut graph, persistence) = load(person_graph_data_with_ontology())?;
    graph.edit_node("a", |node| node.set_ontology_class(None))?;

    let err = graph.save_node("a").await.unwrap_err();

    assert!(matches!(
        err,
        GraphError::Validation(ValidationError::InvalidOntology { .. })
    ));
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_save_failure_keeps_edits_pending() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    graph.rename_node("a", "Full Name")?;
    persistence.fail_next();

    assert!(graph.save_node("a").await.is_err());

    assert_eq!(graph.dirty_node_ids(), vec!["a"]);
    Ok(())
}

#[test]
fn test_reset_discards_toggle_and_rename() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    graph.rename_node("a", "Full Name")?;
    graph.toggle_collector("b")?;

    graph.reset();

    assert!(!graph.is_dirty());
    assert_eq!(graph.node("a").unwrap().name(), "Name");
    assert_eq!(graph.node("c2").unwrap().nodegroup_id(), "b");
    assert!(graph.card("card-b").is_some());
    Ok(())
}

// =========================================================================
// Move and Reorder Tests
// =========================================================================

#[tokio::test]
async fn test_move_regroups_non_collector() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let change = graph.move_node("c2", None, "r").await?;

    assert!(matches!(change, GraphChange::NodeMoved { .. }));
    let node = graph.node("c2").unwrap();
    assert_eq!(node.nodegroup_id(), "r");
    assert_eq!(graph.parent_node("c2").unwrap().node_id(), "r");
    assert!(!node.is_dirty(), "Moved fields are server-confirmed");
    Ok(())
}

#[tokio::test]
async fn test_move_collector_keeps_group() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    graph.move_node("c1", None, "r").await?;

    assert_eq!(graph.node("c1").unwrap().nodegroup_id(), "c1");
    assert_eq!(graph.parent_nodegroup_id("c1").as_deref(), Some("r"));
    Ok(())
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;

    let err = graph.move_node("b", None, "c1").await.unwrap_err();

    assert!(matches!(err, GraphError::InvalidMove { .. }));
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_move_transport_failure_leaves_edge() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;
    persistence.fail_next();

    let err = graph.move_node("c2", None, "r").await.unwrap_err();

    assert!(matches!(
        err,
        GraphError::Persistence(PersistenceError::Transport(_))
    ));
    assert_eq!(graph.parent_node("c2").unwrap().node_id(), "b");
    assert_eq!(graph.node("c2").unwrap().nodegroup_id(), "b");
    Ok(())
}

#[tokio::test]
async fn test_reorder_nodes() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;

    graph
        .reorder_nodes("r", &["b".to_string(), "a".to_string()])
        .await?;

    assert_eq!(graph.child_ids("r"), vec!["b", "a"]);
    assert!(!graph.is_dirty());
    assert_eq!(persistence.calls()[0].kind, EntityKind::Graph);
    Ok(())
}

#[tokio::test]
async fn test_reorder_must_list_every_child() -> Result<()> {
    let (mut graph, persistence) = person_graph()?;

    let err = graph.reorder_nodes("r", &["a".to_string()]).await.unwrap_err();

    assert!(matches!(err, GraphError::InvalidMove { .. }));
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_reorder_unknown_card() -> Result<()> {
    let (mut graph, _) = person_graph()?;

    let err = graph.reorder_cards(&["nope".to_string()]).await.unwrap_err();

    assert!(matches!(err, GraphError::CardNotFound { .. }));
    Ok(())
}

// =========================================================================
// Branch Tests
// =========================================================================

#[tokio::test]
async fn test_can_append_checks_ontology() -> Result<()> {
    let (graph, _) = load(person_graph_data_with_ontology())?;

    let appellation = appellation_branch("br", "Appellation");
    let place = single_node_branch("pl", "Place", "E53_Place");

    assert!(graph.can_append("r", &appellation).await?);
    assert!(!graph.can_append("r", &place).await?);
    assert!(!graph.can_append("c1", &appellation).await?);
    Ok(())
}

#[tokio::test]
async fn test_graph_without_ontology_accepts_any_branch() -> Result<()> {
    let (graph, _) = person_graph()?;

    let place = single_node_branch("pl", "Place", "E53_Place");

    assert!(graph.can_append("c1", &place).await?);
    Ok(())
}

#[tokio::test]
async fn test_append_branch_grafts_fresh_copy() -> Result<()> {
    let (mut graph, persistence) = load(person_graph_data_with_ontology())?;
    let branch = appellation_branch("br", "Appellation");

    let change = graph
        .append_branch("r", &branch, Some("P1_is_identified_by".to_string()))
        .await?;

    let GraphChange::NodesAppended {
        root_node_id,
        node_ids,
        placements,
    } = change
    else {
        panic!("expected NodesAppended");
    };
    assert_eq!(node_ids.len(), 2);
    assert!(!node_ids.iter().any(|id| id.starts_with("br-")));
    assert_eq!(graph.node_count(), 7);
    assert_eq!(
        graph.parent_edge(&root_node_id).unwrap().ontology_property.as_deref(),
        Some("P1_is_identified_by")
    );

    let root = graph.node(&root_node_id).unwrap();
    assert!(root.is_collector());
    assert!(!root.is_top_node());
    let card = graph.card_for_nodegroup(&root_node_id).unwrap();
    assert_ne!(card.card_id, "br-card");
    let value_id = node_ids.iter().find(|id| **id != root_node_id).unwrap();
    assert!(card.has_widget_for(value_id));
    assert_eq!(placements.len(), 1);

    assert_eq!(persistence.calls()[0].kind, EntityKind::Branch);
    Ok(())
}

#[tokio::test]
async fn test_append_branch_rejects_wrong_class() -> Result<()> {
    let (mut graph, persistence) = load(person_graph_data_with_ontology())?;
    let place = single_node_branch("pl", "Place", "E53_Place");

    let err = graph.append_branch("r", &place, None).await.unwrap_err();

    assert!(matches!(err, GraphError::IncompatibleBranch { .. }));
    assert_eq!(persistence.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_append_branch_without_ontology_strips_classes() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    let branch = appellation_branch("br", "Appellation");

    let change = graph
        .append_branch("b", &branch, Some("P1_is_identified_by".to_string()))
        .await?;

    for id in change.touched_node_ids() {
        let node = graph.node(id).unwrap();
        assert_eq!(node.ontology_class(), None);
        assert_eq!(node.parent_property(), None);
    }
    Ok(())
}

#[tokio::test]
async fn test_append_non_collector_branch_joins_target_group() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    let mut branch = appellation_branch("br", "Appellation");
    // Root in the group of an outside collector: not a collector itself
    branch.nodes = branch
        .nodes
        .into_iter()
        .map(|n| {
            let id = n.node_id().to_string();
            let top = n.is_top_node();
            let node = Node::new(&id, "br", n.name(), n.datatype(), Some("elsewhere".to_string()));
            if top {
                node.as_top_node()
            } else {
                node
            }
        })
        .collect();
    branch.cards.clear();

    let change = graph.append_branch("b", &branch, None).await?;

    for id in change.touched_node_ids() {
        assert_eq!(graph.node(id).unwrap().nodegroup_id(), "b");
    }
    assert_eq!(graph.cards().count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_to_graph_data_reloads() -> Result<()> {
    let (mut graph, _) = person_graph()?;
    graph.append_node("c1").await?;

    let exported = graph.to_graph_data();
    let (reloaded, _) = load(exported)?;

    assert_eq!(reloaded.node_count(), 6);
    assert_eq!(reloaded.cards().count(), 4);
    Ok(())
}
