/// Structure synchronization batches and referential validation
///
/// A structure sync applies node/edge upserts and deletions to one workflow's
/// graph as a single atomic operation. Validation happens here, against the
/// *post-mutation* state, before any SQL runs: the repository only applies a
/// batch this module has accepted.

use std::collections::{HashMap, HashSet};

use crate::workflow::error::{Result, WorkflowError};
use crate::workflow::types::{EdgeDraft, NodeDraft};

/// One atomic batch of graph mutations
///
/// Applied in a fixed order for referential safety: delete edges, delete
/// nodes, upsert nodes, upsert edges. All four lists may be empty.
#[derive(Debug, Clone, Default)]
pub struct StructureBatch {
    pub upsert_nodes: Vec<NodeDraft>,
    pub upsert_edges: Vec<EdgeDraft>,
    pub delete_node_ids: Vec<String>,
    pub delete_edge_ids: Vec<String>,
}

impl StructureBatch {
    pub fn is_empty(&self) -> bool {
        self.upsert_nodes.is_empty()
            && self.upsert_edges.is_empty()
            && self.delete_node_ids.is_empty()
            && self.delete_edge_ids.is_empty()
    }
}

/// Minimal projection of a stored edge, enough for endpoint validation
#[derive(Debug, Clone)]
pub struct EdgeRef {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Validate a batch against the graph state it would produce
///
/// Computes the post-mutation node set (existing minus deleted, union
/// upserted) and checks that every edge surviving the batch — upserted edges
/// and existing edges that are neither deleted nor replaced — resolves both
/// endpoints in that set. Deleting a node while an untouched edge still
/// references it is therefore rejected rather than cascaded; the caller must
/// delete (or re-point) the edge in the same batch.
pub fn validate_batch(
    existing_node_ids: &HashSet<String>,
    existing_edges: &[EdgeRef],
    batch: &StructureBatch,
) -> Result<()> {
    for node in &batch.upsert_nodes {
        if node.id.trim().is_empty() {
            return Err(WorkflowError::Validation("node id must not be empty".into()));
        }
        if node.kind.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "node '{}' is missing a kind",
                node.id
            )));
        }
        if !node.node_config.is_object() {
            return Err(WorkflowError::Validation(format!(
                "node '{}' config must be a JSON object",
                node.id
            )));
        }
    }
    for edge in &batch.upsert_edges {
        if edge.id.trim().is_empty() {
            return Err(WorkflowError::Validation("edge id must not be empty".into()));
        }
    }

    let deleted_nodes: HashSet<&str> = batch.delete_node_ids.iter().map(String::as_str).collect();
    let deleted_edges: HashSet<&str> = batch.delete_edge_ids.iter().map(String::as_str).collect();

    // Post-mutation node set: (existing - deleted) ∪ upserted.
    let mut post_nodes: HashSet<&str> = existing_node_ids
        .iter()
        .map(String::as_str)
        .filter(|id| !deleted_nodes.contains(id))
        .collect();
    post_nodes.extend(batch.upsert_nodes.iter().map(|n| n.id.as_str()));

    // Post-mutation edge set: surviving existing edges, overridden by upserts.
    let mut post_edges: HashMap<&str, (&str, &str)> = existing_edges
        .iter()
        .filter(|e| !deleted_edges.contains(e.id.as_str()))
        .map(|e| (e.id.as_str(), (e.source.as_str(), e.target.as_str())))
        .collect();
    for edge in &batch.upsert_edges {
        post_edges.insert(edge.id.as_str(), (edge.source.as_str(), edge.target.as_str()));
    }

    for (id, (source, target)) in &post_edges {
        for endpoint in [source, target] {
            if !post_nodes.contains(endpoint) {
                return Err(WorkflowError::Validation(format!(
                    "edge '{}' references node '{}' which does not exist after this change",
                    id, endpoint
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str) -> NodeDraft {
        NodeDraft {
            id: id.to_string(),
            kind: "start".to_string(),
            name: id.to_string(),
            description: None,
            node_config: json!({}),
            ui_config: Default::default(),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> EdgeDraft {
        EdgeDraft {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            ui_config: Default::default(),
        }
    }

    fn edge_ref(id: &str, source: &str, target: &str) -> EdgeRef {
        EdgeRef {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn nodes(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accepts_edge_between_upserted_nodes() {
        let batch = StructureBatch {
            upsert_nodes: vec![node("a"), node("b")],
            upsert_edges: vec![edge("e1", "a", "b")],
            ..Default::default()
        };
        assert!(validate_batch(&HashSet::new(), &[], &batch).is_ok());
    }

    #[test]
    fn rejects_edge_with_missing_target() {
        let batch = StructureBatch {
            upsert_nodes: vec![node("a")],
            upsert_edges: vec![edge("e1", "a", "ghost")],
            ..Default::default()
        };
        let err = validate_batch(&HashSet::new(), &[], &batch).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn rejects_edge_pointing_at_node_deleted_in_same_batch() {
        let batch = StructureBatch {
            upsert_edges: vec![edge("e1", "a", "b")],
            delete_node_ids: vec!["b".to_string()],
            ..Default::default()
        };
        let err = validate_batch(&nodes(&["a", "b"]), &[], &batch).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn rejects_deleting_node_still_referenced_by_surviving_edge() {
        let existing = [edge_ref("e1", "a", "b")];
        let batch = StructureBatch {
            delete_node_ids: vec!["b".to_string()],
            ..Default::default()
        };
        let err = validate_batch(&nodes(&["a", "b"]), &existing, &batch).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn accepts_deleting_node_and_its_edge_together() {
        let existing = [edge_ref("e1", "a", "b")];
        let batch = StructureBatch {
            delete_node_ids: vec!["b".to_string()],
            delete_edge_ids: vec!["e1".to_string()],
            ..Default::default()
        };
        assert!(validate_batch(&nodes(&["a", "b"]), &existing, &batch).is_ok());
    }

    #[test]
    fn accepts_repointing_edge_away_from_deleted_node() {
        let existing = [edge_ref("e1", "a", "b")];
        let batch = StructureBatch {
            upsert_nodes: vec![node("c")],
            upsert_edges: vec![edge("e1", "a", "c")],
            delete_node_ids: vec!["b".to_string()],
            ..Default::default()
        };
        assert!(validate_batch(&nodes(&["a", "b"]), &existing, &batch).is_ok());
    }

    #[test]
    fn rejects_non_object_node_config() {
        let mut bad = node("a");
        bad.node_config = json!([1, 2, 3]);
        let batch = StructureBatch {
            upsert_nodes: vec![bad],
            ..Default::default()
        };
        let err = validate_batch(&HashSet::new(), &[], &batch).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
