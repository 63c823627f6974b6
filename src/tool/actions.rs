/// Agent-tool request contract
///
/// The tool surface takes a single JSON payload tagged by `action`. Modeling
/// it as a closed enum makes adding an action a compile-time exercise: every
/// dispatcher match is checked exhaustively rather than falling through a
/// string switch.

use serde::{Deserialize, Serialize};

use crate::workflow::types::{EdgeDraft, NodeDraft, Visibility, WorkflowIcon};

/// One invocation of the workflow tool
///
/// Workflow ids arrive as raw strings and are syntax-checked by the adapter
/// before storage is touched, so malformed ids get their own error instead
/// of a misleading not-found.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WorkflowAction {
    /// Create a workflow owned by the caller (private, unpublished)
    Create {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        icon: Option<WorkflowIcon>,
        #[serde(default)]
        visibility: Option<Visibility>,
        #[serde(default)]
        is_published: Option<bool>,
    },

    /// Read a workflow's metadata, optionally with its full graph
    Read {
        id: String,
        #[serde(default)]
        include_structure: bool,
    },

    /// Merge the provided fields onto an existing workflow
    Update {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        icon: Option<WorkflowIcon>,
        #[serde(default)]
        visibility: Option<Visibility>,
        #[serde(default)]
        is_published: Option<bool>,
    },

    /// Destroy a workflow and its whole graph; requires `confirm: true`
    Delete {
        id: String,
        #[serde(default)]
        confirm: bool,
    },

    /// List workflows visible to the caller
    List {
        #[serde(default)]
        include_owned: Option<bool>,
        #[serde(default)]
        include_public: Option<bool>,
        #[serde(default)]
        include_readonly: Option<bool>,
        #[serde(default)]
        limit: Option<u32>,
    },

    /// Apply one atomic batch of node/edge upserts and deletions
    UpdateStructure {
        id: String,
        #[serde(default)]
        nodes: Vec<NodeDraft>,
        #[serde(default)]
        edges: Vec<EdgeDraft>,
        #[serde(default)]
        delete_nodes: Vec<String>,
        #[serde(default)]
        delete_edges: Vec<String>,
    },

    /// Case-insensitive substring search over visible workflow names
    FindByName { workflow_name: String },
}

impl WorkflowAction {
    /// Wire tag of the action, echoed back in every response envelope
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::Create { .. } => "create",
            WorkflowAction::Read { .. } => "read",
            WorkflowAction::Update { .. } => "update",
            WorkflowAction::Delete { .. } => "delete",
            WorkflowAction::List { .. } => "list",
            WorkflowAction::UpdateStructure { .. } => "update_structure",
            WorkflowAction::FindByName { .. } => "find_by_name",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: WorkflowAction = serde_json::from_value(json!({
            "action": "create",
            "name": "My Flow",
            "visibility": "readonly"
        }))
        .unwrap();
        assert!(matches!(
            action,
            WorkflowAction::Create {
                visibility: Some(Visibility::Readonly),
                ..
            }
        ));
        assert_eq!(action.name(), "create");

        let action: WorkflowAction = serde_json::from_value(json!({
            "action": "update_structure",
            "id": "not-checked-here",
            "nodes": [{"id": "n1", "kind": "start", "name": "Start"}],
            "deleteEdges": ["e9"]
        }))
        .unwrap();
        match action {
            WorkflowAction::UpdateStructure {
                nodes,
                delete_edges,
                ..
            } => {
                assert_eq!(nodes.len(), 1);
                assert!(nodes[0].node_config.is_object());
                assert_eq!(delete_edges, vec!["e9".to_string()]);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<WorkflowAction, _> =
            serde_json::from_value(json!({"action": "explode"}));
        assert!(result.is_err());
    }
}
