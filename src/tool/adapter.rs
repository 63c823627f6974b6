/// Workflow tool dispatcher
///
/// The single outward-facing entry point for workflow operations, shared by
/// the HTTP tool route and AI-agent tool hosts. It resolves the caller
/// through the session collaborator, gates every operation through the
/// access evaluator, and folds every outcome — success or any domain error —
/// into one uniform response envelope. `dispatch` is infallible by contract.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::auth::{SessionProvider, SessionUser};
use crate::tool::actions::WorkflowAction;
use crate::workflow::access;
use crate::workflow::error::{Result, WorkflowError};
use crate::workflow::sync::StructureBatch;
use crate::workflow::types::{Visibility, Workflow, WorkflowDraft};
use crate::workflow::repository::WorkflowRepository;

/// Uniform result envelope returned by every tool invocation
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    /// Echo of the requested action tag
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Machine-readable error kind on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable outcome description
    pub message: String,
}

/// Dispatcher over the closed set of workflow tool actions
#[derive(Clone)]
pub struct WorkflowToolAdapter {
    repository: Arc<WorkflowRepository>,
    session: Arc<dyn SessionProvider>,
}

impl WorkflowToolAdapter {
    /// Build an adapter for one caller context
    ///
    /// Cheap to construct; the HTTP layer builds one per request with a
    /// header-derived session.
    pub fn new(repository: Arc<WorkflowRepository>, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            repository,
            session,
        }
    }

    /// Execute one action and fold the outcome into the envelope
    pub async fn dispatch(&self, action: WorkflowAction) -> ToolResponse {
        let name = action.name().to_string();
        match self.execute(action).await {
            Ok((result, message)) => ToolResponse {
                success: true,
                action: name,
                result: Some(result),
                error: None,
                message,
            },
            Err(err) => {
                tracing::warn!("workflow tool '{}' failed: {}", name, err);
                ToolResponse {
                    success: false,
                    action: name,
                    result: None,
                    error: Some(err.kind().to_string()),
                    message: err.to_string(),
                }
            }
        }
    }

    async fn execute(&self, action: WorkflowAction) -> Result<(Value, String)> {
        // Identity first: no action runs without a caller.
        let user = self
            .session
            .current_user()
            .ok_or(WorkflowError::Unauthenticated)?;

        match action {
            WorkflowAction::Create {
                name,
                description,
                icon,
                visibility,
                is_published,
            } => {
                let draft = WorkflowDraft {
                    name: Some(name),
                    description,
                    icon,
                    visibility,
                    is_published,
                    user_id: Some(user.id.clone()),
                    user_name: user.name.clone(),
                    user_avatar: user.avatar.clone(),
                    ..Default::default()
                };
                let workflow = self.repository.save(draft, None).await?;
                let message = format!("Workflow '{}' created with id {}", workflow.name, workflow.id);
                Ok((to_value(&workflow)?, message))
            }

            WorkflowAction::Read {
                id,
                include_structure,
            } => {
                let id = parse_workflow_id(&id)?;
                let workflow = self.fetch_checked(id, &user, false).await?;
                if include_structure {
                    let structure = self
                        .repository
                        .select_structure_by_id(id)
                        .await?
                        .ok_or(WorkflowError::NotFound(id))?;
                    let message = format!(
                        "Workflow '{}' with {} nodes and {} edges",
                        structure.workflow.name,
                        structure.nodes.len(),
                        structure.edges.len()
                    );
                    Ok((to_value(&structure)?, message))
                } else {
                    let message = format!("Workflow '{}'", workflow.name);
                    Ok((to_value(&workflow)?, message))
                }
            }

            WorkflowAction::Update {
                id,
                name,
                description,
                icon,
                visibility,
                is_published,
            } => {
                let id = parse_workflow_id(&id)?;
                let current = self.fetch_checked(id, &user, true).await?;
                let draft = WorkflowDraft {
                    id: Some(id),
                    name,
                    description,
                    icon,
                    visibility,
                    is_published,
                    ..Default::default()
                };
                let updated = self.repository.save(draft, Some(current.version)).await?;
                let message = format!(
                    "Workflow '{}' updated to version {}",
                    updated.name, updated.version
                );
                Ok((to_value(&updated)?, message))
            }

            WorkflowAction::Delete { id, confirm } => {
                let id = parse_workflow_id(&id)?;
                if !confirm {
                    return Err(WorkflowError::NotConfirmed);
                }
                let workflow = self.fetch_checked(id, &user, true).await?;
                if !self.repository.delete(id).await? {
                    return Err(WorkflowError::NotFound(id));
                }
                let message = format!("Workflow '{}' and its structure deleted", workflow.name);
                Ok((json!({ "id": id, "deleted": true }), message))
            }

            WorkflowAction::List {
                include_owned,
                include_public,
                include_readonly,
                limit,
            } => {
                let include_owned = include_owned.unwrap_or(true);
                let include_public = include_public.unwrap_or(true);
                let include_readonly = include_readonly.unwrap_or(true);
                let limit = limit.unwrap_or(50).clamp(1, 100) as usize;

                let mut workflows = self.repository.select_all(&user.id).await?;
                workflows.retain(|w| {
                    if w.user_id == user.id {
                        include_owned
                    } else {
                        match w.visibility {
                            Visibility::Public => include_public,
                            Visibility::Readonly => include_readonly,
                            Visibility::Private => false,
                        }
                    }
                });
                workflows.truncate(limit);

                let message = format!("{} workflow(s) visible", workflows.len());
                Ok((to_value(&workflows)?, message))
            }

            WorkflowAction::UpdateStructure {
                id,
                nodes,
                edges,
                delete_nodes,
                delete_edges,
            } => {
                let id = parse_workflow_id(&id)?;
                let current = self.fetch_checked(id, &user, true).await?;
                let batch = StructureBatch {
                    upsert_nodes: nodes,
                    upsert_edges: edges,
                    delete_node_ids: delete_nodes,
                    delete_edge_ids: delete_edges,
                };
                let report = self
                    .repository
                    .save_structure(id, batch, Some(current.version))
                    .await?;
                let message = format!(
                    "Structure updated: {} node(s) and {} edge(s) upserted, {} node(s) and {} edge(s) removed",
                    report.nodes_upserted,
                    report.edges_upserted,
                    report.nodes_deleted,
                    report.edges_deleted
                );
                let result = json!({
                    "id": id,
                    "nodesUpserted": report.nodes_upserted,
                    "edgesUpserted": report.edges_upserted,
                    "nodesDeleted": report.nodes_deleted,
                    "edgesDeleted": report.edges_deleted,
                });
                Ok((result, message))
            }

            WorkflowAction::FindByName { workflow_name } => {
                let needle = workflow_name.to_lowercase();
                let mut workflows = self.repository.select_all(&user.id).await?;
                workflows.retain(|w| w.name.to_lowercase().contains(&needle));
                let message = format!(
                    "{} workflow(s) matching '{}'",
                    workflows.len(),
                    workflow_name
                );
                Ok((to_value(&workflows)?, message))
            }
        }
    }

    /// Fetch a workflow and gate it through the access evaluator
    ///
    /// Missing records surface as `NotFound`; present-but-forbidden ones as
    /// `Unauthorized`, so callers can tell the two apart.
    async fn fetch_checked(
        &self,
        id: Uuid,
        user: &SessionUser,
        destructive: bool,
    ) -> Result<Workflow> {
        let workflow = self
            .repository
            .select_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        if !access::check_access(&workflow, &user.id, destructive) {
            return Err(WorkflowError::Unauthorized(id));
        }
        Ok(workflow)
    }
}

fn parse_workflow_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| WorkflowError::MalformedId(raw.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| WorkflowError::Corrupt(e.to_string()))
}
