/// SQLite persistence layer for workflow definitions
///
/// Composes access control and structure synchronization with storage:
/// metadata CRUD, graph fetch, visibility-scoped listings, and the atomic
/// structure sync transaction. Uses a JSON column for opaque config bags
/// while keeping lookup fields indexed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::workflow::access;
use crate::workflow::error::{Result, WorkflowError};
use crate::workflow::sync::{validate_batch, EdgeRef, StructureBatch};
use crate::workflow::types::{
    Edge, Node, Visibility, Workflow, WorkflowDraft, WorkflowIcon, WorkflowStructure,
    WorkflowSummary,
};

/// Counts reported back from a committed structure sync
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureReport {
    pub nodes_upserted: u64,
    pub edges_upserted: u64,
    pub nodes_deleted: u64,
    pub edges_deleted: u64,
}

/// SQLite-backed workflow repository
///
/// One instance per process, constructed explicitly and injected into each
/// handler through application state. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct WorkflowRepository {
    pool: SqlitePool,
}

impl WorkflowRepository {
    /// Create a new repository over an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the workflow storage schema
    ///
    /// Creates the workflow, node and edge tables plus lookup indexes.
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                icon JSON,
                visibility TEXT NOT NULL DEFAULT 'private',
                is_published INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                user_id TEXT NOT NULL,
                user_name TEXT,
                user_avatar TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_nodes (
                workflow_id TEXT NOT NULL,
                id TEXT NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                node_config JSON NOT NULL,
                ui_config JSON NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                PRIMARY KEY (workflow_id, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_edges (
                workflow_id TEXT NOT NULL,
                id TEXT NOT NULL,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                ui_config JSON NOT NULL,
                created_at TIMESTAMP NOT NULL,
                PRIMARY KEY (workflow_id, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes for name lookups and owner-scoped listings
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_workflows_name ON workflows(name)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_workflows_user ON workflows(user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create a new workflow or update an existing one's metadata
    ///
    /// A draft without an id is an insert: the repository assigns a fresh
    /// UUID, version 1, and defaults (`private`, unpublished). A draft with
    /// an id merges only the provided fields onto the stored record and bumps
    /// `version`. When `expected_version` is supplied the update is guarded:
    /// a concurrent bump since the caller's read fails with `Conflict`.
    pub async fn save(
        &self,
        draft: WorkflowDraft,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        match draft.id {
            None => self.insert(draft).await,
            Some(id) => self.update(id, draft, expected_version).await,
        }
    }

    async fn insert(&self, draft: WorkflowDraft) -> Result<Workflow> {
        let name = draft
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WorkflowError::Validation("workflow name is required".into()))?
            .to_string();
        let user_id = draft
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| WorkflowError::Validation("workflow owner is required".into()))?
            .to_string();

        let id = Uuid::new_v4();
        let now = Utc::now();
        let visibility = draft.visibility.unwrap_or_default();
        let icon_json = encode_icon(&draft.icon)?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, name, description, icon, visibility, is_published, version,
                 user_id, user_name, user_avatar, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&name)
        .bind(&draft.description)
        .bind(&icon_json)
        .bind(visibility.as_str())
        .bind(draft.is_published.unwrap_or(false))
        .bind(&user_id)
        .bind(&draft.user_name)
        .bind(&draft.user_avatar)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::info!("📋 Created workflow {} ('{}') for user {}", id, name, user_id);

        self.select_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::Corrupt(format!("workflow {} vanished after insert", id)))
    }

    async fn update(
        &self,
        id: Uuid,
        draft: WorkflowDraft,
        expected_version: Option<i64>,
    ) -> Result<Workflow> {
        let current = self
            .select_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if let Some(name) = draft.name.as_deref() {
            if name.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "workflow name must not be empty".into(),
                ));
            }
        }

        let name = draft.name.unwrap_or(current.name);
        let description = draft.description.or(current.description);
        let icon = draft.icon.or(current.icon);
        let visibility = draft.visibility.unwrap_or(current.visibility);
        let is_published = draft.is_published.unwrap_or(current.is_published);
        let icon_json = encode_icon(&icon)?;
        let now = Utc::now();

        let query = if expected_version.is_some() {
            r#"
            UPDATE workflows
            SET name = ?, description = ?, icon = ?, visibility = ?,
                is_published = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#
        } else {
            r#"
            UPDATE workflows
            SET name = ?, description = ?, icon = ?, visibility = ?,
                is_published = ?, version = version + 1, updated_at = ?
            WHERE id = ?
            "#
        };

        let mut update = sqlx::query(query)
            .bind(&name)
            .bind(&description)
            .bind(&icon_json)
            .bind(visibility.as_str())
            .bind(is_published)
            .bind(now)
            .bind(id.to_string());
        if let Some(version) = expected_version {
            update = update.bind(version);
        }

        let affected = update.execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            // Distinguish a stale version from a record deleted underneath us.
            return match self.select_by_id(id).await? {
                Some(_) => Err(WorkflowError::Conflict {
                    id,
                    expected: expected_version.unwrap_or(current.version),
                }),
                None => Err(WorkflowError::NotFound(id)),
            };
        }

        tracing::info!("📋 Updated workflow {} ('{}')", id, name);

        self.select_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// Fetch a workflow's metadata by id
    pub async fn select_by_id(&self, id: Uuid) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(workflow_from_row).transpose()
    }

    /// Fetch a workflow together with its full node/edge graph
    pub async fn select_structure_by_id(&self, id: Uuid) -> Result<Option<WorkflowStructure>> {
        let Some(workflow) = self.select_by_id(id).await? else {
            return Ok(None);
        };

        let node_rows = sqlx::query(
            "SELECT * FROM workflow_nodes WHERE workflow_id = ? ORDER BY created_at, id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let nodes = node_rows
            .iter()
            .map(node_from_row)
            .collect::<Result<Vec<Node>>>()?;

        let edge_rows = sqlx::query(
            "SELECT * FROM workflow_edges WHERE workflow_id = ? ORDER BY created_at, id",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        let edges = edge_rows
            .iter()
            .map(edge_from_row)
            .collect::<Result<Vec<Edge>>>()?;

        Ok(Some(WorkflowStructure {
            workflow,
            nodes,
            edges,
        }))
    }

    /// List every workflow visible to the requester
    ///
    /// Owned workflows plus anything shared as `public` or `readonly`,
    /// newest first.
    pub async fn select_all(&self, requester_id: &str) -> Result<Vec<WorkflowSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, icon, visibility, is_published,
                   version, user_id, user_name, user_avatar, updated_at
            FROM workflows
            WHERE user_id = ? OR visibility IN ('public', 'readonly')
            ORDER BY updated_at DESC
            "#,
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    /// List the workflows the requester may execute
    ///
    /// Owned workflows, plus shared-public ones that are also published.
    /// Read visibility alone is not enough to run someone else's workflow.
    pub async fn select_execute_ability(&self, requester_id: &str) -> Result<Vec<WorkflowSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, icon, visibility, is_published,
                   version, user_id, user_name, user_avatar, updated_at
            FROM workflows
            WHERE user_id = ? OR (visibility = 'public' AND is_published = 1)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_from_row).collect()
    }

    /// Delete a workflow and cascade to all of its nodes and edges
    ///
    /// Returns whether a workflow record was actually removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let id_text = id.to_string();

        sqlx::query("DELETE FROM workflow_edges WHERE workflow_id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM workflow_nodes WHERE workflow_id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await?;
        let affected = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if affected > 0 {
            tracing::info!("🗑️ Deleted workflow {} and its structure", id);
        }
        Ok(affected > 0)
    }

    /// Fetch the workflow and evaluate the access rules against it
    ///
    /// A missing workflow is a plain deny, never an error.
    pub async fn check_access(
        &self,
        id: Uuid,
        requester_id: &str,
        destructive: bool,
    ) -> Result<bool> {
        Ok(match self.select_by_id(id).await? {
            Some(workflow) => access::check_access(&workflow, requester_id, destructive),
            None => false,
        })
    }

    /// Apply one atomic batch of node/edge upserts and deletions
    ///
    /// Validates the batch against the post-mutation graph first, then runs
    /// everything in a single transaction in referential-safety order:
    /// delete edges, delete nodes, upsert nodes, upsert edges. The workflow's
    /// `version` is bumped in the same transaction, always guarded by the
    /// version this call read its validation snapshot at — any concurrent
    /// write bumps the version and invalidates the snapshot, so the bump
    /// affects zero rows and nothing commits. A caller-supplied
    /// `expected_version` is checked on top, catching reads that were
    /// already stale on entry. Any failure commits nothing.
    pub async fn save_structure(
        &self,
        id: Uuid,
        batch: StructureBatch,
        expected_version: Option<i64>,
    ) -> Result<StructureReport> {
        let workflow = self
            .select_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if let Some(expected) = expected_version {
            if expected != workflow.version {
                return Err(WorkflowError::Conflict { id, expected });
            }
        }

        // An empty batch changes nothing and does not consume a version.
        if batch.is_empty() {
            return Ok(StructureReport::default());
        }
        let id_text = id.to_string();

        let existing_node_ids: HashSet<String> =
            sqlx::query("SELECT id FROM workflow_nodes WHERE workflow_id = ?")
                .bind(&id_text)
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(|row| row.try_get::<String, _>("id"))
                .collect::<std::result::Result<_, _>>()?;

        let existing_edges: Vec<EdgeRef> =
            sqlx::query("SELECT id, source, target FROM workflow_edges WHERE workflow_id = ?")
                .bind(&id_text)
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(|row| -> std::result::Result<EdgeRef, sqlx::Error> {
                    Ok(EdgeRef {
                        id: row.try_get("id")?,
                        source: row.try_get("source")?,
                        target: row.try_get("target")?,
                    })
                })
                .collect::<std::result::Result<_, sqlx::Error>>()?;

        validate_batch(&existing_node_ids, &existing_edges, &batch)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut report = StructureReport::default();

        // Version bump doubles as the concurrency guard, keyed to the
        // version the validation snapshot was read at: every committed write
        // bumps the version, so if the graph changed since the snapshot the
        // bump hits zero rows and the whole batch is abandoned before it
        // touches anything.
        let affected = sqlx::query(
            "UPDATE workflows SET version = version + 1, updated_at = ? WHERE id = ? AND version = ?",
        )
        .bind(now)
        .bind(&id_text)
        .bind(workflow.version)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if affected == 0 {
            // Release the transaction's connection before re-reading.
            tx.rollback().await?;
            // Distinguish a concurrent write from a record deleted
            // underneath us.
            return match self.select_by_id(id).await? {
                Some(_) => Err(WorkflowError::Conflict {
                    id,
                    expected: workflow.version,
                }),
                None => Err(WorkflowError::NotFound(id)),
            };
        }

        for edge_id in &batch.delete_edge_ids {
            report.edges_deleted += sqlx::query(
                "DELETE FROM workflow_edges WHERE workflow_id = ? AND id = ?",
            )
            .bind(&id_text)
            .bind(edge_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for node_id in &batch.delete_node_ids {
            report.nodes_deleted += sqlx::query(
                "DELETE FROM workflow_nodes WHERE workflow_id = ? AND id = ?",
            )
            .bind(&id_text)
            .bind(node_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        for node in &batch.upsert_nodes {
            let node_config = serde_json::to_string(&node.node_config)
                .map_err(|e| WorkflowError::Corrupt(e.to_string()))?;
            let ui_config = serde_json::to_string(&node.ui_config)
                .map_err(|e| WorkflowError::Corrupt(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO workflow_nodes
                    (workflow_id, id, kind, name, description, node_config,
                     ui_config, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(workflow_id, id) DO UPDATE SET
                    kind = excluded.kind,
                    name = excluded.name,
                    description = excluded.description,
                    node_config = excluded.node_config,
                    ui_config = excluded.ui_config,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&id_text)
            .bind(&node.id)
            .bind(&node.kind)
            .bind(&node.name)
            .bind(&node.description)
            .bind(&node_config)
            .bind(&ui_config)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            report.nodes_upserted += 1;
        }

        for edge in &batch.upsert_edges {
            let ui_config = serde_json::to_string(&edge.ui_config)
                .map_err(|e| WorkflowError::Corrupt(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO workflow_edges
                    (workflow_id, id, source, target, ui_config, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(workflow_id, id) DO UPDATE SET
                    source = excluded.source,
                    target = excluded.target,
                    ui_config = excluded.ui_config
                "#,
            )
            .bind(&id_text)
            .bind(&edge.id)
            .bind(&edge.source)
            .bind(&edge.target)
            .bind(&ui_config)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            report.edges_upserted += 1;
        }

        tx.commit().await?;

        tracing::info!(
            "🔁 Synced structure for workflow {}: +{} nodes, +{} edges, -{} nodes, -{} edges",
            id,
            report.nodes_upserted,
            report.edges_upserted,
            report.nodes_deleted,
            report.edges_deleted
        );

        Ok(report)
    }
}

fn encode_icon(icon: &Option<WorkflowIcon>) -> Result<Option<String>> {
    icon.as_ref()
        .map(|i| serde_json::to_string(i).map_err(|e| WorkflowError::Corrupt(e.to_string())))
        .transpose()
}

fn decode_icon(raw: Option<String>) -> Result<Option<WorkflowIcon>> {
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| WorkflowError::Corrupt(format!("workflow icon: {}", e)))
    })
    .transpose()
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| WorkflowError::Corrupt(format!("stored uuid: {}", e)))
}

fn parse_visibility(raw: &str) -> Result<Visibility> {
    Visibility::parse(raw)
        .ok_or_else(|| WorkflowError::Corrupt(format!("unknown visibility '{}'", raw)))
}

fn workflow_from_row(row: &SqliteRow) -> Result<Workflow> {
    let id: String = row.try_get("id")?;
    let visibility: String = row.try_get("visibility")?;
    Ok(Workflow {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: decode_icon(row.try_get("icon")?)?,
        visibility: parse_visibility(&visibility)?,
        is_published: row.try_get("is_published")?,
        version: row.try_get("version")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        user_avatar: row.try_get("user_avatar")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<WorkflowSummary> {
    let id: String = row.try_get("id")?;
    let visibility: String = row.try_get("visibility")?;
    Ok(WorkflowSummary {
        id: parse_uuid(&id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: decode_icon(row.try_get("icon")?)?,
        visibility: parse_visibility(&visibility)?,
        is_published: row.try_get("is_published")?,
        version: row.try_get("version")?,
        user_id: row.try_get("user_id")?,
        user_name: row.try_get("user_name")?,
        user_avatar: row.try_get("user_avatar")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn node_from_row(row: &SqliteRow) -> Result<Node> {
    let workflow_id: String = row.try_get("workflow_id")?;
    let node_config: String = row.try_get("node_config")?;
    let ui_config: String = row.try_get("ui_config")?;
    Ok(Node {
        id: row.try_get("id")?,
        workflow_id: parse_uuid(&workflow_id)?,
        kind: row.try_get("kind")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        node_config: serde_json::from_str(&node_config)
            .map_err(|e| WorkflowError::Corrupt(format!("node config: {}", e)))?,
        ui_config: serde_json::from_str(&ui_config)
            .map_err(|e| WorkflowError::Corrupt(format!("node ui config: {}", e)))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn edge_from_row(row: &SqliteRow) -> Result<Edge> {
    let workflow_id: String = row.try_get("workflow_id")?;
    let ui_config: String = row.try_get("ui_config")?;
    Ok(Edge {
        id: row.try_get("id")?,
        workflow_id: parse_uuid(&workflow_id)?,
        source: row.try_get("source")?,
        target: row.try_get("target")?,
        ui_config: serde_json::from_str(&ui_config)
            .map_err(|e| WorkflowError::Corrupt(format!("edge ui config: {}", e)))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{EdgeDraft, NodeDraft};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    // In-memory SQLite must stay on one connection or each checkout would
    // see a different empty database.
    async fn test_repo() -> WorkflowRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let repo = WorkflowRepository::new(pool);
        repo.init_schema().await.expect("schema");
        repo
    }

    fn draft(name: &str, owner: &str) -> WorkflowDraft {
        WorkflowDraft {
            name: Some(name.to_string()),
            user_id: Some(owner.to_string()),
            ..Default::default()
        }
    }

    fn node(id: &str, kind: &str) -> NodeDraft {
        NodeDraft {
            id: id.to_string(),
            kind: kind.to_string(),
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

    #[tokio::test]
    async fn create_assigns_defaults() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();
        assert_eq!(w.name, "My Flow");
        assert_eq!(w.visibility, Visibility::Private);
        assert!(!w.is_published);
        assert_eq!(w.version, 1);
        assert_eq!(w.user_id, "alice");
    }

    #[tokio::test]
    async fn create_without_name_is_rejected() {
        let repo = test_repo().await;
        let mut d = draft("  ", "alice");
        d.name = Some("  ".to_string());
        let err = repo.save(d, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn whitespace_owner_is_rejected() {
        let repo = test_repo().await;
        let err = repo.save(draft("My Flow", "   "), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn update_merges_fields_and_bumps_version() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let patch = WorkflowDraft {
            id: Some(w.id),
            visibility: Some(Visibility::Public),
            ..Default::default()
        };
        let updated = repo.save(patch, Some(w.version)).await.unwrap();
        assert_eq!(updated.name, "My Flow");
        assert_eq!(updated.visibility, Visibility::Public);
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let first = WorkflowDraft {
            id: Some(w.id),
            name: Some("renamed".to_string()),
            ..Default::default()
        };
        repo.save(first, Some(w.version)).await.unwrap();

        // Second writer still holds version 1.
        let second = WorkflowDraft {
            id: Some(w.id),
            name: Some("clobbered".to_string()),
            ..Default::default()
        };
        let err = repo.save(second, Some(w.version)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict { .. }));

        let current = repo.select_by_id(w.id).await.unwrap().unwrap();
        assert_eq!(current.name, "renamed");
    }

    #[tokio::test]
    async fn structure_round_trip() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let batch = StructureBatch {
            upsert_nodes: vec![node("n1", "start")],
            ..Default::default()
        };
        let report = repo.save_structure(w.id, batch, None).await.unwrap();
        assert_eq!(report.nodes_upserted, 1);

        let structure = repo.select_structure_by_id(w.id).await.unwrap().unwrap();
        assert_eq!(structure.nodes.len(), 1);
        assert_eq!(structure.nodes[0].id, "n1");
        assert_eq!(structure.nodes[0].kind, "start");
        assert!(structure.edges.is_empty());
        assert_eq!(structure.workflow.version, 2);

        let batch = StructureBatch {
            delete_node_ids: vec!["n1".to_string()],
            ..Default::default()
        };
        let report = repo.save_structure(w.id, batch, None).await.unwrap();
        assert_eq!(report.nodes_deleted, 1);

        let structure = repo.select_structure_by_id(w.id).await.unwrap().unwrap();
        assert!(structure.nodes.is_empty());
        assert_eq!(structure.workflow.version, 3);
    }

    #[tokio::test]
    async fn dangling_edge_commits_nothing() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let seed = StructureBatch {
            upsert_nodes: vec![node("a", "start")],
            ..Default::default()
        };
        repo.save_structure(w.id, seed, None).await.unwrap();
        let before = repo.select_structure_by_id(w.id).await.unwrap().unwrap();

        let bad = StructureBatch {
            upsert_nodes: vec![node("b", "task")],
            upsert_edges: vec![edge("e1", "b", "ghost")],
            ..Default::default()
        };
        let err = repo.save_structure(w.id, bad, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let after = repo.select_structure_by_id(w.id).await.unwrap().unwrap();
        assert_eq!(after.nodes.len(), before.nodes.len());
        assert_eq!(after.edges.len(), before.edges.len());
        assert_eq!(after.workflow.version, before.workflow.version);
    }

    #[tokio::test]
    async fn stale_structure_sync_is_a_conflict() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let batch = StructureBatch {
            upsert_nodes: vec![node("a", "start")],
            ..Default::default()
        };
        repo.save_structure(w.id, batch.clone(), Some(w.version))
            .await
            .unwrap();

        let err = repo
            .save_structure(w.id, batch, Some(w.version))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict { .. }));
    }

    #[tokio::test]
    async fn concurrent_syncs_cannot_orphan_edges() {
        let repo = test_repo().await;

        // Two individually valid batches that are mutually exclusive: one
        // inserts edge a -> b, the other deletes node b. Whatever the
        // interleaving, at most one may commit, and the surviving graph must
        // never contain an edge whose endpoint is gone.
        for _ in 0..10 {
            let w = repo.save(draft("Race", "alice"), None).await.unwrap();
            let seed = StructureBatch {
                upsert_nodes: vec![node("a", "start"), node("b", "task")],
                ..Default::default()
            };
            repo.save_structure(w.id, seed, None).await.unwrap();

            let add_edge = StructureBatch {
                upsert_edges: vec![edge("e1", "a", "b")],
                ..Default::default()
            };
            let drop_node = StructureBatch {
                delete_node_ids: vec!["b".to_string()],
                ..Default::default()
            };
            let (added, dropped) = tokio::join!(
                repo.save_structure(w.id, add_edge, None),
                repo.save_structure(w.id, drop_node, None),
            );
            assert!(
                !(added.is_ok() && dropped.is_ok()),
                "conflicting batches both committed"
            );

            let structure = repo.select_structure_by_id(w.id).await.unwrap().unwrap();
            let node_ids: HashSet<&str> =
                structure.nodes.iter().map(|n| n.id.as_str()).collect();
            for e in &structure.edges {
                assert!(
                    node_ids.contains(e.source.as_str()) && node_ids.contains(e.target.as_str()),
                    "edge '{}' ({} -> {}) dangles over nodes {:?}",
                    e.id,
                    e.source,
                    e.target,
                    node_ids
                );
            }
        }
    }

    #[tokio::test]
    async fn sync_racing_a_delete_reports_not_found() {
        let repo = test_repo().await;

        for _ in 0..10 {
            let w = repo.save(draft("Doomed", "alice"), None).await.unwrap();
            let batch = StructureBatch {
                upsert_nodes: vec![node("a", "start")],
                ..Default::default()
            };
            let (synced, _) = tokio::join!(
                repo.save_structure(w.id, batch, None),
                repo.delete(w.id),
            );
            // Losing the race to a delete is a not-found, never a conflict.
            match synced {
                Ok(_) => {}
                Err(WorkflowError::NotFound(id)) => assert_eq!(id, w.id),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn upsert_is_insert_or_replace_by_id() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();

        let batch = StructureBatch {
            upsert_nodes: vec![node("n1", "start")],
            ..Default::default()
        };
        repo.save_structure(w.id, batch, None).await.unwrap();

        let mut replacement = node("n1", "http");
        replacement.node_config = json!({"url": "https://example.com"});
        let batch = StructureBatch {
            upsert_nodes: vec![replacement],
            ..Default::default()
        };
        repo.save_structure(w.id, batch, None).await.unwrap();

        let structure = repo.select_structure_by_id(w.id).await.unwrap().unwrap();
        assert_eq!(structure.nodes.len(), 1);
        assert_eq!(structure.nodes[0].kind, "http");
        assert_eq!(
            structure.nodes[0].node_config,
            json!({"url": "https://example.com"})
        );
    }

    #[tokio::test]
    async fn delete_cascades_to_structure() {
        let repo = test_repo().await;
        let w = repo.save(draft("My Flow", "alice"), None).await.unwrap();
        let batch = StructureBatch {
            upsert_nodes: vec![node("a", "start"), node("b", "task")],
            upsert_edges: vec![edge("e1", "a", "b")],
            ..Default::default()
        };
        repo.save_structure(w.id, batch, None).await.unwrap();

        assert!(repo.delete(w.id).await.unwrap());
        assert!(repo.select_by_id(w.id).await.unwrap().is_none());
        assert!(repo.select_structure_by_id(w.id).await.unwrap().is_none());
        // Second delete finds nothing.
        assert!(!repo.delete(w.id).await.unwrap());
    }

    #[tokio::test]
    async fn select_all_applies_visibility() {
        let repo = test_repo().await;
        repo.save(draft("mine-private", "alice"), None).await.unwrap();
        let shared = repo.save(draft("shared", "bob"), None).await.unwrap();
        repo.save(
            WorkflowDraft {
                id: Some(shared.id),
                visibility: Some(Visibility::Readonly),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        repo.save(draft("hidden", "bob"), None).await.unwrap();

        let visible = repo.select_all("alice").await.unwrap();
        let names: Vec<&str> = visible.iter().map(|w| w.name.as_str()).collect();
        assert!(names.contains(&"mine-private"));
        assert!(names.contains(&"shared"));
        assert!(!names.contains(&"hidden"));
    }

    #[tokio::test]
    async fn execute_ability_requires_published_public() {
        let repo = test_repo().await;
        let public_unpublished = repo.save(draft("pub-draft", "bob"), None).await.unwrap();
        repo.save(
            WorkflowDraft {
                id: Some(public_unpublished.id),
                visibility: Some(Visibility::Public),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let runnable = repo.save(draft("pub-live", "bob"), None).await.unwrap();
        repo.save(
            WorkflowDraft {
                id: Some(runnable.id),
                visibility: Some(Visibility::Public),
                is_published: Some(true),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let mine = repo.save(draft("mine", "alice"), None).await.unwrap();

        let runnable_for_alice = repo.select_execute_ability("alice").await.unwrap();
        let ids: Vec<Uuid> = runnable_for_alice.iter().map(|w| w.id).collect();
        assert!(ids.contains(&runnable.id));
        assert!(ids.contains(&mine.id));
        assert!(!ids.contains(&public_unpublished.id));
    }

    #[tokio::test]
    async fn check_access_denies_missing_workflow() {
        let repo = test_repo().await;
        assert!(!repo
            .check_access(Uuid::new_v4(), "alice", false)
            .await
            .unwrap());
    }
}
