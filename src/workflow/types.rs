/// Core workflow type definitions
///
/// Defines the fundamental structures for workflow definitions: the owned,
/// visibility-scoped workflow record and its node/edge graph. These types are
/// serialized/deserialized from JSON for persistence and for the HTTP/tool
/// wire contract (camelCase field names).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who may read or write a workflow besides its owner
///
/// Visibility and `is_published` are orthogonal axes: publishing a workflow
/// does not share it, and sharing does not publish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner can see or change the workflow
    #[default]
    Private,
    /// Anyone can read and write
    Public,
    /// Anyone can read, only the owner can write
    Readonly,
}

impl Visibility {
    /// Storage representation (TEXT column)
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
            Visibility::Readonly => "readonly",
        }
    }

    /// Parse the storage representation back
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Visibility::Private),
            "public" => Some(Visibility::Public),
            "readonly" => Some(Visibility::Readonly),
            _ => None,
        }
    }
}

/// Display icon attached to a workflow
///
/// Tagged variant so new icon sources (uploads, URLs) can be added without
/// breaking stored records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkflowIcon {
    /// Emoji icon with optional renderer-specific styling
    Emoji {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<Value>,
    },
}

/// A workflow definition record (metadata only, no structure)
///
/// The graph itself lives in separate node/edge tables and is loaded through
/// `select_structure_by_id`. `version` is a monotonic counter bumped on every
/// committed metadata or structural change and doubles as the optimistic
/// concurrency token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier
    pub id: Uuid,
    /// Human-readable workflow name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<WorkflowIcon>,
    /// Non-owner read/write eligibility
    pub visibility: Visibility,
    /// Published for execution (independent of visibility)
    pub is_published: bool,
    /// Monotonic change counter, bumped on every committed write
    pub version: i64,
    /// Owning user id
    pub user_id: String,
    /// Denormalized owner display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Denormalized owner avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing projection of a workflow (no structure, no created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<WorkflowIcon>,
    pub visibility: Visibility,
    pub is_published: bool,
    pub version: i64,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A workflow together with its full node/edge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStructure {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// On-canvas placement of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// UI-layer configuration for a node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUiConfig {
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Value>,
}

/// UI-layer configuration for an edge (connection handles etc.)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeUiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Value>,
}

/// A single node in a workflow graph
///
/// `kind` is an open string tag identifying the node's behavior; the engine
/// that eventually runs workflows owns its semantics. `node_config` is an
/// opaque key/value object whose schema belongs to the `kind` — unknown kinds
/// are stored as-is for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node identifier within the workflow (e.g. "n1", "start")
    pub id: String,
    pub workflow_id: Uuid,
    /// Behavior tag (e.g. "start", "http", "llm")
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Kind-specific configuration as a flexible JSON object
    pub node_config: Value,
    pub ui_config: NodeUiConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A directed connection between two nodes of the same workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique edge identifier within the workflow
    pub id: String,
    pub workflow_id: Uuid,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    pub ui_config: EdgeUiConfig,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or updating workflow metadata
///
/// `id: None` means create; `id: Some(..)` means update. On update, only the
/// `Some` fields are merged onto the existing record — the owner columns are
/// fixed at creation and never patched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<WorkflowIcon>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub is_published: Option<bool>,
    /// Owner identity, used on create only
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_avatar: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Node upsert input for structure sync (no server-assigned fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDraft {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub node_config: Value,
    #[serde(default)]
    pub ui_config: NodeUiConfig,
}

/// Edge upsert input for structure sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDraft {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub ui_config: EdgeUiConfig,
}
