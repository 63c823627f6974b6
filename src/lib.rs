/// Flowvault: workflow definition vault
///
/// This library provides the storage and access layer for graph-structured
/// workflow definitions: ownership and visibility-based access control,
/// atomic node/edge structure sync, and a uniform tool contract exposed both
/// over HTTP and to AI-agent hosts. Execution of workflows is out of scope;
/// a separate engine reads definitions from here.

// Core configuration and setup
pub mod config;

// Workflow definition layer - types, access control, sync, persistence
pub mod workflow;

// Tool layer - the action contract and its dispatcher
pub mod tool;

// HTTP API layer - REST endpoints and session resolution
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use api::auth::{SessionProvider, SessionUser, StaticSession};
pub use server::start_server;
pub use tool::{ToolResponse, WorkflowAction, WorkflowToolAdapter};
pub use workflow::{
    Edge, Node, Visibility, Workflow, WorkflowError, WorkflowRepository, WorkflowStructure,
};
