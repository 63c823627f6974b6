/// HTTP API Layer
///
/// REST endpoints over the workflow repository and the tool adapter:
/// - Structure fetch and sync per workflow
/// - The agent-tool contract as a single POST route
/// - Header-based session resolution

// Session collaborator (caller identity)
pub mod auth;

// Workflow endpoints and router builder
pub mod workflows;

// Re-export router builder and state
pub use workflows::{create_workflow_routes, AppState};
