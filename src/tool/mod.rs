/// Workflow Tool Layer
///
/// The outward-facing dispatcher over workflow operations, shared by the
/// HTTP tool route and AI-agent tool hosts:
/// - Closed action enum (the wire contract)
/// - Dispatcher converting every outcome into a uniform envelope

// Agent-tool request contract
pub mod actions;

// Dispatcher and response envelope
pub mod adapter;

// Re-export the tool surface
pub use actions::WorkflowAction;
pub use adapter::{ToolResponse, WorkflowToolAdapter};
