/// Workflow Definition Layer
///
/// This module owns the workflow data model and everything that guards it:
/// - Type definitions (Workflow, Node, Edge, drafts)
/// - The pure visibility/ownership access evaluator
/// - Structure sync batches with post-state referential validation
/// - SQLite persistence with optimistic concurrency

// Core workflow type definitions
pub mod types;

// Typed error taxonomy shared across the crate
pub mod error;

// Pure access-control decision function
pub mod access;

// Structure sync batches and referential validation
pub mod sync;

// SQLite persistence layer
pub mod repository;

// Re-export commonly used types
pub use error::{Result, WorkflowError};
pub use repository::{StructureReport, WorkflowRepository};
pub use sync::StructureBatch;
pub use types::{
    Edge, EdgeDraft, Node, NodeDraft, Visibility, Workflow, WorkflowDraft, WorkflowIcon,
    WorkflowStructure, WorkflowSummary,
};
