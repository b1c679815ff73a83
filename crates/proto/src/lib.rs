//! Shared protocol types for the pagepilot browser tool suite.
//!
//! This crate defines serializable tool call/definition/result structures
//! and strongly-typed error enums shared across the workspace.

pub mod error;
pub mod tool;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of tool call definition and result types.
pub use tool::{ToolCall, ToolDefinition, ToolResult};
