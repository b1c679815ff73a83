//! Tool trait and browser tool implementations.
//!
//! The core of this crate is the action completion barrier ([`barrier`]),
//! the inline-vs-file output router ([`output`]) and the console/network
//! aggregators ([`logs`]); [`browser`] wires them into executable tools
//! over a CDP page, with [`cdp`] adapting chromiumoxide events to the
//! [`events::PageEvents`] seam.

pub mod barrier;
pub mod browser;
pub mod cdp;
pub mod events;
pub mod logs;
pub mod output;

pub use barrier::{ACTION_DEADLINE, ActionBarrier, ActionOutcome, is_navigation_race};
pub use browser::{
    BrowserClickTool, BrowserConsoleTool, BrowserEvaluateTool, BrowserLaunchOptions,
    BrowserNavigateTool, BrowserNetworkTool, BrowserSnapshotTool, BrowserState, BrowserTypeTool,
    SharedBrowser,
};
pub use cdp::CdpPageEvents;
pub use events::{LoadState, PageEvent, PageEvents};
pub use logs::{ConsoleLog, ConsoleSummary, MessageLevel, MessageRecord, NetworkLog, NetworkSummary, RequestRecord};
pub use output::{OutputDecision, OutputDirective, OutputKind, OutputRouter};

use async_trait::async_trait;
use proto::{ToolDefinition, ToolResult};

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to callers.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// JSON schema for accepted tool arguments.
    fn parameters_schema(&self) -> serde_json::Value;
    /// Executes the tool with the given call id and JSON args.
    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult;

    /// Definition bundle advertised to callers.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }
}
