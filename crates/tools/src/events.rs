//! Page event model and the event-source seam consumed by the barrier.

use async_trait::async_trait;
use proto::PageError;
use tokio::sync::broadcast;

/// Load lifecycle states a page can be awaited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The document and its subresources finished loading (`load` fired).
    Load,
    /// The initial HTML document was parsed (`DOMContentLoaded` fired).
    DomContentLoaded,
}

/// A page-level event observed while an action is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A network request left the page.
    RequestStarted { request_id: String },
    /// A network request completed successfully.
    RequestFinished { request_id: String },
    /// A network request failed or was aborted.
    RequestFailed { request_id: String },
    /// The top frame committed a navigation.
    Navigated { url: String },
}

/// Source of page events consumed by the action barrier.
///
/// Implementations fan events out over a broadcast channel so that each
/// barrier call owns an independent receiver, subscribed before its trigger
/// runs. The source is observed, never mutated.
#[async_trait]
pub trait PageEvents: Send + Sync {
    /// Returns a fresh receiver delivering all subsequent page events.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Resolves once the page reaches the given load state.
    async fn wait_for_load_state(&self, state: LoadState) -> Result<(), PageError>;
}
