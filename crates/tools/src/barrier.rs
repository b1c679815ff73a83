//! Action completion barrier: holds a tool result back until the page has
//! settled after the triggering operation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proto::PageError;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::events::{LoadState, PageEvent, PageEvents};

/// Hard ceiling on waiting for network quiescence after a trigger.
pub const ACTION_DEADLINE: Duration = Duration::from_millis(10_000);
/// Fixed delay applied after resolution to absorb late side effects.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1_000);
/// Window after a navigation-race error in which a navigation event still
/// counts as confirmation of the race.
pub const NAVIGATION_GRACE: Duration = Duration::from_millis(500);

/// Error substrings indicating the engine tore the execution context down
/// underneath an in-flight command. Matched case-insensitively against the
/// rendered error text; derived from the CDP error surface.
const NAVIGATION_RACE_MARKERS: &[&str] = &[
    "execution context was destroyed",
    "cannot find context with specified id",
    "frame was detached",
    "inspected target navigated or closed",
    "net::err_aborted",
];

/// Returns `true` when the error text indicates a benign navigation race.
pub fn is_navigation_race(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    NAVIGATION_RACE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Result of a trigger run through the barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome<T> {
    /// The trigger produced a value.
    Completed(T),
    /// A navigation interrupted the trigger; no value is available.
    NavigatedAway,
}

impl<T> ActionOutcome<T> {
    /// Returns the completed value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            ActionOutcome::Completed(value) => Some(value),
            ActionOutcome::NavigatedAway => None,
        }
    }
}

/// In-flight request set and navigation flag for one barrier call.
///
/// Membership changes only through observed request-start/request-end
/// events; a committed navigation abandons request tracking entirely.
#[derive(Default)]
struct ActivityWatch {
    pending: HashSet<String>,
    navigated: bool,
}

impl ActivityWatch {
    fn apply(&mut self, event: PageEvent) {
        match event {
            PageEvent::RequestStarted { request_id } => {
                self.pending.insert(request_id);
            }
            PageEvent::RequestFinished { request_id } | PageEvent::RequestFailed { request_id } => {
                self.pending.remove(&request_id);
            }
            PageEvent::Navigated { url } => {
                debug!(%url, "top frame navigated");
                self.navigated = true;
                self.pending.clear();
            }
        }
    }

    /// Applies events already queued on the receiver without waiting.
    fn catch_up(&mut self, rx: &mut broadcast::Receiver<PageEvent>) {
        loop {
            match rx.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "page event stream lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Synchronization point between a triggering page operation and the moment
/// its result is reported.
///
/// One `run` call subscribes to the event source, drives the trigger, and
/// resolves exactly once via one of four paths: immediate quiescence, the
/// last in-flight request completing, a committed navigation followed by the
/// `load` state, or the deadline. A fixed settle delay is applied after
/// resolution. The event receiver and all timers are dropped on every exit
/// path.
pub struct ActionBarrier {
    events: Arc<dyn PageEvents>,
    deadline: Duration,
    settle: Duration,
    grace: Duration,
}

impl ActionBarrier {
    /// Creates a barrier over `events` with the default timings.
    pub fn new(events: Arc<dyn PageEvents>) -> Self {
        Self::with_timings(events, ACTION_DEADLINE, SETTLE_DELAY, NAVIGATION_GRACE)
    }

    /// Creates a barrier with explicit deadline, settle and grace durations.
    pub fn with_timings(
        events: Arc<dyn PageEvents>,
        deadline: Duration,
        settle: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            events,
            deadline,
            settle,
            grace,
        }
    }

    /// Runs `trigger` and resolves once the page has settled.
    ///
    /// A trigger error that matches [`is_navigation_race`] is suppressed iff
    /// a top-frame navigation has been observed or arrives within the grace
    /// window; the outcome then becomes [`ActionOutcome::NavigatedAway`].
    /// Any other trigger error propagates unchanged.
    pub async fn run<T, F>(&self, trigger: F) -> Result<ActionOutcome<T>, PageError>
    where
        F: Future<Output = Result<T, PageError>>,
    {
        let mut rx = self.events.subscribe();
        let deadline = tokio::time::Instant::now() + self.deadline;
        let mut watch = ActivityWatch::default();
        let mut open = true;

        tokio::pin!(trigger);

        // Drive the trigger while applying events as they arrive.
        let triggered = loop {
            tokio::select! {
                result = &mut trigger => break result,
                event = rx.recv(), if open => match event {
                    Ok(event) => watch.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "page event stream lagged");
                    }
                    Err(RecvError::Closed) => open = false,
                },
            }
        };

        // Events that raced the trigger's completion still count.
        watch.catch_up(&mut rx);

        let outcome = match triggered {
            Ok(value) => ActionOutcome::Completed(value),
            Err(err) if is_navigation_race(&err.to_string()) => {
                if !watch.navigated && !self.navigation_within_grace(&mut rx, &mut watch).await {
                    return Err(err);
                }
                debug!(error = %err, "suppressed navigation race error");
                ActionOutcome::NavigatedAway
            }
            Err(err) => return Err(err),
        };

        // Wait for network quiescence, a navigation, or the deadline.
        while open && !watch.navigated && !watch.pending.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(
                        pending = watch.pending.len(),
                        "deadline reached with requests in flight"
                    );
                    break;
                }
                event = rx.recv() => match event {
                    Ok(event) => watch.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "page event stream lagged");
                    }
                    Err(RecvError::Closed) => open = false,
                },
            }
        }

        // A committed navigation replaces the deadline with the load state.
        if watch.navigated
            && let Err(err) = self.events.wait_for_load_state(LoadState::Load).await
        {
            debug!(error = %err, "load-state wait failed after navigation");
        }

        tokio::time::sleep(self.settle).await;
        Ok(outcome)
    }

    /// Waits up to the grace window for a navigation confirming a race.
    async fn navigation_within_grace(
        &self,
        rx: &mut broadcast::Receiver<PageEvent>,
        watch: &mut ActivityWatch,
    ) -> bool {
        let grace = tokio::time::sleep(self.grace);
        tokio::pin!(grace);

        while !watch.navigated {
            tokio::select! {
                _ = &mut grace => break,
                event = rx.recv() => match event {
                    Ok(event) => watch.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "page event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        watch.navigated
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct FakeEvents {
        tx: broadcast::Sender<PageEvent>,
        load_delay: Duration,
        load_waits: AtomicUsize,
    }

    impl FakeEvents {
        fn new() -> Arc<Self> {
            Self::with_load_delay(Duration::ZERO)
        }

        fn with_load_delay(load_delay: Duration) -> Arc<Self> {
            let (tx, _) = broadcast::channel(64);
            Arc::new(Self {
                tx,
                load_delay,
                load_waits: AtomicUsize::new(0),
            })
        }

        fn emit(&self, event: PageEvent) {
            let _ = self.tx.send(event);
        }
    }

    #[async_trait]
    impl PageEvents for FakeEvents {
        fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
            self.tx.subscribe()
        }

        async fn wait_for_load_state(&self, _state: LoadState) -> Result<(), PageError> {
            self.load_waits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.load_delay).await;
            Ok(())
        }
    }

    fn started(id: &str) -> PageEvent {
        PageEvent::RequestStarted {
            request_id: id.to_string(),
        }
    }

    fn finished(id: &str) -> PageEvent {
        PageEvent::RequestFinished {
            request_id: id.to_string(),
        }
    }

    fn navigated(url: &str) -> PageEvent {
        PageEvent::Navigated {
            url: url.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_immediately_without_requests_or_navigation() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let start = tokio::time::Instant::now();
        let outcome = barrier.run(async { Ok(7u32) }).await.expect("barrier run");

        assert_eq!(outcome, ActionOutcome::Completed(7));
        // Only the settle delay elapses, never the deadline.
        assert!(start.elapsed() >= SETTLE_DELAY);
        assert!(start.elapsed() < ACTION_DEADLINE);
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_only_after_the_last_request_completes() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let source = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            source.emit(finished("req-1"));
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            source.emit(finished("req-2"));
        });

        let trigger_events = events.clone();
        let start = tokio::time::Instant::now();
        let outcome = barrier
            .run(async move {
                trigger_events.emit(started("req-1"));
                trigger_events.emit(started("req-2"));
                Ok(())
            })
            .await
            .expect("barrier run");

        assert_eq!(outcome, ActionOutcome::Completed(()));
        assert!(start.elapsed() >= Duration::from_millis(3_000));
        assert!(start.elapsed() < ACTION_DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_cancels_deadline_and_waits_for_load_state() {
        let events = FakeEvents::with_load_delay(Duration::from_millis(2_000));
        let barrier = ActionBarrier::new(events.clone());

        let trigger_events = events.clone();
        let start = tokio::time::Instant::now();
        let outcome = barrier
            .run(async move {
                // A request that never completes would otherwise hold the
                // barrier until the deadline.
                trigger_events.emit(started("req-stuck"));
                trigger_events.emit(navigated("https://example.com/next"));
                Ok("clicked")
            })
            .await
            .expect("barrier run");

        assert_eq!(outcome, ActionOutcome::Completed("clicked"));
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(2_000) + SETTLE_DELAY);
        assert!(start.elapsed() < ACTION_DEADLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn force_resolves_at_the_deadline_with_requests_in_flight() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let trigger_events = events.clone();
        let start = tokio::time::Instant::now();
        let outcome = barrier
            .run(async move {
                trigger_events.emit(started("req-stuck"));
                Ok(())
            })
            .await
            .expect("barrier run");

        assert_eq!(outcome, ActionOutcome::Completed(()));
        assert!(start.elapsed() >= ACTION_DEADLINE);
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn suppresses_navigation_race_when_navigation_follows_within_grace() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let source = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            source.emit(navigated("https://example.com/after"));
        });

        let outcome: ActionOutcome<()> = barrier
            .run(async {
                Err(PageError::Cdp(
                    "Execution context was destroyed".to_string(),
                ))
            })
            .await
            .expect("race suppressed");

        assert_eq!(outcome, ActionOutcome::NavigatedAway);
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn suppresses_navigation_race_when_navigation_already_fired() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let trigger_events = events.clone();
        let outcome: ActionOutcome<()> = barrier
            .run(async move {
                trigger_events.emit(navigated("https://example.com/committed"));
                Err(PageError::Cdp("Frame was detached".to_string()))
            })
            .await
            .expect("race suppressed");

        assert_eq!(outcome, ActionOutcome::NavigatedAway);
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_navigation_race_without_navigation() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let start = tokio::time::Instant::now();
        let result: Result<ActionOutcome<()>, PageError> = barrier
            .run(async {
                Err(PageError::Cdp(
                    "Execution context was destroyed".to_string(),
                ))
            })
            .await;

        assert!(matches!(result, Err(PageError::Cdp(_))));
        // The grace window elapsed, the settle delay did not.
        assert!(start.elapsed() >= NAVIGATION_GRACE);
        assert!(start.elapsed() < NAVIGATION_GRACE + SETTLE_DELAY);
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_unrelated_trigger_errors() {
        let events = FakeEvents::new();
        let barrier = ActionBarrier::new(events.clone());

        let result: Result<ActionOutcome<()>, PageError> = barrier
            .run(async { Err(PageError::Evaluate("ReferenceError: x".to_string())) })
            .await;

        assert!(matches!(result, Err(PageError::Evaluate(_))));
        assert_eq!(events.load_waits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn navigation_race_markers_match_case_insensitively() {
        assert!(is_navigation_race("Execution context was destroyed"));
        assert!(is_navigation_race("EXECUTION CONTEXT WAS DESTROYED"));
        assert!(is_navigation_race(
            "CDP error: Cannot find context with specified id"
        ));
        assert!(is_navigation_race("Frame was detached"));
        assert!(is_navigation_race("net::ERR_ABORTED"));
        assert!(!is_navigation_race("Node with given id does not belong"));
        assert!(!is_navigation_race("timeout exceeded"));
    }
}
