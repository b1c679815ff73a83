//! chromiumoxide-backed event source and log recorders.
//!
//! Protocol handling stays in chromiumoxide; this module only forwards
//! typed CDP events into the shapes the barrier and the aggregators
//! consume.

use std::collections::HashMap;
use std::sync::Arc;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::log as cdp_log;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventDomContentEventFired, EventFrameNavigated, EventLoadEventFired,
};
use futures_util::StreamExt;
use futures_util::stream::select_all;
use proto::PageError;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{LoadState, PageEvent, PageEvents};
use crate::logs::{
    ConsoleLog, MessageLevel, MessageRecord, NetworkLog, RequestOutcome, RequestRecord,
    RequestTiming,
};

use async_trait::async_trait;

const EVENT_CHANNEL_CAPACITY: usize = 256;

fn cdp_err(err: chromiumoxide::error::CdpError) -> PageError {
    PageError::Cdp(err.to_string())
}

fn request_id(id: &network::RequestId) -> String {
    id.inner().clone()
}

/// Request-lifecycle events merged into one stream for correlation.
enum NetEvent {
    Sent(Arc<EventRequestWillBeSent>),
    Response(Arc<EventResponseReceived>),
    Finished(Arc<EventLoadingFinished>),
    Failed(Arc<EventLoadingFailed>),
}

/// Accumulates one request's fields until its terminal event arrives.
struct InflightRequest {
    method: String,
    url: String,
    status: Option<u16>,
    timing: Option<RequestTiming>,
}

impl InflightRequest {
    fn into_record(self, outcome: RequestOutcome) -> RequestRecord {
        RequestRecord {
            method: self.method,
            url: self.url,
            status: self.status,
            timing: self.timing,
            outcome,
        }
    }
}

/// Fans typed CDP events out to barrier subscribers and records console and
/// network activity into the shared logs.
///
/// Forwarder tasks are aborted when the adapter is dropped.
pub struct CdpPageEvents {
    page: Page,
    tx: broadcast::Sender<PageEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl CdpPageEvents {
    /// Enables the required CDP domains and attaches forwarders and
    /// recorders to `page`.
    pub async fn attach(
        page: Page,
        console: Arc<Mutex<ConsoleLog>>,
        network: Arc<Mutex<NetworkLog>>,
    ) -> Result<Self, PageError> {
        page.execute(network::EnableParams::default())
            .await
            .map_err(cdp_err)?;
        page.execute(cdp_log::EnableParams::default())
            .await
            .map_err(cdp_err)?;

        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut tasks = Vec::new();

        // Top-frame navigations.
        let mut navigations = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(cdp_err)?;
        let nav_tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = navigations.next().await {
                if event.frame.parent_id.is_none() {
                    debug!(url = %event.frame.url, "forwarding top-frame navigation");
                    let _ = nav_tx.send(PageEvent::Navigated {
                        url: event.frame.url.clone(),
                    });
                }
            }
        }));

        // Request lifecycle: barrier events plus network records.
        let sent = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_err)?
            .map(NetEvent::Sent)
            .boxed();
        let received = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_err)?
            .map(NetEvent::Response)
            .boxed();
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_err)?
            .map(NetEvent::Finished)
            .boxed();
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_err)?
            .map(NetEvent::Failed)
            .boxed();
        let mut requests = select_all([sent, received, finished, failed]);

        let net_tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            let mut inflight: HashMap<String, InflightRequest> = HashMap::new();
            while let Some(event) = requests.next().await {
                match event {
                    NetEvent::Sent(ev) => {
                        let id = request_id(&ev.request_id);
                        inflight.insert(
                            id.clone(),
                            InflightRequest {
                                method: ev.request.method.clone(),
                                url: ev.request.url.clone(),
                                status: None,
                                timing: None,
                            },
                        );
                        let _ = net_tx.send(PageEvent::RequestStarted { request_id: id });
                    }
                    NetEvent::Response(ev) => {
                        let id = request_id(&ev.request_id);
                        if let Some(request) = inflight.get_mut(&id) {
                            request.status = u16::try_from(ev.response.status).ok();
                            request.timing = ev.response.timing.as_ref().map(|t| RequestTiming {
                                request_start: t.send_start,
                                response_start: t.receive_headers_end,
                            });
                        }
                    }
                    NetEvent::Finished(ev) => {
                        let id = request_id(&ev.request_id);
                        if let Some(request) = inflight.remove(&id) {
                            network
                                .lock()
                                .await
                                .push(request.into_record(RequestOutcome::Success));
                        }
                        let _ = net_tx.send(PageEvent::RequestFinished { request_id: id });
                    }
                    NetEvent::Failed(ev) => {
                        let id = request_id(&ev.request_id);
                        if let Some(request) = inflight.remove(&id) {
                            network
                                .lock()
                                .await
                                .push(request.into_record(RequestOutcome::Failed));
                        }
                        let _ = net_tx.send(PageEvent::RequestFailed { request_id: id });
                    }
                }
            }
        }));

        // Console messages.
        let mut entries = page
            .event_listener::<cdp_log::EventEntryAdded>()
            .await
            .map_err(cdp_err)?;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = entries.next().await {
                let level = match event.entry.level {
                    cdp_log::LogEntryLevel::Verbose => MessageLevel::Log,
                    cdp_log::LogEntryLevel::Info => MessageLevel::Info,
                    cdp_log::LogEntryLevel::Warning => MessageLevel::Warning,
                    cdp_log::LogEntryLevel::Error => MessageLevel::Error,
                };
                console
                    .lock()
                    .await
                    .push(MessageRecord::new(level, event.entry.text.clone()));
            }
        }));

        Ok(Self { page, tx, tasks })
    }

    /// Best-effort readyState probe. The event subscription is already in
    /// place when this runs, so a false negative only costs waiting for the
    /// event itself.
    async fn ready_state_reached(&self, accepted: &[&str]) -> bool {
        let ready = self
            .page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|result| result.into_value::<String>().ok());
        ready.is_some_and(|state| accepted.contains(&state.as_str()))
    }
}

#[async_trait]
impl PageEvents for CdpPageEvents {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    async fn wait_for_load_state(&self, state: LoadState) -> Result<(), PageError> {
        match state {
            LoadState::Load => {
                let mut fired = self
                    .page
                    .event_listener::<EventLoadEventFired>()
                    .await
                    .map_err(cdp_err)?;
                if self.ready_state_reached(&["complete"]).await {
                    return Ok(());
                }
                fired.next().await;
            }
            LoadState::DomContentLoaded => {
                let mut fired = self
                    .page
                    .event_listener::<EventDomContentEventFired>()
                    .await
                    .map_err(cdp_err)?;
                if self.ready_state_reached(&["interactive", "complete"]).await {
                    return Ok(());
                }
                fired.next().await;
            }
        }
        Ok(())
    }
}

impl Drop for CdpPageEvents {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflight_request_keeps_collected_fields_in_the_record() {
        let inflight = InflightRequest {
            method: "GET".to_string(),
            url: "https://example.com/app.js".to_string(),
            status: Some(200),
            timing: Some(RequestTiming {
                request_start: 1.0,
                response_start: 41.0,
            }),
        };

        let record = inflight.into_record(RequestOutcome::Success);
        assert_eq!(record.method, "GET");
        assert_eq!(record.status, Some(200));
        assert_eq!(record.duration_ms(), Some(40.0));
        assert!(!record.is_failure());
    }
}
