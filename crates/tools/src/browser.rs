//! Browser automation tools backed by Chromium CDP.
//!
//! Page-mutating tools run their operation through the [`ActionBarrier`] so
//! results reflect the settled page; capture tools hand their content to the
//! [`OutputRouter`] for inline-vs-file placement.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use proto::{OutputError, PageError, ToolResult};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::Tool;
use crate::barrier::{ActionBarrier, ActionOutcome};
use crate::cdp::CdpPageEvents;
use crate::events::PageEvents;
use crate::logs::{ConsoleLog, MessageLevel, MessageRecord, NetworkLog, RequestRecord};
use crate::output::{
    Destination, OutputDecision, OutputDirective, OutputKind, OutputRouter, encode_pretty_json,
};

/// Tool that navigates the shared browser page to a URL.
pub struct BrowserNavigateTool {
    state: SharedBrowser,
}
/// Tool that clicks an element on the shared browser page.
pub struct BrowserClickTool {
    state: SharedBrowser,
}
/// Tool that types text into an element on the shared browser page.
pub struct BrowserTypeTool {
    state: SharedBrowser,
}
/// Tool that evaluates JavaScript on the shared browser page.
pub struct BrowserEvaluateTool {
    state: SharedBrowser,
    router: Arc<OutputRouter>,
}
/// Tool that captures the page HTML.
pub struct BrowserSnapshotTool {
    state: SharedBrowser,
    router: Arc<OutputRouter>,
}
/// Tool that reads the recorded console log.
pub struct BrowserConsoleTool {
    state: SharedBrowser,
    router: Arc<OutputRouter>,
}
/// Tool that reads the recorded network log.
pub struct BrowserNetworkTool {
    state: SharedBrowser,
    router: Arc<OutputRouter>,
}

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_TIMEOUT_SECS: u64 = 60;

/// Handle shared by every tool operating on the same browser.
pub type SharedBrowser = Arc<Mutex<BrowserState>>;

/// Options applied when the browser is first launched.
#[derive(Debug, Clone)]
pub struct BrowserLaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
}

impl Default for BrowserLaunchOptions {
    fn default() -> Self {
        Self { headless: true }
    }
}

/// Lazily-launched browser, page, event adapter and session logs.
pub struct BrowserState {
    options: BrowserLaunchOptions,
    browser: Option<Browser>,
    page: Option<Page>,
    events: Option<Arc<CdpPageEvents>>,
    console: Arc<Mutex<ConsoleLog>>,
    network: Arc<Mutex<NetworkLog>>,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserState {
    /// Creates an unlaunched browser state.
    pub fn new(options: BrowserLaunchOptions) -> Self {
        Self {
            options,
            browser: None,
            page: None,
            events: None,
            console: Arc::new(Mutex::new(ConsoleLog::new())),
            network: Arc::new(Mutex::new(NetworkLog::new())),
            handler_task: None,
        }
    }

    /// Creates a shared handle suitable for tool construction.
    pub fn shared(options: BrowserLaunchOptions) -> SharedBrowser {
        Arc::new(Mutex::new(Self::new(options)))
    }

    /// Shared console log handle.
    pub fn console(&self) -> Arc<Mutex<ConsoleLog>> {
        self.console.clone()
    }

    /// Shared network log handle.
    pub fn network(&self) -> Arc<Mutex<NetworkLog>> {
        self.network.clone()
    }

    async fn ensure_ready(&mut self) -> Result<(), PageError> {
        if self.browser.is_none() {
            self.launch().await?;
        }

        if self.page.is_none() {
            let browser = self.browser.as_mut().ok_or(PageError::NotInitialized)?;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| PageError::Cdp(e.to_string()))?;
            let events =
                CdpPageEvents::attach(page.clone(), self.console.clone(), self.network.clone())
                    .await?;
            self.events = Some(Arc::new(events));
            self.page = Some(page);
        }

        Ok(())
    }

    async fn launch(&mut self) -> Result<(), PageError> {
        let mut builder = BrowserConfig::builder();
        if !self.options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(PageError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PageError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        self.handler_task = Some(handler_task);
        Ok(())
    }

    fn page(&self) -> Result<Page, PageError> {
        self.page.clone().ok_or(PageError::NotInitialized)
    }

    fn events(&self) -> Result<Arc<dyn PageEvents>, PageError> {
        self.events
            .clone()
            .map(|events| events as Arc<dyn PageEvents>)
            .ok_or(PageError::NotInitialized)
    }
}

impl Drop for BrowserState {
    fn drop(&mut self) {
        if let Some(handle) = self.handler_task.take() {
            handle.abort();
        }
    }
}

fn operation_timeout(timeout_secs: Option<u64>) -> Duration {
    Duration::from_secs(
        timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS),
    )
}

fn cdp(err: chromiumoxide::error::CdpError) -> PageError {
    PageError::Cdp(err.to_string())
}

/// Renders a routing decision: inline content as-is, file placements as a
/// path + byte-size pair.
fn render_decision(decision: &OutputDecision, content: &str) -> Result<String, OutputError> {
    match &decision.destination {
        Destination::Inline => Ok(content.to_string()),
        Destination::File(path) => Ok(serde_json::to_string(&serde_json::json!({
            "saved_to": path.display().to_string(),
            "size_bytes": decision.size_bytes,
            "reason": decision.reason,
        }))?),
    }
}

#[derive(Debug, Deserialize)]
struct NavigateArgs {
    url: String,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClickArgs {
    selector: String,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TypeArgs {
    selector: String,
    text: String,
    timeout_secs: Option<u64>,
    press_enter: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EvaluateArgs {
    expression: String,
    timeout_secs: Option<u64>,
    save: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SnapshotArgs {
    timeout_secs: Option<u64>,
    save: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConsoleArgs {
    level: Option<String>,
    timeout_secs: Option<u64>,
    save: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NetworkArgs {
    failures_only: Option<bool>,
    slower_than_ms: Option<f64>,
    timeout_secs: Option<u64>,
    save: Option<serde_json::Value>,
}

impl BrowserNavigateTool {
    /// Creates a browser navigation tool over the shared state.
    pub fn new(state: SharedBrowser) -> Self {
        Self { state }
    }
}

impl BrowserClickTool {
    /// Creates a browser click tool over the shared state.
    pub fn new(state: SharedBrowser) -> Self {
        Self { state }
    }
}

impl BrowserTypeTool {
    /// Creates a browser typing tool over the shared state.
    pub fn new(state: SharedBrowser) -> Self {
        Self { state }
    }
}

impl BrowserEvaluateTool {
    /// Creates an evaluation tool routing its result through `router`.
    pub fn new(state: SharedBrowser, router: Arc<OutputRouter>) -> Self {
        Self { state, router }
    }
}

impl BrowserSnapshotTool {
    /// Creates a snapshot tool routing its capture through `router`.
    pub fn new(state: SharedBrowser, router: Arc<OutputRouter>) -> Self {
        Self { state, router }
    }
}

impl BrowserConsoleTool {
    /// Creates a console log tool routing its output through `router`.
    pub fn new(state: SharedBrowser, router: Arc<OutputRouter>) -> Self {
        Self { state, router }
    }
}

impl BrowserNetworkTool {
    /// Creates a network log tool routing its output through `router`.
    pub fn new(state: SharedBrowser, router: Arc<OutputRouter>) -> Self {
        Self { state, router }
    }
}

#[async_trait]
impl Tool for BrowserNavigateTool {
    fn name(&self) -> &str {
        "browser.navigate"
    }

    fn description(&self) -> &str {
        "Navigate the browser page to a URL, wait for it to settle, and return final URL and title"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to navigate to"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: NavigateArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let url = match Url::parse(&parsed.url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
            Ok(_) => {
                return ToolResult::error(
                    call_id,
                    self.name(),
                    "Only http/https URLs are supported".to_string(),
                );
            }
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid URL: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let state = self.state.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let page = state.page()?;
            let barrier = ActionBarrier::new(state.events()?);

            let trigger_page = page.clone();
            let trigger_url = url.clone();
            barrier
                .run(async move {
                    trigger_page.goto(trigger_url.as_str()).await.map_err(cdp)?;
                    Ok(())
                })
                .await?;

            let final_url = page
                .url()
                .await
                .map_err(cdp)?
                .unwrap_or_else(|| url.to_string());
            let title = page.get_title().await.map_err(cdp)?;

            let output = serde_json::json!({
                "action": "navigate",
                "requested_url": url.as_str(),
                "final_url": final_url,
                "title": title,
            });

            Ok::<_, proto::Error>(serde_json::to_string(&output).map_err(OutputError::from)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserClickTool {
    fn name(&self) -> &str {
        "browser.click"
    }

    fn description(&self) -> &str {
        "Click an element on the current browser page and wait for triggered activity to settle"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "selector": {
                    "type": "string",
                    "description": "CSS selector for the element to click"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "required": ["selector"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: ClickArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let selector = parsed.selector;
        let state = self.state.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let page = state.page()?;
            let barrier = ActionBarrier::new(state.events()?);

            let trigger_page = page.clone();
            let trigger_selector = selector.clone();
            let outcome = barrier
                .run(async move {
                    let element = trigger_page
                        .find_element(&trigger_selector)
                        .await
                        .map_err(cdp)?;
                    element.click().await.map_err(cdp)?;
                    Ok(())
                })
                .await?;

            let final_url = page.url().await.map_err(cdp)?.unwrap_or_default();

            let output = serde_json::json!({
                "action": "click",
                "selector": selector,
                "final_url": final_url,
                "interrupted_by_navigation": matches!(outcome, ActionOutcome::NavigatedAway),
            });

            Ok::<_, proto::Error>(serde_json::to_string(&output).map_err(OutputError::from)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserTypeTool {
    fn name(&self) -> &str {
        "browser.type"
    }

    fn description(&self) -> &str {
        "Type text into an element on the current browser page and wait for triggered activity to settle"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "selector": {
                    "type": "string",
                    "description": "CSS selector for the input element"
                },
                "text": {
                    "type": "string",
                    "description": "Text to type into the target element"
                },
                "press_enter": {
                    "type": "boolean",
                    "description": "Press Enter after typing (default: false)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "required": ["selector", "text"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: TypeArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let selector = parsed.selector;
        let text = parsed.text;
        let press_enter = parsed.press_enter.unwrap_or(false);
        let state = self.state.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let page = state.page()?;
            let barrier = ActionBarrier::new(state.events()?);

            let trigger_page = page.clone();
            let trigger_selector = selector.clone();
            let trigger_text = text.clone();
            let outcome = barrier
                .run(async move {
                    let element = trigger_page
                        .find_element(&trigger_selector)
                        .await
                        .map_err(cdp)?;
                    let element = element.click().await.map_err(cdp)?;
                    let element = element.type_str(&trigger_text).await.map_err(cdp)?;
                    if press_enter {
                        element.press_key("Enter").await.map_err(cdp)?;
                    }
                    Ok(())
                })
                .await?;

            let final_url = page.url().await.map_err(cdp)?.unwrap_or_default();

            let output = serde_json::json!({
                "action": "type",
                "selector": selector,
                "typed_chars": text.chars().count(),
                "press_enter": press_enter,
                "final_url": final_url,
                "interrupted_by_navigation": matches!(outcome, ActionOutcome::NavigatedAway),
            });

            Ok::<_, proto::Error>(serde_json::to_string(&output).map_err(OutputError::from)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserEvaluateTool {
    fn name(&self) -> &str {
        "browser.evaluate"
    }

    fn description(&self) -> &str {
        "Evaluate a JavaScript expression on the current page and return the result as JSON"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "JavaScript expression to evaluate"
                },
                "save": {
                    "type": ["boolean", "string"],
                    "description": "true to save to a generated file, false to force inline, or an explicit file name"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: EvaluateArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let directive = match OutputDirective::from_save_arg(parsed.save.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let expression = parsed.expression;
        let state = self.state.clone();
        let router = self.router.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let page = state.page()?;
            let barrier = ActionBarrier::new(state.events()?);

            let outcome = barrier
                .run(async move {
                    let result = page
                        .evaluate(expression)
                        .await
                        .map_err(|e| PageError::Evaluate(e.to_string()))?;
                    Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
                })
                .await?;

            let value = outcome.into_value().unwrap_or(serde_json::Value::Null);
            let encoded = encode_pretty_json(&value)?;
            let decision = router
                .route(OutputKind::Evaluate, &directive, &encoded)
                .await?;

            Ok::<_, proto::Error>(render_decision(&decision, &encoded)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserSnapshotTool {
    fn name(&self) -> &str {
        "browser.snapshot"
    }

    fn description(&self) -> &str {
        "Capture the HTML of the current browser page"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "save": {
                    "type": ["boolean", "string"],
                    "description": "true to save to a generated file, false to force inline, or an explicit file name"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: SnapshotArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let directive = match OutputDirective::from_save_arg(parsed.save.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let state = self.state.clone();
        let router = self.router.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let page = state.page()?;
            let html = page.content().await.map_err(cdp)?;
            let decision = router.route(OutputKind::Snapshot, &directive, &html).await?;

            Ok::<_, proto::Error>(render_decision(&decision, &html)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserConsoleTool {
    fn name(&self) -> &str {
        "browser.console"
    }

    fn description(&self) -> &str {
        "Read recorded console messages, optionally filtered by level, with summary statistics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "level": {
                    "type": "string",
                    "enum": ["log", "info", "warning", "error"],
                    "description": "Only return messages of this level"
                },
                "save": {
                    "type": ["boolean", "string"],
                    "description": "true to save to a generated file, false to force inline, or an explicit file name"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: ConsoleArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let directive = match OutputDirective::from_save_arg(parsed.save.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let level = match parsed.level.as_deref() {
            None => None,
            Some(name) => match MessageLevel::parse(name) {
                Some(level) => Some(level),
                None => {
                    return ToolResult::error(
                        call_id,
                        self.name(),
                        format!("Invalid arguments: unknown level '{name}'"),
                    );
                }
            },
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let state = self.state.clone();
        let router = self.router.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let console = state.console();
            let log = console.lock().await;
            let summary = log.summary();
            let records = log.filtered(level);
            drop(log);

            let lines: Vec<String> = records.iter().map(MessageRecord::to_line).collect();
            let body = lines.join("\n");
            let decision = router.route(OutputKind::Console, &directive, &body).await?;

            let output = match &decision.destination {
                Destination::Inline => serde_json::json!({
                    "summary": summary,
                    "messages": lines,
                }),
                Destination::File(path) => serde_json::json!({
                    "summary": summary,
                    "saved_to": path.display().to_string(),
                    "size_bytes": decision.size_bytes,
                }),
            };

            Ok::<_, proto::Error>(serde_json::to_string(&output).map_err(OutputError::from)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[async_trait]
impl Tool for BrowserNetworkTool {
    fn name(&self) -> &str {
        "browser.network"
    }

    fn description(&self) -> &str {
        "Read recorded network requests, optionally filtered by failure or latency, with summary statistics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "failures_only": {
                    "type": "boolean",
                    "description": "Only return failed requests (status >= 400 or network failure)"
                },
                "slower_than_ms": {
                    "type": "number",
                    "description": "Only return requests slower than this many milliseconds"
                },
                "save": {
                    "type": ["boolean", "string"],
                    "description": "true to save to a generated file, false to force inline, or an explicit file name"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Operation timeout in seconds (default: 15, max: 60)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let parsed: NetworkArgs = match serde_json::from_value(args) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let directive = match OutputDirective::from_save_arg(parsed.save.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };

        let timeout_duration = operation_timeout(parsed.timeout_secs);
        let failures_only = parsed.failures_only.unwrap_or(false);
        let slower_than_ms = parsed.slower_than_ms;
        let state = self.state.clone();
        let router = self.router.clone();

        let run = timeout(timeout_duration, async move {
            let mut state = state.lock().await;
            state.ensure_ready().await?;

            let network = state.network();
            let log = network.lock().await;
            let summary = log.summary();
            let records = match (failures_only, slower_than_ms) {
                (true, None) => log.failures(),
                (false, Some(ms)) => log.slower_than(ms),
                (true, Some(ms)) => {
                    let mut slow = log.slower_than(ms);
                    slow.retain(RequestRecord::is_failure);
                    slow
                }
                (false, None) => log.records().to_vec(),
            };
            drop(log);

            let lines: Vec<String> = records.iter().map(RequestRecord::to_line).collect();
            let body = lines.join("\n");
            let decision = router.route(OutputKind::Network, &directive, &body).await?;

            let output = match &decision.destination {
                Destination::Inline => serde_json::json!({
                    "summary": summary,
                    "requests": lines,
                }),
                Destination::File(path) => serde_json::json!({
                    "summary": summary,
                    "saved_to": path.display().to_string(),
                    "size_bytes": decision.size_bytes,
                }),
            };

            Ok::<_, proto::Error>(serde_json::to_string(&output).map_err(OutputError::from)?)
        })
        .await;

        match run {
            Ok(Ok(payload)) => ToolResult::success(call_id, self.name(), payload),
            Ok(Err(err)) => ToolResult::error(call_id, self.name(), err.to_string()),
            Err(_) => ToolResult::error(
                call_id,
                self.name(),
                format!("Operation timed out after {}s", timeout_duration.as_secs()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> SharedBrowser {
        BrowserState::shared(BrowserLaunchOptions::default())
    }

    fn test_router(dir: &tempfile::TempDir) -> Arc<OutputRouter> {
        Arc::new(OutputRouter::new(dir.path(), 1024))
    }

    #[test]
    fn navigate_tool_metadata_is_stable() {
        let tool = BrowserNavigateTool::new(test_state());
        assert_eq!(tool.name(), "browser.navigate");
        assert!(tool.description().contains("Navigate"));

        let schema = tool.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "url");
    }

    #[test]
    fn click_tool_metadata_is_stable() {
        let tool = BrowserClickTool::new(test_state());
        assert_eq!(tool.name(), "browser.click");
        assert!(tool.description().contains("Click"));

        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "selector");
    }

    #[test]
    fn type_tool_metadata_is_stable() {
        let tool = BrowserTypeTool::new(test_state());
        assert_eq!(tool.name(), "browser.type");

        let schema = tool.parameters_schema();
        assert_eq!(schema["required"][0], "selector");
        assert_eq!(schema["required"][1], "text");
    }

    #[test]
    fn capture_tools_accept_the_tri_state_save_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, schema) in [
            (
                "browser.evaluate",
                BrowserEvaluateTool::new(test_state(), test_router(&dir)).parameters_schema(),
            ),
            (
                "browser.snapshot",
                BrowserSnapshotTool::new(test_state(), test_router(&dir)).parameters_schema(),
            ),
            (
                "browser.console",
                BrowserConsoleTool::new(test_state(), test_router(&dir)).parameters_schema(),
            ),
            (
                "browser.network",
                BrowserNetworkTool::new(test_state(), test_router(&dir)).parameters_schema(),
            ),
        ] {
            assert_eq!(
                schema["properties"]["save"]["type"],
                serde_json::json!(["boolean", "string"]),
                "{name} should expose the save directive"
            );
        }
    }

    #[tokio::test]
    async fn navigate_rejects_non_http_url() {
        let tool = BrowserNavigateTool::new(test_state());
        let result = tool
            .execute("call-1", serde_json::json!({"url":"file:///etc/passwd"}))
            .await;
        assert_eq!(result.call_id, "call-1");
        assert!(result.is_error);
        assert!(result.output.contains("Only http/https URLs"));
    }

    #[tokio::test]
    async fn navigate_rejects_invalid_url() {
        let tool = BrowserNavigateTool::new(test_state());
        let result = tool
            .execute("call-2", serde_json::json!({"url":"not a url"}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid URL"));
    }

    #[tokio::test]
    async fn click_rejects_invalid_arguments() {
        let tool = BrowserClickTool::new(test_state());
        let result = tool
            .execute("call-3", serde_json::json!({"selector":7}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn type_rejects_missing_text() {
        let tool = BrowserTypeTool::new(test_state());
        let result = tool
            .execute("call-4", serde_json::json!({"selector":"#q"}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn evaluate_rejects_numeric_save_directive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = BrowserEvaluateTool::new(test_state(), test_router(&dir));
        let result = tool
            .execute("call-5", serde_json::json!({"expression":"1+1","save":42}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn console_rejects_unknown_level() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tool = BrowserConsoleTool::new(test_state(), test_router(&dir));
        let result = tool
            .execute("call-6", serde_json::json!({"level":"verbose"}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("unknown level"));
    }

    #[tokio::test]
    async fn navigate_with_valid_url_returns_result_shape() {
        let tool = BrowserNavigateTool::new(test_state());
        let result = tool
            .execute(
                "call-7",
                serde_json::json!({"url":"https://example.com","timeout_secs":1}),
            )
            .await;
        assert_eq!(result.call_id, "call-7");
        assert_eq!(result.tool_name, "browser.navigate");
        assert!(!result.output.is_empty());
    }

    #[test]
    fn operation_timeout_clamps_values() {
        assert_eq!(
            operation_timeout(None),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
        assert_eq!(operation_timeout(Some(0)), Duration::from_secs(1));
        assert_eq!(
            operation_timeout(Some(MAX_TIMEOUT_SECS + 100)),
            Duration::from_secs(MAX_TIMEOUT_SECS)
        );
    }
}
