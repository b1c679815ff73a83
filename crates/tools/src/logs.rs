//! Ordered console and network logs with non-destructive filtering and
//! summary statistics.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Plain `console.log` output.
    Log,
    /// Informational message.
    Info,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
}

impl MessageLevel {
    /// Parses a level name as used in tool arguments.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "log" => Some(Self::Log),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageLevel::Log => write!(f, "log"),
            MessageLevel::Info => write!(f, "info"),
            MessageLevel::Warning => write!(f, "warning"),
            MessageLevel::Error => write!(f, "error"),
        }
    }
}

/// One console message, immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Time the message was observed.
    pub timestamp: DateTime<Utc>,
    /// Message severity.
    pub level: MessageLevel,
    /// Message text.
    pub text: String,
}

impl MessageRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            text: text.into(),
        }
    }

    /// Renders the record as one plain-text log line.
    pub fn to_line(&self) -> String {
        format!(
            "{} [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level,
            self.text
        )
    }
}

/// Aggregate statistics over a console log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleSummary {
    /// Total number of messages.
    pub total: usize,
    /// `log` message count.
    pub logs: usize,
    /// `info` message count.
    pub infos: usize,
    /// `warning` message count.
    pub warnings: usize,
    /// `error` message count.
    pub errors: usize,
    /// Text of the earliest error, if any.
    pub first_error: Option<String>,
    /// Text of the earliest warning, if any.
    pub first_warning: Option<String>,
}

/// Ordered, append-only console log for one browser session.
#[derive(Debug, Default)]
pub struct ConsoleLog {
    records: Vec<MessageRecord>,
}

impl ConsoleLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: MessageRecord) {
        self.records.push(record);
    }

    /// All records in arrival order.
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records matching `level`, or all records when `None`.
    ///
    /// Never mutates the log; repeated calls with the same filter yield the
    /// same result.
    pub fn filtered(&self, level: Option<MessageLevel>) -> Vec<MessageRecord> {
        self.records
            .iter()
            .filter(|record| level.is_none_or(|level| record.level == level))
            .cloned()
            .collect()
    }

    /// Computes summary statistics over the whole log.
    pub fn summary(&self) -> ConsoleSummary {
        let count = |level| self.records.iter().filter(|r| r.level == level).count();
        let first = |level| {
            self.records
                .iter()
                .find(|r| r.level == level)
                .map(|r| r.text.clone())
        };
        ConsoleSummary {
            total: self.records.len(),
            logs: count(MessageLevel::Log),
            infos: count(MessageLevel::Info),
            warnings: count(MessageLevel::Warning),
            errors: count(MessageLevel::Error),
            first_error: first(MessageLevel::Error),
            first_warning: first(MessageLevel::Warning),
        }
    }
}

/// Millisecond timing marks for one request. CDP reports `-1` for marks it
/// never observed; such records are excluded from duration statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestTiming {
    /// Time the request left the page, in milliseconds.
    pub request_start: f64,
    /// Time the first response byte arrived, in milliseconds.
    pub response_start: f64,
}

/// Terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    /// The request completed.
    Success,
    /// The request failed before completing.
    Failed,
}

/// One observed network request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// HTTP status, absent when the load failed before a response.
    pub status: Option<u16>,
    /// Timing marks, absent when the engine reported none.
    pub timing: Option<RequestTiming>,
    /// Terminal state.
    pub outcome: RequestOutcome,
}

impl RequestRecord {
    /// Duration between request start and first response byte, when both
    /// marks are present and non-negative.
    pub fn duration_ms(&self) -> Option<f64> {
        let timing = self.timing?;
        (timing.request_start >= 0.0 && timing.response_start >= 0.0)
            .then(|| timing.response_start - timing.request_start)
    }

    /// A request failed when the server answered with status ≥ 400 or the
    /// load failed before any status arrived.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, RequestOutcome::Failed) || self.status.is_some_and(|s| s >= 400)
    }

    /// Renders the record as one plain-text log line.
    pub fn to_line(&self) -> String {
        let status = match (self.status, &self.outcome) {
            (Some(status), _) => status.to_string(),
            (None, RequestOutcome::Failed) => "FAILED".to_string(),
            (None, RequestOutcome::Success) => "-".to_string(),
        };
        match self.duration_ms() {
            Some(duration) => {
                format!("{} {} {} ({} ms)", self.method, self.url, status, duration.round())
            }
            None => format!("{} {} {}", self.method, self.url, status),
        }
    }
}

/// Aggregate statistics over a network log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    /// Total number of requests, timed or not.
    pub total: usize,
    /// Requests that failed (status ≥ 400 or network-level failure).
    pub failures: usize,
    /// Mean duration over timed requests, rounded to whole milliseconds.
    pub average_duration_ms: Option<u64>,
}

/// Ordered, append-only network log for one browser session.
#[derive(Debug, Default)]
pub struct NetworkLog {
    records: Vec<RequestRecord>,
}

impl NetworkLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: RequestRecord) {
        self.records.push(record);
    }

    /// All records in arrival order.
    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Requests that failed. Non-destructive and idempotent.
    pub fn failures(&self) -> Vec<RequestRecord> {
        self.records
            .iter()
            .filter(|r| r.is_failure())
            .cloned()
            .collect()
    }

    /// Requests slower than `min_ms` between start and first response byte.
    /// Untimed requests never match.
    pub fn slower_than(&self, min_ms: f64) -> Vec<RequestRecord> {
        self.records
            .iter()
            .filter(|r| r.duration_ms().is_some_and(|d| d > min_ms))
            .cloned()
            .collect()
    }

    /// Computes summary statistics over the whole log.
    ///
    /// Untimed records are excluded from the average but counted in the
    /// total.
    pub fn summary(&self) -> NetworkSummary {
        let durations: Vec<f64> = self.records.iter().filter_map(|r| r.duration_ms()).collect();
        let average_duration_ms = (!durations.is_empty()).then(|| {
            let mean = durations.iter().sum::<f64>() / durations.len() as f64;
            mean.round() as u64
        });
        NetworkSummary {
            total: self.records.len(),
            failures: self.records.iter().filter(|r| r.is_failure()).count(),
            average_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(level: MessageLevel, text: &str) -> MessageRecord {
        MessageRecord::new(level, text)
    }

    fn timed_request(url: &str, status: u16, request_start: f64, response_start: f64) -> RequestRecord {
        RequestRecord {
            method: "GET".to_string(),
            url: url.to_string(),
            status: Some(status),
            timing: Some(RequestTiming {
                request_start,
                response_start,
            }),
            outcome: RequestOutcome::Success,
        }
    }

    fn untimed_request(url: &str, status: u16) -> RequestRecord {
        RequestRecord {
            method: "GET".to_string(),
            url: url.to_string(),
            status: Some(status),
            timing: None,
            outcome: RequestOutcome::Success,
        }
    }

    #[test]
    fn console_summary_counts_levels_and_finds_first_occurrences() {
        let mut log = ConsoleLog::new();
        log.push(message(MessageLevel::Log, "boot"));
        log.push(message(MessageLevel::Warning, "w1"));
        log.push(message(MessageLevel::Log, "ready"));
        log.push(message(MessageLevel::Error, "e1"));
        log.push(message(MessageLevel::Warning, "w2"));

        let summary = log.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.logs, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.first_error.as_deref(), Some("e1"));
        assert_eq!(summary.first_warning.as_deref(), Some("w1"));
    }

    #[test]
    fn console_filter_is_non_destructive_and_idempotent() {
        let mut log = ConsoleLog::new();
        log.push(message(MessageLevel::Log, "a"));
        log.push(message(MessageLevel::Error, "b"));
        log.push(message(MessageLevel::Log, "c"));

        let first = log.filtered(Some(MessageLevel::Log));
        let second = log.filtered(Some(MessageLevel::Log));
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.filtered(None).len(), 3);
    }

    #[test]
    fn level_parsing_accepts_aliases_and_rejects_unknown_names() {
        assert_eq!(MessageLevel::parse("warning"), Some(MessageLevel::Warning));
        assert_eq!(MessageLevel::parse("WARN"), Some(MessageLevel::Warning));
        assert_eq!(MessageLevel::parse("Error"), Some(MessageLevel::Error));
        assert_eq!(MessageLevel::parse("verbose"), None);
    }

    #[test]
    fn average_duration_excludes_untimed_records_but_counts_them() {
        let mut log = NetworkLog::new();
        log.push(timed_request("https://a.test/1", 200, 0.0, 100.0));
        log.push(timed_request("https://a.test/2", 200, 0.0, 50.0));
        log.push(untimed_request("https://a.test/3", 200));

        let summary = log.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.average_duration_ms, Some(75));
    }

    #[test]
    fn negative_timing_marks_are_excluded_from_the_average() {
        let mut log = NetworkLog::new();
        log.push(timed_request("https://a.test/1", 200, -1.0, 40.0));
        log.push(timed_request("https://a.test/2", 200, 0.0, 30.0));

        let summary = log.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.average_duration_ms, Some(30));
    }

    #[test]
    fn empty_average_when_no_record_carries_timing() {
        let mut log = NetworkLog::new();
        log.push(untimed_request("https://a.test/1", 200));

        assert_eq!(log.summary().average_duration_ms, None);
    }

    #[test]
    fn failures_cover_http_errors_and_network_level_failures() {
        let mut log = NetworkLog::new();
        log.push(timed_request("https://a.test/ok", 200, 0.0, 10.0));
        log.push(timed_request("https://a.test/missing", 404, 0.0, 10.0));
        log.push(RequestRecord {
            method: "GET".to_string(),
            url: "https://a.test/refused".to_string(),
            status: None,
            timing: None,
            outcome: RequestOutcome::Failed,
        });

        let failures = log.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(log.summary().failures, 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn latency_filter_matches_strictly_slower_requests_only() {
        let mut log = NetworkLog::new();
        log.push(timed_request("https://a.test/fast", 200, 0.0, 20.0));
        log.push(timed_request("https://a.test/slow", 200, 0.0, 800.0));
        log.push(untimed_request("https://a.test/untimed", 200));

        let slow = log.slower_than(100.0);
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].url, "https://a.test/slow");
    }

    #[test]
    fn request_lines_render_status_duration_and_failures() {
        let record = timed_request("https://a.test/x", 200, 0.0, 123.4);
        assert_eq!(record.to_line(), "GET https://a.test/x 200 (123 ms)");

        let failed = RequestRecord {
            method: "GET".to_string(),
            url: "https://a.test/y".to_string(),
            status: None,
            timing: None,
            outcome: RequestOutcome::Failed,
        };
        assert_eq!(failed.to_line(), "GET https://a.test/y FAILED");
    }
}
