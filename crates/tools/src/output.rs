//! Inline-vs-file routing for tool results.
//!
//! The router owns the decision table only; the byte-size threshold and the
//! output root are injected at construction.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use proto::OutputError;
use serde::Serialize;
use tracing::debug;

/// Caller instruction controlling inline-vs-file placement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputDirective {
    /// No directive; the size threshold decides.
    #[default]
    Auto,
    /// Persist to a generated file name.
    ToFile,
    /// Embed inline regardless of size.
    Inline,
    /// Persist under this name, resolved against the output root.
    Named(String),
}

impl OutputDirective {
    /// Parses the tri-state `save` tool argument (absent / bool / string).
    pub fn from_save_arg(value: Option<&serde_json::Value>) -> Result<Self, String> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::Auto),
            Some(serde_json::Value::Bool(true)) => Ok(Self::ToFile),
            Some(serde_json::Value::Bool(false)) => Ok(Self::Inline),
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => {
                Ok(Self::Named(name.clone()))
            }
            Some(serde_json::Value::String(_)) => {
                Err("save must not be an empty file name".to_string())
            }
            Some(other) => Err(format!("save must be a boolean or a file name, got {other}")),
        }
    }
}

/// Semantic category of routed content; fixes the generated-name prefix and
/// file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Page HTML snapshot.
    Snapshot,
    /// Console message log.
    Console,
    /// Network request log.
    Network,
    /// JavaScript evaluation result.
    Evaluate,
}

impl OutputKind {
    /// Generated-name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            OutputKind::Snapshot => "snapshot",
            OutputKind::Console => "console",
            OutputKind::Network => "network",
            OutputKind::Evaluate => "evaluate",
        }
    }

    /// Generated-name file extension.
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Snapshot => "md",
            OutputKind::Console => "txt",
            OutputKind::Network => "txt",
            OutputKind::Evaluate => "json",
        }
    }
}

/// Where routed content ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Content is embedded in the response.
    Inline,
    /// Content was written to this absolute path.
    File(PathBuf),
}

/// Why the router chose the destination it chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// The caller named the file.
    NamedByCaller,
    /// The caller asked for file output.
    FileRequested,
    /// The caller asked for inline output.
    InlineRequested,
    /// No directive; the content met the threshold.
    OverThreshold,
    /// No directive; the content stayed below the threshold.
    UnderThreshold,
}

/// Final placement decision for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDecision {
    /// Chosen destination.
    pub destination: Destination,
    /// Exact number of bytes the content occupies (and was written, for
    /// file destinations).
    pub size_bytes: usize,
    /// Why this destination was chosen.
    pub reason: RouteReason,
}

/// Chooses between embedding content in the response and persisting it
/// under the output root.
pub struct OutputRouter {
    root: PathBuf,
    inline_threshold: usize,
}

impl OutputRouter {
    /// Creates a router over `root` with the given inline byte threshold.
    pub fn new(root: impl Into<PathBuf>, inline_threshold: usize) -> Self {
        Self {
            root: root.into(),
            inline_threshold,
        }
    }

    /// Output root all file destinations resolve against.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Routes `content` according to the directive and its size, writing
    /// the file when a file destination is chosen.
    ///
    /// A directory-creation or write failure is fatal for the call; the
    /// decision is never downgraded to inline.
    pub async fn route(
        &self,
        kind: OutputKind,
        directive: &OutputDirective,
        content: &str,
    ) -> Result<OutputDecision, OutputError> {
        let size_bytes = content.len();
        let (name, reason) = match directive {
            OutputDirective::Named(name) => (Some(name.clone()), RouteReason::NamedByCaller),
            OutputDirective::ToFile => (Some(self.generated_name(kind)), RouteReason::FileRequested),
            OutputDirective::Inline => (None, RouteReason::InlineRequested),
            OutputDirective::Auto if size_bytes >= self.inline_threshold => {
                (Some(self.generated_name(kind)), RouteReason::OverThreshold)
            }
            OutputDirective::Auto => (None, RouteReason::UnderThreshold),
        };

        let Some(name) = name else {
            return Ok(OutputDecision {
                destination: Destination::Inline,
                size_bytes,
                reason,
            });
        };

        let path = self.resolve(&name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| OutputError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), size_bytes, "routed content to file");

        Ok(OutputDecision {
            destination: Destination::File(path),
            size_bytes,
            reason,
        })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, OutputError> {
        let joined = self.root.join(name);
        std::path::absolute(&joined).map_err(|source| OutputError::Resolve {
            path: joined,
            source,
        })
    }

    fn generated_name(&self, kind: OutputKind) -> String {
        // RFC 3339 with colons/periods replaced keeps the stamp legal on
        // every filesystem; millisecond precision keeps concurrent names
        // distinct.
        let stamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("{}-{}.{}", kind.prefix(), stamp, kind.extension())
    }
}

/// Encodes an evaluation result as pretty-printed JSON with 2-space
/// indentation and stable key order. The exact byte length of the encoding
/// feeds the threshold decision.
pub fn encode_pretty_json(value: &serde_json::Value) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(value)?)
}
