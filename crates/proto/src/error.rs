use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Browser page / CDP error.
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    /// Tool argument/execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Output routing/persistence error.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Browser page errors
///
/// `Cdp` wraps protocol-level failures verbatim; the barrier's navigation
/// race filter matches against the rendered message text.
#[derive(Debug, Error)]
pub enum PageError {
    /// Browser process launch failure.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Operation attempted before a page exists.
    #[error("Browser page is not initialized")]
    NotInitialized,

    /// Protocol-level command or event failure.
    #[error("CDP error: {0}")]
    Cdp(String),

    /// JavaScript evaluation failure.
    #[error("Evaluation failed: {0}")]
    Evaluate(String),
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool call arguments are invalid.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Tool operation failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool exceeded allowed execution time.
    #[error("Timeout after {0}s")]
    Timeout(u64),
}

/// Output routing errors
///
/// All variants are fatal for the call that raised them — a failed write is
/// never downgraded to an inline result.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Intermediate directory creation failed.
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// File write failed.
    #[error("Failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Absolute path resolution failed.
    #[error("Failed to resolve output path {path}: {source}")]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON encoding of an evaluation result failed.
    #[error("Failed to encode result as JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_config_error_variant() {
        let err = ConfigError::MissingField("output.dir".to_string());
        assert!(err.to_string().contains("Missing required field"));
    }

    #[test]
    fn wraps_page_error_into_top_level_error() {
        let err: Error = PageError::Cdp("Execution context was destroyed".to_string()).into();
        assert!(err.to_string().contains("Page error"));
        assert!(err.to_string().contains("Execution context was destroyed"));
    }

    #[test]
    fn wraps_tool_error_into_top_level_error() {
        let err: Error = ToolError::Timeout(15).into();
        assert!(err.to_string().contains("Timeout after 15s"));
    }

    #[test]
    fn output_error_carries_the_failed_path() {
        let err = OutputError::Write {
            path: PathBuf::from("/out/snapshot.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/out/snapshot.md"));

        let top: Error = err.into();
        assert!(top.to_string().contains("Output error"));
    }
}
