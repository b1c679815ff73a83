use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default inline byte threshold applied when the config omits one.
///
/// Results at or above this size are persisted to a file unless the caller
/// directs otherwise. This is the only place the default lives; core logic
/// receives the effective value at router construction.
pub const DEFAULT_INLINE_THRESHOLD_BYTES: usize = 32 * 1024;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output routing section.
    pub output: OutputConfig,
    /// Browser launch section.
    pub browser: BrowserSection,
}

/// Output routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory routed files resolve against. Empty means
    /// `~/.pagepilot/output`.
    pub dir: String,
    /// Results at or above this many bytes go to a file by default.
    pub inline_threshold_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            inline_threshold_bytes: DEFAULT_INLINE_THRESHOLD_BYTES,
        }
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// Run the browser without a visible window.
    pub headless: bool,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self { headless: true }
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("pagepilot.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home = std::env::var("HOME").ok()?;
            let home_config = PathBuf::from(home).join(".pagepilot").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        // Environment variable overrides (highest priority)
        if let Ok(dir) = std::env::var("PAGEPILOT_OUTPUT_DIR") {
            config.output.dir = dir;
        }
        if let Ok(threshold) = std::env::var("PAGEPILOT_INLINE_THRESHOLD")
            && let Ok(bytes) = threshold.parse::<usize>()
        {
            config.output.inline_threshold_bytes = bytes;
        }
        if let Ok(headless) = std::env::var("PAGEPILOT_HEADLESS")
            && let Ok(flag) = headless.parse::<bool>()
        {
            config.browser.headless = flag;
        }

        if config.output.inline_threshold_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "output.inline_threshold_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        debug!(
            output_dir = %config.output_dir().display(),
            inline_threshold_bytes = config.output.inline_threshold_bytes,
            headless = config.browser.headless,
            "Config loaded"
        );
        Ok(config)
    }

    /// Resolved output root (defaults to `~/.pagepilot/output`).
    pub fn output_dir(&self) -> PathBuf {
        if !self.output.dir.is_empty() {
            return PathBuf::from(&self.output.dir);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".pagepilot").join("output")
    }
}
