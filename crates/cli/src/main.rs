//! CLI entrypoint and subcommand orchestration.

mod config;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use proto::ToolCall;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use tools::{
    BrowserClickTool, BrowserConsoleTool, BrowserEvaluateTool, BrowserLaunchOptions,
    BrowserNavigateTool, BrowserNetworkTool, BrowserSnapshotTool, BrowserState, BrowserTypeTool,
    OutputRouter, SharedBrowser, Tool,
};

/// Top-level command-line arguments for the pagepilot application.
#[derive(Parser)]
#[command(name = "pagepilot")]
#[command(about = "Settled browser actions with routed output", version = "0.1.0")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.pagepilot/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// CLI subcommands available in the application.
#[derive(Subcommand)]
enum Commands {
    /// Navigate to a URL, wait for it to settle, and print the result
    Open {
        /// URL to open
        url: String,
    },

    /// Evaluate a JavaScript expression, optionally opening a URL first
    Eval {
        /// JavaScript expression to evaluate
        expression: String,

        /// URL to open before evaluating
        #[arg(long)]
        url: Option<String>,

        /// Save the result: pass a file name, or no value for a generated one
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        save: Option<String>,

        /// Force inline output regardless of size
        #[arg(long, default_value_t = false)]
        inline: bool,
    },

    /// Capture the page HTML, optionally opening a URL first
    Snapshot {
        /// URL to open before capturing
        #[arg(long)]
        url: Option<String>,

        /// Save the capture: pass a file name, or no value for a generated one
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        save: Option<String>,

        /// Force inline output regardless of size
        #[arg(long, default_value_t = false)]
        inline: bool,
    },

    /// Read recorded console messages, optionally opening a URL first
    Console {
        /// URL to open before reading
        #[arg(long)]
        url: Option<String>,

        /// Only show messages of this level (log, info, warning, error)
        #[arg(long)]
        level: Option<String>,

        /// Save the log: pass a file name, or no value for a generated one
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        save: Option<String>,

        /// Force inline output regardless of size
        #[arg(long, default_value_t = false)]
        inline: bool,
    },

    /// Read recorded network requests, optionally opening a URL first
    Network {
        /// URL to open before reading
        #[arg(long)]
        url: Option<String>,

        /// Only show failed requests (status >= 400 or network failure)
        #[arg(long, default_value_t = false)]
        failures_only: bool,

        /// Only show requests slower than this many milliseconds
        #[arg(long)]
        slower_than_ms: Option<f64>,

        /// Save the log: pass a file name, or no value for a generated one
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        save: Option<String>,

        /// Force inline output regardless of size
        #[arg(long, default_value_t = false)]
        inline: bool,
    },

    /// Print the definitions of all available tools
    Tools,
}

/// Maps the `--inline`/`--save` flags onto the tools' tri-state `save`
/// argument: absent, bool, or explicit file name.
fn save_arg(inline: bool, save: Option<String>) -> Option<serde_json::Value> {
    if inline {
        return Some(serde_json::Value::Bool(false));
    }
    match save {
        Some(name) if name.is_empty() => Some(serde_json::Value::Bool(true)),
        Some(name) => Some(serde_json::Value::String(name)),
        None => None,
    }
}

fn with_save(mut args: serde_json::Value, save: Option<serde_json::Value>) -> serde_json::Value {
    if let (Some(map), Some(save)) = (args.as_object_mut(), save) {
        map.insert("save".to_string(), save);
    }
    args
}

async fn run_tool(tool: &dyn Tool, args: serde_json::Value) -> anyhow::Result<String> {
    let call = ToolCall::new(tool.name(), args);
    let result = tool.execute(&call.call_id, call.arguments.clone()).await;
    if result.is_error {
        anyhow::bail!("{} failed: {}", result.tool_name, result.output);
    }
    Ok(result.output)
}

async fn open_first(state: &SharedBrowser, url: Option<String>) -> anyhow::Result<()> {
    if let Some(url) = url {
        let navigate = BrowserNavigateTool::new(state.clone());
        run_tool(&navigate, serde_json::json!({ "url": url })).await?;
    }
    Ok(())
}

#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing. When --debug is passed, write debug-level logs to
    // ~/.pagepilot/logs/debug.YYYY-MM-DD.log using daily rotation so logs
    // accumulate across sessions.
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;

    let debug_writer = if cli.debug {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let log_dir = std::path::PathBuf::from(home).join(".pagepilot").join("logs");
        std::fs::create_dir_all(&log_dir).ok();
        let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        _file_guard = Some(guard);
        Some(writer)
    } else {
        _file_guard = None;
        None
    };

    match debug_writer {
        Some(writer) => {
            let console = fmt::layer().with_target(false).with_filter(console_filter);
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug,hyper_util=info,reqwest=info"));
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .init();
            info!(
                version = env!("CARGO_PKG_VERSION"),
                log_level = %cli.log_level,
                "========== pagepilot session start =========="
            );
        }
        None => {
            fmt()
                .with_env_filter(console_filter)
                .with_target(false)
                .init();
        }
    }

    // Load config
    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Failed to load config ({e}), using defaults");
        Config::default()
    });

    let state = BrowserState::shared(BrowserLaunchOptions {
        headless: config.browser.headless,
    });
    let router = Arc::new(OutputRouter::new(
        config.output_dir(),
        config.output.inline_threshold_bytes,
    ));

    match cli.command {
        Commands::Open { url } => {
            let navigate = BrowserNavigateTool::new(state.clone());
            let output = run_tool(&navigate, serde_json::json!({ "url": url })).await?;
            println!("{output}");
        }
        Commands::Eval {
            expression,
            url,
            save,
            inline,
        } => {
            open_first(&state, url).await?;
            let evaluate = BrowserEvaluateTool::new(state.clone(), router.clone());
            let args = with_save(
                serde_json::json!({ "expression": expression }),
                save_arg(inline, save),
            );
            let output = run_tool(&evaluate, args).await?;
            println!("{output}");
        }
        Commands::Snapshot { url, save, inline } => {
            open_first(&state, url).await?;
            let snapshot = BrowserSnapshotTool::new(state.clone(), router.clone());
            let args = with_save(serde_json::json!({}), save_arg(inline, save));
            let output = run_tool(&snapshot, args).await?;
            println!("{output}");
        }
        Commands::Console {
            url,
            level,
            save,
            inline,
        } => {
            open_first(&state, url).await?;
            let console = BrowserConsoleTool::new(state.clone(), router.clone());
            let mut args = serde_json::json!({});
            if let (Some(map), Some(level)) = (args.as_object_mut(), level) {
                map.insert("level".to_string(), serde_json::Value::String(level));
            }
            let args = with_save(args, save_arg(inline, save));
            let output = run_tool(&console, args).await?;
            println!("{output}");
        }
        Commands::Network {
            url,
            failures_only,
            slower_than_ms,
            save,
            inline,
        } => {
            open_first(&state, url).await?;
            let network = BrowserNetworkTool::new(state.clone(), router.clone());
            let mut args = serde_json::json!({ "failures_only": failures_only });
            if let (Some(map), Some(ms)) = (args.as_object_mut(), slower_than_ms) {
                map.insert("slower_than_ms".to_string(), serde_json::json!(ms));
            }
            let args = with_save(args, save_arg(inline, save));
            let output = run_tool(&network, args).await?;
            println!("{output}");
        }
        Commands::Tools => {
            let tools: Vec<Box<dyn Tool>> = vec![
                Box::new(BrowserNavigateTool::new(state.clone())),
                Box::new(BrowserClickTool::new(state.clone())),
                Box::new(BrowserTypeTool::new(state.clone())),
                Box::new(BrowserEvaluateTool::new(state.clone(), router.clone())),
                Box::new(BrowserSnapshotTool::new(state.clone(), router.clone())),
                Box::new(BrowserConsoleTool::new(state.clone(), router.clone())),
                Box::new(BrowserNetworkTool::new(state.clone(), router.clone())),
            ];
            let definitions: Vec<_> = tools.iter().map(|tool| tool.definition()).collect();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_flag_maps_to_the_tri_state_directive() {
        assert_eq!(save_arg(false, None), None);
        assert_eq!(
            save_arg(false, Some(String::new())),
            Some(serde_json::Value::Bool(true))
        );
        assert_eq!(
            save_arg(false, Some("x.yaml".to_string())),
            Some(serde_json::Value::String("x.yaml".to_string()))
        );
        // --inline wins over --save.
        assert_eq!(
            save_arg(true, Some("x.yaml".to_string())),
            Some(serde_json::Value::Bool(false))
        );
    }

    #[test]
    fn with_save_inserts_only_when_a_directive_exists() {
        let args = with_save(serde_json::json!({"expression": "1"}), None);
        assert!(args.get("save").is_none());

        let args = with_save(
            serde_json::json!({"expression": "1"}),
            Some(serde_json::Value::Bool(true)),
        );
        assert_eq!(args["save"], serde_json::Value::Bool(true));
    }

    #[test]
    fn cli_parses_capture_subcommands() {
        let cli = Cli::parse_from([
            "pagepilot",
            "snapshot",
            "--url",
            "https://example.com",
            "--save",
        ]);
        match cli.command {
            Commands::Snapshot { url, save, inline } => {
                assert_eq!(url.as_deref(), Some("https://example.com"));
                assert_eq!(save.as_deref(), Some(""));
                assert!(!inline);
            }
            _ => panic!("expected snapshot subcommand"),
        }

        let cli = Cli::parse_from(["pagepilot", "network", "--failures-only", "--inline"]);
        match cli.command {
            Commands::Network {
                failures_only,
                inline,
                ..
            } => {
                assert!(failures_only);
                assert!(inline);
            }
            _ => panic!("expected network subcommand"),
        }
    }
}
