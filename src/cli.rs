//! Command-line interface definitions.
//!
//! Every option can also come from an environment variable. Values given
//! here override the configuration file.

use clap::Parser;
use std::path::PathBuf;

/// Extract news from the configured sites into one JSON document.
///
/// # Examples
///
/// ```sh
/// # Built-in sources, default output news_data.json
/// news_conveyor
///
/// # Custom sources and a tighter deadline
/// news_conveyor -c sources.yaml -o out/news.json --run-timeout 60
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML configuration file (built-in sources when omitted)
    #[arg(short, long, env = "NEWS_CONVEYOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, env = "NEWS_CONVEYOR_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Also write run diagnostics to this JSON file
    #[arg(short, long, env = "NEWS_CONVEYOR_DIAGNOSTICS")]
    pub diagnostics: Option<PathBuf>,

    /// Global run deadline in seconds
    #[arg(long, env = "NEWS_CONVEYOR_RUN_TIMEOUT")]
    pub run_timeout: Option<f64>,

    /// Ceiling on concurrent requests to one host
    #[arg(long, env = "NEWS_CONVEYOR_MAX_CONNECTIONS")]
    pub max_connections_per_host: Option<usize>,
}
