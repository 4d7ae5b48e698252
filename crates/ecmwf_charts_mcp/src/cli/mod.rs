use clap::Parser;

use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::errors::StartupResult;

/// ECMWF Charts MCP Server
///
/// A Model Context Protocol server exposing ECMWF OpenCharts weather charts
/// to agents: product discovery, valid-time lookup and chart retrieval.
///
/// ## Features
/// - **Tools**: list_ecmwf_products, get_available_times, fetch_ecmwf_chart
/// - **Resources**: server status, help and the product catalog
/// - **Prompts**: a guided list → times → fetch workflow
///
/// ## Development
/// ```bash
/// npx @modelcontextprotocol/inspector cargo run --bin mcp-server-ecmwf-charts
/// ```
///
/// ## Configuration
/// Add to your MCP client configuration:
/// ```json
/// {
///   "mcpServers": {
///     "ecmwf-charts": {
///       "command": "mcp-server-ecmwf-charts",
///       "args": ["--timeout-secs", "45"],
///       "env": {
///         "RUST_LOG": "info"
///       }
///     }
///   }
/// }
/// ```
///
/// ## Environment Variables
/// - `RUST_LOG`: Controls logging verbosity (trace, debug, info, warn, error)
/// - `ECMWF_CHARTS_*`: Defaults for the flags below
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-server-ecmwf-charts")]
#[command(about = "An MCP server for browsing and fetching ECMWF OpenCharts weather charts")]
#[command(version)]
#[command(
    long_about = "A Model Context Protocol (MCP) server that lists ECMWF chart products, \nworks out their valid times and fetches chart images from the OpenCharts API."
)]
pub struct Cli {
    /// OpenCharts API base URL
    #[arg(long, env = "ECMWF_CHARTS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Timeout in seconds for each request to the chart service
    #[arg(long, env = "ECMWF_CHARTS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Custom User-Agent string to use for requests
    #[arg(long, env = "ECMWF_CHARTS_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Proxy URL to use for requests (e.g., http://proxy:8080)
    #[arg(long, env = "ECMWF_CHARTS_PROXY_URL")]
    pub proxy_url: Option<String>,
}

impl Cli {
    /// Parse CLI arguments and convert to configuration
    pub fn parse_config() -> StartupResult<Config> {
        Self::parse().into_config()
    }

    fn into_config(self) -> StartupResult<Config> {
        Config::new(
            &self.base_url,
            self.timeout_secs,
            self.user_agent,
            self.proxy_url,
        )
    }
}
