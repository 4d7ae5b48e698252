use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{
        router::{prompt::PromptRouter, tool::ToolRouter},
        wrapper::Parameters,
    },
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{
    catalog,
    error::{ChartServerError, ChartServerResult, McpResult},
    models::{ChartResult, FetchChartRequest, GetAvailableTimesRequest, ListProductsRequest},
    orchestrator::ChartProvider,
};
use crate::services::{OpenChartsSource, Validate};
use crate::utils::run_cancellable;

/// ECMWF Charts MCP Server exposing the chart catalog and OpenCharts images
#[derive(Clone)]
pub struct ChartService {
    provider: ChartProvider,
    timeout_secs: u64,
    tool_router: ToolRouter<ChartService>,
    prompt_router: PromptRouter<ChartService>,
}

impl ChartService {
    pub fn new(config: &Config) -> ChartServerResult<Self> {
        let source = OpenChartsSource::new(config)?;
        let provider = ChartProvider::new(config.base_url.clone(), Arc::new(source));
        Ok(Self::with_provider(provider, config.timeout.as_secs()))
    }

    pub fn with_provider(provider: ChartProvider, timeout_secs: u64) -> Self {
        Self {
            provider,
            timeout_secs,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    fn create_resource_text(&self, uri: &str, name: &str) -> Resource {
        RawResource::new(uri, name.to_string()).no_annotation()
    }

    pub(crate) async fn available_times_contents(
        &self,
        req: GetAvailableTimesRequest,
        ct: &CancellationToken,
    ) -> McpResult<CallToolResult> {
        req.validate()?;
        let times = run_cancellable(
            ct,
            "get_available_times",
            self.provider
                .get_available_times(&req.product_id, &req.base_time),
        )
        .await?;

        Ok(CallToolResult::success(vec![Content::text(to_pretty_json(
            &times,
        )?)]))
    }

    pub(crate) async fn chart_tool_contents(
        &self,
        req: FetchChartRequest,
        ct: &CancellationToken,
    ) -> McpResult<CallToolResult> {
        req.validate()?;
        let chart = run_cancellable(
            ct,
            "fetch_ecmwf_chart",
            self.provider
                .fetch_chart(&req.product_id, &req.base_time, &req.valid_time),
        )
        .await?;

        Ok(CallToolResult::success(chart_contents(&chart)))
    }

    fn generate_status_content(&self) -> String {
        let products = catalog::all_products();
        let weekly = products
            .iter()
            .filter(|p| p.cadence == catalog::Cadence::Weekly)
            .count();

        format!(
            r#"ECMWF Charts MCP Server Status

Server: Running
Chart API: {}
Request timeout: {}s
Products: {} ({} weekly, {} six-hourly)
Tools Available: 3
Prompts Available: 1
Resources Available: 3

Capabilities:
- Product discovery filtered by range and parameter
- Weekly valid times computed locally
- Six-hourly valid times read from the chart service
- Chart images returned inline with their metadata"#,
            self.provider.base_url(),
            self.timeout_secs,
            products.len(),
            weekly,
            products.len() - weekly
        )
    }

    fn generate_help_content(&self) -> &'static str {
        r#"ECMWF Charts MCP Server Help

TOOLS:
- list_ecmwf_products: List chart products
  - filter_range: "medium", "sub-seasonal" or "all" (optional)
  - filter_parameter: "temperature", "wind", "geopotential" or "all" (optional)
  - Example: {"filter_range": "sub-seasonal", "filter_parameter": "wind"}

- get_available_times: List the valid times of a forecast run
  - product_id: Product identifier (required)
  - base_time: Run start, ISO-8601 UTC (required)
  - Example: {"product_id": "medium-2t-mean-spread", "base_time": "2026-01-20T00:00:00Z"}

- fetch_ecmwf_chart: Fetch a chart image
  - product_id: Product identifier (required)
  - base_time: Run start, ISO-8601 UTC (required)
  - valid_time: Forecast target time, ISO-8601 UTC (required)
  - Example: {"product_id": "extended-anomaly-z500", "base_time": "2026-01-20T00:00:00Z", "valid_time": "2026-02-02T00:00:00Z"}

PROMPTS:
- chart_workflow: Step-by-step guidance for fetching a chart

RESOURCES:
- ecmwf://status: Server status and configuration
- ecmwf://help: This help documentation
- ecmwf://products: The product catalog as JSON

TIME FORMAT:
- Always UTC with a trailing Z: 'YYYY-MM-DDTHH:MM:SSZ'
- Offsets other than +00:00 are rejected

CADENCES:
- weekly (sub-seasonal products): valid times are whole weeks after the
  base time, or the Monday opening the week of a listed time
- six-hourly (medium-range products): valid times come from the chart
  service; use get_available_times to see them"#
    }

    fn generate_products_content(&self) -> McpResult<String> {
        to_pretty_json(catalog::all_products())
    }

    /// Body of the resource at `uri`
    pub(crate) fn resource_text(&self, uri: &str) -> McpResult<String> {
        match uri {
            "ecmwf://status" => Ok(self.generate_status_content()),
            "ecmwf://help" => Ok(self.generate_help_content().to_string()),
            "ecmwf://products" => self.generate_products_content(),
            _ => Err(ChartServerError::ResourceNotFound {
                uri: uri.to_string(),
            }
            .into()),
        }
    }
}

/// Metadata text followed by the base64-encoded image
pub(crate) fn chart_contents(chart: &ChartResult) -> Vec<Content> {
    vec![
        Content::text(chart.metadata_text()),
        Content::image(STANDARD.encode(chart.image()), chart.content_type().clone()),
    ]
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> McpResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(
            "serialization_error",
            Some(serde_json::json!({ "message": e.to_string() })),
        )
    })
}

#[tool_router]
impl ChartService {
    #[tool(
        description = "List available ECMWF chart products. Filter by forecast range (medium, sub-seasonal) and parameter (temperature, wind, geopotential); unknown filter values list everything."
    )]
    pub(crate) async fn list_ecmwf_products(
        &self,
        Parameters(req): Parameters<ListProductsRequest>,
    ) -> McpResult<CallToolResult> {
        let products = self.provider.list_products(
            req.filter_range.as_deref(),
            req.filter_parameter.as_deref(),
        );
        tracing::debug!("Listing {} products", products.len());

        Ok(CallToolResult::success(vec![Content::text(to_pretty_json(
            &products,
        )?)]))
    }

    #[tool(
        description = "Get the valid times available for a product's forecast run. Weekly products are computed from the base time; six-hourly products are looked up on the chart service."
    )]
    async fn get_available_times(
        &self,
        Parameters(req): Parameters<GetAvailableTimesRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> McpResult<CallToolResult> {
        self.available_times_contents(req, &ctx.ct).await
    }

    #[tool(
        description = "Fetch an ECMWF chart image. The valid time must be reachable from the base time for the product's cadence; call get_available_times first when unsure."
    )]
    async fn fetch_ecmwf_chart(
        &self,
        Parameters(req): Parameters<FetchChartRequest>,
        ctx: RequestContext<RoleServer>,
    ) -> McpResult<CallToolResult> {
        self.chart_tool_contents(req, &ctx.ct).await
    }
}

#[prompt_router]
impl ChartService {
    /// Guide an agent through listing products, picking times and fetching a chart
    #[prompt(name = "chart_workflow")]
    async fn chart_workflow(
        &self,
        _ctx: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<Vec<PromptMessage>> {
        let guidance = r#"Fetching ECMWF charts:

1. **Pick a product**
   - Call list_ecmwf_products, optionally filtered by range or parameter
   - Sub-seasonal products are weekly means; medium-range products are six-hourly

2. **Pick a run and a valid time**
   - Base times are model run starts in UTC, e.g. '2026-01-20T00:00:00Z'
   - Call get_available_times with the product and base time
   - Choose a valid time from the returned list

3. **Fetch the chart**
   - Call fetch_ecmwf_chart with product_id, base_time and valid_time
   - The result holds the chart metadata and the image

4. **Handling errors**
   - product_not_found: check the id against list_ecmwf_products
   - invalid_time_format: use 'YYYY-MM-DDTHH:MM:SSZ'
   - cadence_mismatch / invalid_valid_time: pick a time from get_available_times
   - upstream_error with status 404: the run is not published yet, try an earlier base time"#;

        Ok(vec![PromptMessage {
            role: PromptMessageRole::Assistant,
            content: PromptMessageContent::text(guidance),
        }])
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for ChartService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "ECMWF Charts MCP Server for weather forecast charts. Tools: list_ecmwf_products, get_available_times, fetch_ecmwf_chart. Times are ISO-8601 UTC (YYYY-MM-DDTHH:MM:SSZ); call get_available_times before fetching."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourcesResult> {
        Ok(ListResourcesResult {
            resources: vec![
                self.create_resource_text("ecmwf://status", "server-status"),
                self.create_resource_text("ecmwf://help", "help-documentation"),
                self.create_resource_text("ecmwf://products", "product-catalog"),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ReadResourceResult> {
        let text = self.resource_text(&uri)?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourceTemplatesResult> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> McpResult<InitializeResult> {
        tracing::info!("ECMWF Charts MCP Server initialized successfully");
        Ok(self.get_info())
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    use rmcp::{ServiceExt, transport::stdio};

    tracing::info!(
        "Serving charts from {} with a {}s timeout",
        config.base_url,
        config.timeout.as_secs()
    );

    let service = ChartService::new(&config)?
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}
