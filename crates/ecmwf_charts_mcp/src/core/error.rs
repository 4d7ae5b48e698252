use rmcp::ErrorData as McpError;
use rmcp::serde_json::json;

use crate::core::catalog;

// Error codes
const ERROR_PRODUCT_NOT_FOUND: &str = "product_not_found";
const ERROR_INVALID_TIME_FORMAT: &str = "invalid_time_format";
const ERROR_CADENCE_MISMATCH: &str = "cadence_mismatch";
const ERROR_INVALID_VALID_TIME: &str = "invalid_valid_time";
const ERROR_UPSTREAM: &str = "upstream_error";
const ERROR_TRANSPORT: &str = "transport_error";
const ERROR_REQUEST_CANCELLED: &str = "request_cancelled";
const ERROR_CLIENT: &str = "client_error";
const ERROR_RESOURCE_NOT_FOUND: &str = "resource_not_found";
const ERROR_INVALID_PARAMS: &str = "invalid_params";

/// Available resource URIs for the ECMWF Charts MCP Server
pub const AVAILABLE_RESOURCES: &[&str] = &["ecmwf://status", "ecmwf://help", "ecmwf://products"];

/// Errors raised while answering a chart tool call
#[derive(Debug, thiserror::Error)]
pub enum ChartServerError {
    #[error("Unknown product: {product_id}")]
    NotFound { product_id: String },
    #[error("Invalid {field}: {value}. Expected ISO-8601 UTC, e.g. 2026-01-20T00:00:00Z")]
    TimeParse { field: &'static str, value: String },
    #[error(
        "valid_time {valid_time} is not reachable from base_time {base_time} with the weekly cadence of {product_id}"
    )]
    CadenceMismatch {
        product_id: String,
        base_time: String,
        valid_time: String,
    },
    #[error("valid_time {valid_time} is not available for {product_id} run {base_time}")]
    InvalidValidTime {
        product_id: String,
        base_time: String,
        valid_time: String,
        available: Vec<String>,
    },
    #[error("Upstream responded with HTTP {status}{}", body_suffix(.message))]
    Upstream { status: u16, message: Option<String> },
    #[error("Transport failure for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timeout: bool,
    },
    #[error("{operation} was cancelled by the client")]
    Cancelled { operation: &'static str },
    #[error("HTTP client error: {message}")]
    Client { message: String },
    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },
}

fn body_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|body| format!(": {body}"))
        .unwrap_or_default()
}

impl From<ChartServerError> for McpError {
    fn from(err: ChartServerError) -> Self {
        let message = err.to_string();
        match err {
            ChartServerError::NotFound { product_id } => McpError::invalid_params(
                ERROR_PRODUCT_NOT_FOUND,
                Some(json!({
                    "product_id": product_id,
                    "message": message,
                    "available_products": catalog::product_ids(),
                })),
            ),
            ChartServerError::TimeParse { field, value } => McpError::invalid_params(
                ERROR_INVALID_TIME_FORMAT,
                Some(json!({ "field": field, "value": value, "message": message })),
            ),
            ChartServerError::CadenceMismatch {
                product_id,
                base_time,
                valid_time,
            } => McpError::invalid_params(
                ERROR_CADENCE_MISMATCH,
                Some(json!({
                    "product_id": product_id,
                    "base_time": base_time,
                    "valid_time": valid_time,
                    "message": message,
                    "hint": "call get_available_times first",
                })),
            ),
            ChartServerError::InvalidValidTime {
                product_id,
                base_time,
                valid_time,
                available,
            } => McpError::invalid_params(
                ERROR_INVALID_VALID_TIME,
                Some(json!({
                    "product_id": product_id,
                    "base_time": base_time,
                    "valid_time": valid_time,
                    "message": message,
                    "available_valid_times": available,
                })),
            ),
            ChartServerError::Upstream { status, message: body } => McpError::internal_error(
                ERROR_UPSTREAM,
                Some(json!({ "status": status, "message": body })),
            ),
            ChartServerError::Transport {
                url,
                message: cause,
                timeout,
            } => McpError::internal_error(
                ERROR_TRANSPORT,
                Some(json!({ "url": url, "message": cause, "timeout": timeout })),
            ),
            ChartServerError::Cancelled { operation } => McpError::internal_error(
                ERROR_REQUEST_CANCELLED,
                Some(json!({ "operation": operation })),
            ),
            ChartServerError::Client { message } => {
                McpError::internal_error(ERROR_CLIENT, Some(json!({ "message": message })))
            }
            ChartServerError::ResourceNotFound { uri } => McpError::resource_not_found(
                ERROR_RESOURCE_NOT_FOUND,
                Some(json!({
                    "uri": uri,
                    "available_resources": AVAILABLE_RESOURCES,
                })),
            ),
            ChartServerError::InvalidParams { message } => {
                McpError::invalid_params(ERROR_INVALID_PARAMS, Some(json!({ "message": message })))
            }
        }
    }
}

pub type ChartServerResult<T> = Result<T, ChartServerError>;
pub type McpResult<T> = Result<T, McpError>;
