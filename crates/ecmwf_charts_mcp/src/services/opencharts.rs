use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, header::CONTENT_TYPE};
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::core::{
    error::{ChartServerError, ChartServerResult},
    models::ChartPayload,
    source::ChartSource,
    time_model::parse_utc_timestamp,
};
use crate::utils::build_client;

/// Raw upstream bodies longer than this are cut before being surfaced
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Marker preceding the bracketed list in the availability error message
const AVAILABILITY_MARKER: &str = "available valid_time";

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// Largest product, image or availability body accepted from the service
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Error bodies beyond this are cut before parsing
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Product endpoint body on success
#[derive(Debug, Deserialize)]
struct ProductResponse {
    data: Option<ProductData>,
}

#[derive(Debug, Deserialize)]
struct ProductData {
    link: Option<ImageLink>,
}

#[derive(Debug, Deserialize)]
struct ImageLink {
    href: String,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

/// Product endpoint body on failure
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Many(Vec<String>),
    One(String),
}

/// Chart source backed by the ECMWF OpenCharts HTTP API
#[derive(Clone)]
pub struct OpenChartsSource {
    client: Client,
    max_body_bytes: usize,
}

impl OpenChartsSource {
    pub fn new(config: &Config) -> ChartServerResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    #[cfg(test)]
    fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Read a whole body, failing once it grows past `max_body_bytes`
    async fn read_bytes(&self, url: &Url, response: Response) -> ChartServerResult<Bytes> {
        let status = response.status().as_u16();
        let limit = self.max_body_bytes;
        let too_large = || {
            tracing::warn!("Response from {} exceeds {} bytes", url, limit);
            ChartServerError::Upstream {
                status,
                message: Some(format!("response body exceeds {} bytes", limit)),
            }
        };

        if response
            .content_length()
            .is_some_and(|length| length > limit as u64)
        {
            return Err(too_large());
        }

        let (body, truncated) = read_capped(response, limit)
            .await
            .map_err(|e| transport_error(url, e))?;
        if truncated {
            return Err(too_large());
        }
        Ok(body)
    }

    async fn get(&self, url: &Url) -> ChartServerResult<Response> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))
    }

    async fn download_image(
        &self,
        url: Url,
        advertised_type: Option<String>,
    ) -> ChartServerResult<ChartPayload> {
        tracing::debug!("Downloading chart image from {}", url);
        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let content_type = header_content_type(&response)
            .or(advertised_type)
            .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
        let bytes = self.read_bytes(&url, response).await?;

        Ok(ChartPayload {
            bytes,
            content_type,
            image_url: Some(url.to_string()),
        })
    }
}

#[async_trait]
impl ChartSource for OpenChartsSource {
    async fn fetch_chart(&self, locator: &Url) -> ChartServerResult<ChartPayload> {
        let response = self.get(locator).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(response).await);
        }

        // Some deployments answer the product locator with the image itself
        if let Some(content_type) = header_content_type(&response).filter(|ct| is_image(ct)) {
            let bytes = self.read_bytes(locator, response).await?;
            return Ok(ChartPayload {
                bytes,
                content_type,
                image_url: Some(locator.to_string()),
            });
        }

        let body = self.read_bytes(locator, response).await?;
        let parsed: ProductResponse =
            serde_json::from_slice(&body).map_err(|e| ChartServerError::Upstream {
                status: status.as_u16(),
                message: Some(format!("invalid product response: {}", e)),
            })?;

        let link = parsed
            .data
            .and_then(|data| data.link)
            .ok_or_else(|| ChartServerError::Upstream {
                status: status.as_u16(),
                message: Some("No image link found in response".to_string()),
            })?;

        let image_url = locator
            .join(&link.href)
            .map_err(|e| ChartServerError::Upstream {
                status: status.as_u16(),
                message: Some(format!("invalid image link '{}': {}", link.href, e)),
            })?;

        self.download_image(image_url, link.media_type).await
    }

    async fn available_valid_times(&self, locator: &Url) -> ChartServerResult<Vec<DateTime<Utc>>> {
        let response = self.get(locator).await?;
        let status = response.status().as_u16();
        let body = self.read_bytes(locator, response).await?;
        let message = error_message(&body);

        let Some(reported) = message.as_deref().and_then(parse_availability_list) else {
            tracing::warn!("No availability list in response from {}", locator);
            return Err(ChartServerError::Upstream {
                status,
                message: message.or_else(|| Some("availability list missing from response".to_string())),
            });
        };

        reported
            .iter()
            .map(|raw| {
                parse_utc_timestamp("available_valid_time", raw).map_err(|_| {
                    ChartServerError::Upstream {
                        status,
                        message: Some(format!("unparseable valid time '{}' in availability list", raw)),
                    }
                })
            })
            .collect()
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> ChartServerError {
    tracing::warn!("Request to {} failed: {}", url, err);
    ChartServerError::Transport {
        url: url.to_string(),
        message: err.to_string(),
        timeout: err.is_timeout(),
    }
}

/// Collect at most `limit` bytes; the flag reports whether more were sent
async fn read_capped(
    mut response: Response,
    limit: usize,
) -> Result<(Bytes, bool), reqwest::Error> {
    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body.freeze(), true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body.freeze(), false))
}

async fn upstream_error(response: Response) -> ChartServerError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let message = match read_capped(response, MAX_ERROR_BODY_BYTES).await {
        Ok((body, _)) => error_message(&body),
        Err(e) => Some(format!("failed to read error body: {}", e)),
    };
    tracing::warn!("Upstream returned HTTP {} for {}", status, url);
    ChartServerError::Upstream { status, message }
}

/// Pull the service's error text out of a response body
fn error_message(body: &[u8]) -> Option<String> {
    if let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(body) {
        return match parsed.error {
            ErrorField::Many(messages) => messages.into_iter().next(),
            ErrorField::One(message) => Some(message),
        };
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(MAX_ERROR_BODY_CHARS).collect())
    }
}

/// Extract the bracketed valid-time list from an availability error message
///
/// e.g. `... available valid_time values are: ['2026-01-20T00:00:00Z', '2026-01-20T06:00:00Z']`
fn parse_availability_list(message: &str) -> Option<Vec<String>> {
    let after_marker = &message[message.find(AVAILABILITY_MARKER)?..];
    let open = after_marker.find('[')?;
    let close = open + after_marker[open..].find(']')?;

    Some(
        after_marker[open + 1..close]
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_image(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .is_ok_and(|parsed| parsed.type_() == mime::IMAGE)
}
