use bytes::Bytes;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use rmcp::schemars;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{
    catalog::{Cadence, Product},
    time_model::format_timestamp,
};

/// Helper function to deserialize and trim strings
fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}

/// Request to list catalog products
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListProductsRequest {
    /// Filter by forecast range: "medium", "sub-seasonal" or "all" (default)
    #[serde(default)]
    pub filter_range: Option<String>,
    /// Filter by parameter: "temperature", "wind", "geopotential" or "all" (default)
    #[serde(default)]
    pub filter_parameter: Option<String>,
}

/// Request to list the valid times of a forecast run
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetAvailableTimesRequest {
    /// Product identifier (see list_ecmwf_products)
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub product_id: String,
    /// Base time in ISO format (YYYY-MM-DDTHH:MM:SSZ)
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub base_time: String,
}

/// Request to fetch a chart image
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FetchChartRequest {
    /// Product identifier (see list_ecmwf_products)
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub product_id: String,
    /// Base time in ISO format (YYYY-MM-DDTHH:MM:SSZ). Use the latest available run.
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub base_time: String,
    /// Valid time in ISO format (YYYY-MM-DDTHH:MM:SSZ). Must be available for the product.
    #[serde(deserialize_with = "deserialize_trimmed_string")]
    pub valid_time: String,
}

/// Where a list of valid times came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesSource {
    Computed,
    Upstream,
}

/// Valid times reachable from a forecast run
#[derive(Debug, Clone, Serialize)]
pub struct AvailableTimes {
    pub product_id: String,
    pub base_time: String,
    pub cadence: Cadence,
    pub source: TimesSource,
    pub available_valid_times: Vec<String>,
}

impl AvailableTimes {
    pub fn new(
        product: &Product,
        base_time: &DateTime<Utc>,
        source: TimesSource,
        times: &[DateTime<Utc>],
    ) -> Self {
        Self {
            product_id: product.id.to_string(),
            base_time: format_timestamp(base_time),
            cadence: product.cadence,
            source,
            available_valid_times: times.iter().map(format_timestamp).collect(),
        }
    }
}

/// Image bytes returned by a chart source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPayload {
    pub bytes: Bytes,
    pub content_type: String,
    /// Final image locator, when the source resolved one
    pub image_url: Option<String>,
}

/// A fetched chart with the metadata describing it
#[derive(Debug, Clone, Getters)]
pub struct ChartResult {
    #[getter(skip)]
    product: &'static Product,
    base_time: DateTime<Utc>,
    valid_time: DateTime<Utc>,
    image_url: Option<String>,
    content_type: String,
    image: Bytes,
}

impl ChartResult {
    /// Get field `product` from instance of `ChartResult`.
    pub fn product(&self) -> &'static Product {
        self.product
    }

    pub fn new(
        product: &'static Product,
        base_time: DateTime<Utc>,
        valid_time: DateTime<Utc>,
        payload: ChartPayload,
    ) -> Self {
        Self {
            product,
            base_time,
            valid_time,
            image_url: payload.image_url,
            content_type: payload.content_type,
            image: payload.bytes,
        }
    }

    /// Markdown summary returned alongside the image
    pub fn metadata_text(&self) -> String {
        format!(
            r#"# ECMWF Chart: {name}

**Product ID:** {id}
**Range:** {range}
**Parameter:** {parameter}
**Cadence:** {cadence}

**Base time:** {base_time}
**Valid time:** {valid_time}

**Image URL:** {image_url}
**Content type:** {content_type}
**Size:** {size} bytes
"#,
            name = self.product.name,
            id = self.product.id,
            range = self.product.range,
            parameter = self.product.parameter,
            cadence = self.product.cadence,
            base_time = format_timestamp(&self.base_time),
            valid_time = format_timestamp(&self.valid_time),
            image_url = self.image_url.as_deref().unwrap_or("N/A"),
            content_type = self.content_type,
            size = self.image.len(),
        )
    }
}
