use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::core::{error::ChartServerResult, models::ChartPayload};

/// Upstream provider of chart images and run availability
///
/// The orchestrator builds locators from the catalog and hands them to a
/// source, which keeps the HTTP client swappable for stubs in tests.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Fetch the chart image addressed by `locator`
    ///
    /// # Returns
    /// * `Ok(ChartPayload)` - The image bytes and content type
    /// * `Err(ChartServerError::Upstream)` - Non-2xx status or unusable response
    /// * `Err(ChartServerError::Transport)` - Timeout or connection failure
    async fn fetch_chart(&self, locator: &Url) -> ChartServerResult<ChartPayload>;

    /// Ask the service which valid times exist for the run addressed by `locator`
    ///
    /// Times are returned in the order the service reported them.
    async fn available_valid_times(&self, locator: &Url) -> ChartServerResult<Vec<DateTime<Utc>>>;
}
