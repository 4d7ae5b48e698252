use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::core::{
    catalog::{self, ParameterFilter, Product, RangeFilter},
    error::{ChartServerError, ChartServerResult},
    models::{AvailableTimes, ChartResult, TimesSource},
    source::ChartSource,
    time_model::{self, Availability, PairCheck},
};

/// Valid time far outside any run; the service answers it with the list of real steps
pub const AVAILABILITY_PROBE_VALID_TIME: &str = "2099-01-01T00:00:00Z";

/// Images larger than this are passed through but flagged in the logs
const LARGE_IMAGE_BYTES: usize = 1024 * 1024;

/// Chart orchestrator combining the catalog, the time model and a chart source.
///
/// Holds no mutable state; every call is determined by its arguments, the
/// static catalog and the upstream service. No call is retried.
#[derive(Clone)]
pub struct ChartProvider {
    base_url: Url,
    source: Arc<dyn ChartSource>,
}

impl ChartProvider {
    pub fn new(base_url: Url, source: Arc<dyn ChartSource>) -> Self {
        Self { base_url, source }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Products matching the loose range/parameter filters
    pub fn list_products(
        &self,
        filter_range: Option<&str>,
        filter_parameter: Option<&str>,
    ) -> Vec<&'static Product> {
        catalog::list_products(
            RangeFilter::parse(filter_range),
            ParameterFilter::parse(filter_parameter),
        )
    }

    /// Valid times of a run: computed for weekly products, asked upstream for six-hourly ones
    pub async fn get_available_times(
        &self,
        product_id: &str,
        base_time: &str,
    ) -> ChartServerResult<AvailableTimes> {
        let product = catalog::get_product(product_id)?;
        let base = time_model::parse_utc_timestamp("base_time", base_time)?;

        match time_model::compute_available_times(product, base) {
            Availability::Computed(times) => Ok(AvailableTimes::new(
                product,
                &base,
                TimesSource::Computed,
                &times,
            )),
            Availability::Delegated => {
                let times = self.upstream_times(product, &base).await?;
                Ok(AvailableTimes::new(
                    product,
                    &base,
                    TimesSource::Upstream,
                    &times,
                ))
            }
        }
    }

    /// Fetch one chart after checking the (base, valid) pair against the product cadence
    pub async fn fetch_chart(
        &self,
        product_id: &str,
        base_time: &str,
        valid_time: &str,
    ) -> ChartServerResult<ChartResult> {
        let product = catalog::get_product(product_id)?;
        let base = time_model::parse_utc_timestamp("base_time", base_time)?;
        let valid = time_model::parse_utc_timestamp("valid_time", valid_time)?;

        match time_model::validate_time_pair(product, base, valid)? {
            PairCheck::Verified => {}
            PairCheck::DeferToUpstream => {
                let available = self.upstream_times(product, &base).await?;
                if available.binary_search(&valid).is_err() {
                    return Err(ChartServerError::InvalidValidTime {
                        product_id: product.id.to_string(),
                        base_time: time_model::format_timestamp(&base),
                        valid_time: time_model::format_timestamp(&valid),
                        available: available
                            .iter()
                            .map(time_model::format_timestamp)
                            .collect(),
                    });
                }
            }
        }

        let locator = self.locator(
            product,
            &time_model::format_timestamp(&base),
            &time_model::format_timestamp(&valid),
        )?;
        tracing::info!("Fetching {} from {}", product.id, locator);

        let payload = self.source.fetch_chart(&locator).await?;
        if payload.bytes.len() > LARGE_IMAGE_BYTES {
            tracing::warn!(
                "Chart {} is {} bytes; some clients reject images over {} bytes",
                product.id,
                payload.bytes.len(),
                LARGE_IMAGE_BYTES
            );
        }

        Ok(ChartResult::new(product, base, valid, payload))
    }

    async fn upstream_times(
        &self,
        product: &Product,
        base: &DateTime<Utc>,
    ) -> ChartServerResult<Vec<DateTime<Utc>>> {
        let locator = self.locator(
            product,
            &time_model::format_timestamp(base),
            AVAILABILITY_PROBE_VALID_TIME,
        )?;
        tracing::debug!("Probing availability of {} at {}", product.id, locator);

        let reported = self.source.available_valid_times(&locator).await?;
        Ok(time_model::normalize_reported_times(reported))
    }

    fn locator(
        &self,
        product: &Product,
        base_time: &str,
        valid_time: &str,
    ) -> ChartServerResult<Url> {
        let relative = product.render_locator(base_time, valid_time);
        self.base_url.join(&relative).map_err(|e| ChartServerError::Client {
            message: format!("invalid chart locator '{}': {}", relative, e),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::core::models::ChartPayload;

    pub(crate) const PNG_STUB: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRstub-chart";

    /// How a stubbed availability lookup fails
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum AvailabilityFailure {
        Status(u16),
        Timeout,
    }

    impl AvailabilityFailure {
        fn into_error(self, locator: &Url) -> ChartServerError {
            match self {
                AvailabilityFailure::Status(status) => ChartServerError::Upstream {
                    status,
                    message: Some("stubbed availability failure".to_string()),
                },
                AvailabilityFailure::Timeout => ChartServerError::Transport {
                    url: locator.to_string(),
                    message: "operation timed out".to_string(),
                    timeout: true,
                },
            }
        }
    }

    /// In-memory chart source recording the locators it was asked for
    pub(crate) struct StubSource {
        chart: Result<ChartPayload, u16>,
        times: Result<Vec<&'static str>, AvailabilityFailure>,
        pub(crate) chart_calls: AtomicUsize,
        pub(crate) availability_calls: AtomicUsize,
        pub(crate) last_locator: Mutex<Option<Url>>,
    }

    impl StubSource {
        pub(crate) fn png() -> Self {
            Self {
                chart: Ok(ChartPayload {
                    bytes: Bytes::from_static(PNG_STUB),
                    content_type: "image/png".to_string(),
                    image_url: Some("https://stub.example/chart.png".to_string()),
                }),
                times: Ok(Vec::new()),
                chart_calls: AtomicUsize::new(0),
                availability_calls: AtomicUsize::new(0),
                last_locator: Mutex::new(None),
            }
        }

        pub(crate) fn failing(status: u16) -> Self {
            Self {
                chart: Err(status),
                ..Self::png()
            }
        }

        pub(crate) fn with_times(mut self, times: Vec<&'static str>) -> Self {
            self.times = Ok(times);
            self
        }

        pub(crate) fn with_availability_failure(mut self, failure: AvailabilityFailure) -> Self {
            self.times = Err(failure);
            self
        }
    }

    #[async_trait]
    impl ChartSource for StubSource {
        async fn fetch_chart(&self, locator: &Url) -> ChartServerResult<ChartPayload> {
            self.chart_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_locator.lock().unwrap() = Some(locator.clone());
            match &self.chart {
                Ok(payload) => Ok(payload.clone()),
                Err(status) => Err(ChartServerError::Upstream {
                    status: *status,
                    message: Some("stubbed failure".to_string()),
                }),
            }
        }

        async fn available_valid_times(
            &self,
            locator: &Url,
        ) -> ChartServerResult<Vec<DateTime<Utc>>> {
            self.availability_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_locator.lock().unwrap() = Some(locator.clone());
            match &self.times {
                Ok(times) => Ok(times
                    .iter()
                    .map(|t| time_model::parse_utc_timestamp("stub", t).unwrap())
                    .collect()),
                Err(failure) => Err(failure.into_error(locator)),
            }
        }
    }

    pub(crate) fn provider(source: Arc<StubSource>) -> ChartProvider {
        let base_url = Url::parse("https://charts.example/opencharts-api/v1/").unwrap();
        ChartProvider::new(base_url, source)
    }

    #[tokio::test]
    async fn test_fetch_weekly_chart() {
        let source = Arc::new(StubSource::png());
        let provider = provider(source.clone());

        let result = provider
            .fetch_chart(
                "extended-anomaly-z500",
                "2026-01-20T00:00:00Z",
                "2026-02-02T00:00:00Z",
            )
            .await
            .unwrap();

        assert_eq!(result.image().as_ref(), PNG_STUB);
        assert_eq!(result.content_type(), "image/png");
        assert_eq!(result.product().id, "extended-anomaly-z500");

        let text = result.metadata_text();
        assert!(text.contains("extended-anomaly-z500"));
        assert!(text.contains("2026-01-20T00:00:00Z"));
        assert!(text.contains("2026-02-02T00:00:00Z"));

        // Weekly products never probe availability
        assert_eq!(source.availability_calls.load(Ordering::SeqCst), 0);
        let locator = source.last_locator.lock().unwrap().clone().unwrap();
        assert_eq!(
            locator.as_str(),
            "https://charts.example/opencharts-api/v1/products/extended-anomaly-z500/?base_time=2026-01-20T00:00:00Z&valid_time=2026-02-02T00:00:00Z"
        );
    }

    #[tokio::test]
    async fn test_fetch_upstream_failure_keeps_status() {
        let provider = provider(Arc::new(StubSource::failing(404)));

        let result = provider
            .fetch_chart(
                "extended-anomaly-z500",
                "2026-01-20T00:00:00Z",
                "2026-02-02T00:00:00Z",
            )
            .await;

        assert!(matches!(
            result,
            Err(ChartServerError::Upstream { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let source = Arc::new(StubSource::png());
        let provider = provider(source.clone());

        let first = provider
            .fetch_chart(
                "extended-anomaly-2t",
                "2026-01-20T00:00:00Z",
                "2026-02-03T00:00:00Z",
            )
            .await
            .unwrap();
        let second = provider
            .fetch_chart(
                "extended-anomaly-2t",
                "2026-01-20T00:00:00Z",
                "2026-02-03T00:00:00Z",
            )
            .await
            .unwrap();

        assert_eq!(first.image(), second.image());
        assert_eq!(first.metadata_text(), second.metadata_text());
        assert_eq!(source.chart_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_weekly_cadence_mismatch_skips_upstream() {
        let source = Arc::new(StubSource::png());
        let provider = provider(source.clone());

        let result = provider
            .fetch_chart(
                "extended-anomaly-z500",
                "2026-01-20T00:00:00Z",
                "2026-01-25T00:00:00Z",
            )
            .await;

        assert!(matches!(
            result,
            Err(ChartServerError::CadenceMismatch { .. })
        ));
        assert_eq!(source.chart_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_product_then_recovery() {
        let provider = provider(Arc::new(StubSource::png()));

        let result = provider
            .fetch_chart(
                "nonexistent-id",
                "2026-01-20T00:00:00Z",
                "2026-02-02T00:00:00Z",
            )
            .await;
        assert!(matches!(result, Err(ChartServerError::NotFound { .. })));

        let result = provider
            .get_available_times("nonexistent-id", "2026-01-20T00:00:00Z")
            .await;
        assert!(matches!(result, Err(ChartServerError::NotFound { .. })));

        assert!(
            provider
                .get_available_times("extended-anomaly-z500", "2026-01-20T00:00:00Z")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_malformed_times_name_field() {
        let provider = provider(Arc::new(StubSource::png()));

        let result = provider
            .fetch_chart("extended-anomaly-z500", "not-a-time", "2026-02-02T00:00:00Z")
            .await;
        assert!(matches!(
            result,
            Err(ChartServerError::TimeParse { field: "base_time", .. })
        ));

        let result = provider
            .fetch_chart("extended-anomaly-z500", "2026-01-20T00:00:00Z", "2026-02-02")
            .await;
        assert!(matches!(
            result,
            Err(ChartServerError::TimeParse { field: "valid_time", .. })
        ));
    }

    #[tokio::test]
    async fn test_weekly_available_times_are_computed() {
        let source = Arc::new(StubSource::png());
        let provider = provider(source.clone());

        let times = provider
            .get_available_times("extended-anomaly-uv", "2026-01-20T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(times.source, TimesSource::Computed);
        assert_eq!(times.available_valid_times.len(), 6);
        assert_eq!(times.available_valid_times[0], "2026-01-27T00:00:00Z");
        assert_eq!(times.available_valid_times[1], "2026-02-03T00:00:00Z");
        assert_eq!(source.availability_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_six_hourly_available_times_come_from_upstream() {
        let source = Arc::new(StubSource::png().with_times(vec![
            "2026-01-20T12:00:00Z",
            "2026-01-20T00:00:00Z",
            "2026-01-20T06:00:00Z",
            "2026-01-20T12:00:00Z",
        ]));
        let provider = provider(source.clone());

        let times = provider
            .get_available_times("medium-2t-mean-spread", "2026-01-20T00:00:00Z")
            .await
            .unwrap();

        assert_eq!(times.source, TimesSource::Upstream);
        assert_eq!(
            times.available_valid_times,
            vec![
                "2026-01-20T00:00:00Z",
                "2026-01-20T06:00:00Z",
                "2026-01-20T12:00:00Z"
            ]
        );

        let locator = source.last_locator.lock().unwrap().clone().unwrap();
        assert!(locator.as_str().contains("valid_time=2099-01-01T00:00:00Z"));
        assert!(locator.as_str().contains("products/medium-2t-mean-spread/"));
    }

    #[tokio::test]
    async fn test_six_hourly_fetch_checks_membership() {
        let source = Arc::new(
            StubSource::png().with_times(vec!["2026-01-20T00:00:00Z", "2026-01-20T06:00:00Z"]),
        );
        let provider = provider(source.clone());

        let result = provider
            .fetch_chart(
                "medium-ens-wind",
                "2026-01-20T00:00:00Z",
                "2026-01-20T06:00:00Z",
            )
            .await
            .unwrap();
        assert_eq!(result.image().as_ref(), PNG_STUB);

        let result = provider
            .fetch_chart(
                "medium-ens-wind",
                "2026-01-20T00:00:00Z",
                "2026-01-20T18:00:00Z",
            )
            .await;
        match result {
            Err(ChartServerError::InvalidValidTime { available, .. }) => {
                assert_eq!(
                    available,
                    vec!["2026-01-20T00:00:00Z", "2026-01-20T06:00:00Z"]
                );
            }
            other => panic!("expected InvalidValidTime, got {other:?}"),
        }

        assert_eq!(source.availability_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.chart_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_six_hourly_available_times_propagate_upstream_status() {
        let source = Arc::new(
            StubSource::png().with_availability_failure(AvailabilityFailure::Status(503)),
        );
        let provider = provider(source.clone());

        let result = provider
            .get_available_times("medium-2t-mean-spread", "2026-01-20T00:00:00Z")
            .await;

        assert!(matches!(
            result,
            Err(ChartServerError::Upstream { status: 503, .. })
        ));
        assert_eq!(source.availability_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_six_hourly_available_times_propagate_transport_failure() {
        let provider = provider(Arc::new(
            StubSource::png().with_availability_failure(AvailabilityFailure::Timeout),
        ));

        let result = provider
            .get_available_times("medium-2t-mean-spread", "2026-01-20T00:00:00Z")
            .await;

        assert!(matches!(
            result,
            Err(ChartServerError::Transport { timeout: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_six_hourly_fetch_stops_when_availability_fails() {
        for failure in [AvailabilityFailure::Status(404), AvailabilityFailure::Timeout] {
            let source = Arc::new(StubSource::png().with_availability_failure(failure));
            let provider = provider(source.clone());

            let result = provider
                .fetch_chart(
                    "medium-2t-mean-spread",
                    "2026-01-20T00:00:00Z",
                    "2026-01-20T06:00:00Z",
                )
                .await;

            match (failure, result) {
                (AvailabilityFailure::Status(_), Err(ChartServerError::Upstream { status, .. })) => {
                    assert_eq!(status, 404)
                }
                (AvailabilityFailure::Timeout, Err(ChartServerError::Transport { timeout, .. })) => {
                    assert!(timeout)
                }
                (failure, other) => panic!("{failure:?} surfaced as {other:?}"),
            }
            assert_eq!(source.availability_calls.load(Ordering::SeqCst), 1);
            assert_eq!(source.chart_calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_list_products_uses_loose_filters() {
        let provider = provider(Arc::new(StubSource::png()));

        assert_eq!(provider.list_products(None, None).len(), 7);
        assert_eq!(provider.list_products(Some("medium"), None).len(), 4);
        assert_eq!(provider.list_products(Some("bogus"), Some("wind")).len(), 3);
    }
}
