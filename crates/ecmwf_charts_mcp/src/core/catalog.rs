use std::fmt;

use serde::Serialize;

use crate::core::error::{ChartServerError, ChartServerResult};

/// URL template shared by every OpenCharts product, relative to the API base URL
const OPENCHARTS_PRODUCT_TEMPLATE: &str =
    "products/{product_id}/?base_time={base_time}&valid_time={valid_time}";

/// Forecast range a product belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeClass {
    Medium,
    SubSeasonal,
}

impl RangeClass {
    pub const ALL: [RangeClass; 2] = [RangeClass::Medium, RangeClass::SubSeasonal];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeClass::Medium => "medium",
            RangeClass::SubSeasonal => "sub-seasonal",
        }
    }
}

impl fmt::Display for RangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical parameter a product depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterClass {
    Temperature,
    Wind,
    Geopotential,
}

impl ParameterClass {
    pub const ALL: [ParameterClass; 3] = [
        ParameterClass::Temperature,
        ParameterClass::Wind,
        ParameterClass::Geopotential,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterClass::Temperature => "temperature",
            ParameterClass::Wind => "wind",
            ParameterClass::Geopotential => "geopotential",
        }
    }
}

impl fmt::Display for ParameterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spacing rule between consecutive valid times of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cadence {
    /// Weekly-mean periods, derivable from the base time alone
    Weekly,
    /// Six-hourly steps whose availability is reported by the upstream service
    SixHourly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::SixHourly => "six-hourly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chart product offered by ECMWF OpenCharts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub range: RangeClass,
    pub parameter: ParameterClass,
    pub cadence: Cadence,
    pub kind: &'static str,
    pub description: &'static str,
    /// Locator template relative to the API base URL.
    ///
    /// Placeholders: `{product_id}`, `{base_time}`, `{valid_time}`.
    #[serde(skip)]
    pub url_template: &'static str,
}

impl Product {
    /// Substitute the product id and both timestamps into the URL template
    pub fn render_locator(&self, base_time: &str, valid_time: &str) -> String {
        self.url_template
            .replace("{product_id}", self.id)
            .replace("{base_time}", base_time)
            .replace("{valid_time}", valid_time)
    }
}

static PRODUCTS: &[Product] = &[
    Product {
        id: "extended-anomaly-z500",
        name: "500 hPa height: Weekly mean anomalies",
        range: RangeClass::SubSeasonal,
        parameter: ParameterClass::Geopotential,
        cadence: Cadence::Weekly,
        kind: "forecast",
        description: "Extended-range ensemble weekly mean anomalies of 500 hPa geopotential height relative to the model climate.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "extended-anomaly-2t",
        name: "2m temperature: Weekly mean anomalies",
        range: RangeClass::SubSeasonal,
        parameter: ParameterClass::Temperature,
        cadence: Cadence::Weekly,
        kind: "forecast",
        description: "Extended-range ensemble weekly mean anomalies of 2 metre temperature relative to the model climate.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "extended-anomaly-uv",
        name: "10m wind: Weekly mean anomalies",
        range: RangeClass::SubSeasonal,
        parameter: ParameterClass::Wind,
        cadence: Cadence::Weekly,
        kind: "forecast",
        description: "Extended-range ensemble weekly mean anomalies of 10 metre wind relative to the model climate.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "medium-2t-mean-spread",
        name: "Ensemble mean and spread: 2m temperature",
        range: RangeClass::Medium,
        parameter: ParameterClass::Temperature,
        cadence: Cadence::SixHourly,
        kind: "forecast",
        description: "Medium-range ensemble mean and spread of 2 metre temperature.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "medium-t500-mean-spread",
        name: "Ensemble mean and spread: 500 hPa geopotential height",
        range: RangeClass::Medium,
        parameter: ParameterClass::Geopotential,
        cadence: Cadence::SixHourly,
        kind: "forecast",
        description: "Medium-range ensemble mean and spread of 500 hPa geopotential height.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "medium-10ws-mean-spread",
        name: "Ensemble mean and spread: 10m wind speed",
        range: RangeClass::Medium,
        parameter: ParameterClass::Wind,
        cadence: Cadence::SixHourly,
        kind: "forecast",
        description: "Medium-range ensemble mean and spread of 10 metre wind speed.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
    Product {
        id: "medium-ens-wind",
        name: "Probabilities: 100m wind speed",
        range: RangeClass::Medium,
        parameter: ParameterClass::Wind,
        cadence: Cadence::SixHourly,
        kind: "forecast",
        description: "Medium-range ensemble probabilities of 100 metre wind speed exceeding thresholds.",
        url_template: OPENCHARTS_PRODUCT_TEMPLATE,
    },
];

/// Range filter accepted by `list_ecmwf_products`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFilter {
    All,
    Only(RangeClass),
}

impl RangeFilter {
    /// Parse free-text input; anything unrecognized falls back to `All`
    pub fn parse(input: Option<&str>) -> Self {
        let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return RangeFilter::All;
        };
        if raw.eq_ignore_ascii_case("all") {
            return RangeFilter::All;
        }
        match RangeClass::ALL
            .into_iter()
            .find(|range| range.as_str().eq_ignore_ascii_case(raw))
        {
            Some(range) => RangeFilter::Only(range),
            None => {
                tracing::debug!("Unrecognized range filter '{}', listing all ranges", raw);
                RangeFilter::All
            }
        }
    }

    fn matches(&self, range: RangeClass) -> bool {
        match self {
            RangeFilter::All => true,
            RangeFilter::Only(wanted) => *wanted == range,
        }
    }
}

/// Parameter filter accepted by `list_ecmwf_products`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterFilter {
    All,
    Only(ParameterClass),
}

impl ParameterFilter {
    /// Parse free-text input; anything unrecognized falls back to `All`
    pub fn parse(input: Option<&str>) -> Self {
        let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return ParameterFilter::All;
        };
        if raw.eq_ignore_ascii_case("all") {
            return ParameterFilter::All;
        }
        match ParameterClass::ALL
            .into_iter()
            .find(|parameter| parameter.as_str().eq_ignore_ascii_case(raw))
        {
            Some(parameter) => ParameterFilter::Only(parameter),
            None => {
                tracing::debug!(
                    "Unrecognized parameter filter '{}', listing all parameters",
                    raw
                );
                ParameterFilter::All
            }
        }
    }

    fn matches(&self, parameter: ParameterClass) -> bool {
        match self {
            ParameterFilter::All => true,
            ParameterFilter::Only(wanted) => *wanted == parameter,
        }
    }
}

/// Every product in catalog order
pub fn all_products() -> &'static [Product] {
    PRODUCTS
}

/// Products matching both filters, in catalog order
pub fn list_products(range: RangeFilter, parameter: ParameterFilter) -> Vec<&'static Product> {
    PRODUCTS
        .iter()
        .filter(|product| range.matches(product.range) && parameter.matches(product.parameter))
        .collect()
}

/// Exact, case-sensitive lookup by identifier
pub fn get_product(product_id: &str) -> ChartServerResult<&'static Product> {
    PRODUCTS
        .iter()
        .find(|product| product.id == product_id)
        .ok_or_else(|| ChartServerError::NotFound {
            product_id: product_id.to_string(),
        })
}

/// Product identifiers in catalog order
pub fn product_ids() -> Vec<&'static str> {
    PRODUCTS.iter().map(|product| product.id).collect()
}
