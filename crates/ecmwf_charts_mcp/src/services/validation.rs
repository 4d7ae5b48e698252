use crate::core::error::ChartServerError;
use crate::core::models::{FetchChartRequest, GetAvailableTimesRequest};

pub trait Validate {
    fn validate(&self) -> Result<(), ChartServerError>;
}

fn require(field: &str, value: &str) -> Result<(), ChartServerError> {
    if value.is_empty() {
        return Err(ChartServerError::InvalidParams {
            message: format!("{} is required", field),
        });
    }
    Ok(())
}

impl Validate for GetAvailableTimesRequest {
    fn validate(&self) -> Result<(), ChartServerError> {
        require("product_id", &self.product_id)?;
        require("base_time", &self.base_time)
    }
}

impl Validate for FetchChartRequest {
    fn validate(&self) -> Result<(), ChartServerError> {
        require("product_id", &self.product_id)?;
        require("base_time", &self.base_time)?;
        require("valid_time", &self.valid_time)
    }
}
