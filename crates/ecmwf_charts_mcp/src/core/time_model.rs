use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc, Weekday};

use crate::core::{
    catalog::{Cadence, Product},
    error::{ChartServerError, ChartServerResult},
};

/// Timestamp format used on the wire and in every tool response
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Weekly steps listed for sub-seasonal products.
///
/// ECMWF extended-range forecasts run to day 46, which covers six complete
/// weekly-mean periods.
pub const WEEKLY_HORIZON_WEEKS: i64 = 6;

/// Valid times reachable from a base time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Derived locally from the cadence
    Computed(Vec<DateTime<Utc>>),
    /// Only the upstream service knows which steps of the run exist
    Delegated,
}

/// Outcome of a local (base, valid) consistency check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairCheck {
    Verified,
    DeferToUpstream,
}

/// Parse an ISO-8601 timestamp carrying an explicit UTC designator.
///
/// Accepts `Z` and `+00:00`. Sub-second precision is dropped.
pub fn parse_utc_timestamp(field: &'static str, value: &str) -> ChartServerResult<DateTime<Utc>> {
    let invalid = || ChartServerError::TimeParse {
        field,
        value: value.to_string(),
    };

    let parsed = DateTime::parse_from_rfc3339(value.trim()).map_err(|_| invalid())?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(invalid());
    }

    let utc = parsed.with_timezone(&Utc);
    Ok(utc.with_nanosecond(0).unwrap_or(utc))
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(WIRE_FORMAT).to_string()
}

/// Valid times for a product run, or `Delegated` when only upstream can tell
pub fn compute_available_times(product: &Product, base_time: DateTime<Utc>) -> Availability {
    match product.cadence {
        Cadence::Weekly => Availability::Computed(weekly_valid_times(base_time)),
        Cadence::SixHourly => Availability::Delegated,
    }
}

fn weekly_valid_times(base_time: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    (1..=WEEKLY_HORIZON_WEEKS)
        .filter_map(|week| base_time.checked_add_signed(TimeDelta::weeks(week)))
        .collect()
}

/// Sort ascending and drop duplicates; nothing else is changed
pub fn normalize_reported_times(mut times: Vec<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
    times.sort_unstable();
    times.dedup();
    times
}

/// Check that `valid_time` is reachable from `base_time` under the product's cadence.
///
/// Weekly products accept `base + 7k days` (k >= 0) and the Monday 00:00Z that
/// opens the week holding one of the listed steps, so only periods inside
/// the forecast horizon qualify. Six-hourly products are checked against
/// upstream availability by the caller.
pub fn validate_time_pair(
    product: &Product,
    base_time: DateTime<Utc>,
    valid_time: DateTime<Utc>,
) -> ChartServerResult<PairCheck> {
    match product.cadence {
        Cadence::Weekly => {
            if is_weekly_step(base_time, valid_time) || opens_weekly_period(base_time, valid_time)
            {
                Ok(PairCheck::Verified)
            } else {
                Err(ChartServerError::CadenceMismatch {
                    product_id: product.id.to_string(),
                    base_time: format_timestamp(&base_time),
                    valid_time: format_timestamp(&valid_time),
                })
            }
        }
        Cadence::SixHourly => Ok(PairCheck::DeferToUpstream),
    }
}

fn is_weekly_step(base_time: DateTime<Utc>, valid_time: DateTime<Utc>) -> bool {
    let offset = valid_time - base_time;
    offset >= TimeDelta::zero() && offset.num_seconds() % TimeDelta::weeks(1).num_seconds() == 0
}

/// Monday 00:00Z whose week `[valid, valid + 7 days)` contains a listed step
fn opens_weekly_period(base_time: DateTime<Utc>, valid_time: DateTime<Utc>) -> bool {
    if valid_time.weekday() != Weekday::Mon || valid_time.num_seconds_from_midnight() != 0 {
        return false;
    }

    let period_end = valid_time + TimeDelta::weeks(1);
    weekly_valid_times(base_time)
        .iter()
        .any(|step| *step >= valid_time && *step < period_end)
}
