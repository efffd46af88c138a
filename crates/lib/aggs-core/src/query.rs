//! Converts sparse tool arguments into a typed [`AggregateQuery`].
//!
//! Only `ticker` is mandatory. Every other argument falls back to its default
//! when missing or when its value cannot be read as the expected type.

use aggs_models::schema::{
    ARG_FROM_DATE,
    ARG_LIMIT,
    ARG_MAX_RESULTS,
    ARG_MULTIPLIER,
    ARG_TICKER,
    ARG_TIMESPAN,
    ARG_TO_DATE,
};
use aggs_models::{AggregateQuery, QueryDefaults, Timespan};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::RelayError;
use crate::normalize::whole_u64;

/// Builds a query from caller arguments.
///
/// # Errors
/// Returns `InvalidArguments` when `ticker` is absent, not a string, or blank.
pub fn build_query(
    arguments: &Map<String, Value>,
    defaults: &QueryDefaults,
) -> Result<AggregateQuery, RelayError> {
    let ticker = arguments
        .get(ARG_TICKER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|ticker| !ticker.is_empty())
        .ok_or_else(|| RelayError::invalid_arguments("ticker is required"))?;

    let mut query = AggregateQuery::with_defaults(ticker, defaults);

    if let Some(multiplier) = lenient(arguments, ARG_MULTIPLIER, |value| {
        positive_int(value).and_then(|v| u32::try_from(v).ok())
    }) {
        query.multiplier = multiplier;
    }
    if let Some(timespan) = lenient(arguments, ARG_TIMESPAN, |value| {
        value.as_str().and_then(|raw| raw.parse::<Timespan>().ok())
    }) {
        query.timespan = timespan;
    }
    if let Some(from_date) = lenient(arguments, ARG_FROM_DATE, date_string) {
        query.from_date = from_date;
    }
    if let Some(to_date) = lenient(arguments, ARG_TO_DATE, date_string) {
        query.to_date = to_date;
    }
    if let Some(display_limit) = lenient(arguments, ARG_MAX_RESULTS, |value| {
        positive_int(value).and_then(|v| usize::try_from(v).ok())
    }) {
        query.display_limit = display_limit;
    }
    if let Some(fetch_limit) = lenient(arguments, ARG_LIMIT, |value| {
        positive_int(value).and_then(|v| usize::try_from(v).ok())
    }) {
        query.fetch_limit = fetch_limit;
    }

    Ok(query)
}

/// Reads `name` with `parse`, logging values that are present but unusable.
fn lenient<T>(
    arguments: &Map<String, Value>,
    name: &str,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let value = arguments.get(name).filter(|value| !value.is_null())?;
    let parsed = parse(value);
    if parsed.is_none() {
        warn!(argument = name, value = %value, "ignoring unusable argument; using default");
    }
    parsed
}

fn positive_int(value: &Value) -> Option<u64> {
    let parsed = match value {
        Value::Number(_) => whole_u64(value),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.filter(|value| *value > 0)
}

fn date_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::to_string)
}
