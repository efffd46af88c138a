//! Maps upstream aggregate payloads onto the fixed [`AggregateResult`] schema.
//!
//! The whole payload is rejected if any record is unusable; callers never see
//! a partial bar list presented as complete.

use std::{error::Error, fmt};

use aggs_models::schema::{make_timespan_label, make_truncation_note};
use aggs_models::{AggregateBar, AggregateQuery, AggregateResult};
use serde_json::{Map, Value};

const ENVELOPE_KEYS: [&str; 2] = ["results", "aggregates"];
// Providers drop the record array entirely when a query matches nothing.
const ENVELOPE_COUNT_KEYS: [&str; 2] = ["resultsCount", "count"];

const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "t"];
const OPEN_KEYS: [&str; 2] = ["open", "o"];
const HIGH_KEYS: [&str; 2] = ["high", "h"];
const LOW_KEYS: [&str; 2] = ["low", "l"];
const CLOSE_KEYS: [&str; 2] = ["close", "c"];
const VOLUME_KEYS: [&str; 2] = ["volume", "v"];
const VWAP_KEYS: [&str; 2] = ["vwap", "vw"];
const TRANSACTION_KEYS: [&str; 3] = ["transactions", "transaction_count", "n"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    InvalidJson(String),
    UnexpectedShape(&'static str),
    RecordNotObject { index: usize },
    MissingField { index: usize, field: &'static str },
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(message) => write!(f, "invalid JSON: {message}"),
            Self::UnexpectedShape(found) => {
                write!(f, "expected an array of aggregate records, found {found}")
            }
            Self::RecordNotObject { index } => write!(f, "record {index} is not an object"),
            Self::MissingField { index, field } => {
                write!(f, "record {index} is missing field `{field}`")
            }
            Self::InvalidField {
                index,
                field,
                expected,
            } => write!(f, "record {index} field `{field}` must be {expected}"),
        }
    }
}

impl Error for NormalizeError {}

/// Parses and truncates a successful upstream body for `query`.
///
/// # Errors
/// Returns `NormalizeError` if the body is not JSON, has no record array, or
/// any record lacks a mandatory field.
pub fn normalize(query: &AggregateQuery, body: &[u8]) -> Result<AggregateResult, NormalizeError> {
    let bars = parse_bars(body)?;
    Ok(truncate(query, bars))
}

/// Parses every record in `body`, preserving upstream order.
///
/// # Errors
/// Returns `NormalizeError` on the first unusable record.
pub fn parse_bars(body: &[u8]) -> Result<Vec<AggregateBar>, NormalizeError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|err| NormalizeError::InvalidJson(err.to_string()))?;
    let records = records(&payload)?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .as_object()
                .ok_or(NormalizeError::RecordNotObject { index })
                .and_then(|record| parse_bar(index, record))
        })
        .collect()
}

/// Applies the display cap to already-parsed bars.
#[must_use]
pub fn truncate(query: &AggregateQuery, mut bars: Vec<AggregateBar>) -> AggregateResult {
    let total_count = bars.len();
    let truncation_note = if total_count > query.display_limit {
        bars.truncate(query.display_limit);
        Some(make_truncation_note(query.display_limit, total_count))
    } else {
        None
    };

    AggregateResult {
        ticker: query.ticker.clone(),
        resolved_timespan_label: make_timespan_label(query.multiplier, query.timespan.as_str()),
        from_date: query.from_date.clone(),
        to_date: query.to_date.clone(),
        total_count,
        bars,
        truncation_note,
    }
}

fn records(payload: &Value) -> Result<&[Value], NormalizeError> {
    match payload {
        Value::Array(records) => Ok(records.as_slice()),
        Value::Object(envelope) => {
            if let Some(records) = ENVELOPE_KEYS
                .iter()
                .find_map(|key| envelope.get(*key).and_then(Value::as_array))
            {
                return Ok(records.as_slice());
            }
            let empty = ENVELOPE_COUNT_KEYS
                .iter()
                .any(|key| envelope.get(*key).and_then(Value::as_u64) == Some(0));
            if empty {
                Ok(&[])
            } else {
                Err(NormalizeError::UnexpectedShape("an object without a record array"))
            }
        }
        Value::Null => Err(NormalizeError::UnexpectedShape("null")),
        Value::Bool(_) => Err(NormalizeError::UnexpectedShape("a boolean")),
        Value::Number(_) => Err(NormalizeError::UnexpectedShape("a number")),
        Value::String(_) => Err(NormalizeError::UnexpectedShape("a string")),
    }
}

fn parse_bar(index: usize, record: &Map<String, Value>) -> Result<AggregateBar, NormalizeError> {
    let fields = RecordFields { index, record };
    Ok(AggregateBar {
        timestamp: fields.required("timestamp", &TIMESTAMP_KEYS, whole_i64, "an integer")?,
        open: fields.required("open", &OPEN_KEYS, Value::as_f64, "a number")?,
        high: fields.required("high", &HIGH_KEYS, Value::as_f64, "a number")?,
        low: fields.required("low", &LOW_KEYS, Value::as_f64, "a number")?,
        close: fields.required("close", &CLOSE_KEYS, Value::as_f64, "a number")?,
        volume: fields.required("volume", &VOLUME_KEYS, whole_u64, "a non-negative integer")?,
        vwap: fields.optional("vwap", &VWAP_KEYS, Value::as_f64, "a number")?,
        transaction_count: fields.optional(
            "transactions",
            &TRANSACTION_KEYS,
            whole_u64,
            "a non-negative integer",
        )?,
    })
}

struct RecordFields<'a> {
    index: usize,
    record: &'a Map<String, Value>,
}

impl RecordFields<'_> {
    fn lookup(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .find_map(|key| self.record.get(*key).filter(|value| !value.is_null()))
    }

    fn required<T>(
        &self,
        field: &'static str,
        keys: &[&str],
        read: fn(&Value) -> Option<T>,
        expected: &'static str,
    ) -> Result<T, NormalizeError> {
        self.optional(field, keys, read, expected)?
            .ok_or(NormalizeError::MissingField {
                index: self.index,
                field,
            })
    }

    fn optional<T>(
        &self,
        field: &'static str,
        keys: &[&str],
        read: fn(&Value) -> Option<T>,
        expected: &'static str,
    ) -> Result<Option<T>, NormalizeError> {
        self.lookup(keys)
            .map(|value| {
                read(value).ok_or(NormalizeError::InvalidField {
                    index: self.index,
                    field,
                    expected,
                })
            })
            .transpose()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|raw| raw.fract() == 0.0 && raw.abs() < i64::MAX as f64)
            .map(|raw| raw as i64)
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub(crate) fn whole_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|raw| raw.fract() == 0.0 && *raw >= 0.0 && *raw < u64::MAX as f64)
            .map(|raw| raw as u64)
    })
}
