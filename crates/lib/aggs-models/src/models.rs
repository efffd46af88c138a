use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::{
    DEFAULT_DISPLAY_LIMIT,
    DEFAULT_FETCH_LIMIT,
    DEFAULT_FROM_DATE,
    DEFAULT_MULTIPLIER,
    DEFAULT_TO_DATE,
};

/// Size of the window each aggregate bar covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    Minute,
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Timespan {
    pub const ALL: [Self; 7] = [
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Quarter,
        Self::Year,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTimespan(pub String);

impl fmt::Display for UnknownTimespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown timespan: {}", self.0)
    }
}

impl std::error::Error for UnknownTimespan {}

impl FromStr for Timespan {
    type Err = UnknownTimespan;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|timespan| timespan.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownTimespan(value.to_string()))
    }
}

/// Fallback values applied to every field a caller leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub multiplier: u32,
    pub timespan: Timespan,
    pub from_date: String,
    pub to_date: String,
    pub display_limit: usize,
    pub fetch_limit: usize,
}

impl QueryDefaults {
    #[must_use]
    pub fn with_display_limit(mut self, display_limit: usize) -> Self {
        self.display_limit = display_limit;
        self
    }

    #[must_use]
    pub fn with_fetch_limit(mut self, fetch_limit: usize) -> Self {
        self.fetch_limit = fetch_limit;
        self
    }
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            timespan: Timespan::default(),
            from_date: DEFAULT_FROM_DATE.to_string(),
            to_date: DEFAULT_TO_DATE.to_string(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

/// Fully populated aggregates request.
///
/// `from_date <= to_date` is left to the upstream to enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub ticker: String,
    pub multiplier: u32,
    pub timespan: Timespan,
    pub from_date: String,
    pub to_date: String,
    pub display_limit: usize,
    pub fetch_limit: usize,
}

impl AggregateQuery {
    /// Builds a query for `ticker` with every other field taken from `defaults`.
    #[must_use]
    pub fn with_defaults(ticker: impl Into<String>, defaults: &QueryDefaults) -> Self {
        Self {
            ticker: ticker.into(),
            multiplier: defaults.multiplier,
            timespan: defaults.timespan,
            from_date: defaults.from_date.clone(),
            to_date: defaults.to_date.clone(),
            display_limit: defaults.display_limit,
            fetch_limit: defaults.fetch_limit,
        }
    }
}

/// One OHLCV record over a fixed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBar {
    /// Window start, epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub vwap: Option<f64>,
    #[serde(rename = "transactions")]
    pub transaction_count: Option<u64>,
}

/// Normalized response for one `list_aggs` call.
///
/// Field order is the serialized key order; optional values serialize as
/// `null` so the payload keeps one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub ticker: String,
    #[serde(rename = "timespan")]
    pub resolved_timespan_label: String,
    pub from_date: String,
    pub to_date: String,
    #[serde(rename = "count")]
    pub total_count: usize,
    #[serde(rename = "aggregates")]
    pub bars: Vec<AggregateBar>,
    #[serde(rename = "note")]
    pub truncation_note: Option<String>,
}
