//! Aggregate sources backing the reference upstream.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::{error::Error, fmt, fs, io};

use aggs_models::{AggregateBar, Timespan};
use chrono::{DateTime, NaiveDate};

/// One validated `list_aggs` request, as handed to a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub ticker: String,
    pub multiplier: u32,
    pub timespan: Timespan,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    UnknownTicker(String),
    Failed(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTicker(ticker) => write!(f, "ticker not found: {ticker}"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

impl Error for SourceError {}

/// Provider of raw aggregate bars.
pub trait AggregateSource: Send + Sync {
    /// Bars for `request.ticker` inside `[from, to]`, oldest first, at most
    /// `request.limit` of them.
    fn aggregates(
        &self,
        request: &SourceRequest,
    ) -> impl Future<Output = Result<Vec<AggregateBar>, SourceError>> + Send;
}

#[derive(Debug)]
pub enum FixtureError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read fixture: {err}"),
            Self::Json(err) => write!(f, "invalid fixture: {err}"),
        }
    }
}

impl Error for FixtureError {}

impl From<io::Error> for FixtureError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for FixtureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// In-memory source loaded from a JSON object of `ticker -> [bar, ...]`.
///
/// Tickers match case-insensitively. Bars are served at their stored
/// resolution; `multiplier` and `timespan` do not resample them.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    bars: HashMap<String, Vec<AggregateBar>>,
}

impl FixtureSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a fixture file.
    ///
    /// # Errors
    /// Returns `FixtureError` if the file cannot be read or is not a ticker map
    /// of bar records.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses fixture JSON.
    ///
    /// # Errors
    /// Returns `FixtureError::Json` if `raw` is not a ticker map of bar records.
    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        let parsed: HashMap<String, Vec<AggregateBar>> = serde_json::from_str(raw)?;
        let mut source = Self::new();
        for (ticker, bars) in parsed {
            source.insert(&ticker, bars);
        }
        Ok(source)
    }

    /// Adds (or replaces) the bars for `ticker`.
    pub fn insert(&mut self, ticker: &str, mut bars: Vec<AggregateBar>) {
        bars.sort_by_key(|bar| bar.timestamp);
        self.bars.insert(ticker.trim().to_ascii_uppercase(), bars);
    }

    #[must_use]
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.bars.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    fn lookup(&self, request: &SourceRequest) -> Result<Vec<AggregateBar>, SourceError> {
        let bars = self
            .bars
            .get(&request.ticker.trim().to_ascii_uppercase())
            .ok_or_else(|| SourceError::UnknownTicker(request.ticker.clone()))?;

        Ok(bars
            .iter()
            .filter(|bar| within(bar.timestamp, request.from, request.to))
            .take(request.limit)
            .cloned()
            .collect())
    }
}

impl AggregateSource for FixtureSource {
    async fn aggregates(&self, request: &SourceRequest) -> Result<Vec<AggregateBar>, SourceError> {
        self.lookup(request)
    }
}

fn within(timestamp_ms: i64, from: NaiveDate, to: NaiveDate) -> bool {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|at| at.date_naive())
        .is_some_and(|day| from <= day && day <= to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: i64) -> AggregateBar {
        AggregateBar {
            timestamp,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10,
            vwap: None,
            transaction_count: None,
        }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid test date")
    }

    fn request(ticker: &str, from: &str, to: &str, limit: usize) -> SourceRequest {
        SourceRequest {
            ticker: ticker.to_string(),
            multiplier: 1,
            timespan: Timespan::Day,
            from: date(from),
            to: date(to),
            limit,
        }
    }

    // 2024-01-02, 2024-01-03, 2024-01-04 at 05:00 UTC
    const JAN_2: i64 = 1_704_171_600_000;
    const JAN_3: i64 = 1_704_258_000_000;
    const JAN_4: i64 = 1_704_344_400_000;

    #[test]
    fn filters_by_inclusive_date_range_and_sorts() {
        let mut source = FixtureSource::new();
        source.insert("aapl", vec![bar(JAN_4), bar(JAN_2), bar(JAN_3)]);

        let bars = source
            .lookup(&request("AAPL", "2024-01-03", "2024-01-04", 10))
            .expect("ticker is known");

        let stamps: Vec<i64> = bars.iter().map(|bar| bar.timestamp).collect();
        assert_eq!(stamps, vec![JAN_3, JAN_4]);
    }

    #[test]
    fn honors_limit() {
        let mut source = FixtureSource::new();
        source.insert("AAPL", vec![bar(JAN_2), bar(JAN_3), bar(JAN_4)]);

        let bars = source
            .lookup(&request("aapl", "2024-01-01", "2024-01-31", 2))
            .expect("ticker is known");

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, JAN_2);
    }

    #[test]
    fn unknown_ticker_is_reported() {
        let source = FixtureSource::new();

        let err = source
            .lookup(&request("ZZZZ", "2024-01-01", "2024-01-31", 10))
            .expect_err("empty source knows no tickers");

        assert_eq!(err, SourceError::UnknownTicker("ZZZZ".to_string()));
        assert_eq!(err.to_string(), "ticker not found: ZZZZ");
    }

    #[test]
    fn parses_fixture_json_with_optional_fields() {
        let raw = r#"{
            "msft": [
                { "timestamp": 1704171600000, "open": 370.87, "high": 372.1, "low": 369.0,
                  "close": 371.5, "volume": 2500, "vwap": null, "transactions": null }
            ]
        }"#;

        let source = FixtureSource::from_json(raw).expect("fixture should parse");

        assert_eq!(source.tickers(), vec!["MSFT"]);
    }

    #[test]
    fn rejects_malformed_fixture() {
        let err = FixtureSource::from_json(r#"{ "AAPL": [ { "open": 1.0 } ] }"#)
            .expect_err("bars need every required field");
        assert!(matches!(err, FixtureError::Json(_)));
    }
}
