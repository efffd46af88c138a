use std::sync::Arc;

use aggs_models::schema::{
    ARG_FROM_DATE,
    ARG_LIMIT,
    ARG_MAX_RESULTS,
    ARG_MULTIPLIER,
    ARG_TICKER,
    ARG_TIMESPAN,
    ARG_TO_DATE,
    TOOL_LIST_AGGS,
};
use aggs_models::{QueryDefaults, Timespan};
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};

const LIST_AGGS_DESCRIPTION: &str = "Fetch aggregate bars (OHLCV data) for a stock ticker";

/// Tool definition for `list_aggs`, advertising the configured defaults.
#[must_use]
pub fn list_aggs_tool(defaults: &QueryDefaults) -> Tool {
    let timespans: Vec<&str> = Timespan::ALL.iter().map(|timespan| timespan.as_str()).collect();

    let mut properties = JsonObject::new();
    properties.insert(
        ARG_TICKER.to_string(),
        json!({ "type": "string", "description": "Stock ticker symbol (e.g. AAPL)" }),
    );
    properties.insert(
        ARG_MULTIPLIER.to_string(),
        json!({
            "type": "integer",
            "minimum": 1,
            "default": defaults.multiplier,
            "description": "Size of the timespan multiplier",
        }),
    );
    properties.insert(
        ARG_TIMESPAN.to_string(),
        json!({
            "type": "string",
            "enum": timespans,
            "default": defaults.timespan.as_str(),
            "description": "Size of the time window",
        }),
    );
    properties.insert(
        ARG_FROM_DATE.to_string(),
        json!({
            "type": "string",
            "default": defaults.from_date,
            "description": "Start date (YYYY-MM-DD)",
        }),
    );
    properties.insert(
        ARG_TO_DATE.to_string(),
        json!({
            "type": "string",
            "default": defaults.to_date,
            "description": "End date (YYYY-MM-DD)",
        }),
    );
    properties.insert(
        ARG_MAX_RESULTS.to_string(),
        json!({
            "type": "integer",
            "minimum": 1,
            "default": defaults.display_limit,
            "description": "Maximum number of bars included in the response",
        }),
    );
    properties.insert(
        ARG_LIMIT.to_string(),
        json!({
            "type": "integer",
            "minimum": 1,
            "default": defaults.fetch_limit,
            "description": "Maximum number of bars fetched from the upstream",
        }),
    );

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), json!([ARG_TICKER]));

    Tool::new(TOOL_LIST_AGGS, LIST_AGGS_DESCRIPTION, Arc::new(schema))
}
