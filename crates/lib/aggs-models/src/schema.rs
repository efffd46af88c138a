pub const TOOL_LIST_AGGS: &str = "list_aggs";
pub const UPSTREAM_LIST_AGGS_PATH: &str = "/v1/list_aggs";

pub const ARG_TICKER: &str = "ticker";
pub const ARG_MULTIPLIER: &str = "multiplier";
pub const ARG_TIMESPAN: &str = "timespan";
pub const ARG_FROM_DATE: &str = "from_date";
pub const ARG_TO_DATE: &str = "to_date";
pub const ARG_MAX_RESULTS: &str = "max_results";
pub const ARG_LIMIT: &str = "limit";

pub const PARAM_TICKER: &str = "ticker";
pub const PARAM_MULTIPLIER: &str = "multiplier";
pub const PARAM_TIMESPAN: &str = "timespan";
pub const PARAM_FROM: &str = "from";
pub const PARAM_TO: &str = "to";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_MAX_RESULTS: &str = "max_results";

pub const DEFAULT_MULTIPLIER: u32 = 1;
pub const DEFAULT_FROM_DATE: &str = "2024-01-01";
pub const DEFAULT_TO_DATE: &str = "2024-12-31";
pub const DEFAULT_DISPLAY_LIMIT: usize = 100;
pub const DEFAULT_FETCH_LIMIT: usize = 50_000;

pub fn make_timespan_label(multiplier: u32, timespan: &str) -> String {
    format!("{multiplier} {timespan}")
}

pub fn make_truncation_note(display_limit: usize, total_count: usize) -> String {
    format!("Showing first {display_limit} of {total_count} total aggregates")
}
