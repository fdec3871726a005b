pub mod fetch;
pub mod plan;

use chrono::NaiveDate;

/// Parse a `YYYY-MM-DD` command-line date
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}
