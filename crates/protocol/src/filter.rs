//! List filters and their compiled query form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::validation::{ValidationError, parse_date};

/// Upper bound on the number of records a list request returns.
///
/// This is a safety cap, not pagination: no cursor or continuation is
/// exposed, and records past the cap are simply not returned.
pub const MAX_RESULTS: usize = 100;

/// Raw list filters as they arrive in the query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl MetricFilter {
    /// Compile into a typed query
    ///
    /// Blank strings count as absent. Date parse failures are client errors.
    pub fn compile(&self) -> Result<MetricQuery, ValidationError> {
        let start = non_empty(&self.start_date)
            .map(|v| parse_date("startDate", v))
            .transpose()?;
        let end = non_empty(&self.end_date)
            .map(|v| parse_date("endDate", v))
            .transpose()?;

        Ok(MetricQuery {
            name: non_empty(&self.name).map(str::to_string),
            team: non_empty(&self.team).map(str::to_string),
            role: non_empty(&self.role).map(str::to_string),
            start,
            end,
            limit: MAX_RESULTS,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// AND-composed predicate over metric records
///
/// Scalar fields are exact-match equality; `start`/`end` are inclusive
/// bounds on `timestamp`. `None` means unconstrained. Results are ordered
/// newest first and truncated at `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub name: Option<String>,
    pub team: Option<String>,
    pub role: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for MetricQuery {
    fn default() -> Self {
        Self {
            name: None,
            team: None,
            role: None,
            start: None,
            end: None,
            limit: MAX_RESULTS,
        }
    }
}

impl MetricQuery {
    /// Reference predicate; stores that evaluate queries natively must agree with it
    pub fn matches(&self, metric: &Metric) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            want.as_deref().is_none_or(|w| w == have)
        }

        eq(&self.name, &metric.name)
            && eq(&self.team, &metric.team)
            && eq(&self.role, &metric.role)
            && self.start.is_none_or(|s| metric.timestamp >= s)
            && self.end.is_none_or(|e| metric.timestamp <= e)
    }

    /// Filter, order newest first and cap an in-memory set of records
    pub fn apply<'a, I>(&self, records: I) -> Vec<Metric>
    where
        I: IntoIterator<Item = &'a Metric>,
    {
        let mut hits: Vec<Metric> = records
            .into_iter()
            .filter(|m| self.matches(m))
            .cloned()
            .collect();

        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        hits.truncate(self.limit);
        hits
    }
}
