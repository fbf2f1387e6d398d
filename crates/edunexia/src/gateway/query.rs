use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};

/// PostgREST query-string builder: column filters, ordering, and the offset window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    params: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(self, columns: &str) -> Self {
        self.push("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("eq.{value}"))
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("lt.{value}"))
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("gte.{value}"))
    }

    pub fn order_desc(self, column: &str) -> Self {
        self.push("order", format!("{column}.desc"))
    }

    pub fn window(self, offset: u64, limit: u32) -> Self {
        self.push("offset", offset.to_string())
            .push("limit", limit.to_string())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }
}

/// Timestamp literal accepted by PostgREST filters.
pub fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/0`.
pub fn content_range_total(header: &str) -> Option<u64> {
    header
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
}
