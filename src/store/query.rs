//! Row query builder.

use std::fmt::Display;

use serde_json::Value as JsonValue;

/// Equality-filtered, optionally ordered select over one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    table: String,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl RowQuery {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Display) -> Self {
        self.filters.push((column.into(), value.to_string()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some((column.into(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// `(column, ascending)`
    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.order
            .as_ref()
            .map(|(column, ascending)| (column.as_str(), *ascending))
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether a JSON row satisfies every equality filter.
    pub fn matches(&self, row: &JsonValue) -> bool {
        self.filters.iter().all(|(column, expected)| match row.get(column) {
            Some(JsonValue::String(value)) => value == expected,
            Some(JsonValue::Null) | None => false,
            Some(other) => other.to_string() == *expected,
        })
    }

    /// Query-string pairs in PostgREST syntax.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(
            self.filters
                .iter()
                .map(|(column, value)| (column.clone(), format!("eq.{value}"))),
        );
        if let Some((column, ascending)) = &self.order {
            let direction = if *ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}
