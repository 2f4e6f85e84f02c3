use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TrialResult;

/// One result row, keyed by column name in select order.
pub type Row = Map<String, Value>;

/// A relational backend that runs one statement per call.
pub trait SqlBackend: Send + Sync {
    /// Run `sql` with positional text parameters (`$1`, `$2`, ...) and fetch every row.
    fn execute(&self, sql: &str, params: &[&str]) -> TrialResult<Vec<Row>>;
}

/// A remote search backend returning decoded JSON payloads.
pub trait ApiBackend: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> TrialResult<Value>;

    /// Release any held session. Later calls may reopen one.
    fn close(&self);
}

/// A single search against one remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub search: Option<String>,
    pub count: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
}

impl ApiRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            search: None,
            count: None,
            sort: None,
            limit: None,
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs for this request.
    ///
    /// `count` and `limit` are mutually exclusive: `count` aggregates into buckets, `limit`
    /// bounds raw results. When both are set, `count` wins and `limit` is not sent.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(count) = &self.count {
            pairs.push(("count", count.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }

        match (self.count.is_some(), self.limit) {
            (false, Some(limit)) => pairs.push(("limit", limit.to_string())),
            (true, Some(limit)) => debug!("dropping limit={limit}: count takes precedence"),
            _ => {}
        }

        pairs
    }
}
