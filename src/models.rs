//! Data models for catalog queries.
//!
//! Requests and responses are JSON documents. The client understands a
//! handful of well-known fields (`query`, `limit`, `offset`, `page_size`,
//! `progress`, `results`, `errors`) and carries everything else forward
//! untouched, so server-driven continuation markers (cursors, next offsets)
//! survive from one round to the next without the client interpreting them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryError;

/// Wire field names. These are part of the service contract.
pub const FIELD_QUERY: &str = "query";
pub const FIELD_PROGRESS: &str = "progress";
pub const FIELD_LIMIT: &str = "limit";
pub const FIELD_OFFSET: &str = "offset";
pub const FIELD_PAGE_SIZE: &str = "page_size";
pub const FIELD_RESULTS: &str = "results";
pub const FIELD_ERRORS: &str = "errors";

/// Caller-supplied query parameters, as parsed from the command line.
///
/// Numeric options keep their raw signed value; the request builder decides
/// whether they are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub page_size: Option<i64>,
    pub progress: bool,
}

impl QueryParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// An outbound request document.
///
/// Starts life as the initial query built by [`Request::build`] and grows
/// as each response is merged into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request(Map<String, Value>);

impl Request {
    /// Build the initial request from caller parameters.
    ///
    /// `limit`, `offset` and `page_size` are only set when strictly
    /// positive; zero or negative means "unset". `progress` is always sent.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::MissingQuery` if the query is absent or blank.
    pub fn build(params: &QueryParams) -> Result<Self, QueryError> {
        let query = params
            .query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .ok_or(QueryError::MissingQuery)?;

        let mut fields = Map::new();
        fields.insert(FIELD_PROGRESS.to_string(), Value::Bool(params.progress));
        fields.insert(FIELD_QUERY.to_string(), Value::String(query.to_string()));

        for (key, value) in [
            (FIELD_LIMIT, params.limit),
            (FIELD_OFFSET, params.offset),
            (FIELD_PAGE_SIZE, params.page_size),
        ] {
            if let Some(v) = value.filter(|v| *v > 0) {
                fields.insert(key.to_string(), Value::from(v));
            }
        }

        Ok(Self(fields))
    }

    pub fn query(&self) -> Option<&str> {
        self.0.get(FIELD_QUERY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Overlay every top-level field of `response` onto a copy of this
    /// request. Response fields win on collision; nested values are
    /// replaced, not merged.
    pub fn merged_with(&self, response: &Response) -> Request {
        let mut next = self.clone();
        for (key, value) in response.fields() {
            next.0.insert(key.clone(), value.clone());
        }
        next
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Request {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A response document from one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// Rows returned this round, if the server had any.
    pub fn results(&self) -> Option<&Vec<Value>> {
        self.0.get(FIELD_RESULTS).and_then(Value::as_array)
    }

    /// The `results` field as sent, whatever its shape.
    pub fn results_value(&self) -> Option<&Value> {
        self.0.get(FIELD_RESULTS)
    }

    /// True if this round carried at least one result.
    pub fn has_results(&self) -> bool {
        match self.results_value() {
            None | Some(Value::Null) => false,
            Some(Value::Array(rows)) => !rows.is_empty(),
            Some(_) => true,
        }
    }

    /// Errors the server accumulated so far.
    pub fn errors(&self) -> Vec<ServerError> {
        match self.0.get(FIELD_ERRORS) {
            Some(Value::Array(entries)) => entries.iter().cloned().map(ServerError).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![ServerError(other.clone())],
        }
    }

    /// Progress indicator embedded in this response, as text.
    ///
    /// Servers send either a string (`"50"`) or a bare number (`50`).
    pub fn progress_token(&self) -> Option<String> {
        match self.0.get(FIELD_PROGRESS)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Response {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Response {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

/// One entry of a response's `errors` sequence.
///
/// Advisory only: these are shown to the user after the loop and never
/// change the exit code.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError(pub Value);

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(value: Value) -> Response {
        Response::try_from(value).unwrap()
    }

    #[test]
    fn test_build_minimal_request() {
        let req = Request::build(&QueryParams::new("select COLL_NAME, DATA_NAME")).unwrap();
        assert_eq!(
            req.to_value(),
            json!({"query": "select COLL_NAME, DATA_NAME", "progress": false})
        );
    }

    #[test]
    fn test_build_rejects_missing_or_blank_query() {
        assert!(matches!(
            Request::build(&QueryParams::default()),
            Err(QueryError::MissingQuery)
        ));
        assert!(matches!(
            Request::build(&QueryParams::new("")),
            Err(QueryError::MissingQuery)
        ));
        assert!(matches!(
            Request::build(&QueryParams::new("   ")),
            Err(QueryError::MissingQuery)
        ));
    }

    #[test]
    fn test_build_omits_non_positive_numbers() {
        for bad in [-3, -1, 0] {
            let params = QueryParams::new("q")
                .with_limit(bad)
                .with_offset(bad)
                .with_page_size(bad);
            let req = Request::build(&params).unwrap();
            assert!(!req.contains(FIELD_LIMIT), "limit {} should be omitted", bad);
            assert!(!req.contains(FIELD_OFFSET));
            assert!(!req.contains(FIELD_PAGE_SIZE));
        }
    }

    #[test]
    fn test_build_keeps_positive_numbers() {
        let params = QueryParams::new("q")
            .with_limit(5)
            .with_offset(10)
            .with_page_size(256)
            .with_progress(true);
        let req = Request::build(&params).unwrap();
        assert_eq!(
            req.to_value(),
            json!({"query": "q", "progress": true, "limit": 5, "offset": 10, "page_size": 256})
        );
    }

    #[test]
    fn test_merge_response_overrides_request() {
        let req = Request::build(&QueryParams::new("q").with_offset(1)).unwrap();
        let merged = req.merged_with(&response(json!({"offset": 100, "cursor": "abc"})));

        assert_eq!(merged.get("offset"), Some(&json!(100)));
        assert_eq!(merged.get("cursor"), Some(&json!("abc")));
        assert_eq!(merged.query(), Some("q"));
    }

    #[test]
    fn test_merge_empty_response_is_identity() {
        let req = Request::build(&QueryParams::new("q").with_limit(3)).unwrap();
        assert_eq!(req.merged_with(&Response::default()), req);
    }

    #[test]
    fn test_merge_replaces_nested_values_wholesale() {
        let req = Request::from(
            json!({"query": "q", "cursor": {"a": 1, "b": 2}})
                .as_object()
                .unwrap()
                .clone(),
        );
        let merged = req.merged_with(&response(json!({"cursor": {"a": 5}})));
        assert_eq!(merged.get("cursor"), Some(&json!({"a": 5})));
    }

    #[test]
    fn test_response_accessors() {
        let resp = response(json!({
            "results": [["/a", "f1"]],
            "errors": ["bad column", {"code": -1}],
            "progress": "50"
        }));

        assert_eq!(resp.results().unwrap().len(), 1);
        let errors: Vec<String> = resp.errors().iter().map(ToString::to_string).collect();
        assert_eq!(errors, vec!["bad column".to_string(), r#"{"code":-1}"#.to_string()]);
        assert_eq!(resp.progress_token().as_deref(), Some("50"));
    }

    #[test]
    fn test_response_numeric_progress_and_missing_fields() {
        let resp = response(json!({"progress": 75}));
        assert_eq!(resp.progress_token().as_deref(), Some("75"));
        assert!(resp.results().is_none());
        assert!(resp.errors().is_empty());

        let resp = response(json!({"progress": true}));
        assert_eq!(resp.progress_token(), None);
    }

    #[test]
    fn test_has_results() {
        assert!(response(json!({"results": [["/a"]]})).has_results());
        assert!(response(json!({"results": "/a"})).has_results());
        assert!(!response(json!({"results": []})).has_results());
        assert!(!response(json!({"results": null})).has_results());
        assert!(!response(json!({"errors": []})).has_results());
    }

    #[test]
    fn test_response_rejects_non_object() {
        assert!(Response::try_from(json!([1, 2])).is_err());
    }
}
