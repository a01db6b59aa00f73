//! Request descriptions and response envelopes.

use std::collections::BTreeMap;

use agentbox_common::{AgentboxError, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

/// A request to dispatch against the admin backend, described independently
/// of the session that will decorate and send it.
///
/// Dispatch may send the request twice (once more after a forced
/// re-authentication), so the description owns its parts rather than a
/// built `reqwest::Request`.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the session's base URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    /// GET request for `path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Request with an explicit method.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), headers: Vec::new(), body: None }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Caller-facing parameters for listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct RequestParameters {
    /// Related sub-resources to embed (`include=a,b,c`)
    pub include: Vec<String>,
    /// Filter expressions, rendered as `filter[key]=value`
    pub filter: BTreeMap<String, String>,
}

impl RequestParameters {
    /// Render into query parameters, excluding pagination (the search
    /// engine owns `page`/`limit`).
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.include.is_empty() {
            query.push(("include".to_string(), self.include.join(",")));
        }
        for (key, value) in &self.filter {
            query.push((format!("filter[{key}]"), value.clone()));
        }
        query
    }
}

/// Body shape of single-resource admin API responses:
/// `{ "response": <payload or error list> }`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub response: Value,
}

/// One error object the backend embeds in an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl ApiEnvelope {
    /// Unwrap the payload, turning an embedded error list into an `Api`
    /// error.
    pub fn into_result(self, status: u16) -> Result<Value> {
        if let Some(errors) = self.response.get("errors").and_then(Value::as_array) {
            let details: Vec<ApiErrorDetail> = errors
                .iter()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect();
            let message = if details.is_empty() {
                "backend reported unstructured errors".to_string()
            } else {
                details
                    .iter()
                    .map(|d| format!("{} {}: {}", d.code, d.title, d.detail))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(AgentboxError::Api { status, message });
        }
        Ok(self.response)
    }
}
