//! Single requests against the action API: parameter completion, retry,
//! cookie threading and response classification.

use std::collections::BTreeMap;
use std::sync::Arc;

use bot_logging::{bot_debug, bot_warn};
use serde_json::Value;

use crate::cookies::{set_cookies, CookieStore};
use crate::query::QueryResults;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::ApiError;

/// Request parameters, sorted by name.
pub type Params = BTreeMap<String, String>;

/// Seconds of replication lag tolerated by write requests.
pub const MAXLAG_SECONDS: &str = "5";

pub fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Clone)]
pub struct RequestEngine {
    api_url: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl RequestEngine {
    pub fn new(api_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            api_url: api_url.into(),
            transport,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// One round trip, without continuation.
    pub async fn execute_single(
        &self,
        cookies: &mut dyn CookieStore,
        method: Method,
        params: &Params,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(cookies, method, params);
        let response = self.send_with_retry(&request).await?;
        for (name, value) in set_cookies(&response.headers) {
            cookies.store(&name, &value);
        }
        let body: Value = serde_json::from_str(&response.body)
            .map_err(|err| ApiError::UnexpectedResponse(format!("invalid JSON: {err}")))?;
        check_response(&body, params.get("action").map(String::as_str))?;
        Ok(body)
    }

    /// Lazy sequence over every batch of an `action=query` request.
    pub fn execute_as_query<'a>(
        &'a self,
        cookies: &'a mut dyn CookieStore,
        params: Params,
    ) -> Result<QueryResults<'a>, ApiError> {
        match params.get("action").map(String::as_str) {
            Some("query") => Ok(QueryResults::new(self, cookies, params)),
            other => Err(ApiError::NotAQuery(other.unwrap_or_default().to_string())),
        }
    }

    fn build_request(
        &self,
        cookies: &dyn CookieStore,
        method: Method,
        params: &Params,
    ) -> HttpRequest {
        let mut full = params.clone();
        full.insert("format".into(), "json".into());
        full.insert("formatversion".into(), "2".into());
        if method == Method::Post {
            full.insert("maxlag".into(), MAXLAG_SECONDS.into());
        }
        HttpRequest {
            method,
            url: self.api_url.clone(),
            params: full.into_iter().collect(),
            cookie: cookies.cookie_header(),
        }
    }

    async fn send_with_retry(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        bot_debug!(
            "API {:?} {}",
            request.method,
            request.param("action").unwrap_or_default()
        );
        match self.transport.send(request).await {
            Err(err) if err.is_timeout() => {
                bot_warn!("Request to {} timed out, retrying once", self.api_url);
                Ok(self.transport.send(request).await?)
            }
            other => Ok(other?),
        }
    }
}

/// Raises the error or the first warning carried by a decoded response.
pub fn check_response(body: &Value, action: Option<&str>) -> Result<(), ApiError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let info = error.get("info").and_then(Value::as_str).unwrap_or_default();
        return Err(ApiError::from_code(code, info));
    }
    let Some(warnings) = body.get("warnings") else {
        return Ok(());
    };
    let scoped = action
        .and_then(|action| warnings.get(action))
        .or_else(|| warnings.get("main"));
    match scoped.and_then(warning_text) {
        Some(text) => Err(ApiError::Warning(text)),
        None => Ok(()),
    }
}

fn warning_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("warnings")
            .or_else(|| map.get("*"))
            .and_then(warning_text)
            .or_else(|| map.values().find_map(warning_text)),
        Value::Array(items) => items.iter().find_map(warning_text),
        _ => None,
    }
}

/// The first entry of `query.pages`, in either response shape.
pub fn first_page(body: &Value) -> Result<&Value, ApiError> {
    let pages = body
        .get("query")
        .and_then(|q| q.get("pages"))
        .ok_or_else(|| ApiError::UnexpectedResponse("no query.pages".into()))?;
    let first = match pages {
        Value::Array(items) => items.first(),
        Value::Object(map) => map.values().next(),
        _ => None,
    };
    first.ok_or_else(|| ApiError::UnexpectedResponse("empty query.pages".into()))
}

/// `query.pages` as a list, whatever the response shape.
pub fn pages_of(query: &Value) -> Vec<Value> {
    match query.get("pages") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(map)) => map.values().cloned().collect(),
        _ => Vec::new(),
    }
}
