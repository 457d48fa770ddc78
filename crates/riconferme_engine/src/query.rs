//! Continuation over `action=query` batches.

use std::collections::VecDeque;

use futures_util::stream::{self, Stream};
use serde_json::Value;

use crate::cookies::CookieStore;
use crate::request::{pages_of, Params, RequestEngine};
use crate::transport::Method;
use crate::ApiError;

/// Lazy, single-pass sequence of the pages or list entries of a query.
///
/// Each batch's `continue` object is merged into the original parameters to
/// form the next request. Iteration stops when a response has no
/// `continue`, or once a numeric `*limit` parameter has been satisfied.
pub struct QueryResults<'a> {
    engine: &'a RequestEngine,
    cookies: &'a mut dyn CookieStore,
    original: Params,
    next_params: Option<Params>,
    buffer: VecDeque<Value>,
    list_key: String,
    limit: Option<usize>,
    fetched: usize,
}

impl<'a> QueryResults<'a> {
    pub(crate) fn new(
        engine: &'a RequestEngine,
        cookies: &'a mut dyn CookieStore,
        params: Params,
    ) -> Self {
        let list_key = params
            .get("list")
            .cloned()
            .unwrap_or_else(|| "pages".to_string());
        let limit = params
            .iter()
            .find(|(key, value)| key.ends_with("limit") && value.as_str() != "max")
            .and_then(|(_, value)| value.parse().ok());
        Self {
            engine,
            cookies,
            next_params: Some(params.clone()),
            original: params,
            buffer: VecDeque::new(),
            list_key,
            limit,
            fetched: 0,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Value>, ApiError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            let Some(params) = self.next_params.take() else {
                return Ok(None);
            };
            let body = self
                .engine
                .execute_single(&mut *self.cookies, Method::Get, &params)
                .await?;
            self.absorb(&body);
        }
    }

    /// Drains the remaining items.
    pub async fn collect_all(mut self) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Value, ApiError>> + 'a {
        stream::unfold(Some(self), |state| async move {
            let mut results = state?;
            match results.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(results))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    fn absorb(&mut self, body: &Value) {
        let query = body.get("query").cloned().unwrap_or(Value::Null);
        if self.list_key == "pages" {
            let pages = pages_of(&query);
            self.fetched += pages
                .first()
                .and_then(|page| page.get("revisions"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            self.buffer.extend(pages);
        } else if let Some(entries) = query.get(&self.list_key).and_then(Value::as_array) {
            self.fetched += entries.len();
            self.buffer.extend(entries.iter().cloned());
        }

        if self.limit.is_some_and(|limit| self.fetched >= limit) {
            return;
        }
        if let Some(cont) = body.get("continue").and_then(Value::as_object) {
            let mut next = self.original.clone();
            for (key, value) in cont {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                next.insert(key.clone(), value);
            }
            self.next_params = Some(next);
        }
    }
}
