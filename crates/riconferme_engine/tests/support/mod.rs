use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use riconferme_engine::{HttpRequest, HttpResponse, Transport, TransportError, TransportErrorKind};

/// Serves queued responses in order and records every request; an empty
/// queue is a network error.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Result<HttpResponse, TransportError>) {
        lock(&self.responses).push_back(response);
    }

    pub fn push_json(&self, value: serde_json::Value) {
        self.push(Ok(HttpResponse::json(value.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Err(TransportError::new(
                TransportErrorKind::Network,
                "no replayed response left",
            ))
        })
    }
}
