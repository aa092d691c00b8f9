//! In-memory transport for tests
//!
//! [`MockTransport`] replays queued responses in order and records every
//! request it receives, so tests can assert how many exchanges happened and
//! what was sent without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::errors::{ApiClientError, Result, TransportErrorKind};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};

type Reply = Result<HttpResponse>;

/// Scripted transport that records requests
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    /// Create a mock transport with no queued replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a JSON body.
    pub fn push_json(&self, status: u16, body: &Value) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.push_reply(Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Queue a response with a raw body.
    pub fn push_raw(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.push_reply(Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, kind: TransportErrorKind, message: &str) {
        self.push_reply(Err(ApiClientError::Transport { kind, message: message.to_string() }));
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn push_reply(&self, reply: Reply) {
        lock(&self.replies).push_back(reply);
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        lock(&self.requests).push(request);
        lock(&self.replies).pop_front().unwrap_or_else(|| {
            Err(ApiClientError::Transport {
                kind: TransportErrorKind::Other,
                message: "no scripted reply left".to_string(),
            })
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
