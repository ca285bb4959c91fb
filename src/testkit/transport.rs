//! Scripted [`HttpTransport`].

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::{HttpRequest, HttpResponse, HttpTransport};

/// Replies with queued responses in order and records every request.
///
/// An empty queue answers with a transport error, so a test that forgets to
/// script a reply fails loudly instead of hanging.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: &str) {
        self.push(HttpResponse::json(status, body));
    }

    pub fn push_error(&self, error: Error) {
        self.responses.lock().push_back(Err(error));
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn pending(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Connection(format!("no scripted response for {url}"))))
    }
}
