//! Transport wrapper that keeps a copy of every exchange for debugging.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::port::outbound::transport::{HttpRequest, HttpResponse, HttpTransport};

/// One request and what came back.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: HttpRequest,
    /// `None` when the transport itself failed.
    pub response: Option<HttpResponse>,
}

/// Delegates to an inner transport and records each call.
pub struct RecordingTransport {
    inner: Arc<dyn HttpTransport>,
    log: Mutex<Vec<Recorded>>,
    limit: usize,
}

impl RecordingTransport {
    /// Keep at most `limit` entries, dropping the oldest.
    #[must_use]
    pub fn new(inner: Arc<dyn HttpTransport>, limit: usize) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let result = self.inner.send(request.clone()).await;
        let mut log = self.log.lock();
        if log.len() >= self.limit {
            log.remove(0);
        }
        log.push(Recorded {
            request,
            response: result.as_ref().ok().cloned(),
        });
        result
    }
}
