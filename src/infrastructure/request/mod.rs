//! Uniform REST dispatch: rate limiting, nonces, signing, status mapping.
//!
//! Each venue owns one [`Requester`]. A request goes through the venue's
//! limiter, gets a nonce and signature when asked for, is sent through the
//! configured [`HttpTransport`], and the response is mapped onto the error
//! taxonomy before decoding. Nothing is retried here; callers decide using
//! [`crate::error::check_transient_error`].

mod nonce;
mod recording;
mod sign;

pub use nonce::Nonce;
pub use recording::{Recorded, RecordingTransport};
pub use sign::{
    decode_base64_secret, hmac_sha256_base64, hmac_sha256_hex, hmac_sha512_base64,
    hmac_sha512_hex, RequestSigner, SignContext,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::config::{Credentials, VenueConfig};
use super::limiter::{RateLimiter, DEFAULT_CLASS};
use crate::error::{Error, Result};
use crate::port::outbound::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

const ERROR_BODY_LIMIT: usize = 512;

/// What to send, before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub auth: bool,
    pub nonce: bool,
    /// Limiter bucket to draw from.
    pub class: String,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            auth: false,
            nonce: false,
            class: DEFAULT_CLASS.to_string(),
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert("Content-Type".into(), "application/json".into());
        Ok(self)
    }

    #[must_use]
    pub fn authenticated(mut self) -> Self {
        self.auth = true;
        self
    }

    #[must_use]
    pub fn with_nonce(mut self) -> Self {
        self.nonce = true;
        self
    }

    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    fn encoded_query(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.query {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= ERROR_BODY_LIMIT {
        return text.into_owned();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// One venue's REST client.
pub struct Requester {
    venue: String,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    limiter: RateLimiter,
    nonce: Nonce,
    timeout: Duration,
    verbose: bool,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl Requester {
    /// A requester with no limiter, no signer and a 15s timeout.
    #[must_use]
    pub fn new(
        venue: impl Into<String>,
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            venue: venue.into(),
            base_url: base_url.into(),
            transport,
            limiter: RateLimiter::disabled(),
            nonce: Nonce::new(),
            timeout: Duration::from_secs(15),
            verbose: false,
            signer: None,
        }
    }

    /// Take timeout and verbosity from the venue's config.
    #[must_use]
    pub fn configured(mut self, config: &VenueConfig) -> Self {
        self.timeout = config.http_timeout;
        self.verbose = config.verbose;
        self
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send and return the raw response for binary payloads.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` when the request is authenticated and no key material is set
    /// - `RateLimited` on 429, `AuthRejected` on 401/403
    /// - `HttpStatus` for other non-2xx responses, or a venue error from the signer
    /// - transport errors from the underlying client
    pub async fn send_raw(
        &self,
        request: RequestDescriptor,
        credentials: Option<&Credentials>,
    ) -> Result<HttpResponse> {
        self.limiter.acquire(&request.class).await;

        let nonce = request.nonce.then(|| self.nonce.next());
        let mut query = request.encoded_query();
        let mut headers = request.headers.clone();

        if request.auth {
            let credentials = credentials
                .filter(|c| c.is_present())
                .ok_or_else(|| Error::AuthRequired {
                    venue: self.venue.clone(),
                })?;
            let signer = self
                .signer
                .as_ref()
                .ok_or_else(|| Error::not_yet_implemented(&self.venue, "request signing"))?;
            signer.sign(SignContext {
                method: request.method,
                path: &request.path,
                query: &mut query,
                headers: &mut headers,
                body: request.body.as_deref(),
                nonce,
                credentials,
            })?;
        }

        let mut url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let http = HttpRequest {
            method: request.method,
            url,
            headers,
            body: request.body,
            timeout: self.timeout,
        };
        if self.verbose {
            debug!(venue = %self.venue, method = %http.method, url = %http.url, "HTTP request");
        }

        let response = self.transport.send(http).await?;
        if self.verbose {
            debug!(
                venue = %self.venue,
                status = response.status,
                bytes = response.body.len(),
                "HTTP response"
            );
        }

        if response.is_success() {
            Ok(response)
        } else {
            Err(self.status_error(&response))
        }
    }

    /// Send and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Everything [`send_raw`](Self::send_raw) returns, plus `Decode` when the
    /// body does not match `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
        credentials: Option<&Credentials>,
    ) -> Result<T> {
        let response = self.send_raw(request, credentials).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| Error::Decode(format!("{}: {e}", self.venue)))
    }

    fn status_error(&self, response: &HttpResponse) -> Error {
        if response.status == 429 {
            let retry_after = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Error::RateLimited {
                venue: self.venue.clone(),
                retry_after,
            };
        }
        if let Some(err) = self
            .signer
            .as_ref()
            .and_then(|s| s.venue_error(response.status, &response.body))
        {
            return err;
        }
        match response.status {
            401 | 403 => Error::AuthRejected {
                venue: self.venue.clone(),
                reason: truncate_body(&response.body),
            },
            status => Error::HttpStatus {
                status,
                body: truncate_body(&response.body),
            },
        }
    }
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("venue", &self.venue)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::check_transient_error;
    use crate::testkit::transport::MockTransport;

    struct HeaderSigner;

    impl RequestSigner for HeaderSigner {
        fn sign(&self, ctx: SignContext<'_>) -> Result<()> {
            let payload = format!("{}{}", ctx.nonce.unwrap_or_default(), ctx.path);
            let sig = hmac_sha256_hex(ctx.credentials.secret.as_bytes(), payload.as_bytes())?;
            ctx.headers.insert("X-Key".into(), ctx.credentials.key.clone());
            ctx.headers.insert("X-Sign".into(), sig);
            Ok(())
        }

        fn venue_error(&self, status: u16, body: &[u8]) -> Option<Error> {
            let v: serde_json::Value = serde_json::from_slice(body).ok()?;
            Some(Error::Venue {
                venue: "mock".into(),
                code: v.get("code")?.to_string(),
                message: format!("{status}: {}", v.get("msg")?.as_str()?),
            })
        }
    }

    fn requester(transport: Arc<MockTransport>) -> Requester {
        Requester::new("mock", "https://api.example.com/", transport)
            .with_signer(Arc::new(HeaderSigner))
    }

    #[tokio::test]
    async fn decodes_json_and_builds_url() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, r#"{"price":"1.5"}"#);
        let req = requester(Arc::clone(&transport));

        let body: serde_json::Value = req
            .send(RequestDescriptor::get("/ticker").query("pair", "BTC-USD"), None)
            .await
            .unwrap();
        assert_eq!(body["price"], "1.5");

        let sent = transport.requests();
        assert_eq!(sent[0].url, "https://api.example.com/ticker?pair=BTC-USD");
        assert_eq!(sent[0].timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn signs_authenticated_requests() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, "{}");
        let req = requester(Arc::clone(&transport));
        let creds = Credentials::new("key", "secret");

        let _: serde_json::Value = req
            .send(
                RequestDescriptor::post("/orders").authenticated().with_nonce(),
                Some(&creds),
            )
            .await
            .unwrap();
        let sent = transport.requests();
        assert_eq!(sent[0].headers["X-Key"], "key");
        assert_eq!(sent[0].headers["X-Sign"].len(), 64);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_sending() {
        let transport = Arc::new(MockTransport::new());
        let req = requester(Arc::clone(&transport));
        let err = req
            .send_raw(RequestDescriptor::get("/balance").authenticated(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthRequired { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn maps_statuses() {
        let transport = Arc::new(MockTransport::new());
        let req = requester(Arc::clone(&transport));

        transport.push(HttpResponse {
            status: 429,
            headers: BTreeMap::from([("retry-after".into(), "3".into())]),
            body: Vec::new(),
        });
        let err = req.send_raw(RequestDescriptor::get("/a"), None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RateLimited { retry_after: Some(d), .. } if d == Duration::from_secs(3)
        ));
        assert!(check_transient_error(&err));

        transport.push_json(503, "unavailable");
        let err = req.send_raw(RequestDescriptor::get("/a"), None).await.unwrap_err();
        assert!(check_transient_error(&err));

        transport.push_json(400, r#"{"code":-1013,"msg":"bad qty"}"#);
        let err = req.send_raw(RequestDescriptor::get("/a"), None).await.unwrap_err();
        assert!(matches!(&err, Error::Venue { code, .. } if code == "-1013"));
        assert!(!check_transient_error(&err));

        transport.push_json(404, "nope");
        let err = req.send_raw(RequestDescriptor::get("/a"), None).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, "{not json");
        let req = requester(Arc::clone(&transport));
        let err = req
            .send::<serde_json::Value>(RequestDescriptor::get("/a"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeError);
    }
}
