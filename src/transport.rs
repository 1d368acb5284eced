//! Transport trait and its HTTP and mock implementations.
//!
//! [`Transport`] is the seam between the pipeline client and the network.
//! [`HttpTransport`] talks to a real service with `reqwest`; [`MockTransport`]
//! replays canned responses so hosts and tests can drive the controller
//! without a live service.
//!
//! ```text
//! PipelineClient ──► Transport::post_json() ──► TransportResponse
//!                              │
//!                   ┌──────────┴──────────┐
//!              HttpTransport         MockTransport
//!               (reqwest)           (canned replies)
//! ```

use crate::config::ClientConfig;
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Raw status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text. Always empty for non-success statuses from
    /// [`HttpTransport`].
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the wire.
///
/// Implementations perform exactly one exchange per call and never retry.
/// Non-success statuses are returned as responses, not errors; only failures
/// to complete the exchange at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` a JSON body to `url`.
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse>;

    /// `GET` `url`.
    async fn get(&self, url: &str) -> Result<TransportResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Wrap an existing client (cheap to clone, uses `Arc` internally).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the configuration.
    ///
    /// The overall deadline is enforced by the pipeline client, so no
    /// request timeout is set on the `reqwest` client itself.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let client = builder.build().map_err(|e| {
            PipelineError::InvalidConfig(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }

    async fn read(resp: reqwest::Response) -> Result<TransportResponse> {
        let status = resp.status().as_u16();
        // Failure bodies are never read; a stalled one must not mask the status.
        let body = if resp.status().is_success() {
            resp.text().await?
        } else {
            String::new()
        };
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        let resp = self.client.post(url).json(body).send().await?;
        Self::read(resp).await
    }

    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let resp = self.client.get(url).send().await?;
        Self::read(resp).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// One canned reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockReply {
    status: u16,
    body: String,
    delay: Option<Duration>,
    hang: bool,
}

impl MockReply {
    /// A 200 response carrying `value` as JSON.
    pub fn json(value: Value) -> Self {
        Self::raw(200, value.to_string())
    }

    /// A response with an arbitrary status and body.
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
            hang: false,
        }
    }

    /// An empty-bodied response with the given status.
    pub fn status(status: u16) -> Self {
        Self::raw(status, "")
    }

    /// A reply that never arrives.
    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::status(200)
        }
    }

    /// Delay the reply.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A recorded call made against [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

/// A test transport that returns canned replies in order.
///
/// Cycles back to the beginning when all replies have been consumed.
/// Every call is recorded and can be inspected with [`calls`](Self::calls).
///
/// # Example
///
/// ```
/// use lesson_pipeline::transport::{MockReply, MockTransport};
///
/// let mock = MockTransport::new(vec![MockReply::status(500)]);
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTransport {
    /// Create a mock transport with the given canned replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockTransport requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same reply.
    pub fn fixed(reply: MockReply) -> Self {
        Self::new(vec![reply])
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    async fn answer(&self, call: MockCall) -> Result<TransportResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        let reply = self.replies[idx].clone();

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if reply.hang {
            std::future::pending::<()>().await;
        }
        Ok(TransportResponse {
            status: reply.status,
            body: reply.body,
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        self.answer(MockCall {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<TransportResponse> {
        self.answer(MockCall {
            method: "GET",
            url: url.to_string(),
            body: None,
        })
        .await
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
    use serde_json::json;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_mock_cycles_replies_and_records_calls() {
        let mock = MockTransport::new(vec![MockReply::status(500), MockReply::json(json!({"ok": true}))]);
        let r1 = mock.post_json("http://unused/generate", &json!({"grade": 1})).await.unwrap();
        let r2 = mock.get("http://unused/health").await.unwrap();
        let r3 = mock.get("http://unused/health").await.unwrap();
        assert_eq!(r1.status, 500);
        assert!(!r1.is_success());
        assert_eq!(r2.status, 200);
        assert_eq!(r2.body, r#"{"ok":true}"#);
        assert_eq!(r3.status, 500); // cycles

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].body, Some(json!({"grade": 1})));
        assert_eq!(calls[1].method, "GET");
        assert_eq!(calls[1].body, None);
    }

    #[tokio::test]
    async fn test_http_posts_json_body() {
        let app = Router::new().route(
            "/generate",
            post(|Json(body): Json<Value>| async move { Json(json!({ "echo": body })) }),
        );
        let base = spawn_server(app).await;

        let transport = HttpTransport::with_client(Client::new());
        let resp = transport
            .post_json(&format!("{}/generate", base), &json!({"grade": 5, "topic": "Fractions"}))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        let echoed: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(echoed["echo"]["topic"], "Fractions");
        assert_eq!(echoed["echo"]["grade"], 5);
    }

    #[tokio::test]
    async fn test_http_non_success_is_a_response() {
        let app = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_server(app).await;

        let transport = HttpTransport::from_config(&ClientConfig::default()).unwrap();
        let resp = transport
            .post_json(&format!("{}/generate", base), &json!({}))
            .await
            .unwrap();
        assert_eq!(resp.status, 500);
        assert!(!resp.is_success());
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_http_failure_status_returned_without_waiting_for_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Headers promise a body that never arrives.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 1024\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let transport = HttpTransport::with_client(Client::new());
        let resp = tokio::time::timeout(
            Duration::from_secs(2),
            transport.post_json(&format!("http://{}/generate", addr), &json!({})),
        )
        .await
        .expect("failure status must not wait on the body")
        .unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_http_get() {
        let app = Router::new().route("/health", get(|| async { Json(json!({"status": "healthy"})) }));
        let base = spawn_server(app).await;

        let transport = HttpTransport::with_client(Client::new());
        let resp = transport.get(&format!("{}/health", base)).await.unwrap();
        assert!(resp.is_success());
        assert!(resp.body.contains("healthy"));
    }

    #[tokio::test]
    async fn test_http_connection_refused_is_request_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::with_client(Client::new());
        let err = transport
            .post_json(&format!("http://{}/generate", addr), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Request(_)));
    }
}
