use crate::{
    cancel::CancellationToken,
    config::ClientConfig,
    error::Result,
    transport::{HttpTransport, Transport, TransportResponse},
    types::{GenerationRequest, PipelineResult},
    PipelineError,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client for the remote generation pipeline.
///
/// Each [`submit`](Self::submit) issues exactly one `POST {base_url}/generate`
/// and never retries. The call is bounded by the configured timeout and can be
/// aborted with a [`CancellationToken`].
///
/// # Example
///
/// ```no_run
/// use lesson_pipeline::{validate, ClientConfig, PipelineClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = PipelineClient::new(ClientConfig::default())?;
///     let request = validate(Some("4"), Some("Types of angles"))?;
///     let result = client.submit(&request).await?;
///     println!("final status: {}", result.final_status);
///     Ok(())
/// }
/// ```
pub struct PipelineClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for PipelineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineClient")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl PipelineClient {
    /// Create a client that talks HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any [`Transport`] (e.g. a mock).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit a request and parse the pipeline result.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<PipelineResult> {
        self.submit_inner(request, None).await
    }

    /// Same as [`submit`](Self::submit), abortable through `cancel`.
    ///
    /// A token that is already cancelled prevents the call entirely.
    pub async fn submit_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        self.submit_inner(request, Some(cancel)).await
    }

    async fn submit_inner(
        &self,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<PipelineResult> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(PipelineError::Cancelled);
        }

        let url = self.config.generate_url();
        let body = json!({ "grade": request.grade, "topic": request.topic });
        info!(
            target: "lesson_pipeline",
            %url,
            grade = request.grade,
            topic = %request.topic,
            transport = self.transport.name(),
            "submitting generation request"
        );

        let resp = self
            .bounded(self.transport.post_json(&url, &body), cancel)
            .await?;

        if !resp.is_success() {
            warn!(target: "lesson_pipeline", %url, status = resp.status, "pipeline service returned an error status");
            return Err(PipelineError::TransportFailure {
                status: resp.status,
            });
        }

        let result = PipelineResult::from_json(&resp.body).map_err(|e| {
            warn!(target: "lesson_pipeline", %url, error = %e, "pipeline response did not parse");
            e
        })?;
        debug!(
            target: "lesson_pipeline",
            was_refined = result.was_refined,
            final_status = %result.final_status,
            "pipeline result received"
        );
        Ok(result)
    }

    /// Probe `GET {base_url}/health`.
    ///
    /// Returns `Ok(true)` when the service reports `{"status": "healthy"}`,
    /// `Ok(false)` for any other 2xx body.
    pub async fn health(&self) -> Result<bool> {
        let url = self.config.health_url();
        let resp = self.bounded(self.transport.get(&url), None).await?;
        if !resp.is_success() {
            return Err(PipelineError::TransportFailure {
                status: resp.status,
            });
        }
        let value: Value = serde_json::from_str(&resp.body)?;
        let healthy = value.get("status").and_then(Value::as_str) == Some("healthy");
        debug!(target: "lesson_pipeline", %url, healthy, "health probe");
        Ok(healthy)
    }

    /// Apply the timeout and, when given, the cancellation token to one call.
    async fn bounded<F>(&self, call: F, cancel: Option<&CancellationToken>) -> Result<TransportResponse>
    where
        F: Future<Output = Result<TransportResponse>>,
    {
        let timeout = self.config.timeout;
        let timed = tokio::time::timeout(timeout, call);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                r = timed => r,
                _ = token.cancelled() => {
                    info!(target: "lesson_pipeline", "pipeline request cancelled");
                    return Err(PipelineError::Cancelled);
                }
            },
            None => timed.await,
        };
        outcome.map_err(|_| {
            warn!(target: "lesson_pipeline", ?timeout, "pipeline request timed out");
            PipelineError::Timeout(timeout)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockReply, MockTransport};
    use crate::types::ReviewStatus;
    use std::time::Duration;

    fn request() -> GenerationRequest {
        GenerationRequest {
            grade: 5,
            topic: "Fractions".into(),
        }
    }

    fn client(mock: &Arc<MockTransport>) -> PipelineClient {
        let config = ClientConfig::builder("http://svc:8000/")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        PipelineClient::with_transport(config, Arc::clone(mock) as Arc<dyn Transport>)
    }

    fn passing_body() -> Value {
        json!({
            "initial_output": {"explanation": "Halves and quarters.", "mcqs": []},
            "initial_review": {"status": "pass", "scores": {"accuracy": 9}, "feedback": []},
            "was_refined": false,
            "final_status": "pass"
        })
    }

    #[tokio::test]
    async fn test_submit_posts_once_to_generate() {
        let mock = Arc::new(MockTransport::fixed(MockReply::json(passing_body())));
        let result = client(&mock).submit(&request()).await.unwrap();

        assert_eq!(result.initial_review.status, ReviewStatus::Pass);
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].url, "http://svc:8000/generate");
        assert_eq!(calls[0].body, Some(json!({"grade": 5, "topic": "Fractions"})));
    }

    #[tokio::test]
    async fn test_non_success_is_transport_failure_without_retry() {
        let mock = Arc::new(MockTransport::fixed(MockReply::raw(503, "not json at all")));
        let err = client(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::TransportFailure { status: 503 }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_body_is_malformed() {
        let mock = Arc::new(MockTransport::fixed(MockReply::raw(200, "{\"was_refined\": true}")));
        let err = client(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_refined_without_refined_review_is_malformed() {
        let mut body = passing_body();
        body["was_refined"] = json!(true);
        body["refined_output"] = json!({"explanation": "again", "mcqs": []});
        let mock = Arc::new(MockTransport::fixed(MockReply::json(body)));
        let err = client(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_hung_call_times_out() {
        let mock = Arc::new(MockTransport::fixed(MockReply::hang()));
        let err = client(&mock).submit(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_call() {
        let mock = Arc::new(MockTransport::fixed(MockReply::json(passing_body())));
        let token = CancellationToken::new();
        token.cancel();
        let err = client(&mock)
            .submit_cancellable(&request(), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let mock = Arc::new(MockTransport::fixed(MockReply::hang()));
        let client = client(&mock);
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            })
        };
        let err = client.submit_cancellable(&request(), &token).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let mock = Arc::new(MockTransport::new(vec![
            MockReply::json(json!({"status": "healthy"})),
            MockReply::json(json!({"status": "degraded"})),
            MockReply::status(502),
        ]));
        let client = client(&mock);
        assert!(client.health().await.unwrap());
        assert!(!client.health().await.unwrap());
        assert!(matches!(
            client.health().await.unwrap_err(),
            PipelineError::TransportFailure { status: 502 }
        ));
        assert_eq!(mock.calls()[0].url, "http://svc:8000/health");
    }
}
