use std::time::Duration;
use thiserror::Error;

/// Rejections produced while checking raw user input, before any network use.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Grade was absent, non-numeric, zero or negative.
    #[error("Please fill in all fields: grade must be a positive whole number")]
    MissingGrade,

    /// Topic was absent or empty after trimming.
    #[error("Please fill in all fields: topic must not be empty")]
    MissingTopic,
}

/// Errors produced by the pipeline client and its transport.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, DNS, reset).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    ///
    /// The response body is deliberately not parsed.
    #[error("API error: {status}")]
    TransportFailure {
        /// HTTP status code (e.g. 404, 500, 503).
        status: u16,
    },

    /// The service answered 2xx but the body does not describe a pipeline result.
    #[error("Malformed pipeline response: {0}")]
    MalformedResponse(String),

    /// The call did not complete within the configured timeout.
    #[error("Pipeline request timed out after {0:?}")]
    Timeout(Duration),

    /// The call was aborted through its cancellation token.
    #[error("Pipeline request was cancelled")]
    Cancelled,

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedResponse(err.to_string())
    }
}

impl PipelineError {
    /// HTTP status carried by the error, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::TransportFailure { status } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced by [`PipelineController::submit`](crate::PipelineController::submit).
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Input was rejected locally; the client was never invoked.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A run is already in flight; the submit control is disabled.
    #[error("A pipeline run is already in progress")]
    Busy,

    /// The run failed in the client; the state machine is in `Failed`.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The state machine refused a transition.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// A state machine transition outside the transition table.
///
/// The machine is left unchanged when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid pipeline transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub to: &'static str,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_message_includes_status() {
        let err = PipelineError::TransportFailure { status: 500 };
        assert_eq!(err.to_string(), "API error: 500");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_json_error_maps_to_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_controller_error_wraps_validation() {
        let err: ControllerError = ValidationError::MissingTopic.into();
        assert!(matches!(
            err,
            ControllerError::Validation(ValidationError::MissingTopic)
        ));
        assert!(err.to_string().contains("topic"));
    }
}
