//! The pipeline result controller: validate, submit, drive stages, render.

use crate::{
    cancel::CancellationToken,
    client::PipelineClient,
    error::ControllerError,
    events::{emit, EventHandler},
    render::{render_pipeline, PipelineView},
    state::{Phase, PipelineStateMachine, StageMarker},
    types::GenerationRequest,
    validate::validate,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Scoped "loading" lock: held for the whole run, released on every exit path.
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives one submission at a time from raw input to rendered views.
///
/// Views are produced only once the complete result has arrived; a failed
/// run produces none. Only one run may be in flight: a second submission
/// while one is outstanding gets [`ControllerError::Busy`].
///
/// Events reach the handler only after the state lock is released, so a
/// handler may call [`stages`](Self::stages) or [`phase`](Self::phase).
///
/// # Example
///
/// ```no_run
/// use lesson_pipeline::{ClientConfig, PipelineClient, PipelineController};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let controller = PipelineController::new(PipelineClient::new(ClientConfig::default())?);
///     let view = controller.submit(Some("5"), Some("Fractions")).await?;
///     println!("{}", view.summary.outcome);
///     Ok(())
/// }
/// ```
pub struct PipelineController {
    client: PipelineClient,
    machine: Mutex<PipelineStateMachine>,
    in_flight: AtomicBool,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("client", &self.client)
            .field("machine", &self.machine)
            .field("in_flight", &self.in_flight)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

impl PipelineController {
    pub fn new(client: PipelineClient) -> Self {
        Self {
            client,
            machine: Mutex::new(PipelineStateMachine::new()),
            in_flight: AtomicBool::new(false),
            event_handler: None,
        }
    }

    /// Attach an observer for phase and stage events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn client(&self) -> &PipelineClient {
        &self.client
    }

    /// Whether the submit control is enabled (no run in flight).
    pub fn submit_enabled(&self) -> bool {
        !self.in_flight.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        self.machine().phase().clone()
    }

    /// Snapshot of the stage markers in display order.
    pub fn stages(&self) -> Vec<StageMarker> {
        self.machine().stages().to_vec()
    }

    /// Phases visited by the current (or last) run.
    pub fn history(&self) -> Vec<Phase> {
        self.machine().history().to_vec()
    }

    /// Validate raw input and run the pipeline.
    pub async fn submit(
        &self,
        grade_raw: Option<&str>,
        topic_raw: Option<&str>,
    ) -> Result<PipelineView, ControllerError> {
        let request = self.check(grade_raw, topic_raw)?;
        self.run(&request, None).await
    }

    /// Same as [`submit`](Self::submit), abortable through `cancel`.
    pub async fn submit_cancellable(
        &self,
        grade_raw: Option<&str>,
        topic_raw: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PipelineView, ControllerError> {
        let request = self.check(grade_raw, topic_raw)?;
        self.run(&request, Some(cancel)).await
    }

    fn check(
        &self,
        grade_raw: Option<&str>,
        topic_raw: Option<&str>,
    ) -> Result<GenerationRequest, ControllerError> {
        validate(grade_raw, topic_raw).map_err(|e| {
            warn!(target: "lesson_pipeline", error = %e, "submission rejected");
            ControllerError::Validation(e)
        })
    }

    /// Run an already validated request.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<PipelineView, ControllerError> {
        let _guard = SubmitGuard::acquire(&self.in_flight).ok_or_else(|| {
            warn!(target: "lesson_pipeline", "submission ignored: a run is already in flight");
            ControllerError::Busy
        })?;

        self.update(|machine| {
            machine.reset();
            machine.begin(request)
        })?;

        let outcome = match cancel {
            Some(token) => self.client.submit_cancellable(request, token).await,
            None => self.client.submit(request).await,
        };

        match outcome {
            Ok(result) => {
                self.update(|machine| machine.apply_result(&result))?;
                info!(
                    target: "lesson_pipeline",
                    was_refined = result.was_refined,
                    final_status = %result.final_status,
                    "pipeline run finalized"
                );
                Ok(render_pipeline(&result))
            }
            Err(e) => {
                error!(target: "lesson_pipeline", error = %e, "pipeline run failed");
                self.update(|machine| machine.fail(&e))?;
                Err(ControllerError::Pipeline(e))
            }
        }
    }

    fn machine(&self) -> MutexGuard<'_, PipelineStateMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` under the lock, then deliver the queued events without it.
    fn update<T>(&self, f: impl FnOnce(&mut PipelineStateMachine) -> T) -> T {
        let (out, events) = {
            let mut machine = self.machine();
            let out = f(&mut *machine);
            (out, machine.take_events())
        };
        for event in events {
            emit(&self.event_handler, event);
        }
        out
    }
}
