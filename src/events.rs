//! Event system for observing a pipeline run.
//!
//! Provides an optional, non-intrusive way to watch the state machine.
//! The machine queues an event for every run start, phase transition, stage
//! marker change and run end; the controller delivers them once its state
//! lock is released. Hosts implement [`EventHandler`] to drive progress
//! displays, logs or tests, and may read controller state from the handler.

use crate::state::{Phase, StageMarker};
use std::sync::Arc;

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A validated submission started a run.
    RunStarted {
        /// Requested grade.
        grade: u32,
        /// Requested topic.
        topic: String,
    },
    /// The state machine moved between phases.
    PhaseChanged {
        /// Phase before the transition.
        from: Phase,
        /// Phase after the transition.
        to: Phase,
    },
    /// A stage marker changed status, label or visibility.
    StageUpdated(StageMarker),
    /// The run reached `Finalized` (`ok = true`) or `Failed` (`ok = false`).
    RunFinished {
        /// Whether the run finalized.
        ok: bool,
    },
}

/// Handler for run events.
///
/// This is entirely optional -- the controller works without one.
///
/// # Example
///
/// ```
/// use lesson_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::PhaseChanged { to, .. } => println!("[phase] {}", to.name()),
///             Event::StageUpdated(marker) => println!("[{}] {}", marker.stage.title(), marker.label),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event, in the order the machine queued them.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use lesson_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::RunFinished { ok } = event {
///         println!("finished ok={}", ok);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
