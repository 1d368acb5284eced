//! # Lesson Pipeline
//!
//! Client-side controller for a remote "generate → review → (refine →
//! re-review) → finalize" lesson-content pipeline.
//!
//! The remote service does the generating and reviewing. This crate does
//! everything around it: validates the request, makes the single call,
//! interprets the conditionally-present parts of the response, drives an
//! explicit stage state machine, and renders each stage into plain view data
//! a host can display.
//!
//! ## Core Concepts
//!
//! - **[`validate()`]**: turns raw form input into a [`GenerationRequest`].
//! - **[`PipelineClient`]**: one `POST /generate`, bounded by a timeout and a
//!   [`CancellationToken`], parsed into a [`PipelineResult`].
//! - **[`PipelineStateMachine`]**: phases and per-stage markers, queued as events
//!   for an [`EventHandler`](events::EventHandler).
//! - **[`render`]**: pure functions from results to [`PipelineView`]s.
//! - **[`PipelineController`]**: wires the above together with a
//!   single-flight submit guard.
//! - **[`Transport`](transport::Transport)**: the network seam, with
//!   [`MockTransport`] for tests and demos.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lesson_pipeline::{ClientConfig, PipelineClient, PipelineController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("http://localhost:8000").build()?;
//!     let controller = PipelineController::new(PipelineClient::new(config)?);
//!
//!     let view = controller.submit(Some("4"), Some("Types of angles")).await?;
//!     for mcq in &view.initial.content.mcqs {
//!         println!("Q{}: {}", mcq.number, mcq.question);
//!     }
//!     println!("{} ({})", view.summary.final_status_label, view.summary.outcome);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod render;
pub mod state;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod validate;

pub use cancel::CancellationToken;
pub use client::PipelineClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::PipelineController;
pub use error::{ControllerError, InvalidTransition, PipelineError, Result, ValidationError};
pub use render::{
    render_content, render_final_summary, render_pipeline, render_review, ContentView,
    FeedbackView, PipelineView, ReviewView, ScoreTier, SummaryView, ViewPrefix,
};
pub use state::{Phase, PipelineStateMachine, StageId, StageMarker, StageStatus};
pub use transport::{HttpTransport, MockReply, MockTransport};
pub use types::{
    ContentBlock, GenerationRequest, McqItem, PipelineResult, ReviewResult, ReviewStatus, Scores,
};
pub use validate::validate;
