//! Explicit state machine for a pipeline run.
//!
//! ```text
//! Idle ─► Generating ─► GeneratedReviewing ─┬──────────────────────────────► Finalized
//!             │                │            └► Refining ─► RefinedReviewing ─┘
//!             └────────────────┴─► Failed
//! ```
//!
//! Alongside the phase the machine keeps one [`StageMarker`] per pipeline
//! stage, which is what a host displays. Refine and RefinedReview markers are
//! hidden unless the run was refined.
//!
//! The machine never calls observers itself. Every change is queued as an
//! [`Event`] and handed out by [`PipelineStateMachine::take_events`], so the
//! owner can deliver them after releasing any lock around the machine.

use crate::error::{InvalidTransition, PipelineError};
use crate::events::Event;
use crate::types::{GenerationRequest, PipelineResult, ReviewStatus};
use serde::Serialize;
use tracing::{debug, warn};

/// Phase of the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Generating,
    GeneratedReviewing,
    Refining,
    RefinedReviewing,
    Finalized { final_status: String },
    Failed { message: String },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Generating => "generating",
            Phase::GeneratedReviewing => "generated_reviewing",
            Phase::Refining => "refining",
            Phase::RefinedReviewing => "refined_reviewing",
            Phase::Finalized { .. } => "finalized",
            Phase::Failed { .. } => "failed",
        }
    }

    /// A run is outstanding; submission must stay disabled.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::Generating | Phase::GeneratedReviewing | Phase::Refining | Phase::RefinedReviewing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finalized { .. } | Phase::Failed { .. })
    }

    /// The transition table. Reset to `Idle` is always allowed.
    ///
    /// `GeneratedReviewing -> Failed` covers a service that reports a failure
    /// after generation; the controller parses the whole response before
    /// touching the review stage, so it only ever fails from `Generating`.
    fn can_transition_to(&self, to: &Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (_, Idle)
                | (Idle, Generating)
                | (Generating, GeneratedReviewing)
                | (GeneratedReviewing, Refining)
                | (Refining, RefinedReviewing)
                | (GeneratedReviewing, Finalized { .. })
                | (RefinedReviewing, Finalized { .. })
                | (Generating, Failed { .. })
                | (GeneratedReviewing, Failed { .. })
        )
    }
}

/// The five pipeline stages, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Generate,
    InitialReview,
    Refine,
    RefinedReview,
    Finalize,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::Generate,
        StageId::InitialReview,
        StageId::Refine,
        StageId::RefinedReview,
        StageId::Finalize,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Only shown when the run was refined.
    pub fn is_conditional(self) -> bool {
        matches!(self, StageId::Refine | StageId::RefinedReview)
    }

    pub fn title(self) -> &'static str {
        match self {
            StageId::Generate => "Generator",
            StageId::InitialReview => "Reviewer",
            StageId::Refine => "Refiner",
            StageId::RefinedReview => "Re-review",
            StageId::Finalize => "Final",
        }
    }
}

/// Display status of one stage marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Complete,
    Failed,
}

/// What a host shows for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageMarker {
    pub stage: StageId,
    pub status: StageStatus,
    pub label: String,
    pub visible: bool,
}

impl StageMarker {
    fn pending(stage: StageId) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            label: "Pending".to_string(),
            visible: !stage.is_conditional(),
        }
    }
}

fn review_label(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pass => "Passed",
        ReviewStatus::Fail => "Failed",
    }
}

/// Drives phases and stage markers for one controller.
///
/// The machine is re-entrant: [`reset`](Self::reset) returns it to `Idle` with
/// all markers pending and conditional stages hidden, ready for the next run.
#[derive(Debug)]
pub struct PipelineStateMachine {
    phase: Phase,
    markers: [StageMarker; 5],
    history: Vec<Phase>,
    pending: Vec<Event>,
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            markers: StageId::ALL.map(StageMarker::pending),
            history: vec![Phase::Idle],
            pending: Vec::new(),
        }
    }

    /// Drain the events queued since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// All stage markers in display order, hidden ones included.
    pub fn stages(&self) -> &[StageMarker] {
        &self.markers
    }

    pub fn marker(&self, stage: StageId) -> &StageMarker {
        &self.markers[stage.index()]
    }

    /// Phases visited since the last reset, starting with `Idle`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Force the machine back to `Idle` and clear every marker.
    pub fn reset(&mut self) {
        let from = std::mem::replace(&mut self.phase, Phase::Idle);
        self.history.clear();
        self.history.push(Phase::Idle);
        for stage in StageId::ALL {
            self.markers[stage.index()] = StageMarker::pending(stage);
        }
        if from != Phase::Idle {
            debug!(target: "lesson_pipeline", from = from.name(), "state machine reset");
            self.pending.push(Event::PhaseChanged { from, to: Phase::Idle });
        }
    }

    /// `Idle -> Generating` for a validated submission.
    pub fn begin(&mut self, request: &GenerationRequest) -> Result<(), InvalidTransition> {
        self.transition(Phase::Generating)?;
        self.pending.push(Event::RunStarted {
            grade: request.grade,
            topic: request.topic.clone(),
        });
        self.set_marker(StageId::Generate, StageStatus::Active, "Running...", true);
        Ok(())
    }

    /// Walk the stages a successful result reached, ending in `Finalized`.
    pub fn apply_result(&mut self, result: &PipelineResult) -> Result<(), InvalidTransition> {
        self.transition(Phase::GeneratedReviewing)?;
        self.set_marker(StageId::Generate, StageStatus::Complete, "Done", true);
        self.set_marker(
            StageId::InitialReview,
            StageStatus::Complete,
            review_label(result.initial_review.status),
            true,
        );

        if let Some(refinement) = result.refinement() {
            // Refinement already happened server-side; both markers complete at once.
            self.transition(Phase::Refining)?;
            self.set_marker(StageId::Refine, StageStatus::Complete, "Done", true);
            self.transition(Phase::RefinedReviewing)?;
            self.set_marker(
                StageId::RefinedReview,
                StageStatus::Complete,
                review_label(refinement.review.status),
                true,
            );
        }

        if !result.final_status_matches() {
            warn!(
                target: "lesson_pipeline",
                final_status = %result.final_status,
                last_review = %result.last_review_status(),
                "final_status disagrees with the last review; displaying it as received"
            );
        }

        self.transition(Phase::Finalized {
            final_status: result.final_status.clone(),
        })?;
        let final_label = result.final_status.to_uppercase();
        self.set_marker(StageId::Finalize, StageStatus::Complete, &final_label, true);
        self.pending.push(Event::RunFinished { ok: true });
        Ok(())
    }

    /// Move to the absorbing `Failed` phase.
    pub fn fail(&mut self, error: &PipelineError) -> Result<(), InvalidTransition> {
        self.transition(Phase::Failed {
            message: error.to_string(),
        })?;
        self.set_marker(StageId::Generate, StageStatus::Failed, "Error", true);
        self.pending.push(Event::RunFinished { ok: false });
        Ok(())
    }

    fn transition(&mut self, to: Phase) -> Result<(), InvalidTransition> {
        if !self.phase.can_transition_to(&to) {
            return Err(InvalidTransition {
                from: self.phase.name(),
                to: to.name(),
            });
        }
        debug!(target: "lesson_pipeline", from = self.phase.name(), to = to.name(), "phase transition");
        let from = std::mem::replace(&mut self.phase, to.clone());
        self.history.push(to.clone());
        self.pending.push(Event::PhaseChanged { from, to });
        Ok(())
    }

    fn set_marker(&mut self, stage: StageId, status: StageStatus, label: &str, visible: bool) {
        let marker = &mut self.markers[stage.index()];
        marker.status = status;
        marker.label = label.to_string();
        marker.visible = visible;
        self.pending.push(Event::StageUpdated(marker.clone()));
    }
}
