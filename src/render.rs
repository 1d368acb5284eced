//! Pure renderers from pipeline data to view data.
//!
//! Every function here reads only its argument and returns plain,
//! serializable view structs. The host decides how a view looks; these
//! functions decide what it says.

use crate::types::{ContentBlock, McqItem, PipelineResult, ReviewResult};
use serde::Serialize;
use serde_json::Number;

/// Which content/review pair a view belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPrefix {
    Initial,
    Refined,
}

impl ViewPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewPrefix::Initial => "initial",
            ViewPrefix::Refined => "refined",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McqView {
    /// 1-based question number.
    pub number: usize,
    pub question: String,
    pub options: Vec<OptionView>,
    /// The answer key as supplied.
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentView {
    pub explanation: String,
    pub mcqs: Vec<McqView>,
}

/// Score band used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

impl ScoreTier {
    pub fn for_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreTier::High
        } else if score >= 6.0 {
            ScoreTier::Medium
        } else {
            ScoreTier::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreTier::High => "high",
            ScoreTier::Medium => "medium",
            ScoreTier::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreView {
    /// Criterion name as received (e.g. `age_appropriateness`).
    pub criterion: String,
    /// Human label (e.g. `Age Appropriateness`).
    pub label: String,
    /// The score exactly as the service sent it.
    pub value: Number,
    pub tier: ScoreTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum FeedbackView {
    Items(Vec<String>),
    NoIssues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub passed: bool,
    pub status_label: String,
    pub scores: Vec<ScoreView>,
    pub feedback: FeedbackView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    pub was_refined: bool,
    /// "required one refinement pass" or "passed on first attempt".
    pub outcome: String,
    /// `final_status` uppercased, otherwise untouched.
    pub final_status_label: String,
}

/// Content and review views for one prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageViews {
    pub prefix: ViewPrefix,
    pub content: ContentView,
    pub review: ReviewView,
}

/// Everything a host displays for one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineView {
    pub initial: StageViews,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined: Option<StageViews>,
    pub summary: SummaryView,
}

impl PipelineView {
    pub fn get(&self, prefix: ViewPrefix) -> Option<&StageViews> {
        match prefix {
            ViewPrefix::Initial => Some(&self.initial),
            ViewPrefix::Refined => self.refined.as_ref(),
        }
    }
}

pub const REFINED_OUTCOME: &str = "required one refinement pass";
pub const FIRST_ATTEMPT_OUTCOME: &str = "passed on first attempt";

/// Render a content block.
///
/// Every option whose text starts with the answer key is flagged correct,
/// so an ambiguous key such as `"A"` against `"A) x"` and `"AB) y"` flags both.
pub fn render_content(block: &ContentBlock) -> ContentView {
    ContentView {
        explanation: block.explanation.clone(),
        mcqs: block
            .mcqs
            .iter()
            .enumerate()
            .map(|(i, mcq)| render_mcq(i + 1, mcq))
            .collect(),
    }
}

fn render_mcq(number: usize, mcq: &McqItem) -> McqView {
    McqView {
        number,
        question: mcq.question.clone(),
        options: mcq
            .options
            .iter()
            .map(|opt| OptionView {
                text: opt.clone(),
                correct: opt.starts_with(mcq.answer.as_str()),
            })
            .collect(),
        answer: mcq.answer.clone(),
    }
}

/// Render a review.
pub fn render_review(review: &ReviewResult) -> ReviewView {
    let passed = review.status.is_pass();
    let scores: Vec<ScoreView> = review
        .scores
        .as_ref()
        .map(|scores| {
            scores
                .iter()
                .map(|(criterion, value)| ScoreView {
                    criterion: criterion.to_string(),
                    label: format_label(criterion),
                    value: value.clone(),
                    tier: ScoreTier::for_score(value.as_f64().unwrap_or_default()),
                })
                .collect()
        })
        .unwrap_or_default();

    let feedback = match review.feedback {
        Some(ref items) if !items.is_empty() => FeedbackView::Items(items.clone()),
        _ => FeedbackView::NoIssues,
    };

    ReviewView {
        passed,
        status_label: if passed {
            "PASSED".to_string()
        } else {
            "FAILED - Needs Refinement".to_string()
        },
        scores,
        feedback,
    }
}

/// Render the closing summary. `final_status` is trusted, not re-derived.
pub fn render_final_summary(result: &PipelineResult) -> SummaryView {
    SummaryView {
        was_refined: result.was_refined,
        outcome: if result.was_refined {
            REFINED_OUTCOME.to_string()
        } else {
            FIRST_ATTEMPT_OUTCOME.to_string()
        },
        final_status_label: result.final_status.to_uppercase(),
    }
}

/// Render every view for a finished run.
pub fn render_pipeline(result: &PipelineResult) -> PipelineView {
    PipelineView {
        initial: StageViews {
            prefix: ViewPrefix::Initial,
            content: render_content(&result.initial_output),
            review: render_review(&result.initial_review),
        },
        refined: result.refinement().map(|r| StageViews {
            prefix: ViewPrefix::Refined,
            content: render_content(r.output),
            review: render_review(r.review),
        }),
        summary: render_final_summary(result),
    }
}

/// `age_appropriateness` -> `Age Appropriateness`.
pub fn format_label(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
