//! Example: drive the controller against a MockTransport, no service needed.
//!
//! Run with: `cargo run --example mock_pipeline`

use lesson_pipeline::events::{Event, FnEventHandler};
use lesson_pipeline::{ClientConfig, MockReply, MockTransport, PipelineClient, PipelineController};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A run where the first review fails and one refinement pass fixes it
    let mock = MockTransport::fixed(MockReply::json(json!({
        "initial_output": {
            "explanation": "An acute angle is smaller than a right angle.",
            "mcqs": [{
                "question": "Which angle is exactly 90 degrees?",
                "options": ["A) Acute", "B) Right", "C) Obtuse"],
                "answer": "B"
            }]
        },
        "initial_review": {
            "status": "fail",
            "scores": {"age_appropriateness": 5, "conceptual_correctness": 9, "clarity": 6},
            "feedback": ["Explain what a right angle is before comparing to it"]
        },
        "was_refined": true,
        "refined_output": {
            "explanation": "A right angle looks like the corner of a book. An acute angle is smaller.",
            "mcqs": [{
                "question": "Which angle looks like the corner of a book?",
                "options": ["A) Acute", "B) Right", "C) Obtuse"],
                "answer": "B"
            }]
        },
        "refined_review": {
            "status": "pass",
            "scores": {"age_appropriateness": 8, "conceptual_correctness": 9, "clarity": 8},
            "feedback": []
        },
        "final_status": "pass"
    })));

    let client = PipelineClient::with_transport(ClientConfig::default(), Arc::new(mock));
    let controller = PipelineController::new(client).with_event_handler(Arc::new(FnEventHandler(
        |event: Event| {
            if let Event::StageUpdated(marker) = event {
                println!("[{}] {}", marker.stage.title(), marker.label);
            }
        },
    )));

    let view = controller.submit(Some("4"), Some("Types of angles")).await?;

    for stages in [Some(&view.initial), view.refined.as_ref()].into_iter().flatten() {
        println!("--- {} ---", stages.prefix.as_str());
        println!("{}", stages.content.explanation);
        println!("review: {}", stages.review.status_label);
        for score in &stages.review.scores {
            println!("  {}: {}/10 ({})", score.label, score.value, score.tier.as_str());
        }
    }
    println!("Final: {} ({})", view.summary.final_status_label, view.summary.outcome);
    Ok(())
}
