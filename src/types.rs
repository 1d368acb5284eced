use crate::{error::Result, PipelineError};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::fmt;

/// A validated request for one pipeline run.
///
/// Only [`validate`](crate::validate::validate) constructs these from user input,
/// so a value in hand always has a positive grade and a trimmed, non-empty topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// School grade the content targets.
    pub grade: u32,

    /// Lesson topic, already trimmed.
    pub topic: String,
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqItem {
    pub question: String,

    /// Display order is significant and preserved.
    pub options: Vec<String>,

    /// Prefix key of the correct option (e.g. `"A"` for `"A) Paris"`).
    pub answer: String,
}

/// Generated material for one stage (initial or refined).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub explanation: String,
    pub mcqs: Vec<McqItem>,
}

/// Binary verdict of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pass,
    Fail,
}

impl ReviewStatus {
    pub fn is_pass(self) -> bool {
        matches!(self, ReviewStatus::Pass)
    }

    /// Wire form: `"pass"` or `"fail"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pass => "pass",
            ReviewStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criterion scores in the order the service listed them.
///
/// JSON objects carry no ordering guarantee in serde's default map types,
/// so the entries are collected straight off the wire into a `Vec`. Values
/// keep their JSON number form (`8`, `8.0`, `7.5`) and are not range-checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scores(pub Vec<(String, Number)>);

impl Scores {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Number)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, criterion: &str) -> Option<&Number> {
        self.0.iter().find(|(k, _)| k == criterion).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Number>> FromIterator<(K, V)> for Scores {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Scores(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for Scores {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Scores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = Scores;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of criterion name to numeric score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Scores, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Number>()? {
                    entries.push((key, value));
                }
                Ok(Scores(entries))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// A scored, feedback-bearing judgment of a [`ContentBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub status: ReviewStatus,

    /// Absent when the reviewer returned no scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,

    /// Absent when the reviewer returned no feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Vec<String>>,
}

/// Complete result of one remote pipeline run.
///
/// Construct through [`PipelineResult::from_json`] or
/// [`PipelineResult::from_value`], which enforce the refinement invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub initial_output: ContentBlock,
    pub initial_review: ReviewResult,
    pub was_refined: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_output: Option<ContentBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_review: Option<ReviewResult>,

    /// The content block the service settled on. Older services omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<ContentBlock>,

    /// Expected `"pass"` or `"fail"`, but passed through verbatim.
    pub final_status: String,
}

/// Borrowed view of the refinement pass, available only when `was_refined` is set.
#[derive(Debug, Clone, Copy)]
pub struct Refinement<'a> {
    pub output: &'a ContentBlock,
    pub review: &'a ReviewResult,
}

impl PipelineResult {
    /// Parse a response body and check the refinement invariant.
    pub fn from_json(body: &str) -> Result<Self> {
        let result: PipelineResult = serde_json::from_str(body)?;
        result.check()?;
        Ok(result)
    }

    /// Same as [`from_json`](Self::from_json) for an already-decoded value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let result: PipelineResult = serde_json::from_value(value)?;
        result.check()?;
        Ok(result)
    }

    fn check(&self) -> Result<()> {
        if self.was_refined {
            if self.refined_output.is_none() {
                return Err(PipelineError::MalformedResponse(
                    "was_refined is true but refined_output is missing".into(),
                ));
            }
            if self.refined_review.is_none() {
                return Err(PipelineError::MalformedResponse(
                    "was_refined is true but refined_review is missing".into(),
                ));
            }
        }
        Ok(())
    }

    /// The refinement pass, or `None` when the first review was accepted.
    ///
    /// Refined fields are never read when `was_refined` is false, even if the
    /// service happened to send them.
    pub fn refinement(&self) -> Option<Refinement<'_>> {
        if !self.was_refined {
            return None;
        }
        match (&self.refined_output, &self.refined_review) {
            (Some(output), Some(review)) => Some(Refinement { output, review }),
            _ => None,
        }
    }

    /// Status of the last review actually performed.
    pub fn last_review_status(&self) -> ReviewStatus {
        self.refinement()
            .map(|r| r.review.status)
            .unwrap_or(self.initial_review.status)
    }

    /// Whether the supplied `final_status` agrees with the last review.
    pub fn final_status_matches(&self) -> bool {
        self.final_status == self.last_review_status().as_str()
    }

    /// The content block the run settled on.
    pub fn final_content(&self) -> &ContentBlock {
        if let Some(ref out) = self.final_output {
            return out;
        }
        self.refinement()
            .map(|r| r.output)
            .unwrap_or(&self.initial_output)
    }
}
