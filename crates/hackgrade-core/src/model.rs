//! Data model shared by the scorer, the aggregator and reporting.

use serde::{Deserialize, Serialize};

/// Upper bound of every criterion.
pub const MAX_CRITERION: f64 = 5.0;

/// A question with its reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub expected_answer: String,
}

/// One answer to grade, built per answer and dropped afterwards.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub question_id: String,
    pub question_text: String,
    pub expected_answer: String,
    pub participant_answer: String,
}

impl EvaluationRequest {
    pub fn new(question: &Question, participant_answer: impl Into<String>) -> Self {
        Self {
            question_id: question.id.clone(),
            question_text: question.question.clone(),
            expected_answer: question.expected_answer.clone(),
            participant_answer: participant_answer.into(),
        }
    }
}

/// Scores for the three rubric criteria plus a justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub completeness: f64,
    pub conciseness: f64,
    pub correctness: f64,
    pub comment: String,
}

impl CriterionScores {
    /// Construct with every value clamped to `[0, 5]`.
    pub fn new(
        completeness: f64,
        conciseness: f64,
        correctness: f64,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            completeness: clamp_criterion(completeness),
            conciseness: clamp_criterion(conciseness),
            correctness: clamp_criterion(correctness),
            comment: comment.into(),
        }
    }

    /// Build from a flat judgment object. Missing or non-numeric keys count as 0.
    pub fn from_judgment(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        let comment = match obj.get("comment") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self::new(
            numeric_field(obj, "completeness"),
            numeric_field(obj, "conciseness"),
            numeric_field(obj, "correctness"),
            comment,
        )
    }

    pub fn triple(&self) -> [f64; 3] {
        [self.completeness, self.conciseness, self.correctness]
    }
}

fn numeric_field(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> f64 {
    match obj.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Clamp into `[0, 5]`; NaN maps to 0.
pub fn clamp_criterion(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_CRITERION)
}

/// One successful run inside a self-consistency batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantScore {
    pub model: String,
    pub variant: u32,
    #[serde(flatten)]
    pub scores: CriterionScores,
}

/// Final per-answer evaluation handed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEvaluation {
    #[serde(flatten)]
    pub criteria: CriterionScores,
    pub score: f64,
    pub inconsistent: bool,
    pub needs_manual_review: bool,
    pub suspicious: bool,
    pub runs_requested: u32,
    pub runs_succeeded: u32,
    pub variant_scores: Vec<VariantScore>,
}

/// Submission payload as received from participants. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
}

impl Submission {
    pub fn participant(&self) -> &str {
        self.participant_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub evaluation: AggregatedEvaluation,
}

/// Result set for one participant, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub participant_id: String,
    pub questions: Vec<QuestionResult>,
}
