//! Self-consistent answer grading for hackathon submissions.
//!
//! Turns a (question, reference answer, participant answer) triple into a
//! structured score despite a non-deterministic, rate-limited model backend
//! and adversarial participant input:
//!
//! - Four independently phrased prompt variants, participant text fenced as data
//! - Tolerant extraction of the judgment object from free-form model output
//! - Process-wide concurrency cap with exponential backoff and jitter
//! - Per-criterion median over repeated runs, optionally across two models
//! - Weighted final score, inconsistency and suspicious-score flags
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hackgrade_core::{
//!     EvaluationOptions, GraderConfig, OpenAiBackend, QuestionStore, Submission,
//!     SubmissionEvaluator,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GraderConfig::from_env()?;
//! let backend = Arc::new(OpenAiBackend::from_config(&config)?);
//! let evaluator = SubmissionEvaluator::from_config(&config, backend)?;
//!
//! let store = QuestionStore::open("questions.json")?;
//! let submission: Submission = serde_json::from_str(
//!     r#"{"participant_id":"TeamA","answers":[{"question_id":"Q1","answer":"EcoFlex"}]}"#,
//! )?;
//! let options = EvaluationOptions::from_config(&config);
//! let questions = store.snapshot().await;
//! let result = evaluator
//!     .evaluate_submission(&questions, &submission, &options)
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! Without a backend, [`SubmissionEvaluator::heuristic_only`] grades by token
//! overlap.

pub mod aggregate;
pub mod audit;
pub mod backend;
pub mod caller;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod heuristic;
pub mod limiter;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod questions;
pub mod retry;
pub mod scoring;

pub use aggregate::{aggregate_runs, median, AggregationSettings, SelfConsistencyEvaluator};
pub use audit::{run_injection_audit, InjectionAuditReport, PayloadOutcome, INJECTION_PAYLOADS};
pub use backend::{FakeBackend, ModelBackend, OpenAiBackend};
pub use caller::BackendCaller;
pub use config::GraderConfig;
pub use error::{GradeError, GradeResult};
pub use evaluator::{EvaluationOptions, SubmissionEvaluator};
pub use heuristic::heuristic_scores;
pub use limiter::ConcurrencyLimiter;
pub use model::{
    AggregatedEvaluation, AnswerEntry, CriterionScores, EvaluationRequest, Question,
    QuestionResult, Submission, SubmissionResult, VariantScore,
};
pub use parse::parse_response;
pub use prompt::{build_prompt, VARIANT_COUNT};
pub use questions::{QuestionBank, QuestionStore};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use scoring::{combine, Weights};
