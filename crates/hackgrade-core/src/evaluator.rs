//! Submission Evaluator: fans a participant's answers out to the scorer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::aggregate::{aggregate_runs, AggregationSettings, SelfConsistencyEvaluator};
use crate::backend::ModelBackend;
use crate::caller::BackendCaller;
use crate::config::{clamp_runs, GraderConfig, MAX_WORKERS};
use crate::error::{GradeError, GradeResult};
use crate::heuristic::heuristic_scores;
use crate::limiter::ConcurrencyLimiter;
use crate::model::{
    AggregatedEvaluation, EvaluationRequest, QuestionResult, Submission, SubmissionResult,
    VariantScore,
};
use crate::questions::QuestionBank;

/// Label recorded on variant scores produced without a backend.
pub const HEURISTIC_MODEL: &str = "heuristic";

/// Per-call knobs of [`SubmissionEvaluator::evaluate_submission`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
    pub use_llm: bool,
    /// Primary model first; a second entry enables dual-model pooling.
    pub models: Vec<String>,
    pub workers: usize,
    pub sc_runs: u32,
}

impl EvaluationOptions {
    pub fn from_config(config: &GraderConfig) -> Self {
        Self {
            use_llm: config.use_llm,
            models: config.models(),
            workers: config.effective_workers(),
            sc_runs: config.effective_sc_runs(),
        }
    }
}

#[derive(Clone)]
pub struct SubmissionEvaluator {
    scorer: Option<SelfConsistencyEvaluator>,
    settings: AggregationSettings,
}

impl SubmissionEvaluator {
    /// Evaluator able to use the backend.
    pub fn new(scorer: SelfConsistencyEvaluator) -> Self {
        let settings = scorer.settings().clone();
        Self {
            scorer: Some(scorer),
            settings,
        }
    }

    /// Wire a backend into a full evaluator using `config` for the limiter,
    /// retry policy, timeout and aggregation thresholds.
    pub fn from_config(
        config: &GraderConfig,
        backend: Arc<dyn ModelBackend>,
    ) -> GradeResult<Self> {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_calls)?;
        let caller = BackendCaller::new(
            backend,
            limiter,
            config.retry.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        debug!(
            provider = caller.provider_name(),
            max_concurrent_calls = caller.limiter().capacity(),
            "backend caller ready"
        );
        let settings = AggregationSettings::from_config(config);
        Ok(Self::new(SelfConsistencyEvaluator::new(caller, settings)))
    }

    /// Evaluator restricted to the heuristic scorer.
    pub fn heuristic_only(settings: AggregationSettings) -> Self {
        Self {
            scorer: None,
            settings,
        }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// Backend provider, or `None` for heuristic-only grading.
    pub fn provider_name(&self) -> Option<&'static str> {
        self.scorer.as_ref().map(|s| s.caller().provider_name())
    }

    /// Grade every answer of `submission`.
    ///
    /// All question ids are resolved before any grading starts, so an unknown
    /// id fails the submission without partial results. Output order follows
    /// the input answers regardless of completion order.
    pub async fn evaluate_submission(
        &self,
        questions: &QuestionBank,
        submission: &Submission,
        options: &EvaluationOptions,
    ) -> GradeResult<SubmissionResult> {
        let participant_id = submission.participant().to_string();

        let requests = submission
            .answers
            .iter()
            .map(|a| {
                questions
                    .require(&a.question_id)
                    .map(|q| EvaluationRequest::new(q, a.answer.clone()))
            })
            .collect::<GradeResult<Vec<_>>>()?;

        let evaluations = if options.use_llm {
            let scorer = self.scorer.as_ref().ok_or_else(|| GradeError::Config {
                message: "LLM grading requested but no model backend is configured".to_string(),
            })?;
            self.grade_with_backend(scorer, &requests, options).await?
        } else {
            requests
                .iter()
                .map(|req| self.grade_heuristic(req))
                .collect::<GradeResult<Vec<_>>>()?
        };

        let questions = requests
            .into_iter()
            .zip(evaluations)
            .map(|(req, evaluation)| QuestionResult {
                question_id: req.question_id,
                evaluation,
            })
            .collect::<Vec<_>>();

        info!(
            participant_id = %participant_id,
            answers = questions.len(),
            use_llm = options.use_llm,
            "submission graded"
        );

        Ok(SubmissionResult {
            participant_id,
            questions,
        })
    }

    fn grade_heuristic(&self, req: &EvaluationRequest) -> GradeResult<AggregatedEvaluation> {
        let scores = heuristic_scores(&req.expected_answer, &req.participant_answer);
        let mut evaluation = aggregate_runs(
            vec![VariantScore {
                model: HEURISTIC_MODEL.to_string(),
                variant: 0,
                scores,
            }],
            1,
            &self.settings,
        )?;
        // token overlap cannot be talked into a high score
        evaluation.suspicious = false;
        evaluation.needs_manual_review = false;
        Ok(evaluation)
    }

    async fn grade_with_backend(
        &self,
        scorer: &SelfConsistencyEvaluator,
        requests: &[EvaluationRequest],
        options: &EvaluationOptions,
    ) -> GradeResult<Vec<AggregatedEvaluation>> {
        let models = Arc::new(
            options
                .models
                .iter()
                .filter(|m| !m.trim().is_empty())
                .cloned()
                .collect::<Vec<_>>(),
        );
        if models.is_empty() {
            return Err(GradeError::Config {
                message: "at least one model is required for LLM grading".to_string(),
            });
        }

        let workers = options.workers.clamp(1, MAX_WORKERS);
        let sc_runs = clamp_runs(options.sc_runs);
        let sem = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (idx, req) in requests.iter().enumerate() {
            let permit = sem.clone().acquire_owned().await.map_err(|e| GradeError::Internal {
                message: format!("worker pool closed: {e}"),
            })?;
            let scorer = scorer.clone();
            let models = models.clone();
            let req = req.clone();
            join_set.spawn(async move {
                let _permit = permit;
                debug!(question_id = %req.question_id, sc_runs, "grading answer");
                let result = if sc_runs > 1 {
                    scorer.evaluate_self_consistent(&req, &models, sc_runs).await
                } else {
                    scorer.evaluate_single(&req, &models[0]).await
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<GradeResult<AggregatedEvaluation>>> =
            (0..requests.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined.map_err(|e| GradeError::Internal {
                message: format!("grading task failed: {e}"),
            })?;
            slots[idx] = Some(result);
        }

        // first failure in answer order wins, independent of completion order
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(GradeError::Internal {
                        message: "grading task produced no result".to_string(),
                    })
                })
            })
            .collect()
    }
}
